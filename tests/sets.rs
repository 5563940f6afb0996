mod support;

use redtable::wire::{WireValue, VALUE_ATTR};
use redtable::{Reply, SetMember, Value};

use support::{client_with, stored_record, MockBackend, MockResponse, RecordedCall};

fn wire_set(members: &[&str]) -> WireValue {
    WireValue::Ss(members.iter().map(|m| m.to_string()).collect())
}

#[tokio::test]
async fn test_sadd_adds_all_members_at_once() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client
        .sadd("myset", vec![SetMember::from("a"), SetMember::from("b")])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(input.update_expression, "ADD #value :members");
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_not_exists(#key) OR attribute_type(#value, :type)")
    );
    let values = input.expression_attribute_values.as_ref().unwrap();
    assert_eq!(values.get(":members"), Some(&wire_set(&["a", "b"])));
    assert_eq!(values.get(":type"), Some(&WireValue::S("SS".to_string())));
}

#[tokio::test]
async fn test_sadd_numbers_store_a_number_set() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    client
        .sadd("scores", vec![SetMember::from(3), SetMember::from(5)])
        .await
        .unwrap();

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    let values = input.expression_attribute_values.as_ref().unwrap();
    assert_eq!(
        values.get(":members"),
        Some(&WireValue::Ns(vec!["3".to_string(), "5".to_string()]))
    );
    assert_eq!(values.get(":type"), Some(&WireValue::S("NS".to_string())));
}

#[tokio::test]
async fn test_sadd_rejects_mixed_members_before_any_call() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let err = client
        .sadd("myset", vec![SetMember::from("a"), SetMember::from(5)])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[redtable][SADD]: expected every set member to be a string, but member 1 is a number"
    );
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_srem_deletes_members() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client
        .srem("myset", vec![SetMember::from("a")])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(input.update_expression, "DELETE #value :members");
}

#[tokio::test]
async fn test_scard_of_absent_key_is_zero() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    assert_eq!(client.scard("missing").await.unwrap(), Reply::Int(0));
}

#[tokio::test]
async fn test_scard_counts_members() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "myset",
        wire_set(&["a", "b", "c"]),
    ))));
    let client = client_with(&backend);

    assert_eq!(client.scard("myset").await.unwrap(), Reply::Int(3));
}

#[tokio::test]
async fn test_sismember_checks_one_candidate() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "myset",
        wire_set(&["a", "b"]),
    ))));
    backend.respond(MockResponse::Record(Some(stored_record(
        "myset",
        wire_set(&["a", "b"]),
    ))));
    let client = client_with(&backend);

    assert_eq!(client.sismember("myset", "a").await.unwrap(), Reply::Bool(true));
    assert_eq!(client.sismember("myset", "z").await.unwrap(), Reply::Bool(false));
}

#[tokio::test]
async fn test_smismember_answers_per_candidate() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "myset",
        wire_set(&["a", "b"]),
    ))));
    let client = client_with(&backend);

    let reply = client
        .smismember("myset", vec![SetMember::from("a"), SetMember::from("z")])
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::Array(vec![Reply::Bool(true), Reply::Bool(false)])
    );
}

#[tokio::test]
async fn test_smembers_of_absent_key_is_an_empty_array() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    assert_eq!(
        client.smembers("missing").await.unwrap(),
        Reply::Array(Vec::new())
    );
}

#[tokio::test]
async fn test_scard_on_a_list_is_a_wrong_type_error() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "mylist",
        WireValue::L(vec![WireValue::S("a".to_string())]),
    ))));
    let client = client_with(&backend);

    let err = client.scard("mylist").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "[redtable][SCARD]: expected mylist to hold a set value"
    );
}

#[tokio::test]
async fn test_sdiff_subtracts_the_rest_from_the_first() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Records(vec![
        Some(stored_record("a", wire_set(&["x", "y", "z"]))),
        Some(stored_record("b", wire_set(&["y"]))),
    ]));
    let client = client_with(&backend);

    let reply = client
        .sdiff(vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::Array(vec![
            Reply::Value(Value::String("x".to_string())),
            Reply::Value(Value::String("z".to_string())),
        ])
    );
}

#[tokio::test]
async fn test_sinter_keeps_the_common_members() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Records(vec![
        Some(stored_record("a", wire_set(&["x", "y"]))),
        Some(stored_record("b", wire_set(&["y", "z"]))),
    ]));
    let client = client_with(&backend);

    let reply = client
        .sinter(vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::Array(vec![Reply::Value(Value::String("y".to_string()))])
    );
}

#[tokio::test]
async fn test_sunion_merges_without_duplicates() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Records(vec![
        Some(stored_record("a", wire_set(&["x", "y"]))),
        Some(stored_record("b", wire_set(&["y", "z"]))),
    ]));
    let client = client_with(&backend);

    let reply = client
        .sunion(vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    let members = reply.as_array().unwrap();
    assert_eq!(members.len(), 3);
}

#[tokio::test]
async fn test_sunionstore_writes_the_result() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Records(vec![
        Some(stored_record("a", wire_set(&["x"]))),
        Some(stored_record("b", wire_set(&["y"]))),
    ]));
    let client = client_with(&backend);

    let reply = client
        .sunionstore("dest", vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Int(2));

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let RecordedCall::Put(input) = &calls[1] else {
        panic!("expected the result to be written");
    };
    let Some(WireValue::Ss(members)) = input.item.get(VALUE_ATTR) else {
        panic!("expected a string set value");
    };
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_sinterstore_empty_result_clears_the_destination() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Records(vec![
        Some(stored_record("a", wire_set(&["x"]))),
        Some(stored_record("b", wire_set(&["y"]))),
    ]));
    let client = client_with(&backend);

    let reply = client
        .sinterstore("dest", vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Int(0));

    let calls = backend.calls();
    assert!(matches!(calls[1], RecordedCall::Delete(_)));
}

#[tokio::test]
async fn test_smove_is_one_atomic_batch() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "src",
        wire_set(&["a", "b"]),
    ))));
    let client = client_with(&backend);

    let reply = client.smove("src", "dst", "a").await.unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let RecordedCall::TransactWrite(operations) = &calls[1] else {
        panic!("expected a batch write");
    };
    assert_eq!(operations.len(), 2);
}

#[tokio::test]
async fn test_smove_answers_false_when_the_member_is_absent() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "src",
        wire_set(&["b"]),
    ))));
    let client = client_with(&backend);

    let reply = client.smove("src", "dst", "a").await.unwrap();
    assert_eq!(reply, Reply::Bool(false));

    // Only the read happened.
    assert_eq!(backend.call_count(), 1);
}
