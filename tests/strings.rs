mod support;

use redtable::operation::ReturnValues;
use redtable::wire::{WireValue, KEY_ATTR, TTL_ATTR, VALUE_ATTR};
use redtable::{GetOptions, Reply, SetOptions, Value};

use support::{client_with, stored_record, stored_string, MockBackend, MockResponse, RecordedCall};
use redtable::backend::BackendError;

#[tokio::test]
async fn test_get_returns_stored_string() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_string("greeting", "hello"))));
    let client = client_with(&backend);

    let reply = client.get("greeting").await.unwrap();
    assert_eq!(reply, Reply::Value(Value::String("hello".to_string())));

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    let RecordedCall::Get(input) = &calls[0] else {
        panic!("expected a get call");
    };
    assert_eq!(input.table_name, support::TABLE);
    assert_eq!(input.key.get(KEY_ATTR), Some(&WireValue::S("greeting".to_string())));
    assert_eq!(input.consistent_read, None);
}

#[tokio::test]
async fn test_get_absent_key_is_nil() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    assert_eq!(client.get("missing").await.unwrap(), Reply::Nil);
}

#[tokio::test]
async fn test_get_non_scalar_value_is_nil() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "mylist",
        WireValue::L(vec![WireValue::S("a".to_string())]),
    ))));
    let client = client_with(&backend);

    assert_eq!(client.get("mylist").await.unwrap(), Reply::Nil);
}

#[tokio::test]
async fn test_get_with_consistent_read() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let options = GetOptions {
        consistent_read: Some(true),
    };
    client.get_with("k", options).await.unwrap();

    let RecordedCall::Get(input) = &backend.calls()[0] else {
        panic!("expected a get call");
    };
    assert_eq!(input.consistent_read, Some(true));
}

#[tokio::test]
async fn test_get_empty_key_is_rejected_before_any_call() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let err = client.get("").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "[redtable][GET]: expected key to be a non-empty string"
    );
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_set_writes_key_and_value() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client.set("greeting", "hello").await.unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let RecordedCall::Put(input) = &backend.calls()[0] else {
        panic!("expected a put call");
    };
    assert_eq!(input.item.get(KEY_ATTR), Some(&WireValue::S("greeting".to_string())));
    assert_eq!(input.item.get(VALUE_ATTR), Some(&WireValue::S("hello".to_string())));
    assert_eq!(input.item.get(TTL_ATTR), None);
    assert_eq!(input.condition_expression, None);
}

#[tokio::test]
async fn test_set_with_ex_carries_a_ttl() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let options = SetOptions {
        ex: Some(60),
        ..SetOptions::default()
    };
    client.set_with("k", "v", options).await.unwrap();

    let RecordedCall::Put(input) = &backend.calls()[0] else {
        panic!("expected a put call");
    };
    let Some(WireValue::N(ttl)) = input.item.get(TTL_ATTR) else {
        panic!("expected a numeric ttl attribute");
    };
    let ttl: u64 = ttl.parse().unwrap();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    assert!((now + 55..=now + 65).contains(&ttl));
}

#[tokio::test]
async fn test_set_nx_swallows_the_failed_condition() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Failure(BackendError::ConditionalCheckFailed(
        "exists".to_string(),
    )));
    let client = client_with(&backend);

    let options = SetOptions {
        nx: true,
        ..SetOptions::default()
    };
    let reply = client.set_with("k", "v", options).await.unwrap();
    assert_eq!(reply, Reply::Bool(false));

    let RecordedCall::Put(input) = &backend.calls()[0] else {
        panic!("expected a put call");
    };
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_not_exists(#key)")
    );
}

#[tokio::test]
async fn test_set_xx_requires_an_existing_key() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let options = SetOptions {
        xx: true,
        ..SetOptions::default()
    };
    client.set_with("k", "v", options).await.unwrap();

    let RecordedCall::Put(input) = &backend.calls()[0] else {
        panic!("expected a put call");
    };
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_exists(#key)")
    );
}

#[tokio::test]
async fn test_set_nx_and_xx_are_exclusive() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let options = SetOptions {
        nx: true,
        xx: true,
        ..SetOptions::default()
    };
    let err = client.set_with("k", "v", options).await.unwrap_err();
    assert_eq!(err.to_string(), "[redtable][SET]: NX / XX are exclusive");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_set_rejects_non_scalar_values() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let err = client
        .set("k", Value::List(vec![Value::from("a")]))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[redtable][SET]: expected value to be a string or a number"
    );
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_incr_answers_the_updated_value() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Attributes(Some(
        [(VALUE_ATTR.to_string(), WireValue::N("6".to_string()))].into(),
    )));
    let client = client_with(&backend);

    let reply = client.incr("counter").await.unwrap();
    assert_eq!(reply, Reply::Int(6));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(
        input.update_expression,
        "SET #value = if_not_exists(#value, :start) + :incr"
    );
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_not_exists(#key) OR attribute_type(#value, :type)")
    );
    let values = input.expression_attribute_values.as_ref().unwrap();
    assert_eq!(values.get(":incr"), Some(&WireValue::N("1".to_string())));
    assert_eq!(values.get(":start"), Some(&WireValue::N("0".to_string())));
    assert_eq!(input.return_values, ReturnValues::UpdatedNew);
}

#[tokio::test]
async fn test_decrby_subtracts() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Attributes(Some(
        [(VALUE_ATTR.to_string(), WireValue::N("-3".to_string()))].into(),
    )));
    let client = client_with(&backend);

    let reply = client.decrby("counter", 5).await.unwrap();
    assert_eq!(reply, Reply::Int(-3));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(
        input.update_expression,
        "SET #value = if_not_exists(#value, :start) - :decr"
    );
    let values = input.expression_attribute_values.as_ref().unwrap();
    assert_eq!(values.get(":decr"), Some(&WireValue::N("5".to_string())));
}

#[tokio::test]
async fn test_incr_on_non_number_propagates_the_failure() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Failure(BackendError::ConditionalCheckFailed(
        "not a number".to_string(),
    )));
    let client = client_with(&backend);

    let err = client.incr("greeting").await.unwrap_err();
    assert!(err.to_string().starts_with("[redtable][INCR]:"));
}

#[tokio::test]
async fn test_strlen_measures_the_stored_text() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_string("greeting", "hello"))));
    let client = client_with(&backend);

    assert_eq!(client.strlen("greeting").await.unwrap(), Reply::Int(5));
}

#[tokio::test]
async fn test_strlen_of_absent_key_is_zero() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    assert_eq!(client.strlen("missing").await.unwrap(), Reply::Int(0));
}

#[tokio::test]
async fn test_mget_answers_in_call_order() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Records(vec![
        Some(stored_string("a", "first")),
        None,
        Some(stored_string("c", "third")),
    ]));
    let client = client_with(&backend);

    let replies = client
        .mget(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(
        replies,
        vec![
            Reply::Value(Value::String("first".to_string())),
            Reply::Nil,
            Reply::Value(Value::String("third".to_string())),
        ]
    );

    let RecordedCall::TransactGet(inputs) = &backend.calls()[0] else {
        panic!("expected a batch read");
    };
    assert_eq!(inputs.len(), 3);
}

#[tokio::test]
async fn test_mset_writes_one_atomic_batch() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client
        .mset(vec![
            ("a".to_string(), Value::from("first")),
            ("b".to_string(), Value::from(2_i64)),
        ])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let RecordedCall::TransactWrite(operations) = &backend.calls()[0] else {
        panic!("expected a batch write");
    };
    assert_eq!(operations.len(), 2);
}

#[tokio::test]
async fn test_mget_rejects_more_than_25_keys() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let keys: Vec<String> = (0..26).map(|i| format!("key{i}")).collect();
    let err = client.mget(keys).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "[redtable][MGET]: expected at most 25 elements, got 26"
    );
    assert_eq!(backend.call_count(), 0);
}
