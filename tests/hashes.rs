mod support;

use std::collections::HashMap;

use redtable::backend::BackendError;
use redtable::wire::{WireValue, VALUE_ATTR};
use redtable::{Reply, Value};

use support::{client_with, stored_record, MockBackend, MockResponse, RecordedCall};

fn wire_hash(fields: &[(&str, &str)]) -> WireValue {
    WireValue::M(
        fields
            .iter()
            .map(|(field, value)| (field.to_string(), WireValue::S(value.to_string())))
            .collect(),
    )
}

#[tokio::test]
async fn test_hget_projects_one_field() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[("name", "ada")]),
    ))));
    let client = client_with(&backend);

    let reply = client.hget("user", "name").await.unwrap();
    assert_eq!(reply, Reply::Value(Value::String("ada".to_string())));

    let RecordedCall::Get(input) = &backend.calls()[0] else {
        panic!("expected a get call");
    };
    assert_eq!(
        input.projection_expression.as_deref(),
        Some("#key, #value.#field")
    );
    let names = input.expression_attribute_names.as_ref().unwrap();
    assert_eq!(names.get("#field"), Some(&"name".to_string()));
}

#[tokio::test]
async fn test_hget_absent_field_is_nil() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[]),
    ))));
    let client = client_with(&backend);

    assert_eq!(client.hget("user", "age").await.unwrap(), Reply::Nil);
}

#[tokio::test]
async fn test_hgetall_decodes_the_whole_map() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[("name", "ada"), ("city", "london")]),
    ))));
    let client = client_with(&backend);

    let reply = client.hgetall("user").await.unwrap();
    let expected: HashMap<String, Value> = [
        ("name".to_string(), Value::from("ada")),
        ("city".to_string(), Value::from("london")),
    ]
    .into();
    assert_eq!(reply, Reply::Value(Value::Map(expected)));
}

#[tokio::test]
async fn test_hgetall_of_absent_key_is_nil() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    assert_eq!(client.hgetall("missing").await.unwrap(), Reply::Nil);
}

#[tokio::test]
async fn test_hdel_removes_each_named_field() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client
        .hdel("user", vec!["name".to_string(), "city".to_string()])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(
        input.update_expression,
        "REMOVE #value.#field0, #value.#field1"
    );
    let names = input.expression_attribute_names.as_ref().unwrap();
    assert_eq!(names.get("#field0"), Some(&"name".to_string()));
    assert_eq!(names.get("#field1"), Some(&"city".to_string()));
}

#[tokio::test]
async fn test_hdel_answers_false_without_a_hash() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Failure(BackendError::ConditionalCheckFailed(
        "no hash".to_string(),
    )));
    let client = client_with(&backend);

    let reply = client.hdel("missing", vec!["name".to_string()]).await.unwrap();
    assert_eq!(reply, Reply::Bool(false));
}

#[tokio::test]
async fn test_hexists_checks_the_projected_field() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[("name", "ada")]),
    ))));
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[]),
    ))));
    let client = client_with(&backend);

    assert_eq!(client.hexists("user", "name").await.unwrap(), Reply::Bool(true));
    assert_eq!(client.hexists("user", "age").await.unwrap(), Reply::Bool(false));
}

#[tokio::test]
async fn test_hstrlen_measures_a_string_field() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[("name", "ada")]),
    ))));
    let client = client_with(&backend);

    let reply = client.hstrlen("user", "name").await.unwrap();
    assert_eq!(reply, Reply::Int(3));

    let RecordedCall::Get(input) = &backend.calls()[0] else {
        panic!("expected a get call");
    };
    assert_eq!(
        input.projection_expression.as_deref(),
        Some("#key, #value.#field")
    );
}

#[tokio::test]
async fn test_hstrlen_of_a_non_string_field_is_zero() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        WireValue::M([("visits".to_string(), WireValue::N("4".to_string()))].into()),
    ))));
    let client = client_with(&backend);

    assert_eq!(client.hstrlen("user", "visits").await.unwrap(), Reply::Int(0));
    assert_eq!(client.hstrlen("missing", "name").await.unwrap(), Reply::Int(0));
}

#[tokio::test]
async fn test_hlen_of_absent_key_is_zero() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    assert_eq!(client.hlen("missing").await.unwrap(), Reply::Int(0));
}

#[tokio::test]
async fn test_hmget_projects_only_the_named_fields() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Record(Some(stored_record(
        "user",
        wire_hash(&[("name", "ada")]),
    ))));
    let client = client_with(&backend);

    let reply = client
        .hmget("user", vec!["name".to_string(), "age".to_string()])
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::Array(vec![
            Reply::Value(Value::String("ada".to_string())),
            Reply::Nil,
        ])
    );

    let RecordedCall::Get(input) = &backend.calls()[0] else {
        panic!("expected a get call");
    };
    assert_eq!(
        input.projection_expression.as_deref(),
        Some("#key, #value.#field0, #value.#field1")
    );
}

#[tokio::test]
async fn test_hincrby_updates_one_field() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Attributes(Some(
        [(
            VALUE_ATTR.to_string(),
            WireValue::M([("visits".to_string(), WireValue::N("4".to_string()))].into()),
        )]
        .into(),
    )));
    let client = client_with(&backend);

    let reply = client.hincrby("user", "visits", 2).await.unwrap();
    assert_eq!(reply, Reply::Int(4));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(
        input.update_expression,
        "SET #value.#field = if_not_exists(#value.#field, :start) + :incr"
    );
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_exists(#key) AND attribute_type(#value, :type)")
    );
}

#[tokio::test]
async fn test_hset_updates_an_existing_hash_fieldwise() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client
        .hset(
            "user",
            vec![
                ("name".to_string(), Value::from("ada")),
                ("city".to_string(), Value::from("london")),
            ],
        )
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    let RecordedCall::Update(input) = &calls[0] else {
        panic!("expected an update call");
    };
    assert_eq!(
        input.update_expression,
        "SET #value.#field0 = :value0, #value.#field1 = :value1"
    );
}

#[tokio::test]
async fn test_hmset_writes_like_hset() {
    let backend = MockBackend::new();
    let client = client_with(&backend);

    let reply = client
        .hmset("user", vec![("name".to_string(), Value::from("ada"))])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let RecordedCall::Update(input) = &backend.calls()[0] else {
        panic!("expected an update call");
    };
    assert_eq!(input.update_expression, "SET #value.#field0 = :value0");
}

#[tokio::test]
async fn test_hset_falls_back_to_creating_the_hash() {
    let backend = MockBackend::new();
    backend.respond(MockResponse::Failure(BackendError::ConditionalCheckFailed(
        "no hash".to_string(),
    )));
    let client = client_with(&backend);

    let reply = client
        .hset("user", vec![("name".to_string(), Value::from("ada"))])
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bool(true));

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let RecordedCall::Update(create) = &calls[1] else {
        panic!("expected the creating update");
    };
    assert_eq!(create.update_expression, "SET #value = :values");
    assert_eq!(
        create.condition_expression.as_deref(),
        Some("attribute_not_exists(#key)")
    );
}
