use std::collections::HashMap;

use crate::commands::{validate_batch, validate_field, validate_key};
use crate::error::CommandError;
use crate::executor::Submit;
use crate::operation::{GetInput, ReturnValues, StorageOperation, UpdateInput};
use crate::reply::Reply;
use crate::value::Value;
use crate::wire::{self, WireValue, KEY_ATTR, VALUE_ATTR};

use super::{attribute_names, attribute_values};

/// Handles the HGET command.
///
/// Projects a single field out of the stored map; the record never
/// travels in full. Absent keys and absent fields both read as nil.
pub(crate) async fn hget(
    table: &str,
    submit: &Submit,
    key: &str,
    field: &str,
) -> Result<Reply, CommandError> {
    match read_field(table, submit, key, field).await? {
        Some(value) => Ok(Reply::Value(value)),
        None => Ok(Reply::Nil),
    }
}

/// Handles the HGETALL command. An absent key reads as nil.
pub(crate) async fn hgetall(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    match read_hash(table, submit, key).await? {
        Some(fields) => Ok(Reply::Value(Value::Map(fields))),
        None => Ok(Reply::Nil),
    }
}

/// Handles the HDEL command.
///
/// One update removes all named fields. The key must exist and hold a
/// map; when it does not, the failed condition reads as `false`.
pub(crate) async fn hdel(
    table: &str,
    submit: &Submit,
    key: &str,
    fields: &[String],
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    validate_batch(fields.len())?;
    for field in fields {
        validate_field(field)?;
    }

    let mut paths = Vec::with_capacity(fields.len());
    let mut names = vec![("#key", KEY_ATTR), ("#value", VALUE_ATTR)];
    let placeholders: Vec<String> = (0..fields.len()).map(|i| format!("#field{}", i)).collect();
    for (placeholder, field) in placeholders.iter().zip(fields) {
        paths.push(format!("#value.{}", placeholder));
        names.push((placeholder.as_str(), field.as_str()));
    }

    let expression = format!("REMOVE {}", paths.join(", "));
    let mut input = UpdateInput::new(table, wire::key_item(key), &expression);
    input.condition_expression =
        Some("attribute_exists(#key) AND attribute_type(#value, :type)".to_string());
    input.expression_attribute_names = Some(attribute_names(&names));
    input.expression_attribute_values = Some(attribute_values([(
        ":type",
        WireValue::S("M".to_string()),
    )]));

    match submit.submit(StorageOperation::Update(input)).await {
        Ok(_) => Ok(Reply::Bool(true)),
        Err(err) if err.is_conditional_failure() => Ok(Reply::Bool(false)),
        Err(err) => Err(err),
    }
}

/// Handles the HEXISTS command.
pub(crate) async fn hexists(
    table: &str,
    submit: &Submit,
    key: &str,
    field: &str,
) -> Result<Reply, CommandError> {
    let value = read_field(table, submit, key, field).await?;
    Ok(Reply::Bool(value.is_some()))
}

/// Handles the HSTRLEN command.
///
/// Measures the text length of one field. Absent keys, absent fields
/// and non-string field values all measure zero.
pub(crate) async fn hstrlen(
    table: &str,
    submit: &Submit,
    key: &str,
    field: &str,
) -> Result<Reply, CommandError> {
    let length = match read_field(table, submit, key, field).await? {
        Some(Value::String(s)) => s.len(),
        _ => 0,
    };
    Ok(Reply::Int(length as i64))
}

/// Handles the HKEYS command. An absent key reads as nil.
pub(crate) async fn hkeys(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    match read_hash(table, submit, key).await? {
        Some(fields) => Ok(Reply::Array(
            fields
                .into_keys()
                .map(|field| Reply::Value(Value::String(field)))
                .collect(),
        )),
        None => Ok(Reply::Nil),
    }
}

/// Handles the HVALS command. An absent key reads as nil.
pub(crate) async fn hvals(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    match read_hash(table, submit, key).await? {
        Some(fields) => Ok(Reply::Array(
            fields.into_values().map(Reply::Value).collect(),
        )),
        None => Ok(Reply::Nil),
    }
}

/// Handles the HLEN command. An absent key has zero fields.
pub(crate) async fn hlen(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    match read_hash(table, submit, key).await? {
        Some(fields) => Ok(Reply::Int(fields.len() as i64)),
        None => Ok(Reply::Int(0)),
    }
}

/// Handles the HMGET command.
///
/// Projects only the named fields and answers one reply per field in
/// call order, nil for the ones that are absent.
pub(crate) async fn hmget(
    table: &str,
    submit: &Submit,
    key: &str,
    fields: &[String],
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    validate_batch(fields.len())?;
    for field in fields {
        validate_field(field)?;
    }

    let mut paths = vec!["#key".to_string()];
    let mut names = vec![("#key", KEY_ATTR), ("#value", VALUE_ATTR)];
    let placeholders: Vec<String> = (0..fields.len()).map(|i| format!("#field{}", i)).collect();
    for (placeholder, field) in placeholders.iter().zip(fields) {
        paths.push(format!("#value.{}", placeholder));
        names.push((placeholder.as_str(), field.as_str()));
    }

    let mut input = GetInput::new(table, wire::key_item(key));
    input.projection_expression = Some(paths.join(", "));
    input.expression_attribute_names = Some(attribute_names(&names));

    let output = submit.submit(StorageOperation::Get(input)).await?;
    let mut projected = decode_hash(key, output.record())?.unwrap_or_default();

    let replies = fields
        .iter()
        .map(|field| match projected.remove(field) {
            Some(value) => Reply::Value(value),
            None => Reply::Nil,
        })
        .collect();
    Ok(Reply::Array(replies))
}

/// Handles the HINCRBY command.
///
/// One conditional arithmetic update on a single field; the key must
/// already hold a map, the field is created at zero when absent.
/// Standalone, the reply is the updated field value; inside a
/// transaction the batch write carries no payload, so the reply is
/// just `true`.
pub(crate) async fn hincrby(
    table: &str,
    submit: &Submit,
    key: &str,
    field: &str,
    amount: i64,
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    validate_field(field)?;

    let mut input = UpdateInput::new(
        table,
        wire::key_item(key),
        "SET #value.#field = if_not_exists(#value.#field, :start) + :incr",
    );
    input.condition_expression =
        Some("attribute_exists(#key) AND attribute_type(#value, :type)".to_string());
    input.expression_attribute_names = Some(attribute_names(&[
        ("#key", KEY_ATTR),
        ("#value", VALUE_ATTR),
        ("#field", field),
    ]));
    input.expression_attribute_values = Some(attribute_values([
        (":start", WireValue::N("0".to_string())),
        (":type", WireValue::S("M".to_string())),
        (":incr", WireValue::N(amount.to_string())),
    ]));
    if !submit.is_transaction() {
        input.return_values = ReturnValues::UpdatedNew;
    }

    let output = submit.submit(StorageOperation::Update(input)).await?;

    if submit.is_transaction() {
        return Ok(Reply::Bool(true));
    }

    let mut updated = decode_hash(key, output.attributes())?.unwrap_or_default();
    match updated.remove(field) {
        Some(Value::Number(n)) => Ok(Reply::from_number(n)),
        _ => Ok(Reply::Bool(true)),
    }
}

/// Reads a single field through a projection.
async fn read_field(
    table: &str,
    submit: &Submit,
    key: &str,
    field: &str,
) -> Result<Option<Value>, CommandError> {
    validate_key(key)?;
    validate_field(field)?;

    let mut input = GetInput::new(table, wire::key_item(key));
    input.projection_expression = Some("#key, #value.#field".to_string());
    input.expression_attribute_names = Some(attribute_names(&[
        ("#key", KEY_ATTR),
        ("#value", VALUE_ATTR),
        ("#field", field),
    ]));

    let output = submit.submit(StorageOperation::Get(input)).await?;
    let mut projected = decode_hash(key, output.record())?.unwrap_or_default();
    Ok(projected.remove(field))
}

/// Reads the full record for a key and decodes it as a map.
async fn read_hash(
    table: &str,
    submit: &Submit,
    key: &str,
) -> Result<Option<HashMap<String, Value>>, CommandError> {
    validate_key(key)?;

    let input = GetInput::new(table, wire::key_item(key));
    let output = submit.submit(StorageOperation::Get(input)).await?;
    decode_hash(key, output.record())
}

/// Decodes the value attribute of a record as a map.
///
/// A record without a value attribute decodes as `None`; projections
/// that matched nothing come back that way.
fn decode_hash(
    key: &str,
    record: Option<&wire::Item>,
) -> Result<Option<HashMap<String, Value>>, CommandError> {
    match record.and_then(|item| item.get(VALUE_ATTR)) {
        None => Ok(None),
        Some(WireValue::M(entries)) => {
            let fields = entries
                .iter()
                .map(|(field, raw)| Ok((field.clone(), wire::decode(raw)?)))
                .collect::<Result<HashMap<_, _>, CommandError>>()?;
            Ok(Some(fields))
        }
        Some(_) => Err(CommandError::WrongType {
            key: key.to_string(),
            expected: "hash",
        }),
    }
}
