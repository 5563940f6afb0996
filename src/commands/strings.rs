use crate::commands::{validate_key, GetOptions, SetOptions};
use crate::error::{CommandError, ValidationError};
use crate::executor::Submit;
use crate::operation::{GetInput, PutInput, ReturnValues, StorageOperation, UpdateInput};
use crate::reply::Reply;
use crate::value::Value;
use crate::wire::{self, WireValue, KEY_ATTR, VALUE_ATTR};

use super::{attribute_names, attribute_values, unix_now};

/// Handles the GET command.
///
/// Reads the record for a key and returns its value when it holds a
/// string or a number; any other stored type (or an absent key) reads
/// as nil.
///
/// # Arguments
///
/// * `table` - The table holding the record
/// * `submit` - The submit handle for this invocation
/// * `key` - The key to read
/// * `options` - Read options; consistent reads are ignored inside a
///   transaction
pub(crate) async fn get(
    table: &str,
    submit: &Submit,
    key: &str,
    options: &GetOptions,
) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let mut input = GetInput::new(table, wire::key_item(key));
    if !submit.is_transaction() {
        input.consistent_read = options.consistent_read;
    }

    let output = submit.submit(StorageOperation::Get(input)).await?;
    let value = output
        .record()
        .map(wire::decode_value_attr)
        .transpose()?
        .flatten();

    match value {
        Some(value @ (Value::String(_) | Value::Number(_))) => Ok(Reply::Value(value)),
        _ => Ok(Reply::Nil),
    }
}

/// Handles the SET command.
///
/// Writes a string or number value, optionally with a TTL (`EX` /
/// `EXAT`, exclusive) and an existence condition (`NX` / `XX`,
/// exclusive). With a condition, a failed conditional check reads as
/// `false` instead of an error; without one the write is
/// unconditional and always answers `true`.
pub(crate) async fn set(
    table: &str,
    submit: &Submit,
    key: &str,
    value: &Value,
    options: &SetOptions,
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    if !matches!(value, Value::String(_) | Value::Number(_)) {
        return Err(ValidationError::ExpectedStringOrNumber.into());
    }
    options.validate()?;

    let ttl = options.ttl(unix_now());
    let mut input = PutInput::new(table, wire::record(key, value, ttl));
    if options.nx {
        input.condition_expression = Some("attribute_not_exists(#key)".to_string());
        input.expression_attribute_names = Some(attribute_names(&[("#key", KEY_ATTR)]));
    } else if options.xx {
        input.condition_expression = Some("attribute_exists(#key)".to_string());
        input.expression_attribute_names = Some(attribute_names(&[("#key", KEY_ATTR)]));
    }

    match submit.submit(StorageOperation::Put(input)).await {
        Ok(_) => Ok(Reply::Bool(true)),
        Err(err) if (options.nx || options.xx) && err.is_conditional_failure() => {
            Ok(Reply::Bool(false))
        }
        Err(err) => Err(err),
    }
}

/// Handles the STRLEN command by reading through GET and measuring the
/// value's text form. Absent keys measure zero.
pub(crate) async fn strlen(
    table: &str,
    submit: &Submit,
    key: &str,
    options: &GetOptions,
) -> Result<Reply, CommandError> {
    let reply = get(table, submit, key, options).await?;

    let length = match reply {
        Reply::Value(Value::String(s)) => s.len(),
        Reply::Value(Value::Number(n)) => n.to_string().len(),
        _ => 0,
    };

    Ok(Reply::Int(length as i64))
}

/// Handles INCR / INCRBY.
///
/// Issues a conditional arithmetic update: the key must be absent or
/// already hold a number. Standalone, the reply is the updated value;
/// inside a transaction the batch write carries no per-item payload,
/// so the reply is just `true`.
pub(crate) async fn incrby(
    table: &str,
    submit: &Submit,
    key: &str,
    amount: i64,
) -> Result<Reply, CommandError> {
    arithmetic(table, submit, key, amount, "+", ":incr").await
}

/// Handles DECR / DECRBY, the subtracting twin of [`incrby`].
pub(crate) async fn decrby(
    table: &str,
    submit: &Submit,
    key: &str,
    amount: i64,
) -> Result<Reply, CommandError> {
    arithmetic(table, submit, key, amount, "-", ":decr").await
}

async fn arithmetic(
    table: &str,
    submit: &Submit,
    key: &str,
    amount: i64,
    operator: &str,
    placeholder: &'static str,
) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let expression = format!(
        "SET #value = if_not_exists(#value, :start) {} {}",
        operator, placeholder
    );
    let mut input = UpdateInput::new(table, wire::key_item(key), &expression);
    input.condition_expression =
        Some("attribute_not_exists(#key) OR attribute_type(#value, :type)".to_string());
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#value", VALUE_ATTR)]));
    input.expression_attribute_values = Some(attribute_values([
        (":start", WireValue::N("0".to_string())),
        (":type", WireValue::S("N".to_string())),
        (placeholder, WireValue::N(amount.to_string())),
    ]));
    if !submit.is_transaction() {
        input.return_values = ReturnValues::UpdatedNew;
    }

    let output = submit.submit(StorageOperation::Update(input)).await?;

    if submit.is_transaction() {
        return Ok(Reply::Bool(true));
    }

    let updated = output
        .attributes()
        .map(wire::decode_value_attr)
        .transpose()?
        .flatten();

    match updated {
        Some(Value::Number(n)) => Ok(Reply::from_number(n)),
        _ => Ok(Reply::Nil),
    }
}
