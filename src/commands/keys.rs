use crate::commands::{unix_now, validate_key};
use crate::error::CommandError;
use crate::executor::Submit;
use crate::operation::{DeleteInput, GetInput, StorageOperation, UpdateInput};
use crate::reply::Reply;
use crate::value::Value;
use crate::wire::{self, WireValue, KEY_ATTR, TTL_ATTR, VALUE_ATTR};

use super::{attribute_names, attribute_values};

/// Handles the DEL command for a single key. Deleting an absent key is
/// a no-op.
pub(crate) async fn del(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let input = DeleteInput::new(table, wire::key_item(key));
    submit.submit(StorageOperation::Delete(input)).await?;
    Ok(Reply::Bool(true))
}

/// Handles the EXISTS command for a single key. Only the key attribute
/// is projected, so the record's value never travels.
pub(crate) async fn exists(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let mut input = GetInput::new(table, wire::key_item(key));
    input.projection_expression = Some("#key".to_string());
    input.expression_attribute_names = Some(attribute_names(&[("#key", KEY_ATTR)]));

    let output = submit.submit(StorageOperation::Get(input)).await?;
    Ok(Reply::Bool(output.record().is_some()))
}

/// Handles the EXPIRE command: the key expires this many seconds from
/// now. Expiring an absent key reads as `false`.
pub(crate) async fn expire(
    table: &str,
    submit: &Submit,
    key: &str,
    seconds: u64,
) -> Result<Reply, CommandError> {
    set_expiry(table, submit, key, unix_now() + seconds).await
}

/// Handles the EXPIREAT command: the key expires at a Unix timestamp.
pub(crate) async fn expire_at(
    table: &str,
    submit: &Submit,
    key: &str,
    timestamp: u64,
) -> Result<Reply, CommandError> {
    set_expiry(table, submit, key, timestamp).await
}

async fn set_expiry(
    table: &str,
    submit: &Submit,
    key: &str,
    timestamp: u64,
) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let mut input = UpdateInput::new(table, wire::key_item(key), "SET #ttl = :ttl");
    input.condition_expression = Some("attribute_exists(#key)".to_string());
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#ttl", TTL_ATTR)]));
    input.expression_attribute_values = Some(attribute_values([(
        ":ttl",
        WireValue::N(timestamp.to_string()),
    )]));

    match submit.submit(StorageOperation::Update(input)).await {
        Ok(_) => Ok(Reply::Bool(true)),
        Err(err) if err.is_conditional_failure() => Ok(Reply::Bool(false)),
        Err(err) => Err(err),
    }
}

/// Handles the PERSIST command: removes the expiry from a key. Reads
/// as `false` when the key is absent or carries no expiry.
pub(crate) async fn persist(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let mut input = UpdateInput::new(table, wire::key_item(key), "REMOVE #ttl");
    input.condition_expression =
        Some("attribute_exists(#key) AND attribute_exists(#ttl)".to_string());
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#ttl", TTL_ATTR)]));

    match submit.submit(StorageOperation::Update(input)).await {
        Ok(_) => Ok(Reply::Bool(true)),
        Err(err) if err.is_conditional_failure() => Ok(Reply::Bool(false)),
        Err(err) => Err(err),
    }
}

/// Handles the TTL command.
///
/// Answers the remaining seconds, `-1` for a key without an expiry and
/// `-2` for an absent key, the way Redis grades the two cases.
pub(crate) async fn ttl(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let mut input = GetInput::new(table, wire::key_item(key));
    input.projection_expression = Some("#key, #ttl".to_string());
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#ttl", TTL_ATTR)]));

    let output = submit.submit(StorageOperation::Get(input)).await?;
    let Some(record) = output.record() else {
        return Ok(Reply::Int(-2));
    };

    match record.get(TTL_ATTR) {
        Some(WireValue::N(text)) => {
            let expires_at = text
                .parse::<i64>()
                .map_err(|_| wire::WireError::Number(text.clone()))?;
            Ok(Reply::Int(expires_at - unix_now() as i64))
        }
        _ => Ok(Reply::Int(-1)),
    }
}

/// Handles the TYPE command.
///
/// The stored wire discriminator already names the type, so the value
/// is inspected without being decoded. An absent key has type "none".
pub(crate) async fn type_of(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    validate_key(key)?;

    let input = GetInput::new(table, wire::key_item(key));
    let output = submit.submit(StorageOperation::Get(input)).await?;

    let name = match output.record().and_then(|item| item.get(VALUE_ATTR)) {
        None => "none",
        Some(WireValue::L(_)) => "list",
        Some(WireValue::M(_)) => "hash",
        Some(WireValue::Ss(_) | WireValue::Ns(_) | WireValue::Bs(_)) => "set",
        Some(_) => "string",
    };
    Ok(Reply::Value(Value::String(name.to_string())))
}
