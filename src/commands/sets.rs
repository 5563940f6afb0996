use crate::commands::{validate_batch, validate_key, GetOptions};
use crate::error::CommandError;
use crate::executor::Submit;
use crate::operation::{GetInput, StorageOperation, UpdateInput};
use crate::reply::Reply;
use crate::value::{SetMember, Value, ValueSet};
use crate::wire::{self, WireValue, KEY_ATTR, VALUE_ATTR};

use super::{attribute_names, attribute_values};

/// Handles the SADD command.
///
/// One update adds all members at once. The members must share a kind
/// (strings, numbers or byte strings), which also picks the stored set
/// type; the key must be absent or already hold a set of that type.
pub(crate) async fn sadd(
    table: &str,
    submit: &Submit,
    key: &str,
    members: &[SetMember],
) -> Result<Reply, CommandError> {
    mutate(table, submit, key, members, "ADD #value :members").await
}

/// Handles the SREM command. Removing members that are not present,
/// or removing from an absent key, is a no-op.
pub(crate) async fn srem(
    table: &str,
    submit: &Submit,
    key: &str,
    members: &[SetMember],
) -> Result<Reply, CommandError> {
    mutate(table, submit, key, members, "DELETE #value :members").await
}

async fn mutate(
    table: &str,
    submit: &Submit,
    key: &str,
    members: &[SetMember],
    expression: &str,
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    validate_batch(members.len())?;

    let set = ValueSet::new(members.to_vec())?;
    let encoded = wire::encode(&Value::Set(set.clone()));

    let mut input = UpdateInput::new(table, wire::key_item(key), expression);
    input.condition_expression =
        Some("attribute_not_exists(#key) OR attribute_type(#value, :type)".to_string());
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#value", VALUE_ATTR)]));
    input.expression_attribute_values = Some(attribute_values([
        (":type", WireValue::S(set.kind().tag().to_string())),
        (":members", encoded),
    ]));

    submit.submit(StorageOperation::Update(input)).await?;
    Ok(Reply::Bool(true))
}

/// Handles the SCARD command. An absent key has cardinality zero.
pub(crate) async fn scard(table: &str, submit: &Submit, key: &str) -> Result<Reply, CommandError> {
    match read_set(table, submit, key, &GetOptions::default()).await? {
        Some(set) => Ok(Reply::Int(set.len() as i64)),
        None => Ok(Reply::Int(0)),
    }
}

/// Handles the SISMEMBER command. Membership in an absent set is false,
/// as is membership of a differently-typed candidate.
pub(crate) async fn sismember(
    table: &str,
    submit: &Submit,
    key: &str,
    member: &SetMember,
) -> Result<Reply, CommandError> {
    let set = read_set(table, submit, key, &GetOptions::default()).await?;
    let present = set.map(|set| set.contains(member)).unwrap_or(false);
    Ok(Reply::Bool(present))
}

/// Handles the SMISMEMBER command: one membership answer per candidate,
/// in call order.
pub(crate) async fn smismember(
    table: &str,
    submit: &Submit,
    key: &str,
    members: &[SetMember],
) -> Result<Reply, CommandError> {
    validate_batch(members.len())?;

    let set = read_set(table, submit, key, &GetOptions::default()).await?;
    let answers = members
        .iter()
        .map(|member| {
            let present = set.as_ref().map(|set| set.contains(member)).unwrap_or(false);
            Reply::Bool(present)
        })
        .collect();
    Ok(Reply::Array(answers))
}

/// Reads the record for a key and decodes it as a set.
///
/// Returns `None` for an absent key and a wrong-type error when the
/// stored value is anything but a set.
pub(crate) async fn read_set(
    table: &str,
    submit: &Submit,
    key: &str,
    options: &GetOptions,
) -> Result<Option<ValueSet>, CommandError> {
    validate_key(key)?;

    let mut input = GetInput::new(table, wire::key_item(key));
    if !submit.is_transaction() {
        input.consistent_read = options.consistent_read;
    }

    let output = submit.submit(StorageOperation::Get(input)).await?;
    let raw = match output.record().and_then(|item| item.get(VALUE_ATTR)) {
        None => return Ok(None),
        Some(raw @ (WireValue::Ss(_) | WireValue::Ns(_) | WireValue::Bs(_))) => raw,
        Some(_) => {
            return Err(CommandError::WrongType {
                key: key.to_string(),
                expected: "set",
            })
        }
    };

    match wire::decode(raw)? {
        Value::Set(set) => Ok(Some(set)),
        _ => Ok(None),
    }
}
