use crate::commands::{validate_batch, validate_key, GetOptions};
use crate::error::{CommandError, ValidationError};
use crate::executor::Submit;
use crate::operation::{GetInput, ReturnValues, StorageOperation, UpdateInput};
use crate::reply::Reply;
use crate::value::Value;
use crate::wire::{self, WireValue, KEY_ATTR, VALUE_ATTR};

use super::{attribute_names, attribute_values};

/// Which end of the list a push appends to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum End {
    Left,
    Right,
}

/// Handles RPUSH / LPUSH / RPUSHX / LPUSHX.
///
/// One conditional update appends (or prepends) all elements at once.
/// The plain variants create the list when the key is absent; the X
/// variants require an existing list and answer `false` when there is
/// none. A key holding a non-list value fails the condition either way.
///
/// # Arguments
///
/// * `elements` - Between 1 and 25 values, pushed in call order
/// * `end` - Which end receives the elements
/// * `require_existing` - True for the X variants
pub(crate) async fn push(
    table: &str,
    submit: &Submit,
    key: &str,
    elements: &[Value],
    end: End,
    require_existing: bool,
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    validate_batch(elements.len())?;

    let mut encoded: Vec<WireValue> = elements.iter().map(wire::encode).collect();
    let expression = match end {
        End::Right => "SET #value = list_append(if_not_exists(#value, :start), :elements)",
        End::Left => {
            // Prepended elements keep their call order at the head.
            encoded.reverse();
            "SET #value = list_append(:elements, if_not_exists(#value, :start))"
        }
    };

    let mut input = UpdateInput::new(table, wire::key_item(key), expression);
    input.condition_expression = Some(if require_existing {
        "attribute_exists(#key) AND attribute_type(#value, :type)".to_string()
    } else {
        "attribute_not_exists(#key) OR attribute_type(#value, :type)".to_string()
    });
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#value", VALUE_ATTR)]));
    input.expression_attribute_values = Some(attribute_values([
        (":start", WireValue::L(Vec::new())),
        (":type", WireValue::S("L".to_string())),
        (":elements", WireValue::L(encoded)),
    ]));
    if !submit.is_transaction() {
        input.return_values = ReturnValues::UpdatedNew;
    }

    let output = match submit.submit(StorageOperation::Update(input)).await {
        Ok(output) => output,
        Err(err) if require_existing && err.is_conditional_failure() => {
            return Ok(Reply::Bool(false));
        }
        Err(err) => return Err(err),
    };

    if submit.is_transaction() {
        return Ok(Reply::Bool(true));
    }

    match output.attributes().and_then(|item| item.get(VALUE_ATTR)) {
        Some(WireValue::L(list)) => Ok(Reply::Int(list.len() as i64)),
        _ => Ok(Reply::Bool(true)),
    }
}

/// Handles the LINDEX command. Negative indexes count from the tail;
/// out-of-range indexes and absent keys read as nil.
pub(crate) async fn lindex(
    table: &str,
    submit: &Submit,
    key: &str,
    index: i64,
    options: &GetOptions,
) -> Result<Reply, CommandError> {
    let Some(list) = read_list(table, submit, key, options).await? else {
        return Ok(Reply::Nil);
    };

    match resolve_index(index, list.len()) {
        Some(i) => Ok(Reply::Value(list.into_iter().nth(i).unwrap_or(Value::Null))),
        None => Ok(Reply::Nil),
    }
}

/// Handles the LLEN command. An absent key reads as nil rather than
/// zero, so callers can tell "no list" from "empty list".
pub(crate) async fn llen(
    table: &str,
    submit: &Submit,
    key: &str,
    options: &GetOptions,
) -> Result<Reply, CommandError> {
    match read_list(table, submit, key, options).await? {
        Some(list) => Ok(Reply::Int(list.len() as i64)),
        None => Ok(Reply::Nil),
    }
}

/// Handles the LRANGE command with Redis slicing rules: both bounds
/// inclusive, negative bounds counted from the tail, out-of-range
/// bounds clamped.
pub(crate) async fn lrange(
    table: &str,
    submit: &Submit,
    key: &str,
    start: i64,
    stop: i64,
    options: &GetOptions,
) -> Result<Reply, CommandError> {
    let Some(list) = read_list(table, submit, key, options).await? else {
        return Ok(Reply::Array(Vec::new()));
    };

    let len = list.len() as i64;
    let start = (if start < 0 { len + start } else { start }).max(0);
    let stop = (if stop < 0 { len + stop } else { stop }).min(len - 1);
    if start > stop {
        return Ok(Reply::Array(Vec::new()));
    }

    let slice = list
        .into_iter()
        .skip(start as usize)
        .take((stop - start + 1) as usize)
        .map(Reply::Value)
        .collect();
    Ok(Reply::Array(slice))
}

/// Handles the LSET command.
///
/// One conditional update overwrites a single position. The index is
/// baked into the update expression, so it must be non-negative; a
/// missing key, a non-list value or an out-of-range index fails the
/// backend condition and surfaces as an error, matching Redis.
pub(crate) async fn lset(
    table: &str,
    submit: &Submit,
    key: &str,
    index: i64,
    value: &Value,
) -> Result<Reply, CommandError> {
    validate_key(key)?;
    if index < 0 {
        return Err(ValidationError::NegativeIndex.into());
    }

    let expression = format!("SET #value[{}] = :element", index);
    let mut input = UpdateInput::new(table, wire::key_item(key), &expression);
    input.condition_expression =
        Some("attribute_exists(#key) AND attribute_type(#value, :type)".to_string());
    input.expression_attribute_names =
        Some(attribute_names(&[("#key", KEY_ATTR), ("#value", VALUE_ATTR)]));
    input.expression_attribute_values = Some(attribute_values([
        (":type", WireValue::S("L".to_string())),
        (":element", wire::encode(value)),
    ]));

    submit.submit(StorageOperation::Update(input)).await?;
    Ok(Reply::Bool(true))
}

/// Reads the record for a key and decodes it as a list.
///
/// Returns `None` for an absent key and a wrong-type error when the
/// stored value is anything but a list.
async fn read_list(
    table: &str,
    submit: &Submit,
    key: &str,
    options: &GetOptions,
) -> Result<Option<Vec<Value>>, CommandError> {
    validate_key(key)?;

    let mut input = GetInput::new(table, wire::key_item(key));
    if !submit.is_transaction() {
        input.consistent_read = options.consistent_read;
    }

    let output = submit.submit(StorageOperation::Get(input)).await?;
    match output.record().and_then(|item| item.get(VALUE_ATTR)) {
        None => Ok(None),
        Some(WireValue::L(elements)) => {
            let list = elements.iter().map(wire::decode).collect::<Result<_, _>>()?;
            Ok(Some(list))
        }
        Some(_) => Err(CommandError::WrongType {
            key: key.to_string(),
            expected: "list",
        }),
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_index_from_either_end() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(2, 3), Some(2));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-3, 3), Some(0));
    }

    #[test]
    fn test_resolve_index_out_of_range() {
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
        assert_eq!(resolve_index(0, 0), None);
    }
}
