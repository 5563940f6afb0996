//! Command functions: thin translations from Redis-shaped calls to
//! single storage operations.
//!
//! Every function here follows the same contract: validate arguments
//! synchronously, build exactly one [`StorageOperation`], hand it to
//! the [`Submit`] handle, and shape the raw result into a [`Reply`].
//! Whether the operation runs immediately or inside a transaction
//! batch is the executor's business, not the command's.
//!
//! [`StorageOperation`]: crate::operation::StorageOperation

mod hashes;
mod keys;
mod lists;
pub(crate) mod sets;
mod strings;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CommandError, ValidationError};
use crate::executor::Submit;
use crate::operation::AttributeNames;
use crate::reply::Reply;
use crate::value::{SetMember, Value};
use crate::wire::{Item, WireValue};

/// The backend caps atomic batches, element lists and multi-key calls
/// at 25 items.
pub const MAX_BATCH_ITEMS: usize = 25;

/// Options for point reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOptions {
    /// Ask the backend for a strongly consistent read. Ignored inside
    /// a transaction, where the batch primitive decides consistency.
    pub consistent_read: Option<bool>,
}

/// Options for SET.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Expire the key after this many seconds.
    pub ex: Option<u64>,
    /// Expire the key at this Unix timestamp (seconds).
    pub exat: Option<u64>,
    /// Only set the key if it does not already exist.
    pub nx: bool,
    /// Only set the key if it already exists.
    pub xx: bool,
}

impl SetOptions {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.ex.is_some() && self.exat.is_some() {
            return Err(ValidationError::ExclusiveExpiry);
        }
        if self.nx && self.xx {
            return Err(ValidationError::ExclusiveExistence);
        }
        Ok(())
    }

    pub(crate) fn ttl(&self, now: u64) -> Option<u64> {
        self.exat.or_else(|| self.ex.map(|ex| now + ex))
    }
}

/// One queued or immediately-executed command invocation.
///
/// The variants mirror the transactable command surface; multi-key
/// conveniences (MGET, SMEMBERS, ...) live on the client and issue
/// their own batches directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get { key: String, options: GetOptions },
    Set { key: String, value: Value, options: SetOptions },
    Strlen { key: String, options: GetOptions },
    Incr { key: String },
    Decr { key: String },
    IncrBy { key: String, amount: i64 },
    DecrBy { key: String, amount: i64 },
    RPush { key: String, elements: Vec<Value> },
    LPush { key: String, elements: Vec<Value> },
    RPushX { key: String, elements: Vec<Value> },
    LPushX { key: String, elements: Vec<Value> },
    LIndex { key: String, index: i64, options: GetOptions },
    LLen { key: String, options: GetOptions },
    LRange { key: String, start: i64, stop: i64, options: GetOptions },
    LSet { key: String, index: i64, value: Value },
    SAdd { key: String, members: Vec<SetMember> },
    SRem { key: String, members: Vec<SetMember> },
    SCard { key: String },
    SIsMember { key: String, member: SetMember },
    SMIsMember { key: String, members: Vec<SetMember> },
    HGet { key: String, field: String },
    HGetAll { key: String },
    HDel { key: String, fields: Vec<String> },
    HExists { key: String, field: String },
    HStrLen { key: String, field: String },
    HKeys { key: String },
    HVals { key: String },
    HLen { key: String },
    HMGet { key: String, fields: Vec<String> },
    HIncrBy { key: String, field: String, amount: i64 },
    Del { key: String },
    Exists { key: String },
    Expire { key: String, seconds: u64 },
    ExpireAt { key: String, timestamp: u64 },
    Persist { key: String },
    Ttl { key: String },
    Type { key: String },
}

impl Command {
    /// The Redis-style name used to tag errors from this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Strlen { .. } => "STRLEN",
            Command::Incr { .. } => "INCR",
            Command::Decr { .. } => "DECR",
            Command::IncrBy { .. } => "INCRBY",
            Command::DecrBy { .. } => "DECRBY",
            Command::RPush { .. } => "RPUSH",
            Command::LPush { .. } => "LPUSH",
            Command::RPushX { .. } => "RPUSHX",
            Command::LPushX { .. } => "LPUSHX",
            Command::LIndex { .. } => "LINDEX",
            Command::LLen { .. } => "LLEN",
            Command::LRange { .. } => "LRANGE",
            Command::LSet { .. } => "LSET",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SCard { .. } => "SCARD",
            Command::SIsMember { .. } => "SISMEMBER",
            Command::SMIsMember { .. } => "SMISMEMBER",
            Command::HGet { .. } => "HGET",
            Command::HGetAll { .. } => "HGETALL",
            Command::HDel { .. } => "HDEL",
            Command::HExists { .. } => "HEXISTS",
            Command::HStrLen { .. } => "HSTRLEN",
            Command::HKeys { .. } => "HKEYS",
            Command::HVals { .. } => "HVALS",
            Command::HLen { .. } => "HLEN",
            Command::HMGet { .. } => "HMGET",
            Command::HIncrBy { .. } => "HINCRBY",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Expire { .. } => "EXPIRE",
            Command::ExpireAt { .. } => "EXPIREAT",
            Command::Persist { .. } => "PERSIST",
            Command::Ttl { .. } => "TTL",
            Command::Type { .. } => "TYPE",
        }
    }

    /// Runs the command against the given submit handle.
    pub(crate) async fn run(&self, table: &str, submit: &Submit) -> Result<Reply, CommandError> {
        match self {
            Command::Get { key, options } => strings::get(table, submit, key, options).await,
            Command::Set { key, value, options } => {
                strings::set(table, submit, key, value, options).await
            }
            Command::Strlen { key, options } => strings::strlen(table, submit, key, options).await,
            Command::Incr { key } => strings::incrby(table, submit, key, 1).await,
            Command::Decr { key } => strings::decrby(table, submit, key, 1).await,
            Command::IncrBy { key, amount } => strings::incrby(table, submit, key, *amount).await,
            Command::DecrBy { key, amount } => strings::decrby(table, submit, key, *amount).await,
            Command::RPush { key, elements } => {
                lists::push(table, submit, key, elements, lists::End::Right, false).await
            }
            Command::LPush { key, elements } => {
                lists::push(table, submit, key, elements, lists::End::Left, false).await
            }
            Command::RPushX { key, elements } => {
                lists::push(table, submit, key, elements, lists::End::Right, true).await
            }
            Command::LPushX { key, elements } => {
                lists::push(table, submit, key, elements, lists::End::Left, true).await
            }
            Command::LIndex { key, index, options } => {
                lists::lindex(table, submit, key, *index, options).await
            }
            Command::LLen { key, options } => lists::llen(table, submit, key, options).await,
            Command::LRange { key, start, stop, options } => {
                lists::lrange(table, submit, key, *start, *stop, options).await
            }
            Command::LSet { key, index, value } => {
                lists::lset(table, submit, key, *index, value).await
            }
            Command::SAdd { key, members } => sets::sadd(table, submit, key, members).await,
            Command::SRem { key, members } => sets::srem(table, submit, key, members).await,
            Command::SCard { key } => sets::scard(table, submit, key).await,
            Command::SIsMember { key, member } => sets::sismember(table, submit, key, member).await,
            Command::SMIsMember { key, members } => {
                sets::smismember(table, submit, key, members).await
            }
            Command::HGet { key, field } => hashes::hget(table, submit, key, field).await,
            Command::HGetAll { key } => hashes::hgetall(table, submit, key).await,
            Command::HDel { key, fields } => hashes::hdel(table, submit, key, fields).await,
            Command::HExists { key, field } => hashes::hexists(table, submit, key, field).await,
            Command::HStrLen { key, field } => hashes::hstrlen(table, submit, key, field).await,
            Command::HKeys { key } => hashes::hkeys(table, submit, key).await,
            Command::HVals { key } => hashes::hvals(table, submit, key).await,
            Command::HLen { key } => hashes::hlen(table, submit, key).await,
            Command::HMGet { key, fields } => hashes::hmget(table, submit, key, fields).await,
            Command::HIncrBy { key, field, amount } => {
                hashes::hincrby(table, submit, key, field, *amount).await
            }
            Command::Del { key } => keys::del(table, submit, key).await,
            Command::Exists { key } => keys::exists(table, submit, key).await,
            Command::Expire { key, seconds } => keys::expire(table, submit, key, *seconds).await,
            Command::ExpireAt { key, timestamp } => {
                keys::expire_at(table, submit, key, *timestamp).await
            }
            Command::Persist { key } => keys::persist(table, submit, key).await,
            Command::Ttl { key } => keys::ttl(table, submit, key).await,
            Command::Type { key } => keys::type_of(table, submit, key).await,
        }
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    Ok(())
}

pub(crate) fn validate_field(field: &str) -> Result<(), ValidationError> {
    if field.is_empty() {
        return Err(ValidationError::EmptyField);
    }
    Ok(())
}

pub(crate) fn validate_batch(len: usize) -> Result<(), ValidationError> {
    if len == 0 {
        return Err(ValidationError::NoElements);
    }
    if len > MAX_BATCH_ITEMS {
        return Err(ValidationError::TooManyElements {
            max: MAX_BATCH_ITEMS,
            got: len,
        });
    }
    Ok(())
}

/// Builds `#placeholder -> attribute` name maps.
pub(crate) fn attribute_names(pairs: &[(&str, &str)]) -> AttributeNames {
    pairs
        .iter()
        .map(|(placeholder, attribute)| (placeholder.to_string(), attribute.to_string()))
        .collect()
}

/// Builds `:placeholder -> wire value` maps.
pub(crate) fn attribute_values<I>(pairs: I) -> Item
where
    I: IntoIterator<Item = (&'static str, WireValue)>,
{
    pairs
        .into_iter()
        .map(|(placeholder, value)| (placeholder.to_string(), value))
        .collect()
}

/// Seconds since the Unix epoch, saturating at zero before it.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
