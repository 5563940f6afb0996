//! The client: one table, one backend, the full command surface.
//!
//! Single-key commands run through the standalone executor, one
//! storage operation each. Multi-key conveniences (MGET, SMEMBERS,
//! SDIFF, ...) compose the backend's batch primitives directly; they
//! cannot be queued in a transaction.

use std::sync::Arc;

use tracing::debug;

use crate::backend::StorageBackend;
use crate::commands::{validate_batch, validate_key, Command, GetOptions, SetOptions};
use crate::error::{CommandError, Error, ValidationError};
use crate::executor::{run_standalone, Submit};
use crate::operation::{DeleteInput, GetInput, PutInput, StorageOperation, UpdateInput};
use crate::reply::Reply;
use crate::transaction::Transaction;
use crate::value::{SetMember, Value, ValueSet};
use crate::wire::{self, WireValue, Item, KEY_ATTR, VALUE_ATTR};

/// A handle to one table full of Redis-shaped records.
///
/// The client is cheap to clone and safe to share; every method takes
/// `&self`.
#[derive(Clone)]
pub struct Client {
    table_name: String,
    backend: Arc<dyn StorageBackend>,
}

impl Client {
    /// Creates a client for a table.
    pub fn new(
        table_name: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self, Error> {
        let table_name = table_name.into();
        if table_name.is_empty() {
            return Err(Error::new("CLIENT", ValidationError::EmptyTableName.into()));
        }

        debug!(table = %table_name, "creating client");
        Ok(Client {
            table_name,
            backend,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Starts an empty transaction against this client's table.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    async fn run(&self, command: Command) -> Result<Reply, Error> {
        run_standalone(&self.table_name, &self.backend, &command).await
    }

    // Strings.

    pub async fn get(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.get_with(key, GetOptions::default()).await
    }

    pub async fn get_with(
        &self,
        key: impl Into<String>,
        options: GetOptions,
    ) -> Result<Reply, Error> {
        self.run(Command::Get {
            key: key.into(),
            options,
        })
        .await
    }

    pub async fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Reply, Error> {
        self.set_with(key, value, SetOptions::default()).await
    }

    pub async fn set_with(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> Result<Reply, Error> {
        self.run(Command::Set {
            key: key.into(),
            value: value.into(),
            options,
        })
        .await
    }

    pub async fn strlen(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Strlen {
            key: key.into(),
            options: GetOptions::default(),
        })
        .await
    }

    pub async fn incr(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Incr { key: key.into() }).await
    }

    pub async fn decr(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Decr { key: key.into() }).await
    }

    pub async fn incrby(&self, key: impl Into<String>, amount: i64) -> Result<Reply, Error> {
        self.run(Command::IncrBy {
            key: key.into(),
            amount,
        })
        .await
    }

    pub async fn decrby(&self, key: impl Into<String>, amount: i64) -> Result<Reply, Error> {
        self.run(Command::DecrBy {
            key: key.into(),
            amount,
        })
        .await
    }

    // Lists.

    pub async fn rpush(&self, key: impl Into<String>, elements: Vec<Value>) -> Result<Reply, Error> {
        self.run(Command::RPush {
            key: key.into(),
            elements,
        })
        .await
    }

    pub async fn lpush(&self, key: impl Into<String>, elements: Vec<Value>) -> Result<Reply, Error> {
        self.run(Command::LPush {
            key: key.into(),
            elements,
        })
        .await
    }

    pub async fn rpushx(&self, key: impl Into<String>, elements: Vec<Value>) -> Result<Reply, Error> {
        self.run(Command::RPushX {
            key: key.into(),
            elements,
        })
        .await
    }

    pub async fn lpushx(&self, key: impl Into<String>, elements: Vec<Value>) -> Result<Reply, Error> {
        self.run(Command::LPushX {
            key: key.into(),
            elements,
        })
        .await
    }

    pub async fn lindex(&self, key: impl Into<String>, index: i64) -> Result<Reply, Error> {
        self.run(Command::LIndex {
            key: key.into(),
            index,
            options: GetOptions::default(),
        })
        .await
    }

    pub async fn llen(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::LLen {
            key: key.into(),
            options: GetOptions::default(),
        })
        .await
    }

    pub async fn lrange(
        &self,
        key: impl Into<String>,
        start: i64,
        stop: i64,
    ) -> Result<Reply, Error> {
        self.run(Command::LRange {
            key: key.into(),
            start,
            stop,
            options: GetOptions::default(),
        })
        .await
    }

    pub async fn lset(
        &self,
        key: impl Into<String>,
        index: i64,
        value: impl Into<Value>,
    ) -> Result<Reply, Error> {
        self.run(Command::LSet {
            key: key.into(),
            index,
            value: value.into(),
        })
        .await
    }

    // Sets.

    pub async fn sadd(
        &self,
        key: impl Into<String>,
        members: Vec<SetMember>,
    ) -> Result<Reply, Error> {
        self.run(Command::SAdd {
            key: key.into(),
            members,
        })
        .await
    }

    pub async fn srem(
        &self,
        key: impl Into<String>,
        members: Vec<SetMember>,
    ) -> Result<Reply, Error> {
        self.run(Command::SRem {
            key: key.into(),
            members,
        })
        .await
    }

    pub async fn scard(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::SCard { key: key.into() }).await
    }

    pub async fn sismember(
        &self,
        key: impl Into<String>,
        member: impl Into<SetMember>,
    ) -> Result<Reply, Error> {
        self.run(Command::SIsMember {
            key: key.into(),
            member: member.into(),
        })
        .await
    }

    pub async fn smismember(
        &self,
        key: impl Into<String>,
        members: Vec<SetMember>,
    ) -> Result<Reply, Error> {
        self.run(Command::SMIsMember {
            key: key.into(),
            members,
        })
        .await
    }

    // Hashes.

    pub async fn hget(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Reply, Error> {
        self.run(Command::HGet {
            key: key.into(),
            field: field.into(),
        })
        .await
    }

    pub async fn hgetall(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::HGetAll { key: key.into() }).await
    }

    pub async fn hdel(&self, key: impl Into<String>, fields: Vec<String>) -> Result<Reply, Error> {
        self.run(Command::HDel {
            key: key.into(),
            fields,
        })
        .await
    }

    pub async fn hexists(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Reply, Error> {
        self.run(Command::HExists {
            key: key.into(),
            field: field.into(),
        })
        .await
    }

    pub async fn hstrlen(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Reply, Error> {
        self.run(Command::HStrLen {
            key: key.into(),
            field: field.into(),
        })
        .await
    }

    pub async fn hkeys(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::HKeys { key: key.into() }).await
    }

    pub async fn hvals(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::HVals { key: key.into() }).await
    }

    pub async fn hlen(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::HLen { key: key.into() }).await
    }

    pub async fn hmget(&self, key: impl Into<String>, fields: Vec<String>) -> Result<Reply, Error> {
        self.run(Command::HMGet {
            key: key.into(),
            fields,
        })
        .await
    }

    pub async fn hincrby(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
        amount: i64,
    ) -> Result<Reply, Error> {
        self.run(Command::HIncrBy {
            key: key.into(),
            field: field.into(),
            amount,
        })
        .await
    }

    // Keys.

    pub async fn del(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Del { key: key.into() }).await
    }

    pub async fn exists(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Exists { key: key.into() }).await
    }

    pub async fn expire(&self, key: impl Into<String>, seconds: u64) -> Result<Reply, Error> {
        self.run(Command::Expire {
            key: key.into(),
            seconds,
        })
        .await
    }

    pub async fn expireat(&self, key: impl Into<String>, timestamp: u64) -> Result<Reply, Error> {
        self.run(Command::ExpireAt {
            key: key.into(),
            timestamp,
        })
        .await
    }

    pub async fn persist(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Persist { key: key.into() }).await
    }

    pub async fn ttl(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Ttl { key: key.into() }).await
    }

    pub async fn type_of(&self, key: impl Into<String>) -> Result<Reply, Error> {
        self.run(Command::Type { key: key.into() }).await
    }

    // Multi-key conveniences. These compose the backend's batch
    // primitives directly and cannot be queued in a transaction.

    /// Reads up to 25 keys in one consistent batch, one reply per key
    /// in call order. Keys holding anything but a string or a number
    /// read as nil.
    pub async fn mget(&self, keys: Vec<String>) -> Result<Vec<Reply>, Error> {
        let records = self.batch_read("MGET", &keys).await?;

        let mut replies = Vec::with_capacity(records.len());
        for record in records {
            let value = record
                .as_ref()
                .map(wire::decode_value_attr)
                .transpose()
                .map_err(|err| Error::new("MGET", err.into()))?
                .flatten();
            replies.push(match value {
                Some(value @ (Value::String(_) | Value::Number(_))) => Reply::Value(value),
                _ => Reply::Nil,
            });
        }
        Ok(replies)
    }

    /// Writes up to 25 string or number values in one atomic batch.
    pub async fn mset(&self, pairs: Vec<(String, Value)>) -> Result<Reply, Error> {
        let wrap = |source: CommandError| Error::new("MSET", source);
        validate_batch(pairs.len()).map_err(|err| wrap(err.into()))?;

        let mut operations = Vec::with_capacity(pairs.len());
        for (key, value) in &pairs {
            validate_key(key).map_err(|err| wrap(err.into()))?;
            if !matches!(value, Value::String(_) | Value::Number(_)) {
                return Err(wrap(ValidationError::ExpectedStringOrNumber.into()));
            }
            operations.push(StorageOperation::Put(PutInput::new(
                &self.table_name,
                wire::record(key, value, None),
            )));
        }

        self.backend
            .transact_write_items(operations)
            .await
            .map_err(|err| wrap(err.into()))?;
        Ok(Reply::Bool(true))
    }

    /// Deletes up to 25 keys in one atomic batch.
    pub async fn del_many(&self, keys: Vec<String>) -> Result<Reply, Error> {
        let wrap = |source: CommandError| Error::new("DEL", source);
        validate_batch(keys.len()).map_err(|err| wrap(err.into()))?;

        let mut operations = Vec::with_capacity(keys.len());
        for key in &keys {
            validate_key(key).map_err(|err| wrap(err.into()))?;
            operations.push(StorageOperation::Delete(DeleteInput::new(
                &self.table_name,
                wire::key_item(key),
            )));
        }

        self.backend
            .transact_write_items(operations)
            .await
            .map_err(|err| wrap(err.into()))?;
        Ok(Reply::Bool(true))
    }

    /// Counts how many of up to 25 keys exist, in one consistent batch.
    pub async fn exists_many(&self, keys: Vec<String>) -> Result<Reply, Error> {
        let records = self.batch_read("EXISTS", &keys).await?;
        let present = records.iter().filter(|record| record.is_some()).count();
        Ok(Reply::Int(present as i64))
    }

    /// Reads a key's value and deletes the record. The read and the
    /// delete are two point calls, not an atomic pair.
    pub async fn getdel(&self, key: impl Into<String>) -> Result<Reply, Error> {
        let key = key.into();
        let reply = self.get(key.clone()).await?;
        self.del(key).await?;
        Ok(reply)
    }

    /// Copies one record to another key.
    ///
    /// Reads as `false` when the source is absent, or when the
    /// destination already exists and `replace` is off.
    pub async fn copy(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
        replace: bool,
    ) -> Result<Reply, Error> {
        let source = source.into();
        let destination = destination.into();
        let wrap = |source: CommandError| Error::new("COPY", source);
        validate_key(&source).map_err(|err| wrap(err.into()))?;
        validate_key(&destination).map_err(|err| wrap(err.into()))?;

        let Some(record) = self.read_record(&source).await.map_err(wrap)? else {
            return Ok(Reply::Bool(false));
        };

        let mut input = PutInput::new(&self.table_name, rekey(record, &destination));
        if !replace {
            input.condition_expression = Some("attribute_not_exists(#key)".to_string());
            input.expression_attribute_names =
                Some([("#key".to_string(), KEY_ATTR.to_string())].into());
        }

        match self.backend.put_item(input).await {
            Ok(()) => Ok(Reply::Bool(true)),
            Err(err) if err.is_conditional_check_failed() => Ok(Reply::Bool(false)),
            Err(err) => Err(wrap(err.into())),
        }
    }

    /// Moves a record to a new key in one atomic batch. Renaming an
    /// absent key is an error, the way Redis treats it.
    pub async fn rename(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Result<Reply, Error> {
        self.rename_record("RENAME", source.into(), destination.into(), false)
            .await
    }

    /// Like [`rename`](Self::rename) but reads as `false` when the
    /// destination already exists.
    pub async fn renamenx(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Result<Reply, Error> {
        self.rename_record("RENAMENX", source.into(), destination.into(), true)
            .await
    }

    async fn rename_record(
        &self,
        name: &'static str,
        source: String,
        destination: String,
        require_fresh: bool,
    ) -> Result<Reply, Error> {
        let wrap = |err: CommandError| Error::new(name, err);
        validate_key(&source).map_err(|err| wrap(err.into()))?;
        validate_key(&destination).map_err(|err| wrap(err.into()))?;

        let Some(record) = self.read_record(&source).await.map_err(wrap)? else {
            return Err(wrap(CommandError::NoSuchKey { key: source }));
        };

        let mut put = PutInput::new(&self.table_name, rekey(record, &destination));
        if require_fresh {
            put.condition_expression = Some("attribute_not_exists(#key)".to_string());
            put.expression_attribute_names =
                Some([("#key".to_string(), KEY_ATTR.to_string())].into());
        }
        let delete = DeleteInput::new(&self.table_name, wire::key_item(&source));

        let operations = vec![
            StorageOperation::Put(put),
            StorageOperation::Delete(delete),
        ];
        match self.backend.transact_write_items(operations).await {
            Ok(()) => Ok(Reply::Bool(true)),
            Err(err) if require_fresh && err.is_conditional_check_failed() => {
                Ok(Reply::Bool(false))
            }
            Err(err) => Err(wrap(err.into())),
        }
    }

    /// Writes up to 25 hash fields, creating the hash when the key is
    /// absent.
    ///
    /// Two steps: a field-wise update against an existing map, and on
    /// its failed condition a create of the whole map guarded against
    /// a concurrent writer. A key holding a non-map value fails both
    /// conditions and surfaces the second failure.
    pub async fn hset(
        &self,
        key: impl Into<String>,
        fields: Vec<(String, Value)>,
    ) -> Result<Reply, Error> {
        let key = key.into();
        let wrap = |source: CommandError| Error::new("HSET", source);
        validate_key(&key).map_err(|err| wrap(err.into()))?;
        validate_batch(fields.len()).map_err(|err| wrap(err.into()))?;
        for (field, _) in &fields {
            if field.is_empty() {
                return Err(wrap(ValidationError::EmptyField.into()));
            }
        }

        let mut assignments = Vec::with_capacity(fields.len());
        let mut names = vec![
            ("#key".to_string(), KEY_ATTR.to_string()),
            ("#value".to_string(), VALUE_ATTR.to_string()),
        ];
        let mut values: Item = [(":type".to_string(), WireValue::S("M".to_string()))].into();
        for (i, (field, value)) in fields.iter().enumerate() {
            assignments.push(format!("#value.#field{i} = :value{i}"));
            names.push((format!("#field{i}"), field.clone()));
            values.insert(format!(":value{i}"), wire::encode(value));
        }

        let expression = format!("SET {}", assignments.join(", "));
        let mut update = UpdateInput::new(&self.table_name, wire::key_item(&key), &expression);
        update.condition_expression =
            Some("attribute_exists(#key) AND attribute_type(#value, :type)".to_string());
        update.expression_attribute_names = Some(names.into_iter().collect());
        update.expression_attribute_values = Some(values);

        match self.backend.update_item(update).await {
            Ok(_) => return Ok(Reply::Bool(true)),
            Err(err) if err.is_conditional_check_failed() => {}
            Err(err) => return Err(wrap(err.into())),
        }

        // No existing map: create the whole value, but never clobber a
        // record written in between.
        let map: WireValue = WireValue::M(
            fields
                .iter()
                .map(|(field, value)| (field.clone(), wire::encode(value)))
                .collect(),
        );
        let mut create = UpdateInput::new(
            &self.table_name,
            wire::key_item(&key),
            "SET #value = :values",
        );
        create.condition_expression = Some("attribute_not_exists(#key)".to_string());
        create.expression_attribute_names = Some(
            [
                ("#key".to_string(), KEY_ATTR.to_string()),
                ("#value".to_string(), VALUE_ATTR.to_string()),
            ]
            .into(),
        );
        create.expression_attribute_values = Some([(":values".to_string(), map)].into());

        self.backend
            .update_item(create)
            .await
            .map_err(|err| wrap(err.into()))?;
        Ok(Reply::Bool(true))
    }

    /// The historical alias of [`hset`](Self::hset); same semantics.
    pub async fn hmset(
        &self,
        key: impl Into<String>,
        fields: Vec<(String, Value)>,
    ) -> Result<Reply, Error> {
        self.hset(key, fields).await
    }

    /// Reads every member of a set. An absent key reads as an empty
    /// array.
    pub async fn smembers(&self, key: impl Into<String>) -> Result<Reply, Error> {
        let key = key.into();
        let submit = Submit::direct("SMEMBERS", Arc::clone(&self.backend));
        let set = crate::commands::sets::read_set(
            &self.table_name,
            &submit,
            &key,
            &GetOptions::default(),
        )
        .await
        .map_err(|err| Error::new("SMEMBERS", err))?;

        Ok(members_reply(
            set.map(|set| set.members().to_vec()).unwrap_or_default(),
        ))
    }

    /// Set difference: members of the first key missing from all the
    /// rest. Up to 25 keys, read in one consistent batch.
    pub async fn sdiff(&self, keys: Vec<String>) -> Result<Reply, Error> {
        let sets = self.read_sets("SDIFF", &keys).await?;
        Ok(members_reply(combine(sets, SetCombine::Difference)))
    }

    /// Set intersection across up to 25 keys.
    pub async fn sinter(&self, keys: Vec<String>) -> Result<Reply, Error> {
        let sets = self.read_sets("SINTER", &keys).await?;
        Ok(members_reply(combine(sets, SetCombine::Intersection)))
    }

    /// Set union across up to 25 keys.
    pub async fn sunion(&self, keys: Vec<String>) -> Result<Reply, Error> {
        let sets = self.read_sets("SUNION", &keys).await?;
        Ok(members_reply(combine(sets, SetCombine::Union)))
    }

    /// [`sdiff`](Self::sdiff) followed by a write of the result to a
    /// destination key. An empty result deletes the destination, so a
    /// stored set never has zero members.
    pub async fn sdiffstore(
        &self,
        destination: impl Into<String>,
        keys: Vec<String>,
    ) -> Result<Reply, Error> {
        let sets = self.read_sets("SDIFFSTORE", &keys).await?;
        self.store_members("SDIFFSTORE", destination.into(), combine(sets, SetCombine::Difference))
            .await
    }

    /// [`sinter`](Self::sinter) followed by a write of the result.
    pub async fn sinterstore(
        &self,
        destination: impl Into<String>,
        keys: Vec<String>,
    ) -> Result<Reply, Error> {
        let sets = self.read_sets("SINTERSTORE", &keys).await?;
        self.store_members("SINTERSTORE", destination.into(), combine(sets, SetCombine::Intersection))
            .await
    }

    /// [`sunion`](Self::sunion) followed by a write of the result.
    pub async fn sunionstore(
        &self,
        destination: impl Into<String>,
        keys: Vec<String>,
    ) -> Result<Reply, Error> {
        let sets = self.read_sets("SUNIONSTORE", &keys).await?;
        self.store_members("SUNIONSTORE", destination.into(), combine(sets, SetCombine::Union))
            .await
    }

    /// Moves one member between two sets in one atomic batch.
    ///
    /// Reads as `false` when the source does not contain the member;
    /// the batch condition re-checks membership so a concurrent
    /// removal cannot duplicate the member.
    pub async fn smove(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
        member: impl Into<SetMember>,
    ) -> Result<Reply, Error> {
        let source = source.into();
        let destination = destination.into();
        let member = member.into();
        let wrap = |err: CommandError| Error::new("SMOVE", err);
        validate_key(&source).map_err(|err| wrap(err.into()))?;
        validate_key(&destination).map_err(|err| wrap(err.into()))?;

        let submit = Submit::direct("SMOVE", Arc::clone(&self.backend));
        let held = crate::commands::sets::read_set(
            &self.table_name,
            &submit,
            &source,
            &GetOptions::default(),
        )
        .await
        .map_err(wrap)?;
        let Some(held) = held else {
            return Ok(Reply::Bool(false));
        };
        if !held.contains(&member) {
            return Ok(Reply::Bool(false));
        }

        let kind = held.kind();
        let one = ValueSet::new(vec![member]).map_err(|err| wrap(err.into()))?;
        let encoded = wire::encode(&Value::Set(one));

        let mut remove = UpdateInput::new(
            &self.table_name,
            wire::key_item(&source),
            "DELETE #value :member",
        );
        remove.condition_expression = Some("contains(#value, :candidate)".to_string());
        remove.expression_attribute_names =
            Some([("#value".to_string(), VALUE_ATTR.to_string())].into());
        remove.expression_attribute_values = Some(
            [
                (":member".to_string(), encoded.clone()),
                (":candidate".to_string(), member_scalar(&encoded)),
            ]
            .into(),
        );

        let mut add = UpdateInput::new(
            &self.table_name,
            wire::key_item(&destination),
            "ADD #value :member",
        );
        add.condition_expression =
            Some("attribute_not_exists(#key) OR attribute_type(#value, :type)".to_string());
        add.expression_attribute_names = Some(
            [
                ("#key".to_string(), KEY_ATTR.to_string()),
                ("#value".to_string(), VALUE_ATTR.to_string()),
            ]
            .into(),
        );
        add.expression_attribute_values = Some(
            [
                (":member".to_string(), encoded),
                (":type".to_string(), WireValue::S(kind.tag().to_string())),
            ]
            .into(),
        );

        let operations = vec![
            StorageOperation::Update(remove),
            StorageOperation::Update(add),
        ];
        match self.backend.transact_write_items(operations).await {
            Ok(()) => Ok(Reply::Bool(true)),
            Err(err) if err.is_conditional_check_failed() => Ok(Reply::Bool(false)),
            Err(err) => Err(wrap(err.into())),
        }
    }

    async fn batch_read(
        &self,
        name: &'static str,
        keys: &[String],
    ) -> Result<Vec<Option<Item>>, Error> {
        let wrap = |source: CommandError| Error::new(name, source);
        validate_batch(keys.len()).map_err(|err| wrap(err.into()))?;

        let mut inputs = Vec::with_capacity(keys.len());
        for key in keys {
            validate_key(key).map_err(|err| wrap(err.into()))?;
            inputs.push(GetInput::new(&self.table_name, wire::key_item(key)));
        }

        self.backend
            .transact_get_items(inputs)
            .await
            .map_err(|err| wrap(err.into()))
    }

    async fn read_record(&self, key: &str) -> Result<Option<Item>, CommandError> {
        let input = GetInput::new(&self.table_name, wire::key_item(key));
        let output = self.backend.get_item(input).await?;
        Ok(output.item)
    }

    async fn read_sets(
        &self,
        name: &'static str,
        keys: &[String],
    ) -> Result<Vec<Vec<SetMember>>, Error> {
        let records = self.batch_read(name, keys).await?;

        let mut sets = Vec::with_capacity(records.len());
        for (key, record) in keys.iter().zip(records) {
            let raw = record.and_then(|mut item| item.remove(VALUE_ATTR));
            let members = match raw {
                None => Vec::new(),
                Some(raw @ (WireValue::Ss(_) | WireValue::Ns(_) | WireValue::Bs(_))) => {
                    match wire::decode(&raw).map_err(|err| Error::new(name, err.into()))? {
                        Value::Set(set) => set.members().to_vec(),
                        _ => Vec::new(),
                    }
                }
                Some(_) => {
                    return Err(Error::new(
                        name,
                        CommandError::WrongType {
                            key: key.clone(),
                            expected: "set",
                        },
                    ))
                }
            };
            sets.push(members);
        }
        Ok(sets)
    }

    async fn store_members(
        &self,
        name: &'static str,
        destination: String,
        members: Vec<SetMember>,
    ) -> Result<Reply, Error> {
        let wrap = |err: CommandError| Error::new(name, err);
        validate_key(&destination).map_err(|err| wrap(err.into()))?;

        // The wire format cannot carry an empty set, so an empty
        // result clears the destination instead.
        if members.is_empty() {
            let input = DeleteInput::new(&self.table_name, wire::key_item(&destination));
            self.backend
                .delete_item(input)
                .await
                .map_err(|err| wrap(err.into()))?;
            return Ok(Reply::Int(0));
        }

        let count = members.len();
        let set = ValueSet::new(members).map_err(|err| wrap(err.into()))?;
        let input = PutInput::new(
            &self.table_name,
            wire::record(&destination, &Value::Set(set), None),
        );
        self.backend
            .put_item(input)
            .await
            .map_err(|err| wrap(err.into()))?;
        Ok(Reply::Int(count as i64))
    }
}

enum SetCombine {
    Difference,
    Intersection,
    Union,
}

/// Folds decoded member lists into one, left to right.
fn combine(sets: Vec<Vec<SetMember>>, how: SetCombine) -> Vec<SetMember> {
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else {
        return Vec::new();
    };

    sets.fold(first, |acc, next| match how {
        SetCombine::Difference => acc
            .into_iter()
            .filter(|member| !next.contains(member))
            .collect(),
        SetCombine::Intersection => acc
            .into_iter()
            .filter(|member| next.contains(member))
            .collect(),
        SetCombine::Union => {
            let mut merged = acc;
            for member in next {
                if !merged.contains(&member) {
                    merged.push(member);
                }
            }
            merged
        }
    })
}

fn members_reply(members: Vec<SetMember>) -> Reply {
    Reply::Array(
        members
            .into_iter()
            .map(|member| Reply::Value(member.into()))
            .collect(),
    )
}

/// Rewrites a record's key attribute, keeping value and expiry.
fn rekey(mut record: Item, key: &str) -> Item {
    record.insert(KEY_ATTR.to_string(), WireValue::S(key.to_string()));
    record
}

/// Extracts the scalar wire value of a one-member set, for use in a
/// `contains` condition.
fn member_scalar(encoded: &WireValue) -> WireValue {
    match encoded {
        WireValue::Ss(members) => WireValue::S(members[0].clone()),
        WireValue::Ns(members) => WireValue::N(members[0].clone()),
        WireValue::Bs(members) => WireValue::B(members[0].clone()),
        other => other.clone(),
    }
}
