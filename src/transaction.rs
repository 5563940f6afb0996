//! Atomic multi-command transactions.
//!
//! A [`Transaction`] queues up to 25 commands without touching the
//! backend, then executes them in a single atomic batch. Every queued
//! command runs against a deferred [`Submit`] handle: instead of
//! executing its storage operation, the handle records it for the
//! coordinator and suspends until the batch result comes back.
//!
//! The coordinator waits for every participant to either submit an
//! operation or report that it bailed out before submitting, validates
//! that the batch is all reads or all writes, issues exactly one batch
//! call and fans the outcome back out. A bailed participant abandons
//! the whole batch before any backend contact, and a failed batch
//! rejects every participant with a clone of the same error, so no
//! partial completion is ever observable.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::client::Client;
use crate::commands::{Command, GetOptions, SetOptions, MAX_BATCH_ITEMS};
use crate::error::{CommandError, Error, TransactionError, ValidationError};
use crate::executor::{DeferredResult, Submission, Submit};
use crate::operation::{OpOutput, StorageOperation};
use crate::reply::Reply;
use crate::value::{SetMember, Value};

/// A queue of commands executed as one atomic batch.
///
/// Queue methods mirror the standalone client methods but only record
/// the call; nothing reaches the backend before [`exec`](Self::exec).
/// Replies come back in queue order.
pub struct Transaction<'a> {
    client: &'a Client,
    commands: Vec<Command>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Transaction {
            client,
            commands: Vec::new(),
        }
    }

    /// The number of commands queued so far.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Get {
            key: key.into(),
            options: GetOptions::default(),
        })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.set_with(key, value, SetOptions::default())
    }

    pub fn set_with(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> &mut Self {
        self.queue(Command::Set {
            key: key.into(),
            value: value.into(),
            options,
        })
    }

    pub fn strlen(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Strlen {
            key: key.into(),
            options: GetOptions::default(),
        })
    }

    pub fn incr(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Incr { key: key.into() })
    }

    pub fn decr(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Decr { key: key.into() })
    }

    pub fn incrby(&mut self, key: impl Into<String>, amount: i64) -> &mut Self {
        self.queue(Command::IncrBy {
            key: key.into(),
            amount,
        })
    }

    pub fn decrby(&mut self, key: impl Into<String>, amount: i64) -> &mut Self {
        self.queue(Command::DecrBy {
            key: key.into(),
            amount,
        })
    }

    pub fn rpush(&mut self, key: impl Into<String>, elements: Vec<Value>) -> &mut Self {
        self.queue(Command::RPush {
            key: key.into(),
            elements,
        })
    }

    pub fn lpush(&mut self, key: impl Into<String>, elements: Vec<Value>) -> &mut Self {
        self.queue(Command::LPush {
            key: key.into(),
            elements,
        })
    }

    pub fn rpushx(&mut self, key: impl Into<String>, elements: Vec<Value>) -> &mut Self {
        self.queue(Command::RPushX {
            key: key.into(),
            elements,
        })
    }

    pub fn lpushx(&mut self, key: impl Into<String>, elements: Vec<Value>) -> &mut Self {
        self.queue(Command::LPushX {
            key: key.into(),
            elements,
        })
    }

    pub fn lindex(&mut self, key: impl Into<String>, index: i64) -> &mut Self {
        self.queue(Command::LIndex {
            key: key.into(),
            index,
            options: GetOptions::default(),
        })
    }

    pub fn llen(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::LLen {
            key: key.into(),
            options: GetOptions::default(),
        })
    }

    pub fn lrange(&mut self, key: impl Into<String>, start: i64, stop: i64) -> &mut Self {
        self.queue(Command::LRange {
            key: key.into(),
            start,
            stop,
            options: GetOptions::default(),
        })
    }

    pub fn lset(&mut self, key: impl Into<String>, index: i64, value: impl Into<Value>) -> &mut Self {
        self.queue(Command::LSet {
            key: key.into(),
            index,
            value: value.into(),
        })
    }

    pub fn sadd(&mut self, key: impl Into<String>, members: Vec<SetMember>) -> &mut Self {
        self.queue(Command::SAdd {
            key: key.into(),
            members,
        })
    }

    pub fn srem(&mut self, key: impl Into<String>, members: Vec<SetMember>) -> &mut Self {
        self.queue(Command::SRem {
            key: key.into(),
            members,
        })
    }

    pub fn scard(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::SCard { key: key.into() })
    }

    pub fn sismember(&mut self, key: impl Into<String>, member: impl Into<SetMember>) -> &mut Self {
        self.queue(Command::SIsMember {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn smismember(&mut self, key: impl Into<String>, members: Vec<SetMember>) -> &mut Self {
        self.queue(Command::SMIsMember {
            key: key.into(),
            members,
        })
    }

    pub fn hget(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.queue(Command::HGet {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn hgetall(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::HGetAll { key: key.into() })
    }

    pub fn hdel(&mut self, key: impl Into<String>, fields: Vec<String>) -> &mut Self {
        self.queue(Command::HDel {
            key: key.into(),
            fields,
        })
    }

    pub fn hexists(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.queue(Command::HExists {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn hstrlen(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.queue(Command::HStrLen {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn hkeys(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::HKeys { key: key.into() })
    }

    pub fn hvals(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::HVals { key: key.into() })
    }

    pub fn hlen(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::HLen { key: key.into() })
    }

    pub fn hmget(&mut self, key: impl Into<String>, fields: Vec<String>) -> &mut Self {
        self.queue(Command::HMGet {
            key: key.into(),
            fields,
        })
    }

    pub fn hincrby(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        amount: i64,
    ) -> &mut Self {
        self.queue(Command::HIncrBy {
            key: key.into(),
            field: field.into(),
            amount,
        })
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Del { key: key.into() })
    }

    pub fn exists(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Exists { key: key.into() })
    }

    pub fn expire(&mut self, key: impl Into<String>, seconds: u64) -> &mut Self {
        self.queue(Command::Expire {
            key: key.into(),
            seconds,
        })
    }

    pub fn expireat(&mut self, key: impl Into<String>, timestamp: u64) -> &mut Self {
        self.queue(Command::ExpireAt {
            key: key.into(),
            timestamp,
        })
    }

    pub fn persist(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Persist { key: key.into() })
    }

    pub fn ttl(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Ttl { key: key.into() })
    }

    pub fn type_of(&mut self, key: impl Into<String>) -> &mut Self {
        self.queue(Command::Type { key: key.into() })
    }

    fn queue(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Executes the queued commands as one atomic batch.
    ///
    /// An empty transaction executes nothing. A transaction mixing
    /// read commands with write commands is rejected before any
    /// backend contact, and so is one holding a command whose
    /// arguments fail validation. On success the replies come back in
    /// queue order; on failure no command has taken effect.
    pub async fn exec(self) -> Result<Vec<Reply>, Error> {
        let commands = self.commands;
        let n = commands.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if n > MAX_BATCH_ITEMS {
            return Err(Error::new(
                "EXEC",
                ValidationError::TransactionTooLarge {
                    max: MAX_BATCH_ITEMS,
                    got: n,
                }
                .into(),
            ));
        }

        debug!(commands = n, "executing transaction");

        let (submissions_tx, submissions_rx) = mpsc::channel::<Submission>(n);
        let mut result_senders: Vec<Option<oneshot::Sender<DeferredResult>>> = Vec::new();
        let mut participants = Vec::new();

        for (index, command) in commands.iter().enumerate() {
            let (result_tx, result_rx) = oneshot::channel::<DeferredResult>();
            result_senders.push(Some(result_tx));

            let submit =
                Submit::deferred(command.name(), index, submissions_tx.clone(), result_rx);
            let table = self.client.table_name();
            participants.push(async move { participate(table, command, submit).await });
        }
        // Only participants hold senders now, so the channel closes
        // once every one of them has reported.
        drop(submissions_tx);

        let coordinator = coordinate(self.client, n, submissions_rx, result_senders);
        let (outcomes, batch_failure) = tokio::join!(join_all(participants), coordinator);

        if let Some(failure) = batch_failure {
            return Err(Error::new("EXEC", failure));
        }

        // An abandoned batch rejects the remaining participants with
        // an abort; surface the failure that caused it, not the
        // collateral abort of an earlier slot.
        let mut replies = Vec::with_capacity(n);
        let mut aborted = None;
        for (command, outcome) in commands.iter().zip(outcomes) {
            match outcome {
                Ok(reply) => replies.push(reply),
                Err(source) => {
                    let is_abort = matches!(
                        source,
                        CommandError::Transaction(TransactionError::Aborted(_))
                    );
                    let error = Error::new(command.name(), source);
                    if is_abort {
                        aborted.get_or_insert(error);
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        match aborted {
            Some(error) => Err(error),
            None => Ok(replies),
        }
    }
}

/// Runs one queued command and keeps the coordinator barrier honest:
/// a participant that finishes without submitting still reports in.
async fn participate(
    table: &str,
    command: &Command,
    submit: Submit,
) -> Result<Reply, CommandError> {
    let result = command.run(table, &submit).await;

    if !submit.was_called() {
        submit.report_skipped().await;
        return match result {
            Ok(_) => Err(ValidationError::MissingSubmit.into()),
            Err(err) => Err(err),
        };
    }

    result
}

/// Collects every participant's submission, issues the one batch call
/// and fans the outcome back out.
///
/// Returns the batch-level failure, if any. Participant-level failures
/// travel through the result channels instead.
async fn coordinate(
    client: &Client,
    expected: usize,
    mut submissions: mpsc::Receiver<Submission>,
    mut result_senders: Vec<Option<oneshot::Sender<DeferredResult>>>,
) -> Option<CommandError> {
    let mut operations: Vec<(usize, StorageOperation)> = Vec::new();
    let mut abandoned = false;

    for _ in 0..expected {
        match submissions.recv().await {
            Some(Submission::Operation { index, op }) => operations.push((index, op)),
            Some(Submission::Skipped { .. }) => abandoned = true,
            // Every participant sends exactly one message before its
            // sender drops, so an early close means they all reported.
            None => break,
        }
    }

    // A participant that failed before submitting abandons the whole
    // batch: nothing reaches the backend, and dropping the result
    // senders rejects everyone still waiting.
    if abandoned || operations.is_empty() {
        return None;
    }

    let reads = operations.iter().filter(|(_, op)| op.is_get()).count();
    if reads != 0 && reads != operations.len() {
        // Dropping the result senders rejects the waiting
        // participants; the batch-level error carries the reason.
        return Some(ValidationError::MixedTransaction.into());
    }

    if reads == operations.len() {
        let inputs = operations
            .iter()
            .map(|(_, op)| match op {
                StorageOperation::Get(input) => input.clone(),
                _ => unreachable!("read batch holds only get operations"),
            })
            .collect();

        match client.backend().transact_get_items(inputs).await {
            Ok(records) => {
                for ((index, _), record) in operations.into_iter().zip(records) {
                    respond(&mut result_senders, index, Ok(OpOutput::Record(record)));
                }
            }
            Err(err) => reject(&mut result_senders, &operations, err),
        }
    } else {
        let ops = operations.iter().map(|(_, op)| op.clone()).collect();

        match client.backend().transact_write_items(ops).await {
            Ok(()) => {
                for (index, _) in operations {
                    respond(&mut result_senders, index, Ok(OpOutput::Done));
                }
            }
            Err(err) => reject(&mut result_senders, &operations, err),
        }
    }

    None
}

fn respond(
    senders: &mut [Option<oneshot::Sender<DeferredResult>>],
    index: usize,
    result: DeferredResult,
) {
    if let Some(sender) = senders.get_mut(index).and_then(Option::take) {
        let _ = sender.send(result);
    }
}

/// Rejects every participant of a failed batch with a clone of the
/// same error.
fn reject(
    senders: &mut [Option<oneshot::Sender<DeferredResult>>],
    operations: &[(usize, StorageOperation)],
    err: crate::backend::BackendError,
) {
    let shared = Arc::new(err);
    for (index, _) in operations {
        respond(
            senders,
            *index,
            Err(TransactionError::Backend(Arc::clone(&shared))),
        );
    }
}
