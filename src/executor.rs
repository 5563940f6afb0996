//! The submit protocol and the standalone execution path.
//!
//! A command function never talks to the backend itself. It receives a
//! [`Submit`] handle, builds exactly one [`StorageOperation`], awaits
//! `submit` once, and shapes the raw result into its own reply. The
//! handle decides whether that operation executes immediately (this
//! module) or is deferred into a transaction batch
//! ([`transaction`](crate::transaction)).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::backend::StorageBackend;
use crate::commands::Command;
use crate::error::{CommandError, Error, TransactionError, ValidationError};
use crate::operation::{OpOutput, StorageOperation};

/// What a participant reports to the transaction coordinator: its one
/// recorded operation, or the fact that it finished without one.
#[derive(Debug)]
pub(crate) enum Submission {
    Operation { index: usize, op: StorageOperation },
    Skipped { index: usize },
}

pub(crate) type DeferredResult = Result<OpOutput, TransactionError>;

enum SubmitMode {
    /// Execute the operation against the backend right away.
    Direct { backend: Arc<dyn StorageBackend> },
    /// Record the operation for the coordinator and suspend until the
    /// batch result is distributed back.
    Deferred {
        index: usize,
        operations: mpsc::Sender<Submission>,
        result: Mutex<Option<oneshot::Receiver<DeferredResult>>>,
    },
}

/// The single callback a command invocation may use for I/O.
///
/// Contract: invoked exactly once per invocation, with exactly one
/// operation. Zero or duplicate invocations are protocol violations,
/// reported as [`ValidationError`]s distinct from backend errors.
pub struct Submit {
    command: &'static str,
    called: AtomicBool,
    mode: SubmitMode,
}

impl Submit {
    pub(crate) fn direct(command: &'static str, backend: Arc<dyn StorageBackend>) -> Self {
        Submit {
            command,
            called: AtomicBool::new(false),
            mode: SubmitMode::Direct { backend },
        }
    }

    pub(crate) fn deferred(
        command: &'static str,
        index: usize,
        operations: mpsc::Sender<Submission>,
        result: oneshot::Receiver<DeferredResult>,
    ) -> Self {
        Submit {
            command,
            called: AtomicBool::new(false),
            mode: SubmitMode::Deferred {
                index,
                operations,
                result: Mutex::new(Some(result)),
            },
        }
    }

    /// Whether this invocation runs inside a transaction batch.
    ///
    /// This is the one flag a command may branch on, to skip
    /// post-processing that has no meaning in a batch (per-item
    /// payloads, consistent-read options).
    pub fn is_transaction(&self) -> bool {
        matches!(self.mode, SubmitMode::Deferred { .. })
    }

    pub(crate) fn was_called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }

    /// Submits the command's one storage operation and resolves with
    /// the raw backend result for it.
    pub async fn submit(&self, op: StorageOperation) -> Result<OpOutput, CommandError> {
        if self.called.swap(true, Ordering::SeqCst) {
            return Err(ValidationError::DuplicateSubmit.into());
        }

        debug!(
            command = self.command,
            kind = op.kind(),
            transactional = self.is_transaction(),
            "submitting storage operation"
        );

        match &self.mode {
            SubmitMode::Direct { backend } => dispatch(backend.as_ref(), op).await,
            SubmitMode::Deferred {
                index,
                operations,
                result,
            } => {
                let result = result.lock().await.take();
                let Some(result) = result else {
                    return Err(ValidationError::DuplicateSubmit.into());
                };

                if operations
                    .send(Submission::Operation { index: *index, op })
                    .await
                    .is_err()
                {
                    return Err(TransactionError::Aborted("coordinator went away").into());
                }

                match result.await {
                    Ok(resolved) => resolved.map_err(CommandError::Transaction),
                    Err(_) => Err(TransactionError::Aborted("coordinator went away").into()),
                }
            }
        }
    }

    /// Unblocks the coordinator barrier for a participant that
    /// finished without submitting anything.
    pub(crate) async fn report_skipped(&self) {
        if let SubmitMode::Deferred {
            index, operations, ..
        } = &self.mode
        {
            let _ = operations.send(Submission::Skipped { index: *index }).await;
        }
    }
}

/// Routes one operation to the matching backend point primitive.
async fn dispatch(
    backend: &dyn StorageBackend,
    op: StorageOperation,
) -> Result<OpOutput, CommandError> {
    match op {
        StorageOperation::Get(input) => {
            let output = backend.get_item(input).await?;
            Ok(OpOutput::Record(output.item))
        }
        StorageOperation::Put(input) => {
            backend.put_item(input).await?;
            Ok(OpOutput::Done)
        }
        StorageOperation::Update(input) => {
            let output = backend.update_item(input).await?;
            Ok(OpOutput::Attributes(output.attributes))
        }
        StorageOperation::Delete(input) => {
            backend.delete_item(input).await?;
            Ok(OpOutput::Done)
        }
    }
}

/// Runs one command outside any transaction.
///
/// The command's one submitted operation executes immediately; any
/// failure comes back wrapped with the command name and the library
/// identity. A command that never submits is a protocol violation.
pub(crate) async fn run_standalone(
    table_name: &str,
    backend: &Arc<dyn StorageBackend>,
    command: &Command,
) -> Result<crate::reply::Reply, Error> {
    let submit = Submit::direct(command.name(), Arc::clone(backend));

    let outcome = command.run(table_name, &submit).await.and_then(|reply| {
        if submit.was_called() {
            Ok(reply)
        } else {
            Err(ValidationError::MissingSubmit.into())
        }
    });

    outcome.map_err(|source| Error::new(command.name(), source))
}
