//! The storage backend contract.
//!
//! The backend is an external table service reached over some
//! transport this crate does not own. It must provide point reads,
//! point writes, conditional updates, point deletes and two atomic
//! batch primitives limited to 25 items each. A client receives its
//! backend as an `Arc<dyn StorageBackend>` at construction; nothing in
//! this crate reaches for a global instance.

use async_trait::async_trait;
use thiserror::Error;

use crate::operation::{DeleteInput, GetInput, PutInput, StorageOperation, UpdateInput};
use crate::wire::Item;

/// Errors reported by the backend.
///
/// A failed condition check is its own kind because several commands
/// treat it as a normal outcome ("push only if the key exists") and
/// swallow it locally, while every other kind always propagates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("conditional check failed: {0}")]
    ConditionalCheckFailed(String),
    #[error("backend service error: {0}")]
    Service(String),
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, BackendError::ConditionalCheckFailed(_))
    }
}

/// Result of a point read.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOutput {
    pub item: Option<Item>,
}

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutput {
    /// The updated attributes, present when the update asked for them.
    pub attributes: Option<Item>,
}

/// Point and batch primitives of the backing table service.
///
/// The atomic batches are all-or-nothing: a multi-read returns one
/// item-or-absent per input in input order, and a multi-write either
/// applies every operation or none, reporting a conflict as a
/// [`BackendError::ConditionalCheckFailed`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get_item(&self, input: GetInput) -> Result<GetOutput, BackendError>;

    async fn put_item(&self, input: PutInput) -> Result<(), BackendError>;

    async fn update_item(&self, input: UpdateInput) -> Result<UpdateOutput, BackendError>;

    async fn delete_item(&self, input: DeleteInput) -> Result<(), BackendError>;

    async fn transact_get_items(
        &self,
        inputs: Vec<GetInput>,
    ) -> Result<Vec<Option<Item>>, BackendError>;

    async fn transact_write_items(
        &self,
        operations: Vec<StorageOperation>,
    ) -> Result<(), BackendError>;
}
