//! A Redis-shaped command surface over a remote key/value table.
//!
//! Records live in a table keyed by a string attribute; values travel
//! in a tagged wire format that distinguishes strings, numbers,
//! booleans, byte strings, lists, maps and homogeneous sets. The
//! [`Client`] exposes the familiar commands (GET, SET, RPUSH, SADD,
//! HSET, EXPIRE, ...) as single storage operations, and a
//! [`Transaction`] queues up to 25 of them for one atomic batch.
//!
//! The backend itself is abstract: anything implementing
//! [`StorageBackend`] works, from an AWS DynamoDB adapter to the mock
//! used in the tests.

pub mod backend;
pub mod client;
pub mod commands;
pub mod error;
mod executor;
pub mod operation;
pub mod reply;
pub mod transaction;
pub mod value;
pub mod wire;

pub use backend::{BackendError, GetOutput, StorageBackend, UpdateOutput};
pub use client::Client;
pub use commands::{Command, GetOptions, SetOptions, MAX_BATCH_ITEMS};
pub use error::{CommandError, Error, TransactionError, ValidationError};
pub use executor::Submit;
pub use reply::Reply;
pub use transaction::Transaction;
pub use value::{Number, SetError, SetKind, SetMember, Value, ValueSet};

/// The name every surfaced error is prefixed with.
pub(crate) const PKG_NAME: &str = env!("CARGO_PKG_NAME");
