//! The closed set of storage operations a command can submit.
//!
//! Every command function builds exactly one of these and hands it to
//! its [`Submit`](crate::executor::Submit) handle. The executors match
//! the enum exhaustively; there is no stringly-typed operation kind.

use std::collections::HashMap;

use crate::wire::Item;

/// Attribute-name placeholders, `#key` style.
pub type AttributeNames = HashMap<String, String>;

/// A point read of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct GetInput {
    pub table_name: String,
    pub key: Item,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<AttributeNames>,
    pub consistent_read: Option<bool>,
}

impl GetInput {
    pub fn new(table_name: &str, key: Item) -> Self {
        GetInput {
            table_name: table_name.to_string(),
            key,
            projection_expression: None,
            expression_attribute_names: None,
            consistent_read: None,
        }
    }
}

/// A point write of one full record, optionally conditional.
#[derive(Debug, Clone, PartialEq)]
pub struct PutInput {
    pub table_name: String,
    pub item: Item,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<AttributeNames>,
}

impl PutInput {
    pub fn new(table_name: &str, item: Item) -> Self {
        PutInput {
            table_name: table_name.to_string(),
            item,
            condition_expression: None,
            expression_attribute_names: None,
        }
    }
}

/// Which attributes an update reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnValues {
    #[default]
    None,
    UpdatedNew,
}

/// A conditional in-place update of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInput {
    pub table_name: String,
    pub key: Item,
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<AttributeNames>,
    pub expression_attribute_values: Option<Item>,
    pub return_values: ReturnValues,
}

impl UpdateInput {
    pub fn new(table_name: &str, key: Item, update_expression: &str) -> Self {
        UpdateInput {
            table_name: table_name.to_string(),
            key,
            update_expression: update_expression.to_string(),
            condition_expression: None,
            expression_attribute_names: None,
            expression_attribute_values: None,
            return_values: ReturnValues::None,
        }
    }
}

/// A point delete of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteInput {
    pub table_name: String,
    pub key: Item,
}

impl DeleteInput {
    pub fn new(table_name: &str, key: Item) -> Self {
        DeleteInput {
            table_name: table_name.to_string(),
            key,
        }
    }
}

/// One storage operation: the only I/O a command invocation may issue.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOperation {
    Get(GetInput),
    Put(PutInput),
    Update(UpdateInput),
    Delete(DeleteInput),
}

impl StorageOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageOperation::Get(_) => "Get",
            StorageOperation::Put(_) => "Put",
            StorageOperation::Update(_) => "Update",
            StorageOperation::Delete(_) => "Delete",
        }
    }

    /// Reads and writes may not mix inside one transaction batch.
    pub fn is_get(&self) -> bool {
        matches!(self, StorageOperation::Get(_))
    }
}

/// The raw per-operation result handed back into a command function.
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutput {
    /// A read result: the record, or absent.
    Record(Option<Item>),
    /// An update result: the updated attributes when requested.
    Attributes(Option<Item>),
    /// Writes inside a transaction carry no per-item payload, and
    /// neither do standalone puts and deletes.
    Done,
}

impl OpOutput {
    pub fn record(&self) -> Option<&Item> {
        match self {
            OpOutput::Record(item) => item.as_ref(),
            _ => None,
        }
    }

    pub fn attributes(&self) -> Option<&Item> {
        match self {
            OpOutput::Attributes(attributes) => attributes.as_ref(),
            _ => None,
        }
    }
}
