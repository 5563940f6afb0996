//! Shared test support: a scripted in-memory backend that records
//! every call it receives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redtable::backend::{BackendError, GetOutput, StorageBackend, UpdateOutput};
use redtable::operation::{DeleteInput, GetInput, PutInput, StorageOperation, UpdateInput};
use redtable::wire::{Item, WireValue, KEY_ATTR, VALUE_ATTR};
use redtable::Client;

pub const TABLE: &str = "test-table";

/// One backend call, as the mock saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Get(GetInput),
    Put(PutInput),
    Update(UpdateInput),
    Delete(DeleteInput),
    TransactGet(Vec<GetInput>),
    TransactWrite(Vec<StorageOperation>),
}

/// A scripted answer for the next backend call. When the script runs
/// dry the mock answers with empty success values.
pub enum MockResponse {
    Record(Option<Item>),
    Attributes(Option<Item>),
    Done,
    Records(Vec<Option<Item>>),
    Failure(BackendError),
}

/// Records calls and answers them from a scripted queue.
pub struct MockBackend {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<MockResponse>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(MockBackend {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        })
    }

    pub fn respond(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next(&self) -> Option<MockResponse> {
        self.responses.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    async fn get_item(&self, input: GetInput) -> Result<GetOutput, BackendError> {
        self.record(RecordedCall::Get(input));
        match self.next() {
            None => Ok(GetOutput { item: None }),
            Some(MockResponse::Record(item)) => Ok(GetOutput { item }),
            Some(MockResponse::Failure(err)) => Err(err),
            Some(_) => panic!("scripted response does not fit get_item"),
        }
    }

    async fn put_item(&self, input: PutInput) -> Result<(), BackendError> {
        self.record(RecordedCall::Put(input));
        match self.next() {
            None | Some(MockResponse::Done) => Ok(()),
            Some(MockResponse::Failure(err)) => Err(err),
            Some(_) => panic!("scripted response does not fit put_item"),
        }
    }

    async fn update_item(&self, input: UpdateInput) -> Result<UpdateOutput, BackendError> {
        self.record(RecordedCall::Update(input));
        match self.next() {
            None => Ok(UpdateOutput { attributes: None }),
            Some(MockResponse::Attributes(attributes)) => Ok(UpdateOutput { attributes }),
            Some(MockResponse::Done) => Ok(UpdateOutput { attributes: None }),
            Some(MockResponse::Failure(err)) => Err(err),
            Some(_) => panic!("scripted response does not fit update_item"),
        }
    }

    async fn delete_item(&self, input: DeleteInput) -> Result<(), BackendError> {
        self.record(RecordedCall::Delete(input));
        match self.next() {
            None | Some(MockResponse::Done) => Ok(()),
            Some(MockResponse::Failure(err)) => Err(err),
            Some(_) => panic!("scripted response does not fit delete_item"),
        }
    }

    async fn transact_get_items(
        &self,
        inputs: Vec<GetInput>,
    ) -> Result<Vec<Option<Item>>, BackendError> {
        let n = inputs.len();
        self.record(RecordedCall::TransactGet(inputs));
        match self.next() {
            None => Ok(vec![None; n]),
            Some(MockResponse::Records(records)) => Ok(records),
            Some(MockResponse::Failure(err)) => Err(err),
            Some(_) => panic!("scripted response does not fit transact_get_items"),
        }
    }

    async fn transact_write_items(
        &self,
        operations: Vec<StorageOperation>,
    ) -> Result<(), BackendError> {
        self.record(RecordedCall::TransactWrite(operations));
        match self.next() {
            None | Some(MockResponse::Done) => Ok(()),
            Some(MockResponse::Failure(err)) => Err(err),
            Some(_) => panic!("scripted response does not fit transact_write_items"),
        }
    }
}

/// A client wired to the given mock, against [`TABLE`].
pub fn client_with(backend: &Arc<MockBackend>) -> Client {
    Client::new(TABLE, Arc::clone(backend) as Arc<dyn StorageBackend>).unwrap()
}

/// A stored record: key attribute plus an encoded value attribute.
pub fn stored_record(key: &str, value: WireValue) -> Item {
    [
        (KEY_ATTR.to_string(), WireValue::S(key.to_string())),
        (VALUE_ATTR.to_string(), value),
    ]
    .into()
}

/// Shorthand for a stored string record.
pub fn stored_string(key: &str, value: &str) -> Item {
    stored_record(key, WireValue::S(value.to_string()))
}
