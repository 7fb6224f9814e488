pub mod dynamo;
pub mod writer;

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::error::{Result, WriteError};

pub use dynamo::DynamoStore;
pub use writer::{BatchWriter, WriteReport};

/// One stored item in DynamoDB's native attribute format.
pub type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSetup {
    Created,
    AlreadyExists,
}

/// The key-value store as the pipeline sees it.
pub trait StatsStore {
    /// Create the destination table if it does not exist yet.
    async fn ensure_table(&self) -> Result<TableSetup>;

    /// Issue one batch-write call. `Ok` carries the items the store accepted the
    /// call for but left unprocessed; `Err` means the whole call failed.
    async fn batch_write(&self, items: Vec<Item>) -> std::result::Result<Vec<Item>, WriteError>;
}

#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::error::AppError;

    /// Scripted response for one batch-write call.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Accept,
        /// Report the last `n` items of the call as unprocessed.
        LeaveUnprocessed(usize),
        Reject(String),
    }

    /// In-memory store that records every call. Unscripted calls are accepted.
    #[derive(Default)]
    pub struct RecordingStore {
        pub calls: Mutex<Vec<Vec<Item>>>,
        pub ensure_calls: Mutex<usize>,
        pub replies: Mutex<VecDeque<Reply>>,
        pub setup_error: Option<String>,
    }

    impl RecordingStore {
        pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                ..Self::default()
            }
        }

        pub fn failing_setup(msg: &str) -> Self {
            Self {
                setup_error: Some(msg.to_string()),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn call_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(Vec::len).collect()
        }

        pub fn written_items(&self) -> Vec<Item> {
            self.calls.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    impl StatsStore for RecordingStore {
        async fn ensure_table(&self) -> Result<TableSetup> {
            *self.ensure_calls.lock().unwrap() += 1;
            match &self.setup_error {
                Some(msg) => Err(AppError::TableSetup(msg.clone())),
                None => Ok(TableSetup::AlreadyExists),
            }
        }

        async fn batch_write(
            &self,
            items: Vec<Item>,
        ) -> std::result::Result<Vec<Item>, WriteError> {
            self.calls.lock().unwrap().push(items.clone());
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Accept);
            match reply {
                Reply::Accept => Ok(Vec::new()),
                Reply::LeaveUnprocessed(n) => {
                    let keep = items.len().saturating_sub(n);
                    Ok(items[keep..].to_vec())
                }
                Reply::Reject(msg) => Err(WriteError::Service(msg)),
            }
        }
    }
}
