//! In-flight management operations keyed by message id.

use std::collections::BTreeMap;
use std::fmt;

use crate::amqp::Message;

/// Result reported to an operation's completion callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    /// Reply carried a 2xx status code
    Ok,
    /// The request could not be delivered
    Error,
    /// Reply carried a status code outside 2xx
    FailedBadStatus,
    /// The instance was closed before a reply arrived
    InstanceClosed,
}

/// Everything an operation's completion callback receives
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    /// Result classification
    pub result: ExecuteResult,
    /// Status code from the reply (0 when there was no reply)
    pub status_code: i32,
    /// Status description from the reply, if the peer sent one
    pub status_description: Option<String>,
    /// The reply message, if there was one
    pub message: Option<Message>,
}

impl OperationOutcome {
    /// Outcome for an operation that ended without a reply
    pub fn without_reply(result: ExecuteResult) -> Self {
        Self {
            result,
            status_code: 0,
            status_description: None,
            message: None,
        }
    }
}

/// Completion callback for one management operation
pub type OnExecuteComplete = Box<dyn FnOnce(OperationOutcome)>;

/// One outstanding request
pub struct PendingOperation {
    message_id: u64,
    on_complete: OnExecuteComplete,
}

impl PendingOperation {
    /// Message id the reply must correlate to
    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    /// Deliver the outcome, consuming the operation
    pub fn complete(self, outcome: OperationOutcome) {
        (self.on_complete)(outcome)
    }
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

/// Set of pending operations.
///
/// The set owns each operation until it is taken out for completion, so an
/// operation can be completed at most once.
#[derive(Debug, Default)]
pub struct PendingOperations {
    operations: BTreeMap<u64, PendingOperation>,
}

impl PendingOperations {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under `message_id`.
    ///
    /// Returns false if the id is already in use.
    pub fn insert(&mut self, message_id: u64, on_complete: OnExecuteComplete) -> bool {
        if self.operations.contains_key(&message_id) {
            return false;
        }
        self.operations.insert(
            message_id,
            PendingOperation {
                message_id,
                on_complete,
            },
        );
        true
    }

    /// Take the operation registered under `message_id`
    pub fn take(&mut self, message_id: u64) -> Option<PendingOperation> {
        self.operations.remove(&message_id)
    }

    /// Take every operation, oldest first
    pub fn drain(&mut self) -> Vec<PendingOperation> {
        std::mem::take(&mut self.operations).into_values().collect()
    }

    /// Number of pending operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
