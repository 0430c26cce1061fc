//! Claims-Based Security (CBS) token client.
//!
//! CBS is a management protocol spoken with the `$cbs` node. A client puts
//! a security token for an audience (`put-token`) before attaching links
//! that need it, and may withdraw it again (`delete-token`).
//!
//! ## Request Layout
//!
//! | Part                          | `put-token`      | `delete-token`   |
//! |-------------------------------|------------------|------------------|
//! | application property `operation` | `put-token`   | `delete-token`   |
//! | application property `type`   | token type      | token type       |
//! | application property `name`   | audience        | audience         |
//! | body                          | token (string)   | empty            |
//!
//! Replies carry `status-code` and `status-description` application
//! properties (not the generic `statusCode`/`statusDescription`).
//!
//! ## State Machine
//!
//! ```text
//!               open_async()              both links open
//!   [Closed] ──────────────> [Opening] ─────────────────> [Open]
//!      ^                         │                          │
//!      │  open error / cancel    │                          │ link failure
//!      └─────────────────────────┘                          v
//!      ^                                                 [Error]
//!      └──────────────── close() ───────────────────────────┘
//! ```

mod client;

pub use client::{Cbs, OnCbsError, OnCbsOpenComplete, OnCbsOperationComplete};

use serde::Serialize;

use crate::management::ExecuteResult;

/// Management node CBS requests are sent to
pub const CBS_NODE: &str = "$cbs";

/// Reply application property holding the status code
pub const CBS_STATUS_CODE_KEY_NAME: &str = "status-code";

/// Reply application property holding the status description
pub const CBS_STATUS_DESCRIPTION_KEY_NAME: &str = "status-description";

/// Operation name for installing a token
pub const PUT_TOKEN_OPERATION: &str = "put-token";

/// Operation name for removing a token
pub const DELETE_TOKEN_OPERATION: &str = "delete-token";

/// Request application property carrying the audience
pub const NAME_KEY: &str = "name";

/// CBS client lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CbsState {
    /// Not open
    Closed,
    /// Waiting for the `$cbs` links to attach
    Opening,
    /// Ready for token operations
    Open,
    /// The `$cbs` links failed after opening
    Error,
}

/// Result reported to the CBS open-complete callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CbsOpenResult {
    /// Opened
    Ok,
    /// Open failed
    Error,
    /// `close` was called while opening
    Cancelled,
}

/// Result of a `put-token` or `delete-token` operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CbsOperationResult {
    /// Peer accepted the request (2xx)
    Ok,
    /// Request could not be delivered
    CbsError,
    /// Peer answered with a non-2xx status
    OperationFailed,
    /// CBS instance was closed before a reply arrived
    InstanceClosed,
}

impl From<ExecuteResult> for CbsOperationResult {
    fn from(result: ExecuteResult) -> Self {
        match result {
            ExecuteResult::Ok => Self::Ok,
            ExecuteResult::FailedBadStatus => Self::OperationFailed,
            ExecuteResult::InstanceClosed => Self::InstanceClosed,
            ExecuteResult::Error => Self::CbsError,
        }
    }
}

/// Everything a CBS operation callback receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CbsOutcome {
    /// Result classification
    pub result: CbsOperationResult,
    /// Status code from the reply (0 when there was no reply)
    pub status_code: i32,
    /// Status description from the reply, if any
    pub status_description: Option<String>,
}
