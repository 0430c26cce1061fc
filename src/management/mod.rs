//! AMQP management request/response correlation.
//!
//! AMQP links are unidirectional, so a management node is reached through a
//! pair of links: requests go out on `<node>-sender` and replies come back on
//! `<node>-receiver`. This module pairs each reply with the request that
//! caused it.
//!
//! # Message Flow
//!
//! ```text
//! Client                                   Management node
//!    |                                            |
//!    |-- request (message-id = 0) -------------->|
//!    |-- request (message-id = 1) -------------->|
//!    |                                            |
//!    |<-- reply (correlation-id = 1, 200) -------|  completes request 1
//!    |<-- reply (correlation-id = 0, 404) -------|  completes request 0
//! ```
//!
//! Replies may arrive in any order; matching is by id only.
//!
//! # State Machine
//!
//! | State     | Entered when                              | Leaves on                        |
//! |-----------|-------------------------------------------|----------------------------------|
//! | `Idle`    | created, closed, or open failed           | `open_async`                     |
//! | `Opening` | `open_async`                              | both links open, a link fails, `close` |
//! | `Open`    | both links reported open                  | a link regresses, `close`        |
//! | `Closing` | `close`                                   | both links closed                |
//! | `Error`   | a link regressed while open or closing    | `close`                          |
//!
//! # Wire Properties
//!
//! | Property            | Section                | Notes                                  |
//! |---------------------|------------------------|----------------------------------------|
//! | `operation`         | application-properties | set on every request                   |
//! | `type`              | application-properties | set on every request                   |
//! | `locales`           | application-properties | only when given                        |
//! | message-id          | properties             | `ulong`, 0, 1, 2, ... per instance     |
//! | correlation-id      | properties (reply)     | `ulong`, equals the request message-id |
//! | status code         | application-properties (reply) | `int`, name configurable      |
//! | status description  | application-properties (reply) | string, optional              |
//!
//! # Usage
//!
//! ```rust,ignore
//! use amqp_cbs::management::AmqpManagement;
//!
//! let mut management = AmqpManagement::create(&mut session, "$management")?;
//! management.open_async(|result| println!("open: {result:?}"), || eprintln!("error"))?;
//!
//! // ... the I/O pump reports both links open ...
//!
//! management.execute_operation_async("READ", "com.example:queue", None, None, |outcome| {
//!     println!("{:?} {}", outcome.result, outcome.status_code);
//! })?;
//! ```

mod client;
mod pending;
mod reply;
mod state;

pub use client::{AmqpManagement, OnError, OnOpenComplete};
pub use pending::{ExecuteResult, OnExecuteComplete, OperationOutcome};
pub use reply::{classify_status, parse_reply, ParsedReply, ReplyError};
pub use state::{transition, LinkPair, LinkSide, ManagementState, Notification, OpenResult, Transition};

/// Application property naming the operation
pub const OPERATION_KEY: &str = "operation";

/// Application property naming the entity type
pub const TYPE_KEY: &str = "type";

/// Application property listing accepted locales
pub const LOCALES_KEY: &str = "locales";

/// Default application property name of the reply status code
pub const DEFAULT_STATUS_CODE_KEY_NAME: &str = "statusCode";

/// Default application property name of the reply status description
pub const DEFAULT_STATUS_DESCRIPTION_KEY_NAME: &str = "statusDescription";

/// Suffix of the sender link name
pub const SENDER_SUFFIX: &str = "-sender";

/// Suffix of the receiver link name
pub const RECEIVER_SUFFIX: &str = "-receiver";
