//! # AMQP CBS Core - Management Correlation and Claims-Based Security
//!
//! Client-side AMQP 1.0 management request/response correlation, and the
//! Claims-Based Security token client built on top of it.
//!
//! ## Features
//!
//! - **Request/response correlation**: `ulong` message ids matched against
//!   reply correlation ids, replies accepted in any order
//! - **Composite link state**: one lifecycle derived from a sender and a
//!   receiver link
//! - **Exactly-once completion**: every accepted operation completes once,
//!   with a reply, a send failure, or instance close
//! - **CBS tokens**: `put-token` / `delete-token` against the `$cbs` node
//!
//! ## Architecture
//!
//! ```text
//!  application
//!      │ put_token_async / delete_token_async
//!      v
//!   [Cbs] ──────────────> [AmqpManagement] ──────> Session (links, sender, receiver)
//!      ^    queued events        ^                       │
//!      │                         │  on_*_state_changed   │
//!      └─────────────────────────┴── on_message_received ┘
//!                                    on_send_complete
//!                                  (driven by the I/O pump)
//! ```
//!
//! Framing, link attach and settlement belong to the AMQP stack behind the
//! [`amqp::Session`] trait. The pump that owns that stack reports link state
//! changes, received messages and send completions to the instance; the
//! instance answers each received message with a [`amqp::DeliveryOutcome`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use amqp_cbs::{Cbs, CbsOperationResult};
//!
//! let mut cbs = Cbs::create(&mut session)?;
//! cbs.open_async(|result| println!("CBS open: {result:?}"), || eprintln!("CBS error"))?;
//!
//! // ... the pump reports both $cbs links open ...
//!
//! cbs.put_token_async("jwt", "sb://example/queue", &token, |outcome| {
//!     if outcome.result == CbsOperationResult::Ok {
//!         println!("token accepted ({})", outcome.status_code);
//!     }
//! })?;
//! ```
//!
//! ## Modules
//!
//! - [`amqp`]: AMQP value/message model and the session trait seam
//! - [`management`]: Management request/response correlator
//! - [`cbs`]: Claims-Based Security token client
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod amqp;
pub mod cbs;
pub mod config;
pub mod error;
pub mod management;

// Re-exports for convenience
pub use amqp::{AmqpValue, DeliveryOutcome, EndpointState, Message, MessageId, SendResult, Session};
pub use cbs::{Cbs, CbsOpenResult, CbsOperationResult, CbsOutcome, CbsState};
pub use config::{CbsConfig, Config, ManagementConfig};
pub use error::{AmqpCbsError, Result};
pub use management::{AmqpManagement, ExecuteResult, ManagementState, OpenResult, OperationOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
