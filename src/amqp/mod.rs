//! AMQP primitives consumed by the management layer.
//!
//! The management client does not implement AMQP framing, sessions or links.
//! It talks to them through the traits in this module, which mirror what an
//! AMQP stack offers to a request/response client:
//!
//! ```text
//!   AmqpManagement
//!     │ open / close / send              ^ on_*_state_changed
//!     v                                  │ on_message_received
//!   MessageSender   MessageReceiver      │ on_send_complete
//!   (<node>-sender) (<node>-receiver)    │
//!     └──────── Session ─────────────────┘
//! ```
//!
//! Events flow upward through plain method calls made by whoever drives the
//! connection I/O. Nothing here spawns threads or blocks.

mod message;
pub mod mock;
mod value;

pub use message::{
    DeliveryOutcome, Message, MessageBody, MessageId, Properties, INTERNAL_ERROR_CONDITION,
};
pub use value::AmqpValue;

use crate::error::Result;

/// Link role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Sends messages to the node
    Sender,
    /// Receives messages from the node
    Receiver,
}

/// Parameters for creating a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    /// Link name, unique within the session
    pub name: String,
    /// Link role
    pub role: LinkRole,
    /// Source address
    pub source: String,
    /// Target address
    pub target: String,
}

/// State of a message sender or message receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Not attached
    Idle,
    /// Attach in progress
    Opening,
    /// Attached
    Open,
    /// Detach in progress
    Closing,
    /// Failed
    Error,
}

/// Result of a message send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Message settled by the peer
    Ok,
    /// Delivery failed
    Error,
    /// Delivery timed out
    Timeout,
    /// Delivery cancelled (e.g. link closed)
    Cancelled,
}

/// Sending half of a link pair
pub trait MessageSender {
    /// Start attaching the link. Completion is reported as a state change.
    fn open(&mut self) -> Result<()>;

    /// Start detaching the link
    fn close(&mut self) -> Result<()>;

    /// Hand a message to the link.
    ///
    /// Completion is reported later through the send-complete event, keyed by
    /// the message id carried in the message properties.
    fn send(&mut self, message: Message) -> Result<()>;

    /// Enable or disable frame tracing
    fn set_trace(&mut self, trace_on: bool);
}

/// Receiving half of a link pair
pub trait MessageReceiver {
    /// Start attaching the link and accepting messages
    fn open(&mut self) -> Result<()>;

    /// Start detaching the link
    fn close(&mut self) -> Result<()>;

    /// Enable or disable frame tracing
    fn set_trace(&mut self, trace_on: bool);
}

/// AMQP session capable of creating the management link pair
pub trait Session {
    /// Link handle
    type Link;
    /// Message sender bound to a link
    type Sender: MessageSender;
    /// Message receiver bound to a link
    type Receiver: MessageReceiver;

    /// Create a link on this session
    fn create_link(&mut self, spec: &LinkSpec) -> Result<Self::Link>;

    /// Create a message sender that owns `link`
    fn create_message_sender(&mut self, link: Self::Link) -> Result<Self::Sender>;

    /// Create a message receiver that owns `link`
    fn create_message_receiver(&mut self, link: Self::Link) -> Result<Self::Receiver>;
}
