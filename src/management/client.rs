//! AMQP management client.
//!
//! Owns the sender/receiver link pair for one management node, stamps each
//! request with a fresh `ulong` message id and completes the matching pending
//! operation when a reply with that correlation id arrives.

use tracing::{debug, error, info, trace, warn};

use super::pending::{ExecuteResult, OnExecuteComplete, OperationOutcome, PendingOperations};
use super::reply::{parse_reply, ReplyError};
use super::state::{transition, LinkPair, LinkSide, ManagementState, Notification, OpenResult};
use super::{
    DEFAULT_STATUS_CODE_KEY_NAME, DEFAULT_STATUS_DESCRIPTION_KEY_NAME, LOCALES_KEY, OPERATION_KEY,
    RECEIVER_SUFFIX, SENDER_SUFFIX, TYPE_KEY,
};
use crate::amqp::{
    DeliveryOutcome, EndpointState, LinkRole, LinkSpec, Message, MessageId, MessageReceiver,
    MessageSender, SendResult, Session,
};
use crate::config::ManagementConfig;
use crate::error::{AmqpCbsError, Result};

/// Callback fired once per `open_async` with the open result
pub type OnOpenComplete = Box<dyn FnOnce(OpenResult)>;

/// Callback fired on every instance-level error
pub type OnError = Box<dyn FnMut()>;

/// Request/response client for one AMQP management node
pub struct AmqpManagement<S: Session> {
    /// Management node address
    node: String,
    /// Sender on `<node>-sender`
    sender: S::Sender,
    /// Receiver on `<node>-receiver`
    receiver: S::Receiver,
    /// Composite lifecycle state
    state: ManagementState,
    /// Sides that reported open during the current open attempt
    links: LinkPair,
    /// Requests awaiting a reply
    pending: PendingOperations,
    /// Id for the next request
    next_message_id: u64,
    on_open_complete: Option<OnOpenComplete>,
    on_error: Option<OnError>,
    /// Application property holding the reply status code
    status_code_key_name: String,
    /// Application property holding the reply status description
    status_description_key_name: String,
}

impl<S: Session> AmqpManagement<S> {
    /// Create the link pair for `management_node` on `session`.
    ///
    /// Nothing is attached until [`open_async`](Self::open_async). On failure
    /// every link and endpoint created so far is released.
    pub fn create(session: &mut S, management_node: &str) -> Result<Self> {
        if management_node.is_empty() {
            error!("Empty string management node");
            return Err(AmqpCbsError::InvalidArgument(
                "management node must not be empty".to_string(),
            ));
        }

        let sender_spec = link_spec(management_node, SENDER_SUFFIX, LinkRole::Sender);
        let receiver_spec = link_spec(management_node, RECEIVER_SUFFIX, LinkRole::Receiver);

        let sender_link = session
            .create_link(&sender_spec)
            .inspect_err(|e| error!("Failed creating sender link: {e}"))?;
        let receiver_link = session
            .create_link(&receiver_spec)
            .inspect_err(|e| error!("Failed creating receiver link: {e}"))?;
        let sender = session
            .create_message_sender(sender_link)
            .inspect_err(|e| error!("Failed creating message sender: {e}"))?;
        let receiver = session
            .create_message_receiver(receiver_link)
            .inspect_err(|e| error!("Failed creating message receiver: {e}"))?;

        debug!(
            node = management_node,
            "Created management links {} / {}", sender_spec.name, receiver_spec.name
        );

        Ok(Self {
            node: management_node.to_string(),
            sender,
            receiver,
            state: ManagementState::Idle,
            links: LinkPair::default(),
            pending: PendingOperations::new(),
            next_message_id: 0,
            on_open_complete: None,
            on_error: None,
            status_code_key_name: DEFAULT_STATUS_CODE_KEY_NAME.to_string(),
            status_description_key_name: DEFAULT_STATUS_DESCRIPTION_KEY_NAME.to_string(),
        })
    }

    /// Create an instance from configuration
    pub fn from_config(session: &mut S, config: &ManagementConfig) -> Result<Self> {
        let mut management = Self::create(session, &config.node)?;
        management.set_override_status_code_key_name(&config.status_code_key_name)?;
        management.set_override_status_description_key_name(&config.status_description_key_name)?;
        management.set_trace(config.trace);
        Ok(management)
    }

    /// Management node address
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Current lifecycle state
    pub fn state(&self) -> ManagementState {
        self.state
    }

    /// Number of requests awaiting a reply
    pub fn pending_operation_count(&self) -> usize {
        self.pending.len()
    }

    /// Message id the next request will carry
    pub fn next_message_id(&self) -> u64 {
        self.next_message_id
    }

    /// Application property name read for the status code
    pub fn status_code_key_name(&self) -> &str {
        &self.status_code_key_name
    }

    /// Application property name read for the status description
    pub fn status_description_key_name(&self) -> &str {
        &self.status_description_key_name
    }

    /// Start attaching both links.
    ///
    /// `on_open_complete` fires exactly once: with `Ok` after both links
    /// report open, with `Error` if either fails first, or with `Cancelled`
    /// if [`close`](Self::close) is called before that.
    pub fn open_async(
        &mut self,
        on_open_complete: impl FnOnce(OpenResult) + 'static,
        on_error: impl FnMut() + 'static,
    ) -> Result<()> {
        if self.state != ManagementState::Idle {
            error!("AMQP management instance already OPEN");
            return Err(AmqpCbsError::InvalidState(format!(
                "Cannot open management instance in state {:?}",
                self.state
            )));
        }

        self.on_open_complete = Some(Box::new(on_open_complete));
        self.on_error = Some(Box::new(on_error));
        self.links.reset();
        self.state = ManagementState::Opening;

        if let Err(e) = self.receiver.open() {
            error!("Failed opening message receiver: {e}");
            self.abort_open();
            return Err(e);
        }

        if let Err(e) = self.sender.open() {
            error!("Failed opening message sender: {e}");
            self.abort_open();
            if let Err(close_err) = self.receiver.close() {
                warn!("Failed closing message receiver after open failure: {close_err}");
            }
            return Err(e);
        }

        debug!(node = %self.node, "Opening management links");
        Ok(())
    }

    fn abort_open(&mut self) {
        self.state = ManagementState::Idle;
        self.on_open_complete = None;
        self.on_error = None;
    }

    /// Detach both links and complete every pending operation with
    /// [`ExecuteResult::InstanceClosed`].
    ///
    /// If a link refuses to close the instance stays `Closing` and pending
    /// operations are kept; calling `close` again retries.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ManagementState::Idle {
            error!("AMQP management instance not open");
            return Err(AmqpCbsError::InvalidState(
                "Cannot close management instance that is not open".to_string(),
            ));
        }

        let previous = self.state;
        self.state = ManagementState::Closing;

        if previous == ManagementState::Opening {
            if let Some(on_open_complete) = self.on_open_complete.take() {
                on_open_complete(OpenResult::Cancelled);
            }
        }

        self.sender
            .close()
            .inspect_err(|e| error!("Failed closing message sender: {e}"))?;
        self.receiver
            .close()
            .inspect_err(|e| error!("Failed closing message receiver: {e}"))?;

        let pending = self.pending.drain();
        if !pending.is_empty() {
            debug!(count = pending.len(), "Completing pending operations on close");
        }
        for operation in pending {
            trace!(message_id = operation.message_id(), "Operation cancelled by close");
            operation.complete(OperationOutcome::without_reply(ExecuteResult::InstanceClosed));
        }

        self.state = ManagementState::Idle;
        self.on_open_complete = None;
        self.on_error = None;
        info!(node = %self.node, "Management instance closed");
        Ok(())
    }

    /// Send a management request.
    ///
    /// The request is a copy of `message` (or an empty message) with the
    /// `operation`, `type` and optional `locales` application properties and
    /// a fresh `ulong` message id. Returns the message id. `on_complete`
    /// fires exactly once unless this call returns an error.
    pub fn execute_operation_async(
        &mut self,
        operation: &str,
        type_: &str,
        locales: Option<&str>,
        message: Option<&Message>,
        on_complete: impl FnOnce(OperationOutcome) + 'static,
    ) -> Result<u64> {
        if operation.is_empty() || type_.is_empty() {
            return Err(AmqpCbsError::InvalidArgument(
                "operation and type must not be empty".to_string(),
            ));
        }

        if self.state != ManagementState::Open {
            error!("execute_operation_async called while not open or in error");
            return Err(AmqpCbsError::InvalidState(format!(
                "Cannot execute operation in state {:?}",
                self.state
            )));
        }

        let mut request = message.cloned().unwrap_or_default();

        let merged = request.set_application_property(OPERATION_KEY, operation.into())
            && request.set_application_property(TYPE_KEY, type_.into())
            && locales.map_or(true, |locales| {
                request.set_application_property(LOCALES_KEY, locales.into())
            });
        if !merged {
            error!("Could not set application properties on the request message");
            return Err(AmqpCbsError::InvalidArgument(
                "request application properties must be a map".to_string(),
            ));
        }

        let message_id = self.next_message_id;
        self.next_message_id += 1;
        request.set_message_id(MessageId::Ulong(message_id));

        let on_complete: OnExecuteComplete = Box::new(on_complete);
        if !self.pending.insert(message_id, on_complete) {
            error!(message_id, "Message id already pending");
            return Err(AmqpCbsError::InvalidState(format!(
                "message id {message_id} is already pending"
            )));
        }

        if let Err(e) = self.sender.send(request) {
            error!("Could not send request message: {e}");
            // The caller sees the error; the callback must not fire as well
            drop(self.pending.take(message_id));
            return Err(e);
        }

        debug!(message_id, operation, type_, "Sent management request");
        Ok(message_id)
    }

    /// Handle the send completion of the request stamped with `message_id`.
    ///
    /// A failed send completes that operation with [`ExecuteResult::Error`];
    /// other operations and the instance state are unaffected.
    pub fn on_send_complete(&mut self, message_id: u64, result: SendResult) {
        if result == SendResult::Ok {
            trace!(message_id, "Management request settled");
            return;
        }

        match self.pending.take(message_id) {
            Some(operation) => {
                warn!(message_id, ?result, "Management request send failed");
                operation.complete(OperationOutcome::without_reply(ExecuteResult::Error));
            },
            None => debug!(message_id, ?result, "Send completion for operation no longer pending"),
        }
    }

    /// Handle a message from the receiver link and return its disposition.
    pub fn on_message_received(&mut self, message: Message) -> DeliveryOutcome {
        if self.state == ManagementState::Idle {
            warn!("Message received while management instance is not open");
            return ReplyError::NotListening.delivery_outcome();
        }

        match self.correlate(message) {
            Ok(()) => DeliveryOutcome::Accepted,
            Err(e) => {
                error!("{e}");
                self.notify_error();
                e.delivery_outcome()
            },
        }
    }

    fn correlate(&mut self, message: Message) -> std::result::Result<(), ReplyError> {
        let reply = parse_reply(
            &message,
            &self.status_code_key_name,
            &self.status_description_key_name,
        )?;

        let operation = self
            .pending
            .take(reply.correlation_id)
            .ok_or(ReplyError::Unmatched(reply.correlation_id))?;

        debug!(
            correlation_id = reply.correlation_id,
            status_code = reply.status_code,
            "Matched management reply"
        );

        operation.complete(OperationOutcome {
            result: reply.result(),
            status_code: reply.status_code,
            status_description: reply.status_description,
            message: Some(message),
        });
        Ok(())
    }

    /// Handle a state change of the message sender
    pub fn on_sender_state_changed(&mut self, new: EndpointState, previous: EndpointState) {
        self.on_link_state_changed(LinkSide::Sender, new, previous);
    }

    /// Handle a state change of the message receiver
    pub fn on_receiver_state_changed(&mut self, new: EndpointState, previous: EndpointState) {
        self.on_link_state_changed(LinkSide::Receiver, new, previous);
    }

    fn on_link_state_changed(&mut self, side: LinkSide, new: EndpointState, previous: EndpointState) {
        let step = transition(self.state, &mut self.links, side, new, previous);

        if step.state != self.state {
            debug!(?side, ?previous, ?new, "Management state {:?} -> {:?}", self.state, step.state);
        }
        self.state = step.state;

        match step.notification {
            Some(Notification::OpenComplete(result)) => {
                match result {
                    OpenResult::Ok => info!(node = %self.node, "Management instance open"),
                    _ => error!(node = %self.node, ?side, ?new, "Management link failed while opening"),
                }
                if let Some(on_open_complete) = self.on_open_complete.take() {
                    on_open_complete(result);
                }
            },
            Some(Notification::Error) => {
                warn!(node = %self.node, ?side, ?previous, ?new, "Unexpected management link state change");
                self.notify_error();
            },
            None => {},
        }
    }

    fn notify_error(&mut self) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error();
        }
    }

    /// Replace the application property name read for the status code
    pub fn set_override_status_code_key_name(&mut self, key_name: &str) -> Result<()> {
        if key_name.is_empty() {
            error!("Empty status code key name");
            return Err(AmqpCbsError::InvalidArgument(
                "status code key name must not be empty".to_string(),
            ));
        }
        self.status_code_key_name = key_name.to_string();
        Ok(())
    }

    /// Replace the application property name read for the status description
    pub fn set_override_status_description_key_name(&mut self, key_name: &str) -> Result<()> {
        if key_name.is_empty() {
            error!("Empty status description key name");
            return Err(AmqpCbsError::InvalidArgument(
                "status description key name must not be empty".to_string(),
            ));
        }
        self.status_description_key_name = key_name.to_string();
        Ok(())
    }

    /// Turn frame tracing on or off for both links
    pub fn set_trace(&mut self, trace_on: bool) {
        self.sender.set_trace(trace_on);
        self.receiver.set_trace(trace_on);
    }
}

impl<S: Session> Drop for AmqpManagement<S> {
    fn drop(&mut self) {
        if self.state != ManagementState::Idle {
            if let Err(e) = self.close() {
                warn!("Failed closing management instance on drop: {e}");
            }
        }
        if !self.pending.is_empty() {
            for operation in self.pending.drain() {
                operation.complete(OperationOutcome::without_reply(ExecuteResult::InstanceClosed));
            }
        }
    }
}

fn link_spec(node: &str, suffix: &str, role: LinkRole) -> LinkSpec {
    LinkSpec {
        name: format!("{node}{suffix}"),
        role,
        source: node.to_string(),
        target: node.to_string(),
    }
}
