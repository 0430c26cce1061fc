//! CBS client over an AMQP management instance.
//!
//! The management instance reports back through closures. Those closures
//! only enqueue events; the CBS instance drains the queue after each call
//! into the management instance, so reacting to an event (for example
//! closing the management instance after a failed open) never re-enters it.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use super::{
    CbsOpenResult, CbsOperationResult, CbsOutcome, CbsState, CBS_NODE, CBS_STATUS_CODE_KEY_NAME,
    CBS_STATUS_DESCRIPTION_KEY_NAME, DELETE_TOKEN_OPERATION, NAME_KEY, PUT_TOKEN_OPERATION,
};
use crate::amqp::{AmqpValue, DeliveryOutcome, EndpointState, Message, SendResult, Session};
use crate::config::CbsConfig;
use crate::error::{AmqpCbsError, Result};
use crate::management::{AmqpManagement, ExecuteResult, OpenResult, OperationOutcome};

/// Callback fired once per `open_async`
pub type OnCbsOpenComplete = Box<dyn FnOnce(CbsOpenResult)>;

/// Callback fired when the CBS links fail after opening
pub type OnCbsError = Box<dyn FnMut()>;

/// Callback fired once per token operation
pub type OnCbsOperationComplete = Box<dyn FnOnce(CbsOutcome)>;

/// Something the management instance reported
#[derive(Debug)]
enum ManagementEvent {
    OpenComplete(OpenResult),
    Error,
    OperationComplete {
        operation_id: u64,
        outcome: OperationOutcome,
    },
}

type EventQueue = Rc<RefCell<VecDeque<ManagementEvent>>>;

/// A token operation awaiting its management completion
struct CbsOperation {
    operation: &'static str,
    on_complete: OnCbsOperationComplete,
}

/// CBS client bound to the `$cbs` node of one session
pub struct Cbs<S: Session> {
    management: AmqpManagement<S>,
    state: CbsState,
    events: EventQueue,
    /// Token operations keyed by a CBS-local id
    operations: HashMap<u64, CbsOperation>,
    next_operation_id: u64,
    on_open_complete: Option<OnCbsOpenComplete>,
    on_error: Option<OnCbsError>,
}

impl<S: Session> Cbs<S> {
    /// Create a CBS client on `session`.
    pub fn create(session: &mut S) -> Result<Self> {
        let mut management = AmqpManagement::create(session, CBS_NODE)
            .inspect_err(|e| error!("Cannot create AMQP management instance for CBS: {e}"))?;
        management.set_override_status_code_key_name(CBS_STATUS_CODE_KEY_NAME)?;
        management.set_override_status_description_key_name(CBS_STATUS_DESCRIPTION_KEY_NAME)?;

        Ok(Self {
            management,
            state: CbsState::Closed,
            events: Rc::new(RefCell::new(VecDeque::new())),
            operations: HashMap::new(),
            next_operation_id: 0,
            on_open_complete: None,
            on_error: None,
        })
    }

    /// Create a CBS client from configuration
    pub fn from_config(session: &mut S, config: &CbsConfig) -> Result<Self> {
        let mut cbs = Self::create(session)?;
        cbs.set_trace(config.trace);
        Ok(cbs)
    }

    /// Current lifecycle state
    pub fn state(&self) -> CbsState {
        self.state
    }

    /// Underlying management instance
    pub fn management(&self) -> &AmqpManagement<S> {
        &self.management
    }

    /// Number of token operations awaiting completion
    pub fn pending_operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Start opening the `$cbs` link pair.
    pub fn open_async(
        &mut self,
        on_open_complete: impl FnOnce(CbsOpenResult) + 'static,
        on_error: impl FnMut() + 'static,
    ) -> Result<()> {
        if self.state != CbsState::Closed {
            error!("CBS instance already open");
            return Err(AmqpCbsError::InvalidState(format!(
                "Cannot open CBS instance in state {:?}",
                self.state
            )));
        }

        let open_events = Rc::clone(&self.events);
        let error_events = Rc::clone(&self.events);
        self.management
            .open_async(
                move |result| {
                    open_events
                        .borrow_mut()
                        .push_back(ManagementEvent::OpenComplete(result))
                },
                move || error_events.borrow_mut().push_back(ManagementEvent::Error),
            )
            .inspect_err(|e| error!("Failed opening AMQP management instance: {e}"))?;

        self.on_open_complete = Some(Box::new(on_open_complete));
        self.on_error = Some(Box::new(on_error));
        self.state = CbsState::Opening;
        self.process_events();
        Ok(())
    }

    /// Close the `$cbs` link pair.
    ///
    /// Pending token operations complete with
    /// [`CbsOperationResult::InstanceClosed`]; an open in progress completes
    /// with [`CbsOpenResult::Cancelled`].
    ///
    /// If the links refuse to close while opening, the cancelled open still
    /// moves the instance to [`CbsState::Closed`] and this returns the error.
    /// The management instance is left closing and a later `open_async` fails.
    pub fn close(&mut self) -> Result<()> {
        if self.state == CbsState::Closed {
            error!("CBS instance not open");
            return Err(AmqpCbsError::InvalidState(
                "Cannot close CBS instance that is not open".to_string(),
            ));
        }

        let closed = self.management.close();
        self.process_events();
        if let Err(e) = closed {
            error!("Failed closing AMQP management instance: {e}");
            return Err(e);
        }

        self.state = CbsState::Closed;
        self.on_open_complete = None;
        self.on_error = None;
        info!("CBS instance closed");
        Ok(())
    }

    /// Install `token` for `audience`.
    ///
    /// The request body is the token as an AMQP string. `on_complete` fires
    /// exactly once unless this call returns an error.
    pub fn put_token_async(
        &mut self,
        type_: &str,
        audience: &str,
        token: &str,
        on_complete: impl FnOnce(CbsOutcome) + 'static,
    ) -> Result<()> {
        let mut message = Message::with_body_value(AmqpValue::string(token));
        self.token_request(PUT_TOKEN_OPERATION, type_, audience, &mut message, on_complete)
    }

    /// Remove the token for `audience`.
    pub fn delete_token_async(
        &mut self,
        type_: &str,
        audience: &str,
        on_complete: impl FnOnce(CbsOutcome) + 'static,
    ) -> Result<()> {
        let mut message = Message::new();
        self.token_request(DELETE_TOKEN_OPERATION, type_, audience, &mut message, on_complete)
    }

    fn token_request(
        &mut self,
        operation: &'static str,
        type_: &str,
        audience: &str,
        message: &mut Message,
        on_complete: impl FnOnce(CbsOutcome) + 'static,
    ) -> Result<()> {
        if type_.is_empty() || audience.is_empty() {
            return Err(AmqpCbsError::InvalidArgument(
                "token type and audience must not be empty".to_string(),
            ));
        }

        if matches!(self.state, CbsState::Closed | CbsState::Error) {
            error!("{operation} called in state {:?}", self.state);
            return Err(AmqpCbsError::InvalidState(format!(
                "Cannot execute {operation} in state {:?}",
                self.state
            )));
        }

        if !message.set_application_property(NAME_KEY, AmqpValue::string(audience)) {
            error!("Could not set audience on the {operation} request");
            return Err(AmqpCbsError::InvalidArgument(
                "request application properties must be a map".to_string(),
            ));
        }

        let operation_id = self.next_operation_id;
        self.next_operation_id += 1;
        self.operations.insert(
            operation_id,
            CbsOperation {
                operation,
                on_complete: Box::new(on_complete),
            },
        );

        let events = Rc::clone(&self.events);
        let submitted = self.management.execute_operation_async(
            operation,
            type_,
            None,
            Some(message),
            move |outcome| {
                events.borrow_mut().push_back(ManagementEvent::OperationComplete {
                    operation_id,
                    outcome,
                })
            },
        );

        match submitted {
            Ok(message_id) => {
                debug!(operation, audience, message_id, "CBS request sent");
                Ok(())
            },
            Err(e) => {
                error!("Failed starting AMQP management operation {operation}: {e}");
                self.operations.remove(&operation_id);
                Err(e)
            },
        }
    }

    /// Forward a message sender state change
    pub fn on_sender_state_changed(&mut self, new: EndpointState, previous: EndpointState) {
        self.management.on_sender_state_changed(new, previous);
        self.process_events();
    }

    /// Forward a message receiver state change
    pub fn on_receiver_state_changed(&mut self, new: EndpointState, previous: EndpointState) {
        self.management.on_receiver_state_changed(new, previous);
        self.process_events();
    }

    /// Forward a received message and return its disposition
    pub fn on_message_received(&mut self, message: Message) -> DeliveryOutcome {
        let outcome = self.management.on_message_received(message);
        self.process_events();
        outcome
    }

    /// Forward a send completion
    pub fn on_send_complete(&mut self, message_id: u64, result: SendResult) {
        self.management.on_send_complete(message_id, result);
        self.process_events();
    }

    /// Turn frame tracing on or off for the `$cbs` links
    pub fn set_trace(&mut self, trace_on: bool) {
        self.management.set_trace(trace_on);
    }

    fn process_events(&mut self) {
        loop {
            let next = self.events.borrow_mut().pop_front();
            match next {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    fn handle_event(&mut self, event: ManagementEvent) {
        match event {
            ManagementEvent::OpenComplete(result) => self.on_management_open_complete(result),
            ManagementEvent::Error => self.on_management_error(),
            ManagementEvent::OperationComplete {
                operation_id,
                outcome,
            } => self.on_operation_complete(operation_id, outcome),
        }
    }

    fn on_management_open_complete(&mut self, result: OpenResult) {
        match self.state {
            CbsState::Opening => match result {
                OpenResult::Ok => {
                    self.state = CbsState::Open;
                    info!("CBS instance open");
                    self.fire_open_complete(CbsOpenResult::Ok);
                },
                OpenResult::Error => {
                    self.state = CbsState::Closed;
                    self.close_management();
                    self.fire_open_complete(CbsOpenResult::Error);
                },
                OpenResult::Cancelled => {
                    self.state = CbsState::Closed;
                    self.close_management();
                    self.fire_open_complete(CbsOpenResult::Cancelled);
                },
            },
            CbsState::Open => {
                error!("Unexpected AMQP management open complete in OPEN");
                self.state = CbsState::Error;
                self.fire_error();
            },
            CbsState::Closed | CbsState::Error => {
                warn!(?result, state = ?self.state, "Unexpected AMQP management open complete");
            },
        }
    }

    fn on_management_error(&mut self) {
        match self.state {
            CbsState::Opening => {
                self.state = CbsState::Closed;
                self.close_management();
                self.fire_open_complete(CbsOpenResult::Error);
            },
            CbsState::Open => {
                error!("AMQP management error while CBS open");
                self.state = CbsState::Error;
                self.fire_error();
            },
            CbsState::Closed => warn!("Unexpected AMQP management error in CLOSED state"),
            CbsState::Error => debug!("AMQP management error while CBS already in error"),
        }
    }

    fn on_operation_complete(&mut self, operation_id: u64, outcome: OperationOutcome) {
        let Some(operation) = self.operations.remove(&operation_id) else {
            warn!(operation_id, "Completion for unknown CBS operation");
            return;
        };

        let result = CbsOperationResult::from(outcome.result);
        debug!(
            operation = operation.operation,
            ?result,
            status_code = outcome.status_code,
            "CBS operation complete"
        );
        (operation.on_complete)(CbsOutcome {
            result,
            status_code: outcome.status_code,
            status_description: outcome.status_description,
        });
    }

    fn close_management(&mut self) {
        if let Err(e) = self.management.close() {
            debug!("AMQP management close after failed open: {e}");
        }
    }

    fn fire_open_complete(&mut self, result: CbsOpenResult) {
        if let Some(on_open_complete) = self.on_open_complete.take() {
            on_open_complete(result);
        }
    }

    fn fire_error(&mut self) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error();
        }
    }
}

impl<S: Session> Drop for Cbs<S> {
    fn drop(&mut self) {
        if self.state != CbsState::Closed {
            if let Err(e) = self.close() {
                warn!("Failed closing CBS instance on drop: {e}");
            }
        }
        self.process_events();
        for (_, operation) in self.operations.drain() {
            (operation.on_complete)(CbsOutcome {
                result: CbsOperationResult::from(ExecuteResult::InstanceClosed),
                status_code: 0,
                status_description: None,
            });
        }
    }
}
