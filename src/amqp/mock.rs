//! In-memory AMQP session for tests and local demos.
//!
//! `MockSession` records every link it creates and every message handed to
//! its senders. Clones share the same record, so a test keeps one clone for
//! inspection and gives the other to the client under test.
//!
//! Link state changes, replies and send completions are not generated
//! automatically: the test plays the I/O pump and calls the client's event
//! methods itself.
//!
//! ```rust,ignore
//! use amqp_cbs::amqp::mock::{MockFailure, MockSession};
//! use amqp_cbs::management::AmqpManagement;
//!
//! let session = MockSession::new();
//! session.inject(MockFailure::CreateReceiverLink);
//! assert!(AmqpManagement::create(&mut session.clone(), "$management").is_err());
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::{LinkRole, LinkSpec, Message, MessageReceiver, MessageSender, Session};
use crate::error::{AmqpCbsError, Result};

/// Failures that can be injected into a [`MockSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    /// Creating the sender link fails
    CreateSenderLink,
    /// Creating the receiver link fails
    CreateReceiverLink,
    /// Creating the message sender fails
    CreateMessageSender,
    /// Creating the message receiver fails
    CreateMessageReceiver,
    /// Opening the message sender fails
    OpenSender,
    /// Opening the message receiver fails
    OpenReceiver,
    /// Closing the message sender fails
    CloseSender,
    /// Closing the message receiver fails
    CloseReceiver,
    /// Handing a message to the sender fails
    Send,
}

/// Calls observed on one endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointCalls {
    /// Successful `open` calls
    pub opens: usize,
    /// Successful `close` calls
    pub closes: usize,
    /// Last trace setting
    pub trace: bool,
}

#[derive(Debug, Default)]
struct MockState {
    links: Vec<LinkSpec>,
    sent: Vec<Message>,
    failures: HashSet<MockFailure>,
    sender: EndpointCalls,
    receiver: EndpointCalls,
    live_senders: usize,
    live_receivers: usize,
}

impl MockState {
    fn check(&self, failure: MockFailure) -> Result<()> {
        if self.failures.contains(&failure) {
            Err(AmqpCbsError::Link(format!("injected failure: {failure:?}")))
        } else {
            Ok(())
        }
    }
}

/// In-memory session shared between a client and its test
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Rc<RefCell<MockState>>,
}

impl MockSession {
    /// Create a new mock session
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent matching call fail until cleared
    pub fn inject(&self, failure: MockFailure) {
        self.state.borrow_mut().failures.insert(failure);
    }

    /// Remove an injected failure
    pub fn clear(&self, failure: MockFailure) {
        self.state.borrow_mut().failures.remove(&failure);
    }

    /// Links created so far, in creation order
    pub fn links(&self) -> Vec<LinkSpec> {
        self.state.borrow().links.clone()
    }

    /// Messages handed to senders, in send order
    pub fn sent_messages(&self) -> Vec<Message> {
        self.state.borrow().sent.clone()
    }

    /// Most recently sent message
    pub fn last_sent(&self) -> Option<Message> {
        self.state.borrow().sent.last().cloned()
    }

    /// Calls observed on message senders
    pub fn sender_calls(&self) -> EndpointCalls {
        self.state.borrow().sender
    }

    /// Calls observed on message receivers
    pub fn receiver_calls(&self) -> EndpointCalls {
        self.state.borrow().receiver
    }

    /// Number of message senders and receivers not yet dropped
    pub fn live_endpoints(&self) -> (usize, usize) {
        let state = self.state.borrow();
        (state.live_senders, state.live_receivers)
    }
}

/// Link created by a [`MockSession`]
#[derive(Debug)]
pub struct MockLink {
    spec: LinkSpec,
}

impl MockLink {
    /// Link parameters
    pub fn spec(&self) -> &LinkSpec {
        &self.spec
    }
}

/// Message sender created by a [`MockSession`]
#[derive(Debug)]
pub struct MockSender {
    link: MockLink,
    state: Rc<RefCell<MockState>>,
}

impl MockSender {
    /// Link this sender is bound to
    pub fn link(&self) -> &MockLink {
        &self.link
    }
}

impl MessageSender for MockSender {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(MockFailure::OpenSender)?;
        state.sender.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(MockFailure::CloseSender)?;
        state.sender.closes += 1;
        Ok(())
    }

    fn send(&mut self, message: Message) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failures.contains(&MockFailure::Send) {
            return Err(AmqpCbsError::Send("injected failure: Send".to_string()));
        }
        state.sent.push(message);
        Ok(())
    }

    fn set_trace(&mut self, trace_on: bool) {
        self.state.borrow_mut().sender.trace = trace_on;
    }
}

impl Drop for MockSender {
    fn drop(&mut self) {
        self.state.borrow_mut().live_senders -= 1;
    }
}

/// Message receiver created by a [`MockSession`]
#[derive(Debug)]
pub struct MockReceiver {
    link: MockLink,
    state: Rc<RefCell<MockState>>,
}

impl MockReceiver {
    /// Link this receiver is bound to
    pub fn link(&self) -> &MockLink {
        &self.link
    }
}

impl MessageReceiver for MockReceiver {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(MockFailure::OpenReceiver)?;
        state.receiver.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(MockFailure::CloseReceiver)?;
        state.receiver.closes += 1;
        Ok(())
    }

    fn set_trace(&mut self, trace_on: bool) {
        self.state.borrow_mut().receiver.trace = trace_on;
    }
}

impl Drop for MockReceiver {
    fn drop(&mut self) {
        self.state.borrow_mut().live_receivers -= 1;
    }
}

impl Session for MockSession {
    type Link = MockLink;
    type Sender = MockSender;
    type Receiver = MockReceiver;

    fn create_link(&mut self, spec: &LinkSpec) -> Result<MockLink> {
        let mut state = self.state.borrow_mut();
        state.check(match spec.role {
            LinkRole::Sender => MockFailure::CreateSenderLink,
            LinkRole::Receiver => MockFailure::CreateReceiverLink,
        })?;
        state.links.push(spec.clone());
        Ok(MockLink { spec: spec.clone() })
    }

    fn create_message_sender(&mut self, link: MockLink) -> Result<MockSender> {
        let mut state = self.state.borrow_mut();
        state.check(MockFailure::CreateMessageSender)?;
        state.live_senders += 1;
        Ok(MockSender {
            link,
            state: Rc::clone(&self.state),
        })
    }

    fn create_message_receiver(&mut self, link: MockLink) -> Result<MockReceiver> {
        let mut state = self.state.borrow_mut();
        state.check(MockFailure::CreateMessageReceiver)?;
        state.live_receivers += 1;
        Ok(MockReceiver {
            link,
            state: Rc::clone(&self.state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, role: LinkRole) -> LinkSpec {
        LinkSpec {
            name: name.to_string(),
            role,
            source: "$management".to_string(),
            target: "$management".to_string(),
        }
    }

    #[test]
    fn test_clones_share_records() {
        let observer = MockSession::new();
        let mut session = observer.clone();

        let link = session.create_link(&spec("a-sender", LinkRole::Sender)).unwrap();
        let mut sender = session.create_message_sender(link).unwrap();
        sender.send(Message::new()).unwrap();

        assert_eq!(observer.links().len(), 1);
        assert_eq!(observer.sent_messages().len(), 1);
        assert_eq!(observer.live_endpoints(), (1, 0));

        drop(sender);
        assert_eq!(observer.live_endpoints(), (0, 0));
    }

    #[test]
    fn test_injected_failure_until_cleared() {
        let mut session = MockSession::new();
        session.inject(MockFailure::CreateReceiverLink);

        assert!(session.create_link(&spec("a-receiver", LinkRole::Receiver)).is_err());
        assert!(session.create_link(&spec("a-sender", LinkRole::Sender)).is_ok());

        session.clear(MockFailure::CreateReceiverLink);
        assert!(session.create_link(&spec("a-receiver", LinkRole::Receiver)).is_ok());
    }

    #[test]
    fn test_endpoint_calls_recorded() {
        let mut session = MockSession::new();
        let link = session.create_link(&spec("a-receiver", LinkRole::Receiver)).unwrap();
        let mut receiver = session.create_message_receiver(link).unwrap();

        receiver.open().unwrap();
        receiver.set_trace(true);
        session.inject(MockFailure::CloseReceiver);
        assert!(receiver.close().is_err());

        let calls = session.receiver_calls();
        assert_eq!(calls.opens, 1);
        assert_eq!(calls.closes, 0);
        assert!(calls.trace);
        assert_eq!(receiver.link().spec().name, "a-receiver");
    }
}
