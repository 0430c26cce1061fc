//! End-to-end CBS token tests.
//!
//! A simulated `$cbs` node answers each request the client sends; the test
//! plays the I/O pump in between.

use std::cell::RefCell;
use std::rc::Rc;

use amqp_cbs::amqp::mock::MockSession;
use amqp_cbs::{
    AmqpValue, Cbs, CbsConfig, CbsOpenResult, CbsOperationResult, CbsOutcome, CbsState, Config,
    DeliveryOutcome, EndpointState, ManagementState, Message, MessageId, SendResult,
};
use proptest::prelude::*;

fn open_cbs(session: &MockSession) -> (Cbs<MockSession>, Rc<RefCell<Vec<CbsOpenResult>>>) {
    let mut cbs = Cbs::create(&mut session.clone()).unwrap();
    let opens = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&opens);
    cbs.open_async(move |r| sink.borrow_mut().push(r), || {}).unwrap();
    cbs.on_receiver_state_changed(EndpointState::Open, EndpointState::Opening);
    cbs.on_sender_state_changed(EndpointState::Open, EndpointState::Opening);
    (cbs, opens)
}

/// Build the reply a `$cbs` node sends for the last request
fn node_reply(session: &MockSession, status: i32, description: Option<&str>) -> Message {
    let request = session.last_sent().unwrap();
    let mut reply = Message::new();
    reply.set_correlation_id(request.message_id().unwrap().clone());
    reply.set_application_property("status-code", AmqpValue::Int(status));
    if let Some(description) = description {
        reply.set_application_property("status-description", AmqpValue::string(description));
    }
    reply
}

fn collector() -> (Rc<RefCell<Vec<CbsOutcome>>>, impl Fn() -> Box<dyn FnOnce(CbsOutcome)>) {
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let shared = Rc::clone(&outcomes);
    let make = move || -> Box<dyn FnOnce(CbsOutcome)> {
        let sink = Rc::clone(&shared);
        Box::new(move |o| sink.borrow_mut().push(o))
    };
    (outcomes, make)
}

/// Full put-token exchange with an accepting node
#[test]
fn test_put_token_accepted() {
    let session = MockSession::new();
    let (mut cbs, opens) = open_cbs(&session);
    assert_eq!(*opens.borrow(), vec![CbsOpenResult::Ok]);

    let (outcomes, make) = collector();
    cbs.put_token_async("servicebus.windows.net:sastoken", "sb://ns/q", "SharedAccessSignature sr=x", make())
        .unwrap();

    let request = session.last_sent().unwrap();
    assert_eq!(
        request.application_property("operation"),
        Some(&AmqpValue::string("put-token"))
    );
    assert_eq!(
        request.application_property("type"),
        Some(&AmqpValue::string("servicebus.windows.net:sastoken"))
    );
    assert_eq!(request.application_property("name"), Some(&AmqpValue::string("sb://ns/q")));
    assert_eq!(
        request.body_value(),
        Some(&AmqpValue::string("SharedAccessSignature sr=x"))
    );

    let reply = node_reply(&session, 202, None);
    assert_eq!(cbs.on_message_received(reply), DeliveryOutcome::Accepted);

    assert_eq!(
        *outcomes.borrow(),
        vec![CbsOutcome {
            result: CbsOperationResult::Ok,
            status_code: 202,
            status_description: None,
        }]
    );
}

/// Token operations are refused before open and never complete
#[test]
fn test_put_token_while_closed_fails() {
    let session = MockSession::new();
    let mut cbs = Cbs::create(&mut session.clone()).unwrap();
    let (outcomes, make) = collector();

    assert!(cbs.put_token_async("jwt", "urn:x", "t", make()).is_err());
    assert!(cbs.delete_token_async("jwt", "urn:x", make()).is_err());
    drop(cbs);

    assert!(outcomes.borrow().is_empty());
    assert!(session.sent_messages().is_empty());
}

/// Token operations wait for both links to attach
#[test]
fn test_put_token_while_opening_is_refused() {
    let session = MockSession::new();
    let mut cbs = Cbs::create(&mut session.clone()).unwrap();
    cbs.open_async(|_| {}, || {}).unwrap();
    assert_eq!(cbs.state(), CbsState::Opening);

    assert!(cbs.put_token_async("jwt", "urn:x", "t", |_| {}).is_err());
    assert_eq!(cbs.pending_operation_count(), 0);
}

/// A rejecting node maps to operation-failed with its description
#[test]
fn test_delete_token_rejected_by_node() {
    let session = MockSession::new();
    let (mut cbs, _) = open_cbs(&session);
    let (outcomes, make) = collector();

    cbs.delete_token_async("jwt", "urn:x", make()).unwrap();
    let reply = node_reply(&session, 404, Some("audience unknown"));
    cbs.on_message_received(reply);

    let outcomes = outcomes.borrow();
    let outcome = &outcomes[0];
    assert_eq!(outcome.result, CbsOperationResult::OperationFailed);
    assert_eq!(outcome.status_code, 404);
    assert_eq!(outcome.status_description.as_deref(), Some("audience unknown"));
    assert_eq!(cbs.state(), CbsState::Open);
}

/// Closing with pending operations completes them as instance-closed
#[test]
fn test_close_with_pending_operations() {
    let session = MockSession::new();
    let (mut cbs, _) = open_cbs(&session);
    let (outcomes, make) = collector();

    for audience in ["urn:a", "urn:b", "urn:c"] {
        cbs.put_token_async("jwt", audience, "t", make()).unwrap();
    }
    cbs.close().unwrap();

    assert_eq!(cbs.state(), CbsState::Closed);
    assert_eq!(cbs.management().state(), ManagementState::Idle);
    let results: Vec<_> = outcomes.borrow().iter().map(|o| o.result).collect();
    assert_eq!(results, vec![CbsOperationResult::InstanceClosed; 3]);
}

/// Send failures surface as CBS errors
#[test]
fn test_send_failure() {
    let session = MockSession::new();
    let (mut cbs, _) = open_cbs(&session);
    let (outcomes, make) = collector();

    cbs.put_token_async("jwt", "urn:x", "t", make()).unwrap();
    let id = session
        .last_sent()
        .and_then(|m| m.message_id().and_then(MessageId::as_ulong))
        .unwrap();
    cbs.on_send_complete(id, SendResult::Cancelled);

    assert_eq!(outcomes.borrow()[0].result, CbsOperationResult::CbsError);
}

/// Losing a link after open moves to error; close and reopen recover
#[test]
fn test_error_then_recover() {
    let session = MockSession::new();
    let mut cbs = Cbs::create(&mut session.clone()).unwrap();
    let errors = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&errors);
    cbs.open_async(|_| {}, move || *sink.borrow_mut() += 1).unwrap();
    cbs.on_receiver_state_changed(EndpointState::Open, EndpointState::Opening);
    cbs.on_sender_state_changed(EndpointState::Open, EndpointState::Opening);

    cbs.on_sender_state_changed(EndpointState::Error, EndpointState::Open);
    assert_eq!(cbs.state(), CbsState::Error);
    assert_eq!(*errors.borrow(), 1);

    cbs.close().unwrap();
    let opens = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&opens);
    cbs.open_async(move |r| sink.borrow_mut().push(r), || {}).unwrap();
    cbs.on_receiver_state_changed(EndpointState::Open, EndpointState::Opening);
    cbs.on_sender_state_changed(EndpointState::Open, EndpointState::Opening);

    assert_eq!(*opens.borrow(), vec![CbsOpenResult::Ok]);
    assert_eq!(cbs.state(), CbsState::Open);
}

/// Configuration drives trace and token type
#[test]
fn test_from_config_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[cbs]\ntoken_type = \"amqp:swt\"\ntrace = true").unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.cbs.token_type, "amqp:swt");

    let session = MockSession::new();
    let mut cbs = Cbs::from_config(&mut session.clone(), &config.cbs).unwrap();
    cbs.open_async(|_| {}, || {}).unwrap();
    cbs.on_receiver_state_changed(EndpointState::Open, EndpointState::Opening);
    cbs.on_sender_state_changed(EndpointState::Open, EndpointState::Opening);

    cbs.put_token_async(&config.cbs.token_type, "urn:x", "t", |_| {}).unwrap();
    assert_eq!(
        session.last_sent().unwrap().application_property("type"),
        Some(&AmqpValue::string("amqp:swt"))
    );
    assert!(session.sender_calls().trace);
    assert_eq!(CbsConfig::default().token_type, "jwt");
}

proptest! {
    /// Each token operation completes exactly once whether answered or closed
    #[test]
    fn prop_token_operations_complete_once(
        answers in proptest::collection::vec(proptest::option::of(100i32..600), 1..10),
    ) {
        let session = MockSession::new();
        let (mut cbs, _) = open_cbs(&session);
        let (outcomes, make) = collector();

        let mut ids = Vec::new();
        for i in 0..answers.len() {
            cbs.put_token_async("jwt", &format!("urn:{i}"), "t", make()).unwrap();
            ids.push(session.last_sent().unwrap().message_id().cloned().unwrap());
        }

        for (id, answer) in ids.iter().zip(&answers) {
            if let Some(status) = answer {
                let mut reply = Message::new();
                reply.set_correlation_id(id.clone());
                reply.set_application_property("status-code", AmqpValue::Int(*status));
                prop_assert_eq!(cbs.on_message_received(reply), DeliveryOutcome::Accepted);
            }
        }
        cbs.close().unwrap();

        let outcomes = outcomes.borrow();
        prop_assert_eq!(outcomes.len(), answers.len());
        let answered = answers.iter().filter(|a| a.is_some()).count();
        let closed = outcomes
            .iter()
            .filter(|o| o.result == CbsOperationResult::InstanceClosed)
            .count();
        prop_assert_eq!(closed, answers.len() - answered);
    }
}
