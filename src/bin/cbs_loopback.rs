//! CBS loopback CLI binary.
//!
//! Runs one `put-token` or `delete-token` exchange against an in-memory
//! session and a simulated `$cbs` node, printing what went over the wire
//! and the outcome the callback received.
//!
//! # Usage
//!
//! ```text
//! cbs-loopback --audience sb://ns/queue --token SharedAccessSignature...
//! cbs-loopback --audience sb://ns/queue --delete --status-code 404 --json
//! ```

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use amqp_cbs::{
    amqp::mock::MockSession, AmqpValue, Cbs, CbsOpenResult, CbsOutcome, Config, EndpointState,
    Message, MessageId, VERSION,
};
use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde_json::json;

#[derive(Parser)]
#[command(name = "cbs-loopback")]
#[command(version = VERSION)]
#[command(about = "Exercise the CBS token client against a simulated $cbs node", long_about = None)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audience the token is for
    #[arg(short, long)]
    audience: String,

    /// Token to put (ignored with --delete)
    #[arg(short, long, default_value = "")]
    token: String,

    /// Token type (default: from config)
    #[arg(long)]
    token_type: Option<String>,

    /// Status code the simulated node replies with
    #[arg(short, long, default_value = "200")]
    status_code: i32,

    /// Status description the simulated node replies with
    #[arg(short, long)]
    description: Option<String>,

    /// Send delete-token instead of put-token
    #[arg(long)]
    delete: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path.clone())
            .with_context(|| format!("loading {}", path.display()))?
            .with_env_overrides(),
        None => Config::from_env(),
    };
    let token_type = cli.token_type.clone().unwrap_or(config.cbs.token_type.clone());

    let session = MockSession::new();
    let mut cbs = Cbs::from_config(&mut session.clone(), &config.cbs)?;

    let opened = Rc::new(RefCell::new(None));
    let opened_sink = Rc::clone(&opened);
    cbs.open_async(
        move |result| *opened_sink.borrow_mut() = Some(result),
        || tracing::error!("CBS links failed"),
    )?;
    cbs.on_receiver_state_changed(EndpointState::Opening, EndpointState::Idle);
    cbs.on_sender_state_changed(EndpointState::Opening, EndpointState::Idle);
    cbs.on_receiver_state_changed(EndpointState::Open, EndpointState::Opening);
    cbs.on_sender_state_changed(EndpointState::Open, EndpointState::Opening);

    let open_result = *opened.borrow();
    if open_result != Some(CbsOpenResult::Ok) {
        bail!("CBS open did not complete: {open_result:?}");
    }

    let outcome = Rc::new(RefCell::new(None::<CbsOutcome>));
    let outcome_sink = Rc::clone(&outcome);
    let on_complete = move |o| *outcome_sink.borrow_mut() = Some(o);
    if cli.delete {
        cbs.delete_token_async(&token_type, &cli.audience, on_complete)?;
    } else {
        cbs.put_token_async(&token_type, &cli.audience, &cli.token, on_complete)?;
    }

    let request = session
        .last_sent()
        .ok_or_else(|| anyhow!("no request was sent"))?;
    let request_id = request
        .message_id()
        .and_then(MessageId::as_ulong)
        .ok_or_else(|| anyhow!("request carries no ulong message id"))?;

    let reply = build_reply(request_id, cli.status_code, cli.description.as_deref());
    let disposition = cbs.on_message_received(reply);
    if !disposition.is_accepted() {
        tracing::warn!(?disposition, "Simulated reply was not accepted");
    }
    cbs.close()?;

    let outcome = outcome
        .borrow_mut()
        .take()
        .ok_or_else(|| anyhow!("operation did not complete"))?;

    if cli.json {
        let output = json!({
            "request": {
                "message_id": request_id,
                "operation": request.application_property("operation").map(ToString::to_string),
                "type": request.application_property("type").map(ToString::to_string),
                "name": request.application_property("name").map(ToString::to_string),
                "body": request.body_value().map(ToString::to_string),
            },
            "disposition": format!("{disposition:?}"),
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Request:");
        println!("  message-id:  {request_id}");
        for key in ["operation", "type", "name"] {
            if let Some(value) = request.application_property(key) {
                println!("  {key:<12} {value}");
            }
        }
        if let Some(body) = request.body_value() {
            println!("  body:        {body}");
        }
        println!("Disposition: {disposition:?}");
        println!("Outcome:");
        println!("  result:      {:?}", outcome.result);
        println!("  status-code: {}", outcome.status_code);
        if let Some(description) = &outcome.status_description {
            println!("  description: {description}");
        }
    }

    Ok(())
}

fn build_reply(correlation_id: u64, status_code: i32, description: Option<&str>) -> Message {
    let mut reply = Message::new();
    reply.set_correlation_id(MessageId::Ulong(correlation_id));
    reply.set_application_property("status-code", AmqpValue::Int(status_code));
    if let Some(description) = description {
        reply.set_application_property("status-description", AmqpValue::string(description));
    }
    reply
}
