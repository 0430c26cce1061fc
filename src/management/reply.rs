//! Parsing of management replies.
//!
//! A reply is matched to its request through the `correlation-id` property,
//! which must be a `ulong` equal to the request's `message-id`. The status
//! code and optional status description travel as application properties
//! whose names are configurable per instance.

use thiserror::Error;

use super::pending::ExecuteResult;
use crate::amqp::{DeliveryOutcome, Message};

/// Fields extracted from a management reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Message id of the request this reply answers
    pub correlation_id: u64,
    /// HTTP-style status code
    pub status_code: i32,
    /// Status description, if present and a string
    pub status_description: Option<String>,
}

impl ParsedReply {
    /// Classify the status code
    pub fn result(&self) -> ExecuteResult {
        classify_status(self.status_code)
    }
}

/// 2xx is success; anything else is a bad status
pub fn classify_status(status_code: i32) -> ExecuteResult {
    if (200..=299).contains(&status_code) {
        ExecuteResult::Ok
    } else {
        ExecuteResult::FailedBadStatus
    }
}

/// Why a received message could not complete an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// No application-properties section
    #[error("Could not get application properties on AMQP management response.")]
    MissingApplicationProperties,

    /// No properties section
    #[error("Could not get message properties on AMQP management response.")]
    MissingProperties,

    /// No correlation-id
    #[error("Could not get correlation Id from AMQP management response.")]
    MissingCorrelationId,

    /// Correlation-id is not a `ulong`
    #[error("Could not get correlation Id from AMQP management response.")]
    CorrelationIdNotUlong,

    /// Application-properties section is not a map
    #[error("Could not get application property map from the application properties in the AMQP management response.")]
    ApplicationPropertiesNotMap,

    /// Status code property absent
    #[error("Could not retrieve status code from the application properties in the AMQP management response.")]
    MissingStatusCode,

    /// Status code property is not an `int`
    #[error("Could not retrieve status code value from the application properties in the AMQP management response.")]
    StatusCodeNotInt,

    /// No pending operation has this message id
    #[error("Could not match AMQP management response to request")]
    Unmatched(u64),

    /// The instance was not listening for replies
    #[error("AMQP management instance is not open")]
    NotListening,
}

impl ReplyError {
    /// Whether the failure is on our side rather than a malformed reply
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::NotListening)
    }

    /// Outcome to report to the peer
    pub fn delivery_outcome(&self) -> DeliveryOutcome {
        if self.is_internal() {
            DeliveryOutcome::Released
        } else {
            DeliveryOutcome::rejected(self.to_string())
        }
    }
}

/// Extract correlation id, status code and description from a reply.
pub fn parse_reply(
    message: &Message,
    status_code_key_name: &str,
    status_description_key_name: &str,
) -> Result<ParsedReply, ReplyError> {
    let application_properties = message
        .application_properties
        .as_ref()
        .ok_or(ReplyError::MissingApplicationProperties)?;

    let properties = message
        .properties
        .as_ref()
        .ok_or(ReplyError::MissingProperties)?;

    let correlation_id = properties
        .correlation_id
        .as_ref()
        .ok_or(ReplyError::MissingCorrelationId)?
        .as_ulong()
        .ok_or(ReplyError::CorrelationIdNotUlong)?;

    if !application_properties.is_map() {
        return Err(ReplyError::ApplicationPropertiesNotMap);
    }

    let status_code = application_properties
        .get_by_str(status_code_key_name)
        .ok_or(ReplyError::MissingStatusCode)?
        .as_int()
        .ok_or(ReplyError::StatusCodeNotInt)?;

    // Absent or non-string descriptions are both reported as no description
    let status_description = application_properties
        .get_by_str(status_description_key_name)
        .and_then(|value| value.as_str())
        .map(str::to_string);

    Ok(ParsedReply {
        correlation_id,
        status_code,
        status_description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::{AmqpValue, MessageId};

    fn reply(correlation_id: MessageId, status: AmqpValue, description: Option<AmqpValue>) -> Message {
        let mut message = Message::new();
        message.set_correlation_id(correlation_id);
        message.set_application_property("statusCode", status);
        if let Some(description) = description {
            message.set_application_property("statusDescription", description);
        }
        message
    }

    fn parse(message: &Message) -> Result<ParsedReply, ReplyError> {
        parse_reply(message, "statusCode", "statusDescription")
    }

    #[test]
    fn test_parse_full_reply() {
        let message = reply(
            MessageId::Ulong(7),
            AmqpValue::Int(200),
            Some(AmqpValue::string("OK")),
        );
        let parsed = parse(&message).unwrap();
        assert_eq!(parsed.correlation_id, 7);
        assert_eq!(parsed.status_code, 200);
        assert_eq!(parsed.status_description.as_deref(), Some("OK"));
        assert_eq!(parsed.result(), ExecuteResult::Ok);
    }

    #[test]
    fn test_description_absent_or_wrong_type_is_none() {
        let message = reply(MessageId::Ulong(1), AmqpValue::Int(404), None);
        let parsed = parse(&message).unwrap();
        assert_eq!(parsed.status_description, None);
        assert_eq!(parsed.result(), ExecuteResult::FailedBadStatus);

        let message = reply(MessageId::Ulong(1), AmqpValue::Int(404), Some(AmqpValue::Int(9)));
        assert_eq!(parse(&message).unwrap().status_description, None);
    }

    #[test]
    fn test_status_classification_bounds() {
        assert_eq!(classify_status(199), ExecuteResult::FailedBadStatus);
        assert_eq!(classify_status(200), ExecuteResult::Ok);
        assert_eq!(classify_status(202), ExecuteResult::Ok);
        assert_eq!(classify_status(299), ExecuteResult::Ok);
        assert_eq!(classify_status(300), ExecuteResult::FailedBadStatus);
        assert_eq!(classify_status(-1), ExecuteResult::FailedBadStatus);
    }

    #[test]
    fn test_missing_sections() {
        let mut message = Message::new();
        message.set_correlation_id(MessageId::Ulong(1));
        assert_eq!(parse(&message), Err(ReplyError::MissingApplicationProperties));

        let mut message = Message::new();
        message.set_application_property("statusCode", AmqpValue::Int(200));
        assert_eq!(parse(&message), Err(ReplyError::MissingProperties));

        message.properties = Some(Default::default());
        assert_eq!(parse(&message), Err(ReplyError::MissingCorrelationId));
    }

    #[test]
    fn test_correlation_id_must_be_ulong() {
        let message = reply(MessageId::String("1".into()), AmqpValue::Int(200), None);
        assert_eq!(parse(&message), Err(ReplyError::CorrelationIdNotUlong));
    }

    #[test]
    fn test_status_code_errors() {
        let mut message = reply(MessageId::Ulong(1), AmqpValue::Int(200), None);
        assert!(parse_reply(&message, "status-code", "status-description")
            .is_err_and(|e| e == ReplyError::MissingStatusCode));

        message.set_application_property("statusCode", AmqpValue::string("200"));
        assert_eq!(parse(&message), Err(ReplyError::StatusCodeNotInt));

        message.application_properties = Some(AmqpValue::Int(1));
        assert_eq!(parse(&message), Err(ReplyError::ApplicationPropertiesNotMap));
    }

    #[test]
    fn test_delivery_outcomes() {
        assert_eq!(ReplyError::NotListening.delivery_outcome(), DeliveryOutcome::Released);
        assert_eq!(
            ReplyError::Unmatched(3).delivery_outcome(),
            DeliveryOutcome::rejected("Could not match AMQP management response to request")
        );
        assert!(!ReplyError::MissingStatusCode.is_internal());
    }
}
