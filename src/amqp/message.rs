//! AMQP messages and delivery outcomes.

use std::fmt;

use uuid::Uuid;

use super::AmqpValue;

/// Error condition reported to the peer for rejected management replies
pub const INTERNAL_ERROR_CONDITION: &str = "amqp:internal-error";

/// AMQP message identifier.
///
/// Management requests always carry a `ulong` id. The other variants exist
/// so that replies from arbitrary peers can be represented faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// `ulong` message id
    Ulong(u64),
    /// `uuid` message id
    Uuid(Uuid),
    /// `binary` message id
    Binary(Vec<u8>),
    /// `string` message id
    String(String),
}

impl MessageId {
    /// Read the `ulong` variant
    pub fn as_ulong(&self) -> Option<u64> {
        match self {
            Self::Ulong(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ulong(id) => write!(f, "{id}"),
            Self::Uuid(id) => write!(f, "{id}"),
            Self::Binary(bytes) => write!(f, "{} bytes", bytes.len()),
            Self::String(id) => write!(f, "{id}"),
        }
    }
}

/// Message properties section (the fields management uses)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    /// Id of this message
    pub message_id: Option<MessageId>,
    /// Id of the message this one responds to
    pub correlation_id: Option<MessageId>,
}

/// Message body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MessageBody {
    /// No body section
    #[default]
    Empty,
    /// A single `amqp-value` section
    Value(AmqpValue),
}

/// An AMQP message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Properties section
    pub properties: Option<Properties>,
    /// Application properties section (a map when present)
    pub application_properties: Option<AmqpValue>,
    /// Body
    pub body: MessageBody,
}

impl Message {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message with an `amqp-value` body
    pub fn with_body_value(value: AmqpValue) -> Self {
        Self {
            body: MessageBody::Value(value),
            ..Self::default()
        }
    }

    /// Set an application property, creating the section when absent.
    ///
    /// Returns `false` if an existing section is not a map.
    pub fn set_application_property(&mut self, key: &str, value: AmqpValue) -> bool {
        self.application_properties
            .get_or_insert_with(AmqpValue::empty_map)
            .set_map_value(AmqpValue::string(key), value)
    }

    /// Get an application property by string key
    pub fn application_property(&self, key: &str) -> Option<&AmqpValue> {
        self.application_properties
            .as_ref()
            .and_then(|props| props.get_by_str(key))
    }

    /// Message id from the properties section
    pub fn message_id(&self) -> Option<&MessageId> {
        self.properties.as_ref().and_then(|p| p.message_id.as_ref())
    }

    /// Set the message id, creating the properties section when absent
    pub fn set_message_id(&mut self, id: MessageId) {
        self.properties.get_or_insert_with(Properties::default).message_id = Some(id);
    }

    /// Correlation id from the properties section
    pub fn correlation_id(&self) -> Option<&MessageId> {
        self.properties.as_ref().and_then(|p| p.correlation_id.as_ref())
    }

    /// Set the correlation id, creating the properties section when absent
    pub fn set_correlation_id(&mut self, id: MessageId) {
        self.properties.get_or_insert_with(Properties::default).correlation_id = Some(id);
    }

    /// Body value, if the body is an `amqp-value` section
    pub fn body_value(&self) -> Option<&AmqpValue> {
        match &self.body {
            MessageBody::Value(value) => Some(value),
            MessageBody::Empty => None,
        }
    }
}

/// Outcome returned to the peer for a received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Message processed
    Accepted,
    /// Message is invalid and will not be processed
    Rejected {
        /// Error condition symbol
        condition: String,
        /// Human-readable description
        description: String,
    },
    /// Message was not processed and may be redelivered
    Released,
}

impl DeliveryOutcome {
    /// Rejected with `amqp:internal-error`
    pub fn rejected(description: impl Into<String>) -> Self {
        Self::Rejected {
            condition: INTERNAL_ERROR_CONDITION.to_string(),
            description: description.into(),
        }
    }

    /// Check for the accepted outcome
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_property_created_on_demand() {
        let mut message = Message::new();
        assert!(message.application_properties.is_none());

        assert!(message.set_application_property("name", "urn:x".into()));
        assert_eq!(
            message.application_property("name"),
            Some(&AmqpValue::string("urn:x"))
        );
    }

    #[test]
    fn test_application_property_on_non_map_section() {
        let mut message = Message {
            application_properties: Some(AmqpValue::Int(3)),
            ..Message::default()
        };
        assert!(!message.set_application_property("name", "urn:x".into()));
    }

    #[test]
    fn test_message_and_correlation_ids() {
        let mut message = Message::new();
        message.set_message_id(MessageId::Ulong(4));
        message.set_correlation_id(MessageId::String("abc".into()));

        assert_eq!(message.message_id().and_then(MessageId::as_ulong), Some(4));
        assert_eq!(message.correlation_id().and_then(MessageId::as_ulong), None);
    }

    #[test]
    fn test_rejected_uses_internal_error_condition() {
        let outcome = DeliveryOutcome::rejected("bad reply");
        assert_eq!(
            outcome,
            DeliveryOutcome::Rejected {
                condition: "amqp:internal-error".to_string(),
                description: "bad reply".to_string(),
            }
        );
        assert!(!outcome.is_accepted());
    }
}
