//! Notification envelope unwrapping.
//!
//! Inbound messages normally arrive wrapped in a pub/sub notification
//! envelope: a JSON object with `Type: "Notification"`, the real payload in
//! `Message`, and transport attributes in `MessageAttributes`. Bodies that do
//! not parse as such an envelope are passed through as-is so plain messages
//! (tests, manual injection) still flow through the same dispatch path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::constants::{attributes, DEFAULT_SUBJECT};
use crate::error::{Result, SyncError};
use crate::messaging::queue::QueueMessage;

const NOTIFICATION_TYPE: &str = "Notification";

/// One typed attribute inside a notification envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttribute {
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Value")]
    pub value: String,
}

/// A pub/sub notification envelope as found on the inbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "MessageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "MessageAttributes", default)]
    pub message_attributes: HashMap<String, NotificationAttribute>,
}

impl NotificationEnvelope {
    fn flattened_attributes(&self) -> HashMap<String, String> {
        self.message_attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.value.clone()))
            .collect()
    }
}

/// A fully resolved inbound message, ready for dispatch.
///
/// Every field is populated: `subject` falls back to the default subject and
/// `correlation_id` to the empty string, so dispatch never has to re-check.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwrappedMessage {
    pub id: String,
    pub subject: String,
    pub correlation_id: String,
    pub payload: String,
    pub attributes: HashMap<String, String>,
}

/// Unwrap a received queue message into an [`UnwrappedMessage`].
///
/// A body that parses as a notification envelope contributes its inner
/// message id, payload and attributes; anything else falls back to the raw
/// body and the transport attributes. The only hard failure is a missing or
/// blank raw message id, which makes the message impossible to account for.
pub fn unwrap_message(raw: &QueueMessage) -> Result<UnwrappedMessage> {
    if raw.id.trim().is_empty() {
        return Err(SyncError::InvalidArgument(
            "received message has no id".to_string(),
        ));
    }

    let envelope = serde_json::from_str::<NotificationEnvelope>(&raw.body)
        .ok()
        .filter(|env| env.kind == NOTIFICATION_TYPE);

    let (id, payload, attrs) = match envelope {
        Some(env) => {
            trace!(message_id = %raw.id, "Unwrapped notification envelope");
            let id = env
                .message_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| raw.id.clone());
            let payload = env.message.clone().unwrap_or_default();
            (id, payload, env.flattened_attributes())
        }
        None => {
            trace!(message_id = %raw.id, "Body is not an envelope, passing through raw");
            (raw.id.clone(), raw.body.clone(), raw.attributes.clone())
        }
    };

    let subject = attrs
        .get(attributes::SUBJECT)
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
    let correlation_id = attrs
        .get(attributes::CORRELATION_ID)
        .cloned()
        .unwrap_or_default();

    Ok(UnwrappedMessage {
        id,
        subject,
        correlation_id,
        payload,
        attributes: attrs,
    })
}
