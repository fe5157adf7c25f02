//! Inbound mail handling — normalizes a raw message into `EmailInput`,
//! classifies it, and produces the record handed to the email store.
//!
//! Flow:
//! 1. `parse_raw_message()` — MIME parsing via `mail-parser`
//! 2. `route_inbound()` — classify without trace
//! 3. The caller persists the returned `RoutedEmail`

use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::IngestError;
use crate::pipeline::classifier::{ClassifyContext, Classifier};
use crate::pipeline::types::{EmailInput, Pipeline};

/// Subject used when the message has none.
pub const NO_SUBJECT: &str = "(no subject)";

/// SMTP envelope addresses. When present they take precedence over the
/// `From`/`To` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub mail_from: Option<String>,
    pub rcpt_to: Option<String>,
}

/// A parsed inbound message: classifier input plus storage-only fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMail {
    pub message_id: String,
    pub reply_to: Option<String>,
    pub body_html: Option<String>,
    pub email: EmailInput,
}

/// The stored form of a classified email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedEmail {
    pub id: String,
    pub message_id: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to_address: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub category_id: String,
    pub matched_node_id: Option<String>,
    pub matched_node_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Parse a raw RFC 5322 message.
pub fn parse_raw_message(
    raw: &[u8],
    envelope: &InboundEnvelope,
) -> Result<IncomingMail, IngestError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| IngestError::Unparseable("no message headers found".into()))?;

    let header_from = parsed.from().and_then(Address::first);
    let from_address = envelope
        .mail_from
        .clone()
        .or_else(|| header_from.and_then(|a| a.address()).map(str::to_string))
        .ok_or(IngestError::MissingSender)?;
    let from_name = header_from
        .and_then(|a| a.name())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let to_address = envelope
        .rcpt_to
        .clone()
        .or_else(|| first_address(parsed.to()))
        .ok_or(IngestError::MissingRecipient)?;

    let subject = parsed
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT)
        .to_string();

    let message_id = parsed
        .message_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let body_text = parsed
        .body_text(0)
        .map(|t| t.into_owned())
        .unwrap_or_default();
    let body_html = parsed.body_html(0).map(|h| h.into_owned());

    debug!(message_id = %message_id, from = %from_address, to = %to_address, "Parsed inbound message");

    Ok(IncomingMail {
        message_id,
        reply_to: first_address(parsed.reply_to()),
        body_html,
        email: EmailInput {
            from_address,
            from_name,
            to_address,
            subject,
            body_text,
        },
    })
}

fn first_address(addr: Option<&Address>) -> Option<String> {
    addr.and_then(Address::first)
        .and_then(|a| a.address())
        .map(str::to_string)
}

/// Classify an inbound message and build its storage record.
pub async fn route_inbound(
    classifier: &Classifier,
    pipeline: &Pipeline,
    mail: IncomingMail,
    ctx: ClassifyContext<'_>,
) -> RoutedEmail {
    let result = classifier.classify(pipeline, &mail.email, ctx, false).await;

    info!(
        message_id = %mail.message_id,
        category_id = %result.category_id,
        matched_node = result.node_id.as_deref().unwrap_or("none"),
        "Routed inbound email"
    );

    let IncomingMail {
        message_id,
        reply_to,
        body_html,
        email,
    } = mail;

    RoutedEmail {
        id: Uuid::new_v4().to_string(),
        message_id,
        from_address: email.from_address,
        from_name: email.from_name,
        to_address: email.to_address,
        reply_to,
        subject: email.subject,
        body_text: email.body_text,
        body_html,
        category_id: result.category_id,
        matched_node_id: result.node_id,
        matched_node_name: result.node_name,
        received_at: Utc::now(),
    }
}
