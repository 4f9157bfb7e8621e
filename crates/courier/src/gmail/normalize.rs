//! Gmail message parsing
//!
//! Converts a `format=full` Gmail API message into [`EmailContent`].
//! Parsing never fails: missing headers, bodies or undecodable payloads
//! become empty strings.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use log::warn;

use super::api::{GmailMessage, MessagePayload};
use crate::models::{EmailContent, MessageId};

/// Standard-alphabet decoder that accepts padded and unpadded input
const BODY_DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Parse a Gmail API message into normalized email content
pub fn parse_email(message: GmailMessage) -> EmailContent {
    let payload = message.payload.as_ref();
    let header = |name: &str| {
        payload
            .and_then(|p| extract_header(p, name))
            .unwrap_or_default()
    };

    EmailContent {
        from: header("from"),
        to: header("to"),
        subject: header("subject"),
        body: payload.map(extract_body).unwrap_or_default(),
        received_at: parse_internal_date(&message.internal_date),
        id: MessageId::new(message.id),
        thread_id: message.thread_id,
        snippet: message.snippet,
    }
}

/// Extract a header value by name (case-insensitive)
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Extract the plain-text body
///
/// A message that exposes a parts list is treated as multipart: only the
/// first part typed exactly `text/plain` is used, nested parts are not
/// searched. Otherwise the top-level body is decoded as is.
fn extract_body(payload: &MessagePayload) -> String {
    let data = match &payload.parts {
        Some(parts) => parts
            .iter()
            .find(|part| part.mime_type.as_deref() == Some("text/plain"))
            .and_then(|part| part.body.as_ref()),
        None => payload.body.as_ref(),
    }
    .and_then(|body| body.data.as_deref());

    data.map(decode_body_data).unwrap_or_default()
}

/// Decode Gmail's URL-safe base64 body data
///
/// `-` and `_` are mapped back to `+` and `/` before a standard decode.
pub(crate) fn decode_body_data(data: &str) -> String {
    let standard: String = data
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    match BODY_DECODER.decode(standard.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Failed to decode message body: {}", e);
            String::new()
        }
    }
}

/// Parse Gmail's `internalDate` (milliseconds since epoch)
fn parse_internal_date(raw: &str) -> DateTime<Utc> {
    match raw.trim().parse::<i64>().ok().and_then(DateTime::from_timestamp_millis) {
        Some(at) => at,
        None => {
            warn!("Invalid internalDate {:?}, using the Unix epoch", raw);
            DateTime::default()
        }
    }
}
