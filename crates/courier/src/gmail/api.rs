//! Gmail API response shapes
//!
//! Only the fields the wait/read path looks at are decoded; serde skips the rest.

use serde::Deserialize;

/// `users.messages.list` response; `messages` is absent when nothing matched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// `users.messages.get` response with `format=full`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub snippet: String,
    /// Milliseconds since epoch, as a decimal string
    pub internal_date: String,
    pub payload: Option<MessagePayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessageBody>,
    pub parts: Option<Vec<MessagePart>>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body data is URL-safe base64, padded or not
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    pub data: Option<String>,
}

/// Top-level part of a multipart message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub mime_type: Option<String>,
    pub body: Option<MessageBody>,
}
