//! Scripted stand-ins for Google services, for tests in this and dependent crates

use anyhow::{Result, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::MailError;
use crate::gmail::api::{GmailMessage, Header, MessageBody, MessagePart, MessagePayload};
use crate::gmail::{OAuthProvider, TokenGrant};
use crate::models::{MessageId, SearchFilter};
use crate::sheets::{SheetsApi, style_request_body};
use crate::wait::{MailQuery, TokenRefresher};

/// Build a multipart message with a plain-text body
pub fn message_from(id: &str, from: &str, body: &str) -> GmailMessage {
    let header = |name: &str, value: &str| Header {
        name: name.to_string(),
        value: value.to_string(),
    };

    GmailMessage {
        id: id.to_string(),
        thread_id: format!("thread-{}", id),
        snippet: body.chars().take(100).collect(),
        internal_date: "1700000000000".to_string(),
        payload: Some(MessagePayload {
            headers: Some(vec![
                header("From", from),
                header("To", "me@gmail.com"),
                header("Subject", "Test message"),
            ]),
            mime_type: Some("multipart/alternative".to_string()),
            parts: Some(vec![MessagePart {
                mime_type: Some("text/plain".to_string()),
                body: Some(MessageBody {
                    data: Some(URL_SAFE_NO_PAD.encode(body)),
                }),
            }]),
            ..Default::default()
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailOp {
    Exists,
    List,
    Fetch,
}

/// One request seen by [`ScriptedMail`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailCall {
    pub op: MailOp,
    pub access_token: String,
}

/// A mailbox whose answers are fixed up front
///
/// Messages added with [`with_message`](Self::with_message) are listed in the
/// order they were added, so add the newest first. Scripted check and listing
/// results are consumed first; once they run out, answers come from the
/// inbox. Calls made with a rejected access token fail with
/// [`MailError::AuthExpired`] without consuming the script.
#[derive(Default)]
pub struct ScriptedMail {
    inbox: Vec<GmailMessage>,
    rejected: HashSet<String>,
    checks: Mutex<VecDeque<Result<bool, MailError>>>,
    listings: Mutex<VecDeque<Result<Vec<MessageId>, MailError>>>,
    calls: Mutex<Vec<MailCall>>,
}

impl ScriptedMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: GmailMessage) -> Self {
        self.inbox.push(message);
        self
    }

    pub fn rejecting(mut self, access_token: &str) -> Self {
        self.rejected.insert(access_token.to_string());
        self
    }

    pub fn with_checks(self, checks: Vec<Result<bool, MailError>>) -> Self {
        *self.checks.lock().unwrap() = checks.into();
        self
    }

    pub fn with_listings(self, listings: Vec<Result<Vec<MessageId>, MailError>>) -> Self {
        *self.listings.lock().unwrap() = listings.into();
        self
    }

    pub fn calls(&self) -> Vec<MailCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.access_token).collect()
    }

    fn count(&self, op: MailOp) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn check_count(&self) -> usize {
        self.count(MailOp::Exists)
    }

    pub fn list_count(&self) -> usize {
        self.count(MailOp::List)
    }

    pub fn fetch_count(&self) -> usize {
        self.count(MailOp::Fetch)
    }

    fn record(&self, op: MailOp, access_token: &str) -> Result<(), MailError> {
        self.calls.lock().unwrap().push(MailCall {
            op,
            access_token: access_token.to_string(),
        });
        if self.rejected.contains(access_token) {
            return Err(MailError::AuthExpired);
        }
        Ok(())
    }

    fn matching<'a>(&'a self, filter: &'a SearchFilter) -> impl Iterator<Item = &'a GmailMessage> {
        self.inbox.iter().filter(move |message| match filter.sender() {
            None => true,
            Some(sender) => crate::gmail::parse_email((*message).clone())
                .from
                .to_ascii_lowercase()
                .contains(&sender.to_ascii_lowercase()),
        })
    }
}

#[async_trait]
impl MailQuery for ScriptedMail {
    async fn exists_recent(
        &self,
        access_token: &str,
        filter: &SearchFilter,
    ) -> Result<bool, MailError> {
        self.record(MailOp::Exists, access_token)?;
        if let Some(scripted) = self.checks.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(self.matching(filter).next().is_some())
    }

    async fn list_newest(
        &self,
        access_token: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<MessageId>, MailError> {
        self.record(MailOp::List, access_token)?;
        if let Some(scripted) = self.listings.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(self
            .matching(filter)
            .take(limit)
            .map(|m| MessageId::new(m.id.clone()))
            .collect())
    }

    async fn fetch_message(
        &self,
        access_token: &str,
        id: &MessageId,
    ) -> Result<GmailMessage, MailError> {
        self.record(MailOp::Fetch, access_token)?;
        self.inbox
            .iter()
            .find(|m| m.id == id.as_str())
            .cloned()
            .ok_or_else(|| MailError::Transient(format!("no message {}", id.as_str())))
    }
}

/// Hands out a fixed sequence of access tokens, or always fails
#[derive(Default)]
pub struct StaticRefresher {
    tokens: Mutex<VecDeque<String>>,
    failing: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticRefresher {
    pub fn granting<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: Mutex::new(tokens.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Take `delay` (tokio time) before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(expired access token, refresh token)` of every call
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenRefresher for StaticRefresher {
    async fn refresh(&self, expired: &str, refresh_token: &str) -> Result<String, MailError> {
        self.calls
            .lock()
            .unwrap()
            .push((expired.to_string(), refresh_token.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(MailError::RefreshFailed("invalid_grant".to_string()));
        }
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| MailError::RefreshFailed("no more tokens".to_string()))
    }
}

/// OAuth provider that knows a fixed set of authorization codes
pub struct FakeOAuth {
    client_id: String,
    codes: HashMap<String, TokenGrant>,
    /// access token -> mailbox address
    owners: HashMap<String, String>,
}

impl FakeOAuth {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            codes: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Accept `code`, granting tokens for `mailbox`
    pub fn with_code(mut self, code: &str, mailbox: &str, access_token: &str, refresh_token: &str) -> Self {
        self.codes.insert(
            code.to_string(),
            TokenGrant {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                scope: "https://www.googleapis.com/auth/gmail.readonly".to_string(),
            },
        );
        self.owners
            .insert(access_token.to_string(), mailbox.to_string());
        self
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        match self.codes.get(code) {
            Some(grant) => Ok(grant.clone()),
            None => bail!("invalid_grant: unknown authorization code"),
        }
    }

    async fn user_email(&self, access_token: &str) -> Result<String> {
        match self.owners.get(access_token) {
            Some(mailbox) => Ok(mailbox.clone()),
            None => bail!("401 Unauthorized"),
        }
    }
}

/// One request seen by [`RecordingSheets`]
#[derive(Debug, Clone, PartialEq)]
pub struct SheetsCall {
    pub op: &'static str,
    pub access_token: String,
    pub args: Value,
}

/// Sheets API that records requests and answers with canned JSON
#[derive(Default)]
pub struct RecordingSheets {
    failing: bool,
    calls: Mutex<Vec<SheetsCall>>,
}

impl RecordingSheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request fails as if Google returned an error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<SheetsCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, access_token: &str, args: Value) -> Result<()> {
        self.calls.lock().unwrap().push(SheetsCall {
            op,
            access_token: access_token.to_string(),
            args,
        });
        if self.failing {
            bail!("http status: 403");
        }
        Ok(())
    }
}

#[async_trait]
impl SheetsApi for RecordingSheets {
    async fn list_spreadsheets(&self, access_token: &str) -> Result<Value> {
        self.record("list", access_token, Value::Null)?;
        Ok(json!({ "files": [{ "id": "sheet-1", "name": "Codes" }] }))
    }

    async fn create_spreadsheet(&self, access_token: &str, title: &str) -> Result<Value> {
        self.record("create", access_token, json!({ "title": title }))?;
        Ok(json!({ "spreadsheetId": "sheet-1", "properties": { "title": title } }))
    }

    async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<()> {
        self.record("delete", access_token, json!({ "fileId": file_id }))
    }

    async fn read_range(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Value> {
        self.record(
            "read",
            access_token,
            json!({ "spreadsheetId": spreadsheet_id, "range": range }),
        )?;
        Ok(json!({ "range": range, "majorDimension": "ROWS", "values": [["1234"]] }))
    }

    async fn update_range(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &Value,
    ) -> Result<Value> {
        self.record(
            "update",
            access_token,
            json!({ "spreadsheetId": spreadsheet_id, "range": range, "values": values }),
        )?;
        Ok(json!({ "spreadsheetId": spreadsheet_id, "updatedRange": range }))
    }

    async fn update_style(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        style: &Value,
    ) -> Result<Value> {
        let body = style_request_body(range, style)?;
        self.record("style", access_token, body)?;
        Ok(json!({ "spreadsheetId": spreadsheet_id, "replies": [{}] }))
    }
}
