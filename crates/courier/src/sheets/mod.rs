//! Google Sheets and Drive operations for a linked mailbox
//!
//! Everything here runs with the mailbox's stored access token as is; an
//! expired token surfaces as an ordinary error.

mod client;
mod request;

pub use client::SheetsClient;
pub use request::{create_spreadsheet_body, grid_range, style_request_body};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Spreadsheet operations exposed over HTTP
///
/// Responses are Google's JSON passed through unchanged.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Spreadsheets visible in the user's Drive
    async fn list_spreadsheets(&self, access_token: &str) -> Result<Value>;

    /// Create a spreadsheet with a single 100x26 "Sheet1" and share it read-only
    async fn create_spreadsheet(&self, access_token: &str, title: &str) -> Result<Value>;

    /// Delete a Drive file
    async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<()>;

    /// Read a range in A1 notation
    async fn read_range(&self, access_token: &str, spreadsheet_id: &str, range: &str)
    -> Result<Value>;

    /// Overwrite a range; values are parsed as if typed by the user
    async fn update_range(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &Value,
    ) -> Result<Value>;

    /// Apply a `userEnteredFormat` object to every cell in a range
    async fn update_style(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        style: &Value,
    ) -> Result<Value>;
}
