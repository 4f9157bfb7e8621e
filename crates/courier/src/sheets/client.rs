//! Sheets v4 and Drive v3 HTTP client

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;
use serde_json::{Value, json};
use std::time::Duration;

use super::SheetsApi;
use super::request::{create_spreadsheet_body, style_request_body};

const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const LIST_FIELDS: &str = "files(id,name,webViewLink,createdTime,owners)";

/// Sheets/Drive client; blocking requests run on tokio's blocking pool
#[derive(Clone)]
pub struct SheetsClient {
    agent: ureq::Agent,
}

impl SheetsClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .build()
            .into();
        Self { agent }
    }

    /// Run a blocking request off the async runtime
    async fn blocking<T, F>(&self, action: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ureq::Agent) -> Result<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || f(&agent).context(action))
            .await
            .with_context(|| format!("{}: request task failed", action))?
    }

    fn get(agent: &ureq::Agent, url: &str, access_token: &str) -> Result<Value> {
        let mut response = agent
            .get(url)
            .header("Authorization", &bearer(access_token))
            .call()?;
        Ok(response.body_mut().read_json()?)
    }

    fn post(agent: &ureq::Agent, url: &str, access_token: &str, body: &Value) -> Result<Value> {
        let mut response = agent
            .post(url)
            .header("Authorization", &bearer(access_token))
            .send_json(body)?;
        Ok(response.body_mut().read_json()?)
    }
}

impl Default for SheetsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn bearer(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}

fn values_url(spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}/{}/values/{}",
        SHEETS_URL,
        urlencoding::encode(spreadsheet_id),
        urlencoding::encode(range)
    )
}

fn list_url() -> String {
    format!(
        "{}?q={}&fields={}",
        DRIVE_FILES_URL,
        urlencoding::encode(&format!("mimeType=\"{}\"", SPREADSHEET_MIME)),
        urlencoding::encode(LIST_FIELDS)
    )
}

#[async_trait]
impl SheetsApi for SheetsClient {
    async fn list_spreadsheets(&self, access_token: &str) -> Result<Value> {
        let access_token = access_token.to_string();
        self.blocking("Failed to list drive files", move |agent| {
            Self::get(agent, &list_url(), &access_token)
        })
        .await
    }

    async fn create_spreadsheet(&self, access_token: &str, title: &str) -> Result<Value> {
        let access_token = access_token.to_string();
        let body = create_spreadsheet_body(title);

        self.blocking("Failed to create sheet", move |agent| {
            let sheet = Self::post(agent, SHEETS_URL, &access_token, &body)?;

            if let Some(id) = sheet.get("spreadsheetId").and_then(Value::as_str) {
                let url = format!("{}/{}/permissions", DRIVE_FILES_URL, urlencoding::encode(id));
                let grant = json!({ "role": "reader", "type": "anyone" });
                if let Err(e) = Self::post(agent, &url, &access_token, &grant) {
                    warn!("Could not share spreadsheet {}: {}", id, e);
                }
            }
            Ok(sheet)
        })
        .await
    }

    async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<()> {
        let access_token = access_token.to_string();
        let url = format!("{}/{}", DRIVE_FILES_URL, urlencoding::encode(file_id));

        self.blocking("Failed to delete file", move |agent| {
            agent
                .delete(&url)
                .header("Authorization", &bearer(&access_token))
                .call()?;
            Ok(())
        })
        .await
    }

    async fn read_range(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Value> {
        let access_token = access_token.to_string();
        let url = values_url(spreadsheet_id, range);
        self.blocking("Failed to read range", move |agent| {
            Self::get(agent, &url, &access_token)
        })
        .await
    }

    async fn update_range(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &Value,
    ) -> Result<Value> {
        let access_token = access_token.to_string();
        let url = format!(
            "{}?valueInputOption=USER_ENTERED",
            values_url(spreadsheet_id, range)
        );
        let body = json!({ "values": values });

        self.blocking("Failed to update range", move |agent| {
            let mut response = agent
                .put(&url)
                .header("Authorization", &bearer(&access_token))
                .send_json(&body)?;
            Ok(response.body_mut().read_json()?)
        })
        .await
    }

    async fn update_style(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        style: &Value,
    ) -> Result<Value> {
        let access_token = access_token.to_string();
        let body = style_request_body(range, style)?;
        let url = format!(
            "{}/{}:batchUpdate",
            SHEETS_URL,
            urlencoding::encode(spreadsheet_id)
        );

        self.blocking("Failed to update style", move |agent| {
            Self::post(agent, &url, &access_token, &body)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_url_encodes_range() {
        assert_eq!(
            values_url("abc123", "Sheet1!A1:B2"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Sheet1%21A1%3AB2"
        );
    }

    #[test]
    fn test_list_url_filters_spreadsheets() {
        let url = list_url();
        assert!(url.starts_with("https://www.googleapis.com/drive/v3/files?q=mimeType%3D%22application%2Fvnd.google-apps.spreadsheet%22"));
        assert!(url.ends_with("&fields=files%28id%2Cname%2CwebViewLink%2CcreatedTime%2Cowners%29"));
    }
}
