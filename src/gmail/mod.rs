//! Gmail REST client for the two RPCs the exporter consumes.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::errors::{AppError, AppResult};
use crate::types::{MessagePage, MessagePart};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/";

/// The remote mailbox as seen by the exporter.
#[async_trait]
pub trait MailboxApi: Send + Sync {
    async fn list_message_ids(&self, query: &str, page_token: Option<&str>)
        -> AppResult<MessagePage>;

    async fn get_full_message(&self, id: &str) -> AppResult<MessagePart>;
}

#[derive(Debug, Deserialize)]
struct MessagesListResponse {
    messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    payload: Option<MessagePart>,
}

#[derive(Clone)]
pub struct GmailClient {
    client: Client,
    base: Url,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: &str) -> AppResult<Self> {
        Self::with_base(access_token, GMAIL_API_BASE)
    }

    pub fn with_base(access_token: &str, base: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Network(format!("building HTTP client: {e}")))?;
        let base = Url::parse(base)
            .map_err(|e| AppError::Config(format!("invalid API base {base}: {e}")))?;

        Ok(Self {
            client,
            base,
            access_token: access_token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base
            .join(path)
            .map_err(|e| AppError::Unexpected(format!("building url for {path}: {e}")))
    }

    async fn get_json(&self, url: Url, params: &[(&str, &str)]) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("reading response body: {e}")))?;
        debug!(status = %status, bytes = text.len(), "Gmail API response");

        if !status.is_success() {
            return Err(classify_status(status, text));
        }
        Ok(text)
    }
}

#[async_trait]
impl MailboxApi for GmailClient {
    async fn list_message_ids(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage> {
        let url = self.endpoint("users/me/messages")?;
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let text = self.get_json(url, &params).await?;
        parse_list_response(&text)
    }

    async fn get_full_message(&self, id: &str) -> AppResult<MessagePart> {
        let url = self.endpoint(&format!("users/me/messages/{id}"))?;
        let text = self.get_json(url, &[("format", "full")]).await?;
        parse_full_message(&text)
    }
}

/// Maps a non-success status onto the error taxonomy. 429 is the only
/// status the fetch path treats as recoverable.
pub fn classify_status(status: StatusCode, body: String) -> AppError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited,
        StatusCode::UNAUTHORIZED => AppError::Auth(format!("credential rejected: {body}")),
        other => AppError::Api {
            status: other.as_u16(),
            body,
        },
    }
}

fn parse_list_response(text: &str) -> AppResult<MessagePage> {
    let parsed: MessagesListResponse = serde_json::from_str(text)
        .map_err(|e| AppError::Decode(format!("message list: {e}")))?;
    Ok(MessagePage {
        ids: parsed
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect(),
        next_page_token: parsed.next_page_token,
    })
}

// serde_json refuses input nested deeper than 128 levels, so a payload with
// roughly 60+ levels of nested parts surfaces as a Decode error.
fn parse_full_message(text: &str) -> AppResult<MessagePart> {
    let parsed: FullMessage = serde_json::from_str(text)
        .map_err(|e| AppError::Decode(format!("full message: {e}")))?;
    parsed
        .payload
        .ok_or_else(|| AppError::Decode("message has no payload".into()))
}
