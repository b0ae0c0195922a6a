use crate::error::ClientError;
use crate::state::{AssetRef, ChatMessage, ChatRole};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Raw response body, chunked as the transport delivers it
pub type ByteStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Body of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub previous_messages: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_image: Option<AssetRef>,
}

#[derive(Clone)]
pub struct GenerationClient {
    client: Client,
    endpoint: String,
}

impl GenerationClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn with_connect_timeout(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the request and hand back the response body as it arrives.
    pub async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            history = request.previous_messages.len(),
            with_image = request.initial_image.is_some(),
            "opening generation stream"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "generation endpoint rejected request");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes_stream().boxed())
    }
}
