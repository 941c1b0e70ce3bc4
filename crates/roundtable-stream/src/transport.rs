//! Transport layer for session event streams

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::error::StreamError;
use crate::frame::Frame;

/// Stream of frames read from one push connection.
///
/// Dropping the stream releases the underlying HTTP connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, StreamError>> + Send>>;

/// Anything that can open a push connection and yield frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn connect(&self, url: &str) -> Result<FrameStream, StreamError>;
}

/// SSE transport over HTTP
#[derive(Clone)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, StreamError> {
        // No total request timeout: the connection is expected to stay open
        // for the lifetime of the session.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| StreamError::Connect(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    /// Use an existing client (it must not carry a total request timeout)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FrameSource for SseTransport {
    async fn connect(&self, url: &str) -> Result<FrameStream, StreamError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Stream connected: {}", url);

        let frames = response
            .bytes_stream()
            .eventsource()
            .map(|item| match item {
                Ok(event) => Ok(Frame::from(event)),
                Err(e) => Err(StreamError::Read(e.to_string())),
            });

        Ok(Box::pin(frames))
    }
}
