//! REST + SSE client for the research backend

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use roundtable_stream::{FrameSource, FrameStream, SseTransport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::ResearchApi;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{
    CreateSessionRequest, FeedbackAck, FeedbackRequest, HealthStatus, Report, Session, SessionId,
};

/// HTTP implementation of [`ResearchApi`]
#[derive(Clone)]
pub struct HttpClient {
    base_url: Url,
    client: reqwest::Client,
    stream: Arc<dyn FrameSource>,
}

impl HttpClient {
    /// Build a client from the server section of the configuration
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = config.url()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create client: {}", e)))?;

        let stream = SseTransport::new(config.connect_timeout())?;

        Ok(Self {
            base_url,
            client,
            stream: Arc::new(stream),
        })
    }

    /// Replace the push transport
    pub fn with_stream_source(mut self, stream: Arc<dyn FrameSource>) -> Self {
        self.stream = stream;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("base_url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn session_endpoint(&self, id: &SessionId, tail: Option<&str>) -> Result<Url> {
        match tail {
            Some(tail) => self.endpoint(&["sessions", id.as_str(), tail]),
            None => self.endpoint(&["sessions", id.as_str()]),
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Turn a non-2xx response into an error carrying the backend's detail
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
        debug!("Backend rejected request: {} {}", status.as_u16(), detail);

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(detail));
        }
        Err(Error::Http {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Pull the human-readable `detail` out of an error body.
///
/// Handled forms: `{"detail": "text"}` and the request-validation form
/// `{"detail": [{"msg": "text", ...}, ...]}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

#[async_trait]
impl ResearchApi for HttpClient {
    async fn health(&self) -> Result<HealthStatus> {
        let response = self.client.get(self.endpoint(&["health"])?).send().await?;
        Self::read_json(response).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let response = self.client.get(self.endpoint(&["sessions"])?).send().await?;
        Self::read_json(response).await
    }

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        let response = self
            .client
            .post(self.endpoint(&["sessions"])?)
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session> {
        let response = self
            .client
            .get(self.session_endpoint(id, None)?)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let response = self
            .client
            .delete(self.session_endpoint(id, None)?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_report(&self, id: &SessionId) -> Result<Option<Report>> {
        let response = self
            .client
            .get(self.session_endpoint(id, Some("report"))?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No report yet for session {}", id);
            return Ok(None);
        }
        Self::read_json(response).await.map(Some)
    }

    async fn submit_feedback(&self, id: &SessionId, feedback: &str) -> Result<FeedbackAck> {
        let body = FeedbackRequest {
            feedback: feedback.to_string(),
        };
        let response = self
            .client
            .post(self.session_endpoint(id, Some("feedback"))?)
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn open_stream(&self, id: &SessionId) -> Result<FrameStream> {
        let url = self.session_endpoint(id, Some("stream"))?;
        Ok(self.stream.connect(url.as_str()).await?)
    }
}
