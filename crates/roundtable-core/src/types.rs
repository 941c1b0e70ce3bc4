//! Wire and domain types shared with the research backend

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Fewest analysts a session may request
pub const MIN_ANALYSTS: u32 = 1;
/// Most analysts a session may request
pub const MAX_ANALYSTS: u32 = 5;

/// Opaque session identifier.
///
/// The backend sends numeric ids; they are carried as strings so the client
/// never depends on their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
    }
}

/// Identifier as it appears on the wire: number or string
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(RawId::into_string)
}

fn optional_id_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(RawId::into_string))
}

/// Lifecycle status of a research session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    AwaitingFeedback,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::AwaitingFeedback => "awaiting_feedback",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// The report has been produced and no further events are expected
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// No further work will happen on the backend
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "awaiting_feedback" => Ok(Self::AwaitingFeedback),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Validation(format!("Unknown session status: {}", other))),
        }
    }
}

/// A generated analyst persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyst {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub description: String,
}

/// One research run, as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub topic: String,
    #[serde(default)]
    pub max_analysts: u32,
    pub status: SessionStatus,
    /// Absent until the user reviewed the analyst team
    #[serde(default)]
    pub human_analyst_feedback: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub analysts: Vec<Analyst>,
}

impl Session {
    pub fn has_analysts(&self) -> bool {
        !self.analysts.is_empty()
    }

    pub fn has_feedback(&self) -> bool {
        self.human_analyst_feedback.is_some()
    }
}

/// Final composed report for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, deserialize_with = "optional_id_string")]
    pub id: Option<String>,
    pub session_id: SessionId,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    /// Markdown text of the whole report
    pub final_report: String,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /sessions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub topic: String,
    pub max_analysts: u32,
}

impl CreateSessionRequest {
    /// Build a request, rejecting blank topics and out-of-range analyst counts
    pub fn new(topic: &str, max_analysts: u32) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::Validation("Please enter a research topic".to_string()));
        }
        if !(MIN_ANALYSTS..=MAX_ANALYSTS).contains(&max_analysts) {
            return Err(Error::Validation(format!(
                "Number of analysts must be between {} and {}",
                MIN_ANALYSTS, MAX_ANALYSTS
            )));
        }

        Ok(Self {
            topic: topic.to_string(),
            max_analysts,
        })
    }
}

/// Body of `POST /sessions/{id}/feedback`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

/// Acknowledgement returned for a feedback submission
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedbackAck {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Response of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 as well as the naive ISO form (no offset) the backend
/// emits, which is taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_timestamp))
    }
}
