//! Raw server-sent event frames

use crate::DEFAULT_LABEL;

/// A single server-sent event as received on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event label; `None` when the frame carried no `event:` field
    pub label: Option<String>,
    /// Concatenated `data:` lines
    pub data: String,
    /// Last event id, if the server sent one
    pub id: Option<String>,
}

impl Frame {
    /// Create a frame without an event label
    pub fn unlabeled(data: impl Into<String>) -> Self {
        Self {
            label: None,
            data: data.into(),
            id: None,
        }
    }

    /// Create a frame with an explicit event label
    pub fn labeled(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            data: data.into(),
            id: None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl From<eventsource_stream::Event> for Frame {
    fn from(event: eventsource_stream::Event) -> Self {
        // An absent `event:` field and an explicit `event: message` are the
        // same thing on the wire.
        let label = if event.event.is_empty() || event.event == DEFAULT_LABEL {
            None
        } else {
            Some(event.event)
        };
        let id = if event.id.is_empty() { None } else { Some(event.id) };

        Self {
            label,
            data: event.data,
            id,
        }
    }
}
