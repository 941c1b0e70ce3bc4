//! Ordered list of known session summaries

use std::cmp::Reverse;

use crate::types::{Session, SessionId};

/// Session summaries, most recent first
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry with a fresh listing
    pub fn replace_all(&mut self, mut sessions: Vec<Session>) {
        // Stable, so the backend's order survives among equal or missing timestamps
        sessions.sort_by_key(|s| Reverse(s.created_at));
        self.sessions = sessions;
    }

    /// Insert a newly created session at the front
    pub fn prepend(&mut self, session: Session) {
        self.sessions.retain(|s| s.id != session.id);
        self.sessions.insert(0, session);
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let index = self.sessions.iter().position(|s| &s.id == id)?;
        Some(self.sessions.remove(index))
    }

    /// Replace the entry with the same id. Unknown ids are ignored.
    pub fn patch(&mut self, session: &Session) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(entry) if entry != session => {
                *entry = session.clone();
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionStatus;
    use chrono::{TimeZone, Utc};

    fn session(id: &str, day: Option<u32>) -> Session {
        Session {
            id: SessionId::from(id),
            topic: format!("topic {}", id),
            max_analysts: 3,
            status: SessionStatus::Pending,
            human_analyst_feedback: None,
            created_at: day.map(|d| Utc.with_ymd_and_hms(2025, 3, d, 9, 0, 0).unwrap()),
            updated_at: None,
            analysts: Vec::new(),
        }
    }

    fn ids(registry: &SessionRegistry) -> Vec<&str> {
        registry.sessions().iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_replace_all_sorts_newest_first() {
        let mut registry = SessionRegistry::new();
        registry.replace_all(vec![
            session("1", Some(1)),
            session("x", None),
            session("3", Some(3)),
            session("2", Some(2)),
        ]);
        assert_eq!(ids(&registry), vec!["3", "2", "1", "x"]);
    }

    #[test]
    fn test_prepend_and_remove() {
        let mut registry = SessionRegistry::new();
        registry.replace_all(vec![session("1", Some(1))]);
        registry.prepend(session("2", Some(2)));
        assert_eq!(ids(&registry), vec!["2", "1"]);

        assert!(registry.remove(&SessionId::from("2")).is_some());
        assert!(registry.remove(&SessionId::from("2")).is_none());
        assert_eq!(ids(&registry), vec!["1"]);
    }

    #[test]
    fn test_patch_ignores_unknown() {
        let mut registry = SessionRegistry::new();
        registry.replace_all(vec![session("1", Some(1))]);

        let mut updated = session("1", Some(1));
        updated.status = SessionStatus::Completed;
        assert!(registry.patch(&updated));
        assert_eq!(
            registry.get(&SessionId::from("1")).map(|s| s.status),
            Some(SessionStatus::Completed)
        );

        assert!(!registry.patch(&session("9", Some(9))));
        assert_eq!(registry.len(), 1);
    }
}
