//! Cache for the report of the selected session

use crate::types::{Report, SessionId};

#[derive(Debug, Clone, Default)]
pub struct ReportHolder {
    cached: Option<Report>,
    pending: bool,
}

impl ReportHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached report, only if it belongs to `id`
    pub fn get(&self, id: &SessionId) -> Option<&Report> {
        self.cached.as_ref().filter(|r| &r.session_id == id)
    }

    pub fn current(&self) -> Option<&Report> {
        self.cached.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether a fetch for `id` should go out. `force` skips the cache.
    pub fn needs_fetch(&self, id: &SessionId, force: bool) -> bool {
        force || (self.get(id).is_none() && !self.pending)
    }

    pub fn begin_fetch(&mut self) {
        self.pending = true;
    }

    /// Record a fetch result. A missing report leaves the cache as it was.
    /// Returns true if the cached report changed.
    pub fn complete(&mut self, id: &SessionId, report: Option<Report>) -> bool {
        self.pending = false;
        match report {
            Some(report) if &report.session_id == id => {
                if self.cached.as_ref() == Some(&report) {
                    return false;
                }
                self.cached = Some(report);
                true
            }
            _ => false,
        }
    }

    pub fn fail(&mut self) {
        self.pending = false;
    }

    /// Drop the cached report; an in-flight fetch stays pending.
    /// Returns true if a report was dropped.
    pub fn clear(&mut self) -> bool {
        self.cached.take().is_some()
    }

    /// Forget everything, including any in-flight fetch
    pub fn reset(&mut self) {
        self.cached = None;
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(session: &str) -> Report {
        Report {
            id: Some("1".to_string()),
            session_id: SessionId::from(session),
            introduction: None,
            content: None,
            conclusion: None,
            final_report: "# Findings".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_cache_is_per_session() {
        let mut holder = ReportHolder::new();
        let id = SessionId::from("1");
        assert!(holder.needs_fetch(&id, false));

        holder.begin_fetch();
        assert!(!holder.needs_fetch(&id, false));
        assert!(holder.complete(&id, Some(report("1"))));
        assert!(!holder.needs_fetch(&id, false));
        assert!(holder.needs_fetch(&id, true));

        assert!(holder.get(&SessionId::from("2")).is_none());
        assert!(holder.needs_fetch(&SessionId::from("2"), false));
    }

    #[test]
    fn test_not_found_keeps_cache() {
        let mut holder = ReportHolder::new();
        let id = SessionId::from("1");
        holder.complete(&id, Some(report("1")));

        holder.begin_fetch();
        assert!(!holder.complete(&id, None));
        assert!(holder.get(&id).is_some());
        assert!(!holder.is_pending());
    }

    #[test]
    fn test_foreign_report_ignored() {
        let mut holder = ReportHolder::new();
        assert!(!holder.complete(&SessionId::from("1"), Some(report("2"))));
        assert!(holder.current().is_none());
    }
}
