//! Per-session generation state: progress, error and the ordered result list.
//!
//! A [`SessionHandle`] is shared between the orchestrator and whoever renders
//! the session. Locks are only held for the duration of a single mutation,
//! never across a network await.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::GeneratedImage;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    pub is_generating: bool,
    pub progress_percent: u8,
    pub error: Option<String>,
    pub results: Vec<GeneratedImage>,
}

impl GenerationSession {
    /// Flips `is_selected` on the matching result. Returns false when the id is unknown.
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        match self.results.iter_mut().find(|img| img.id == id) {
            Some(img) => {
                img.is_selected = !img.is_selected;
                true
            }
            None => false,
        }
    }

    /// Marks every matching result as downloaded; unknown ids are ignored. Returns how many matched.
    pub fn mark_downloaded<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        let ids: HashSet<&str> = ids.into_iter().collect();
        let mut matched = 0;
        for img in self.results.iter_mut().filter(|img| ids.contains(img.id.as_str())) {
            img.is_downloaded = true;
            matched += 1;
        }
        matched
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn selected(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.results.iter().filter(|img| img.is_selected)
    }

    pub fn find(&self, id: &str) -> Option<&GeneratedImage> {
        self.results.iter().find(|img| img.id == id)
    }
}

/// What happened during a run, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    Started { count: u32 },
    ImageAdded { id: String },
    Progress { percent: u8 },
    Failed { message: String },
    Finished,
}

#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<RwLock<GenerationSession>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state: Arc::default(), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> GenerationSession {
        self.state.read().clone()
    }

    pub fn is_generating(&self) -> bool {
        self.state.read().is_generating
    }

    pub fn progress(&self) -> u8 {
        self.state.read().progress_percent
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn results(&self) -> Vec<GeneratedImage> {
        self.state.read().results.clone()
    }

    pub fn toggle_selection(&self, id: &str) -> bool {
        self.state.write().toggle_selection(id)
    }

    pub fn mark_downloaded<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        self.state.write().mark_downloaded(ids)
    }

    pub fn clear_results(&self) {
        self.state.write().clear_results();
    }

    pub fn clear_error(&self) {
        self.state.write().clear_error();
    }

    /// Runs `f` under the write lock. Keep `f` synchronous and short.
    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut GenerationSession) -> T) -> T {
        f(&mut self.state.write())
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(n: usize) -> GenerationSession {
        GenerationSession {
            results: (0..n).map(|_| GeneratedImage::from_payload("AAAA")).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn toggle_flips_only_the_matching_image() {
        let mut s = session_with(3);
        let id = s.results[1].id.clone();
        assert!(s.toggle_selection(&id));
        assert!(s.results[1].is_selected);
        assert!(!s.results[0].is_selected && !s.results[2].is_selected);
        assert!(s.toggle_selection(&id));
        assert!(!s.results[1].is_selected);
    }

    #[test]
    fn toggle_unknown_id_is_a_noop() {
        let mut s = session_with(2);
        let before = s.clone();
        assert!(!s.toggle_selection("gen-missing"));
        assert_eq!(s, before);
    }

    #[test]
    fn mark_downloaded_ignores_unknown_ids() {
        let mut s = session_with(3);
        let first = s.results[0].id.clone();
        let last = s.results[2].id.clone();
        let matched = s.mark_downloaded([first.as_str(), "gen-nope", last.as_str()]);
        assert_eq!(matched, 2);
        let flags: Vec<bool> = s.results.iter().map(|i| i.is_downloaded).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn clear_error_keeps_results() {
        let mut s = session_with(2);
        s.error = Some("boom".into());
        s.clear_error();
        assert!(s.error.is_none());
        assert_eq!(s.results.len(), 2);
        s.clear_results();
        assert!(s.results.is_empty());
    }

    #[test]
    fn handle_snapshots_are_detached() {
        let handle = SessionHandle::new();
        handle.update(|s| s.results.push(GeneratedImage::from_payload("AAAA")));
        let snap = handle.snapshot();
        handle.clear_results();
        assert_eq!(snap.results.len(), 1);
        assert!(handle.results().is_empty());
    }
}
