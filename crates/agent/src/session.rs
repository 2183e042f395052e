//! Per-conversation state owned by the caller.

use std::collections::HashMap;
use tessera_core::emotion::EmotionalSummary;
use tessera_core::thread::ThreadId;

use crate::emotion::{EmotionParams, EmotionalStateTracker};

/// State that persists between turns of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    thread_id: ThreadId,
    tracker: EmotionalStateTracker,
}

impl ConversationSession {
    pub fn new(thread_id: ThreadId, params: EmotionParams) -> Self {
        Self {
            thread_id,
            tracker: EmotionalStateTracker::new(params),
        }
    }

    /// Resume with an existing tracker.
    pub fn with_tracker(thread_id: ThreadId, tracker: EmotionalStateTracker) -> Self {
        Self { thread_id, tracker }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn tracker(&self) -> &EmotionalStateTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut EmotionalStateTracker {
        &mut self.tracker
    }

    pub fn emotional_summary(&self) -> EmotionalSummary {
        self.tracker.summary()
    }
}

/// Sessions keyed by thread, created on first use.
///
/// Not internally synchronized; wrap in a lock if several tasks share it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    params: EmotionParams,
    sessions: HashMap<ThreadId, ConversationSession>,
}

impl SessionRegistry {
    pub fn new(params: EmotionParams) -> Self {
        Self {
            params,
            sessions: HashMap::new(),
        }
    }

    /// The session for `thread_id`, creating it if needed.
    pub fn session(&mut self, thread_id: &ThreadId) -> &mut ConversationSession {
        let params = self.params;
        self.sessions
            .entry(thread_id.clone())
            .or_insert_with(|| ConversationSession::new(thread_id.clone(), params))
    }

    pub fn get(&self, thread_id: &ThreadId) -> Option<&ConversationSession> {
        self.sessions.get(thread_id)
    }

    /// Diagnostic snapshot; `None` for threads never seen.
    pub fn emotional_summary(&self, thread_id: &ThreadId) -> Option<EmotionalSummary> {
        self.sessions.get(thread_id).map(|s| s.emotional_summary())
    }

    pub fn remove(&mut self, thread_id: &ThreadId) -> Option<ConversationSession> {
        self.sessions.remove(thread_id)
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
    use chrono::Utc;
    use tessera_core::emotion::EmotionKind;

    #[test]
    fn sessions_are_created_once_per_thread() {
        let mut registry = SessionRegistry::default();
        let a = ThreadId::from("a");

        registry
            .session(&a)
            .tracker_mut()
            .observe("this is urgent", 1, Utc::now());
        registry.session(&a);
        registry.session(&ThreadId::from("b"));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.emotional_summary(&a).unwrap().state,
            EmotionKind::Urgent
        );
    }

    #[test]
    fn unknown_thread_has_no_summary() {
        let registry = SessionRegistry::default();
        assert!(registry.emotional_summary(&ThreadId::from("nope")).is_none());
    }

    #[test]
    fn threads_do_not_share_state() {
        let mut registry = SessionRegistry::default();
        let a = ThreadId::from("a");
        let b = ThreadId::from("b");

        registry
            .session(&a)
            .tracker_mut()
            .observe("I'm confused", 1, Utc::now());

        assert_eq!(registry.emotional_summary(&a).unwrap().state, EmotionKind::Confused);
        assert_eq!(registry.session(&b).tracker().state(), EmotionKind::Neutral);
    }
}
