//! Observers notified of every pre-call decision.

use std::sync::Arc;

use governor_policy::{Decision, DecisionKind};
use governor_primitives::SessionId;
use tracing::{debug, info, warn};

/// Observer invoked whenever the pre-call hook reaches a decision.
pub trait DecisionObserver: Send + Sync {
    /// Records the decision reached for `tool`.
    fn on_decision(&self, session: Option<&SessionId>, tool: &str, decision: &Decision);
}

/// Observer that emits decisions to the tracing system.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDecisionObserver;

impl DecisionObserver for TracingDecisionObserver {
    fn on_decision(&self, session: Option<&SessionId>, tool: &str, decision: &Decision) {
        let session = session.map_or("-", SessionId::as_str);
        let reason = decision.reason().unwrap_or_default();
        match decision.kind() {
            DecisionKind::Allow => debug!(session, tool, "governor allow"),
            DecisionKind::Correct => info!(session, tool, "governor correct"),
            DecisionKind::Deny => warn!(session, tool, reason, "governor deny"),
            DecisionKind::Escalate => warn!(session, tool, reason, "governor escalate"),
        }
    }
}

/// Observer that fans out to a list of observers.
#[derive(Default, Clone)]
pub struct CompositeDecisionObserver {
    observers: Vec<Arc<dyn DecisionObserver>>,
}

impl CompositeDecisionObserver {
    /// Creates a composite observer from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn DecisionObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer to the set.
    pub fn push(&mut self, observer: Arc<dyn DecisionObserver>) {
        self.observers.push(observer);
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true when no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl DecisionObserver for CompositeDecisionObserver {
    fn on_decision(&self, session: Option<&SessionId>, tool: &str, decision: &Decision) {
        for observer in &self.observers {
            observer.on_decision(session, tool, decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl DecisionObserver for Recording {
        fn on_decision(&self, _session: Option<&SessionId>, tool: &str, decision: &Decision) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{tool}:{}", decision.kind()));
        }
    }

    #[test]
    fn composite_fans_out_in_order() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let mut composite =
            CompositeDecisionObserver::new([first.clone() as Arc<dyn DecisionObserver>]);
        composite.push(second.clone());
        composite.push(Arc::new(TracingDecisionObserver));
        assert_eq!(composite.len(), 3);

        composite.on_decision(None, "Read", &Decision::allow(None));
        composite.on_decision(None, "Bash", &Decision::deny("r", "m"));

        assert_eq!(*first.0.lock().unwrap(), vec!["Read:allow", "Bash:deny"]);
        assert_eq!(*second.0.lock().unwrap(), vec!["Read:allow", "Bash:deny"]);
    }
}
