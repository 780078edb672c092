use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::rules::{LoadReport, RuleSet, RuleStore};

/// Shared pointer to the active rule set.
///
/// Published rule sets are never mutated; a reload swaps in a new `Arc` and readers
/// that already hold a snapshot keep resolving against it.
#[derive(Clone, Debug)]
pub struct RuleSetHandle {
    current: Arc<RwLock<Arc<RuleSet>>>,
}

impl RuleSetHandle {
    pub fn new(rule_set: RuleSet) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(rule_set))) }
    }

    pub fn current(&self) -> Arc<RuleSet> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Publishes `rule_set` and returns the instance it replaced.
    pub fn replace(&self, rule_set: RuleSet) -> Arc<RuleSet> {
        let next = Arc::new(rule_set);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Loads `source` and publishes the result, degraded or not.
    pub fn reload(&self, source: &Path) -> LoadReport {
        let report = RuleStore::load(source);
        self.replace(report.rule_set.clone());
        report
    }
}

impl Default for RuleSetHandle {
    fn default() -> Self {
        Self::new(RuleSet::fallback())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::RuleSetHandle;
    use crate::resolver::{resolve, RenderContext};
    use crate::rules::{Rule, RuleSet, FALLBACK_DEFAULT_RESPONSE};

    fn one_rule(keyword: &str, response: &str) -> RuleSet {
        RuleSet::new(vec![Rule::new([keyword], response)], "default")
    }

    #[test]
    fn replace_publishes_new_snapshot_and_keeps_old_one_intact() {
        let handle = RuleSetHandle::new(one_rule("hi", "first"));
        let before = handle.current();

        let previous = handle.replace(one_rule("hi", "second"));
        let after = handle.current();
        let context = RenderContext::default();

        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(resolve("hi", &context, &before), "first");
        assert_eq!(resolve("hi", &context, &after), "second");
    }

    #[test]
    fn clones_observe_the_same_published_rule_set() {
        let handle = RuleSetHandle::default();
        let clone = handle.clone();

        handle.replace(one_rule("ping", "pong"));

        assert_eq!(clone.current().len(), 1);
    }

    #[test]
    fn reload_publishes_file_contents() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.json");
        fs::write(&path, r#"{"triggers":[{"keywords":["ping"],"response":"pong"}]}"#)
            .expect("write rules");
        let handle = RuleSetHandle::default();

        let report = handle.reload(&path);

        assert!(report.is_clean());
        assert_eq!(resolve("PING", &RenderContext::default(), &handle.current()), "pong");
    }

    #[test]
    fn reload_of_missing_file_publishes_fallback() {
        let dir = TempDir::new().expect("tempdir");
        let handle = RuleSetHandle::new(one_rule("ping", "pong"));

        let report = handle.reload(&dir.path().join("gone.json"));

        assert!(report.is_degraded());
        assert!(handle.current().is_empty());
        assert_eq!(handle.current().default_response(), FALLBACK_DEFAULT_RESPONSE);
    }

    #[test]
    fn concurrent_readers_see_complete_rule_sets() {
        let handle = RuleSetHandle::new(one_rule("a", "a"));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = handle.current();
                        assert_eq!(snapshot.len(), 1);
                    }
                })
            })
            .collect();

        for round in 0..50 {
            handle.replace(one_rule("a", &format!("round-{round}")));
        }
        for reader in readers {
            reader.join().expect("reader thread");
        }
    }
}
