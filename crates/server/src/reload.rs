use autoreply_core::RuleSetHandle;
use tracing::info;

use crate::bootstrap::log_load_report;
use crate::health::RulesSource;

/// Re-reads the rules file and publishes the result.
pub fn reload_rules(rules: &RuleSetHandle, source: &RulesSource) {
    info!(
        event_name = "system.rules.reload",
        correlation_id = "reload",
        source = %source.path().display(),
        "reloading rules"
    );
    let report = source.reload(rules);
    log_load_report(&report, source.path(), "reload");
}

/// Reloads rules every time the process receives SIGHUP.
#[cfg(unix)]
pub fn spawn(rules: RuleSetHandle, source: RulesSource) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            reload_rules(&rules, &source);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
pub fn spawn(_rules: RuleSetHandle, _source: RulesSource) -> std::io::Result<()> {
    tracing::warn!(
        event_name = "system.rules.reload_unavailable",
        "SIGHUP rule reload is only available on unix"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use autoreply_core::{RuleSetHandle, RuleStore};
    use tempfile::TempDir;

    use super::reload_rules;
    use crate::health::RulesSource;

    #[test]
    fn reload_publishes_new_rules_and_records_outcome() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.json");
        fs::write(&path, r#"{"triggers":[{"keywords":["a"],"response":"A"}]}"#).expect("write");

        let source = RulesSource::new(&path);
        let report = RuleStore::load(&path);
        source.record(&report);
        let rules = RuleSetHandle::new(report.rule_set);
        assert_eq!(rules.current().len(), 1);

        fs::write(
            &path,
            r#"{"triggers":[{"keywords":["a"],"response":"A"},{"keywords":["b"],"response":"B"}]}"#,
        )
        .expect("rewrite");
        reload_rules(&rules, &source);

        assert_eq!(rules.current().len(), 2);
    }

    #[test]
    fn reload_of_deleted_file_degrades_to_default() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.json");
        fs::write(&path, r#"{"triggers":[{"keywords":["a"],"response":"A"}]}"#).expect("write");
        let source = RulesSource::new(&path);
        let rules = RuleSetHandle::new(RuleStore::load(&path).rule_set);

        fs::remove_file(&path).expect("remove");
        reload_rules(&rules, &source);

        assert!(rules.current().is_empty());
    }
}
