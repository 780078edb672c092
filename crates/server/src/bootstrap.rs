use std::path::Path;
use std::sync::Arc;

use autoreply_core::config::{AppConfig, ConfigError};
use autoreply_core::{LoadReport, RuleSetHandle, RuleStore};
use autoreply_telegram::polling::TransportError;
use autoreply_telegram::{
    default_dispatcher, BotApiSettings, BotApiTransport, BotIdentity, PollingRunner,
    ReconnectPolicy, SystemClock,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::health::RulesSource;

pub struct Application {
    pub config: AppConfig,
    pub rules: RuleSetHandle,
    pub rules_source: RulesSource,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("telegram transport setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let rules_source = RulesSource::new(&config.responses.path);
    let report = RuleStore::load(rules_source.path());
    log_load_report(&report, rules_source.path(), "bootstrap");
    rules_source.record(&report);
    let rules = RuleSetHandle::new(report.rule_set);

    let identity = BotIdentity::default();
    let transport = BotApiTransport::new(
        BotApiSettings {
            base_url: config.telegram.api_base_url.clone(),
            bot_token: config.telegram.bot_token.clone(),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
        },
        identity.clone(),
    )
    .map_err(BootstrapError::Transport)?;
    info!(
        event_name = "system.bootstrap.transport_ready",
        correlation_id = "bootstrap",
        api_base_url = %config.telegram.api_base_url,
        poll_timeout_secs = config.telegram.poll_timeout_secs,
        "telegram transport configured"
    );

    let dispatcher = default_dispatcher(rules.clone(), Arc::new(SystemClock), identity);
    let runner = PollingRunner::new(Arc::new(transport), dispatcher, ReconnectPolicy::default());

    Ok(Application { config, rules, rules_source, runner })
}

/// Logs a rules load: one warning per problem, then a summary line.
pub fn log_load_report(report: &LoadReport, source: &Path, correlation_id: &str) {
    for warning in &report.warnings {
        warn!(
            event_name = "system.rules.warning",
            correlation_id,
            kind = warning.kind(),
            source = %source.display(),
            error = %warning,
            "rules resource problem"
        );
    }

    if report.is_degraded() {
        warn!(
            event_name = "system.rules.degraded",
            correlation_id,
            source = %source.display(),
            default_response = report.rule_set.default_response(),
            "rules unavailable; answering every message with the built-in default"
        );
    } else {
        info!(
            event_name = "system.rules.loaded",
            correlation_id,
            source = %source.display(),
            rule_count = report.rule_set.len(),
            warnings = report.warnings.len(),
            "rules loaded"
        );
    }
}
