use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use autoreply_core::{LoadReport, RuleSetHandle};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

/// Outcome of the most recent rules load, shared between reloads and the health check.
///
/// Reloads publish the new rule set while holding the outcome lock, so a reader never
/// pairs one load's rule count with another load's status.
#[derive(Clone, Debug)]
pub struct RulesSource {
    path: PathBuf,
    last_load: Arc<RwLock<LoadOutcome>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct LoadOutcome {
    degraded: bool,
    warnings: Vec<String>,
}

impl RulesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), last_load: Arc::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, report: &LoadReport) {
        *self.last_load.write().unwrap_or_else(PoisonError::into_inner) = LoadOutcome::of(report);
    }

    /// Re-reads the rules file, publishes it into `rules`, and records the outcome.
    pub fn reload(&self, rules: &RuleSetHandle) -> LoadReport {
        let mut last_load = self.last_load.write().unwrap_or_else(PoisonError::into_inner);
        let report = rules.reload(&self.path);
        *last_load = LoadOutcome::of(&report);
        report
    }

    fn snapshot(&self, rules: &RuleSetHandle) -> (usize, LoadOutcome) {
        let last_load = self.last_load.read().unwrap_or_else(PoisonError::into_inner);
        (rules.current().len(), last_load.clone())
    }
}

impl LoadOutcome {
    fn of(report: &LoadReport) -> Self {
        Self {
            degraded: report.is_degraded(),
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Clone)]
pub struct HealthState {
    pub rules: RuleSetHandle,
    pub source: RulesSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RulesCheck {
    pub status: &'static str,
    pub rule_count: usize,
    pub source: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rules: RulesCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let rules = rules_check(&state);
    let ready = rules.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        rules,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn rules_check(state: &HealthState) -> RulesCheck {
    let (rule_count, last_load) = state.source.snapshot(&state.rules);
    let source = state.source.path().display().to_string();

    if last_load.degraded {
        let reason = last_load.warnings.first().cloned().unwrap_or_default();
        return RulesCheck {
            status: "degraded",
            rule_count,
            source,
            detail: format!("answering with the built-in default response: {reason}"),
        };
    }

    let detail = match last_load.warnings.len() {
        0 => format!("{rule_count} rule(s) loaded"),
        flagged => format!("{rule_count} rule(s) loaded, {flagged} trigger warning(s)"),
    };
    RulesCheck { status: "ready", rule_count, source, detail }
}

#[cfg(test)]
mod tests {
    use autoreply_core::{RuleSetHandle, RuleStore, RulesFormat};
    use axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState, RulesSource};

    fn state_for(raw: Option<&str>) -> HealthState {
        let source = RulesSource::new("responses.json");
        let report = match raw {
            Some(raw) => RuleStore::parse(raw, RulesFormat::Json),
            None => RuleStore::load(std::path::Path::new("/nonexistent/autoreply/responses.json")),
        };
        source.record(&report);
        HealthState { rules: RuleSetHandle::new(report.rule_set), source }
    }

    #[tokio::test]
    async fn health_returns_ready_when_rules_loaded() {
        let state = state_for(Some(
            r#"{"triggers":[{"keywords":["hi"],"response":"Hello!"}],"default_response":"?"}"#,
        ));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.rules.status, "ready");
        assert_eq!(payload.rules.rule_count, 1);
        assert_eq!(payload.rules.source, "responses.json");
    }

    #[tokio::test]
    async fn trigger_warnings_are_reported_but_stay_ready() {
        let state = state_for(Some(
            r#"{"triggers":[{"keywords":["hi"],"response":"Hello!"},{"keywords":["x"]}]}"#,
        ));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(payload.rules.detail.contains("2 rule(s) loaded, 1 trigger warning(s)"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_rules_file_is_missing() {
        let (status, Json(payload)) = health(State(state_for(None))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.rules.status, "degraded");
        assert_eq!(payload.rules.rule_count, 0);
    }

    #[tokio::test]
    async fn reload_publishes_rules_and_outcome_together() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.json");
        std::fs::write(&path, r#"{"triggers":[{"keywords":["hi"],"response":"Hello!"}]}"#)
            .expect("write rules");

        let source = RulesSource::new(&path);
        let rules = RuleSetHandle::default();
        source.record(&RuleStore::load(&path));
        let state = HealthState { rules: rules.clone(), source: source.clone() };

        let report = source.reload(&rules);
        assert!(report.is_clean());
        let (status, Json(payload)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.rules.rule_count, 1);

        std::fs::remove_file(&path).expect("remove rules");
        let report = source.reload(&rules);
        assert!(report.is_degraded());
        let (status, Json(payload)) = health(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.rules.rule_count, 0);
    }

    #[tokio::test]
    async fn router_serves_health_route() {
        let response = router(state_for(Some(r#"{"triggers":[]}"#)))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
