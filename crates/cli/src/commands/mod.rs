pub mod config;
pub mod doctor;
pub mod reply;
pub mod rules;

use std::path::PathBuf;

use autoreply_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success_with_details(command: &str, message: impl Into<String>, details: Value) -> Self {
        Self::with_status(command, "ok", None, message, Some(details), 0)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::with_status(command, "error", Some(error_class), message, None, exit_code)
    }

    fn with_status(
        command: &str,
        status: &str,
        error_class: Option<&str>,
        message: impl Into<String>,
        details: Option<Value>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class: error_class.map(str::to_string),
            message: message.into(),
            details,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// `--path` wins; otherwise the rules file comes from the effective configuration.
pub(crate) fn rules_path(command: &str, explicit: Option<PathBuf>) -> Result<PathBuf, CommandResult> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    AppConfig::load(LoadOptions::default()).map(|config| config.responses.path).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error} (pass --path to skip config loading)"),
            3,
        )
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
