use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use autoreply_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let bot_token = redact_token(config.telegram.bot_token.expose_secret());
    let fields = [
        (
            "telegram.bot_token",
            bot_token,
            source(
                "telegram.bot_token",
                &["AUTOREPLY_TELEGRAM_BOT_TOKEN", "AUTOREPLY_BOT_TOKEN"],
            ),
        ),
        (
            "telegram.api_base_url",
            config.telegram.api_base_url.clone(),
            source("telegram.api_base_url", &["AUTOREPLY_TELEGRAM_API_BASE_URL"]),
        ),
        (
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            source("telegram.poll_timeout_secs", &["AUTOREPLY_TELEGRAM_POLL_TIMEOUT_SECS"]),
        ),
        (
            "responses.path",
            config.responses.path.display().to_string(),
            source("responses.path", &["AUTOREPLY_RESPONSES_PATH"]),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", &["AUTOREPLY_SERVER_BIND_ADDRESS"]),
        ),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            source("server.health_check_port", &["AUTOREPLY_SERVER_HEALTH_CHECK_PORT"]),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", &["AUTOREPLY_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["AUTOREPLY_LOGGING_LEVEL", "AUTOREPLY_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["AUTOREPLY_LOGGING_FORMAT", "AUTOREPLY_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|(key, value, source)| render_line(key, value, source)));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("autoreply.toml"), PathBuf::from("config/autoreply.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id and hides the secret half of `<bot id>:<secret>`.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}
