use std::path::PathBuf;

use thiserror::Error;

/// Recoverable problems with the trigger rules resource.
///
/// These never fail a load: the store degrades to whatever it could read (or to the
/// built-in default) and hands the errors back so the caller can log them.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("rules file `{path}` was not found")]
    Missing { path: PathBuf },
    #[error("could not read rules file `{path}`: {source}")]
    Unreadable { path: PathBuf, source: std::io::Error },
    #[error("could not parse rules file `{path}` as json: {source}")]
    MalformedJson { path: PathBuf, source: serde_json::Error },
    #[error("could not parse rules file `{path}` as toml: {source}")]
    MalformedToml { path: PathBuf, source: toml::de::Error },
    #[error("trigger #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },
}

impl ConfigurationError {
    /// True when the whole resource was unusable and the built-in default is in effect.
    pub fn is_fatal_to_source(&self) -> bool {
        !matches!(self, Self::InvalidRule { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "missing",
            Self::Unreadable { .. } => "unreadable",
            Self::MalformedJson { .. } | Self::MalformedToml { .. } => "malformed",
            Self::InvalidRule { .. } => "invalid_rule",
        }
    }
}
