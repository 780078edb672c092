//! Keyword-triggered auto-reply engine.
//!
//! - `rules` loads an ordered list of trigger rules plus a default response.
//! - `resolver` picks the first matching rule for a message and renders it.
//! - `handle` publishes rule sets atomically so reloads never disturb readers.
//! - `config` is the layered application configuration shared by the binaries.

pub mod config;
pub mod errors;
pub mod handle;
pub mod resolver;
pub mod rules;

pub use errors::ConfigurationError;
pub use handle::RuleSetHandle;
pub use resolver::{
    render, resolve, resolve_with_selection, select, RenderContext, Resolution, Selection,
};
pub use rules::{
    LoadReport, Rule, RuleSet, RuleStore, RulesFormat, FALLBACK_DEFAULT_RESPONSE,
    MISSING_DEFAULT_RESPONSE,
};
