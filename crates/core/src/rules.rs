//! Trigger rules and the store that loads them.
//!
//! A rules resource looks like this (JSON shown, TOML uses the same field names):
//!
//! ```text
//! {
//!   "triggers": [ { "keywords": ["hello", "hi"], "response": "Hey {name}!" } ],
//!   "default_response": "I received your message!"
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// Default reply when the rules resource is absent, unreadable, or malformed.
pub const FALLBACK_DEFAULT_RESPONSE: &str = "Hello! How can I help you?";

/// Default reply when the resource parses but does not define `default_response`.
pub const MISSING_DEFAULT_RESPONSE: &str = "I received your message!";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rule {
    keywords: Vec<String>,
    response: Option<String>,
}

impl Rule {
    /// Builds a rule, lowercasing keywords.
    ///
    /// An empty response is kept as "no response": the rule still claims its
    /// position, and a message it matches is answered with the default response.
    pub fn new<I, K>(keywords: I, response: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keywords = keywords.into_iter().map(|keyword| keyword.as_ref().to_lowercase()).collect();
        let response = response.into();

        Self { keywords, response: (!response.is_empty()).then_some(response) }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// `lowered_text` must already be lowercase. An empty keyword matches everything.
    pub fn matches(&self, lowered_text: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered_text.contains(keyword.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default_response: String,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, default_response: impl Into<String>) -> Self {
        Self { rules, default_response: default_response.into() }
    }

    /// Empty rule set answering every message with [`FALLBACK_DEFAULT_RESPONSE`].
    pub fn fallback() -> Self {
        Self::new(Vec::new(), FALLBACK_DEFAULT_RESPONSE)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default_response(&self) -> &str {
        &self.default_response
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::fallback()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RulesFormat {
    Json,
    Toml,
}

impl RulesFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Result of a load: always a usable rule set, plus anything worth logging.
#[derive(Debug)]
pub struct LoadReport {
    pub rule_set: RuleSet,
    pub warnings: Vec<ConfigurationError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// True when the resource itself could not be used and the fallback is active.
    pub fn is_degraded(&self) -> bool {
        self.warnings.iter().any(ConfigurationError::is_fatal_to_source)
    }

    fn fallback(warning: ConfigurationError) -> Self {
        Self { rule_set: RuleSet::fallback(), warnings: vec![warning] }
    }
}

pub struct RuleStore;

impl RuleStore {
    pub fn load(source: &Path) -> LoadReport {
        let raw = match fs::read_to_string(source) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return LoadReport::fallback(ConfigurationError::Missing {
                    path: source.to_path_buf(),
                });
            }
            Err(error) => {
                return LoadReport::fallback(ConfigurationError::Unreadable {
                    path: source.to_path_buf(),
                    source: error,
                });
            }
        };

        Self::parse_from(&raw, RulesFormat::from_path(source), source.to_path_buf())
    }

    pub fn parse(raw: &str, format: RulesFormat) -> LoadReport {
        Self::parse_from(raw, format, PathBuf::from("<inline>"))
    }

    fn parse_from(raw: &str, format: RulesFormat, path: PathBuf) -> LoadReport {
        let document = match format {
            RulesFormat::Json => serde_json::from_str::<RulesDocument>(raw)
                .map_err(|source| ConfigurationError::MalformedJson { path, source }),
            RulesFormat::Toml => toml::from_str::<RulesDocument>(raw)
                .map_err(|source| ConfigurationError::MalformedToml { path, source }),
        };

        match document {
            Ok(document) => document.into_report(),
            Err(error) => LoadReport::fallback(error),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RulesDocument {
    triggers: Option<Vec<TriggerDocument>>,
    default_response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TriggerDocument {
    keywords: Option<Vec<String>>,
    response: Option<String>,
}

impl RulesDocument {
    fn into_report(self) -> LoadReport {
        let mut warnings = Vec::new();
        let mut rules = Vec::new();

        for (index, trigger) in self.triggers.unwrap_or_default().into_iter().enumerate() {
            let rule = Rule::new(
                trigger.keywords.unwrap_or_default(),
                trigger.response.unwrap_or_default(),
            );

            let invalid = |reason: &str| ConfigurationError::InvalidRule {
                index,
                reason: reason.to_owned(),
            };
            if rule.response().is_none() {
                warnings.push(invalid(
                    "response is missing or empty; matches get the default response",
                ));
            }
            if rule.keywords().is_empty() {
                warnings.push(invalid("no keywords; the trigger never matches"));
            } else if rule.keywords().iter().any(String::is_empty) {
                warnings.push(invalid("empty keyword; the trigger matches every message"));
            }

            rules.push(rule);
        }

        let default_response = self
            .default_response
            .filter(|response| !response.trim().is_empty())
            .unwrap_or_else(|| MISSING_DEFAULT_RESPONSE.to_owned());

        LoadReport { rule_set: RuleSet::new(rules, default_response), warnings }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{
        Rule, RuleStore, RulesFormat, FALLBACK_DEFAULT_RESPONSE, MISSING_DEFAULT_RESPONSE,
    };
    use crate::errors::ConfigurationError;

    #[test]
    fn missing_file_degrades_to_builtin_default() {
        let dir = TempDir::new().expect("tempdir");
        let report = RuleStore::load(&dir.path().join("responses.json"));

        assert!(report.rule_set.is_empty());
        assert_eq!(report.rule_set.default_response(), FALLBACK_DEFAULT_RESPONSE);
        assert!(report.is_degraded());
        assert!(matches!(report.warnings.as_slice(), [ConfigurationError::Missing { .. }]));
    }

    #[test]
    fn malformed_json_degrades_to_builtin_default() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.json");
        fs::write(&path, "{ \"triggers\": [ {").expect("write rules");

        let report = RuleStore::load(&path);

        assert!(report.rule_set.is_empty());
        assert_eq!(report.rule_set.default_response(), FALLBACK_DEFAULT_RESPONSE);
        assert!(matches!(report.warnings.as_slice(), [ConfigurationError::MalformedJson { .. }]));
    }

    #[test]
    fn loads_json_rules_in_declaration_order_with_lowercased_keywords() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.json");
        fs::write(
            &path,
            r#"{
  "triggers": [
    { "keywords": ["Hello", "HI"], "response": "Hey {name}!" },
    { "keywords": ["price"], "response": "See our pricing page." }
  ],
  "default_response": "I received your message!"
}"#,
        )
        .expect("write rules");

        let report = RuleStore::load(&path);

        assert!(report.is_clean());
        let rules = report.rule_set.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].keywords(), ["hello", "hi"]);
        assert_eq!(rules[0].response(), Some("Hey {name}!"));
        assert_eq!(rules[1].keywords(), ["price"]);
        assert_eq!(report.rule_set.default_response(), "I received your message!");
    }

    #[test]
    fn loads_toml_rules_by_extension() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("responses.toml");
        fs::write(
            &path,
            r#"
default_response = "Noted."

[[triggers]]
keywords = ["Thanks"]
response = "You're welcome, {name}."
"#,
        )
        .expect("write rules");

        let report = RuleStore::load(&path);

        assert!(report.is_clean());
        assert_eq!(report.rule_set.rules()[0].keywords(), ["thanks"]);
        assert_eq!(report.rule_set.default_response(), "Noted.");
    }

    #[test]
    fn absent_fields_fall_back_without_failing() {
        let report = RuleStore::parse("{}", RulesFormat::Json);

        assert!(report.is_clean());
        assert!(report.rule_set.is_empty());
        assert_eq!(report.rule_set.default_response(), MISSING_DEFAULT_RESPONSE);
    }

    #[test]
    fn questionable_triggers_keep_their_position_and_are_reported() {
        let report = RuleStore::parse(
            r#"{
  "triggers": [
    { "keywords": [], "response": "never" },
    { "keywords": ["ok"] },
    { "keywords": ["", "bye"], "response": "Bye!" },
    { "keywords": ["fine"], "response": "Good." }
  ]
}"#,
            RulesFormat::Json,
        );

        assert!(!report.is_degraded());
        assert_eq!(report.rule_set.len(), 4);
        assert_eq!(report.rule_set.rules()[1].response(), None);
        assert_eq!(report.rule_set.rules()[2].keywords(), ["", "bye"]);

        let flagged: Vec<usize> = report
            .warnings
            .iter()
            .filter_map(|warning| match warning {
                ConfigurationError::InvalidRule { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(flagged, vec![0, 1, 2]);
    }

    #[test]
    fn rule_matching_follows_keyword_contents() {
        assert!(!Rule::new(Vec::<String>::new(), "x").matches("anything"));
        assert!(Rule::new([""], "x").matches("anything"));
        assert_eq!(Rule::new(["hi"], "").response(), None);
        assert!(Rule::new(["HI"], "x").matches("oh hi there"));
    }

    #[test]
    fn format_is_selected_from_extension() {
        assert_eq!(RulesFormat::from_path("rules.TOML".as_ref()), RulesFormat::Toml);
        assert_eq!(RulesFormat::from_path("responses.json".as_ref()), RulesFormat::Json);
        assert_eq!(RulesFormat::from_path("responses".as_ref()), RulesFormat::Json);
    }
}
