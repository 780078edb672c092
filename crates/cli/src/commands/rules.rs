use std::path::PathBuf;

use autoreply_core::RuleStore;
use serde_json::json;

use crate::commands::{rules_path, CommandResult};

pub fn run(path: Option<PathBuf>) -> CommandResult {
    let path = match rules_path("rules", path) {
        Ok(path) => path,
        Err(result) => return result,
    };

    let report = RuleStore::load(&path);
    let warnings: Vec<String> = report.warnings.iter().map(ToString::to_string).collect();

    if report.is_degraded() {
        let error_class = report.warnings.first().map_or("missing", |warning| warning.kind());
        return CommandResult::failure(
            "rules",
            error_class,
            format!(
                "rules unavailable, the bot would answer with `{}`: {}",
                report.rule_set.default_response(),
                warnings.join("; ")
            ),
            2,
        );
    }

    let rules: Vec<_> = report
        .rule_set
        .rules()
        .iter()
        .map(|rule| json!({ "keywords": rule.keywords(), "response": rule.response() }))
        .collect();

    CommandResult::success_with_details(
        "rules",
        format!(
            "loaded {} rule(s) from `{}` with {} warning(s)",
            report.rule_set.len(),
            path.display(),
            warnings.len()
        ),
        json!({
            "source": path.display().to_string(),
            "rule_count": report.rule_set.len(),
            "default_response": report.rule_set.default_response(),
            "rules": rules,
            "warnings": warnings,
        }),
    )
}
