use std::path::PathBuf;

use autoreply_core::resolver::TIME_FORMAT;
use autoreply_core::{resolve_with_selection, RenderContext, RuleStore, Selection};
use chrono::Local;
use serde_json::json;

use crate::commands::{rules_path, CommandResult};

/// Name substituted for `{name}` when `--name` is not given.
pub const DEFAULT_DISPLAY_NAME: &str = "there";

pub struct ReplyArgs {
    pub message: String,
    pub name: Option<String>,
    pub time: Option<String>,
    pub path: Option<PathBuf>,
}

pub fn run(args: ReplyArgs) -> CommandResult {
    let path = match rules_path("reply", args.path) {
        Ok(path) => path,
        Err(result) => return result,
    };

    let report = RuleStore::load(&path);
    let rule_set = &report.rule_set;
    let context = RenderContext::new(
        args.name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        args.time.unwrap_or_else(|| Local::now().format(TIME_FORMAT).to_string()),
    );

    let reply = resolve_with_selection(&args.message, &context, rule_set);
    let (matched, keywords) = match reply.selection {
        Selection::Rule { index } => {
            let keywords = rule_set.rules().get(index).map(|rule| rule.keywords());
            (json!(index), json!(keywords.unwrap_or_default()))
        }
        Selection::Default => (json!("default"), json!([])),
    };

    CommandResult::success_with_details(
        "reply",
        reply.text.clone(),
        json!({
            "source": path.display().to_string(),
            "degraded": report.is_degraded(),
            "matched_rule": matched,
            "keywords": keywords,
            "reply": reply.text,
            "warnings": report.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }),
    )
}
