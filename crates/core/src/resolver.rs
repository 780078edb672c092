use chrono::{DateTime, TimeZone};

use crate::rules::RuleSet;

pub const NAME_PLACEHOLDER: &str = "{name}";
pub const TIME_PLACEHOLDER: &str = "{time}";

/// Clock format substituted for `{time}`.
pub const TIME_FORMAT: &str = "%H:%M";

/// Per-message values substituted into a response template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub display_name: String,
    pub current_time: String,
}

impl RenderContext {
    pub fn new(display_name: impl Into<String>, current_time: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), current_time: current_time.into() }
    }

    pub fn at<Tz>(display_name: impl Into<String>, now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self::new(display_name, now.format(TIME_FORMAT).to_string())
    }
}

/// Which template answered a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Rule { index: usize },
    Default,
}

/// A rendered reply and the template that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub selection: Selection,
    pub text: String,
}

/// First rule (in declaration order) with a keyword contained in the message wins.
/// A winning rule without a response defers to the default response.
pub fn select(message_text: &str, rule_set: &RuleSet) -> Selection {
    let lowered = message_text.to_lowercase();
    match rule_set.rules().iter().enumerate().find(|(_, rule)| rule.matches(&lowered)) {
        Some((index, rule)) if rule.response().is_some() => Selection::Rule { index },
        _ => Selection::Default,
    }
}

pub fn template_for(selection: Selection, rule_set: &RuleSet) -> &str {
    match selection {
        Selection::Rule { index } => rule_set
            .rules()
            .get(index)
            .and_then(|rule| rule.response())
            .unwrap_or(rule_set.default_response()),
        Selection::Default => rule_set.default_response(),
    }
}

pub fn resolve_with_selection(
    message_text: &str,
    context: &RenderContext,
    rule_set: &RuleSet,
) -> Resolution {
    let selection = select(message_text, rule_set);
    Resolution { selection, text: render(template_for(selection, rule_set), context) }
}

pub fn resolve(message_text: &str, context: &RenderContext, rule_set: &RuleSet) -> String {
    resolve_with_selection(message_text, context, rule_set).text
}

/// Substitutes `{name}` and `{time}` in one pass; substituted text is never rescanned.
pub fn render(template: &str, context: &RenderContext) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix(NAME_PLACEHOLDER) {
            rendered.push_str(&context.display_name);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(TIME_PLACEHOLDER) {
            rendered.push_str(&context.current_time);
            rest = after;
        } else {
            rendered.push('{');
            rest = &tail[1..];
        }
    }

    rendered.push_str(rest);
    rendered
}
