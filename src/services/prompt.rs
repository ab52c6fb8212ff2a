//! Prompt composition for style presets
//!
//! A preset either carries a structured template with {{prompt}}/{{prefix}}/
//! {{suffix}} placeholders (takes priority) or plain prefix/suffix columns.
//! Composition is pure: no I/O, deterministic, missing fields degrade to
//! empty segments.

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use serde::Deserialize;

use crate::entities::style_configs;

lazy_static! {
    static ref PROMPT_PLACEHOLDER: Regex = Regex::new(r"(?i)\{\{\s*prompt\s*\}\}").unwrap();
    static ref PREFIX_PLACEHOLDER: Regex = Regex::new(r"(?i)\{\{\s*prefix\s*\}\}").unwrap();
    static ref SUFFIX_PLACEHOLDER: Regex = Regex::new(r"(?i)\{\{\s*suffix\s*\}\}").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Default, Deserialize)]
struct PromptTemplate {
    template: Option<String>,
    prefix: Option<String>,
    suffix: Option<String>,
    negative: Option<String>,
}

/// Template JSON fields win over the flat style columns
fn resolve_template(style: &style_configs::Model) -> PromptTemplate {
    let parsed: PromptTemplate = style
        .prompt_template
        .as_ref()
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();

    PromptTemplate {
        template: parsed.template,
        prefix: parsed.prefix.or_else(|| style.prompt_prefix.clone()),
        suffix: parsed.suffix.or_else(|| style.prompt_suffix.clone()),
        negative: parsed.negative.or_else(|| style.negative_prompt.clone()),
    }
}

fn normalize(value: &str) -> String {
    WHITESPACE.replace_all(value, " ").trim().to_string()
}

/// Comma-join the non-empty parts, then collapse whitespace
fn merge_parts(parts: &[Option<&str>]) -> String {
    let joined = parts
        .iter()
        .filter_map(|part| *part)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    normalize(&joined)
}

/// Compose the positive prompt for a generation request
pub fn compose_prompt(style: &style_configs::Model, user_prompt: Option<&str>) -> String {
    let template = resolve_template(style);
    let base_prompt = user_prompt.map(str::trim).unwrap_or_default();

    if let Some(tpl) = template.template.as_deref() {
        let rendered = PROMPT_PLACEHOLDER.replace_all(tpl, NoExpand(base_prompt));
        let rendered =
            PREFIX_PLACEHOLDER.replace_all(&rendered, NoExpand(template.prefix.as_deref().unwrap_or("")));
        let rendered =
            SUFFIX_PLACEHOLDER.replace_all(&rendered, NoExpand(template.suffix.as_deref().unwrap_or("")));
        return normalize(&rendered);
    }

    // Instruction-style prompt for img2img models: style parts first, user
    // context woven in after
    let style_parts = merge_parts(&[template.prefix.as_deref(), template.suffix.as_deref()]);
    if base_prompt.is_empty() {
        return style_parts;
    }
    merge_parts(&[Some(style_parts.as_str()), Some(base_prompt)])
}

/// Compose the negative prompt: style negative merged with any user-supplied
/// negative, comma-separated, empty parts dropped
pub fn compose_negative_prompt(style: &style_configs::Model, user_negative: Option<&str>) -> String {
    let template = resolve_template(style);
    merge_parts(&[template.negative.as_deref(), user_negative])
}
