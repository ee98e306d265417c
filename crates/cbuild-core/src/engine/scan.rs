//! Import specifier discovery.
//!
//! Finds `import ... from`, bare `import "x"`, `export ... from`,
//! `require("x")` and `import("x")` specifiers without parsing.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use std::collections::HashSet;

const IMPORT_PATTERN: &str = r#"\bimport\s*(?:[\w$*{}\s,]+?\s*from\s*)?["']([^"'\n]+)["']|\bexport\s*[\w$*{}\s,]+?\s*from\s*["']([^"'\n]+)["']|\b(?:require|import)\s*\(\s*["']([^"'\n]+)["']\s*\)"#;

/// String literals are matched alongside comments so comment markers
/// inside strings survive stripping.
const COMMENT_PATTERN: &str = r#"(?s)"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|`(?:[^`\\]|\\.)*`|/\*.*?\*/|(?m:^[ \t]*//[^\n]*)"#;

static IMPORT_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(IMPORT_PATTERN).ok());
static COMMENT_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(COMMENT_PATTERN).ok());

/// Specifiers imported by `source`, deduplicated, in first-appearance order.
#[must_use]
pub fn scan_specifiers(source: &str) -> Vec<String> {
    let stripped = match COMMENT_RE.as_ref() {
        Some(re) => re.replace_all(source, keep_strings).into_owned(),
        None => source.to_string(),
    };

    let Some(re) = IMPORT_RE.as_ref() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    re.captures_iter(&stripped)
        .filter_map(|caps| (1..=3).find_map(|i| caps.get(i)))
        .map(|m| m.as_str().to_string())
        .filter(|spec| seen.insert(spec.clone()))
        .collect()
}

fn keep_strings(caps: &Captures<'_>) -> String {
    let text = &caps[0];
    if text.trim_start().starts_with('/') {
        String::new()
    } else {
        text.to_string()
    }
}
