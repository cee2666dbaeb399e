//! Method-name conventions.
//!
//! Repository methods are recognized by name. Both Rust `snake_case` and
//! Java-style `camelCase` spellings are accepted: `find_by_age` and
//! `findByAge` resolve to the same property.

use regex::Regex;
use std::sync::LazyLock;

static FIND_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^find(?:_by_|By)([A-Za-z][A-Za-z0-9_]*)$").expect("find-by pattern is valid")
});

/// What a method name asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    FindAll,
    FindById,
    Save,
    /// `find_by_<property>`; carries the raw suffix
    FindBy(String),
    Unsupported,
}

/// Classify a method name.
pub fn parse_intent(method: &str) -> Intent {
    match method {
        "find_all" | "findAll" => return Intent::FindAll,
        "find_by_id" | "findById" => return Intent::FindById,
        "save" => return Intent::Save,
        _ => {}
    }

    FIND_BY
        .captures(method)
        .and_then(|caps| caps.get(1))
        .map_or(Intent::Unsupported, |suffix| {
            Intent::FindBy(suffix.as_str().to_string())
        })
}

/// Property names a `find_by` suffix may refer to, most literal first.
pub fn property_candidates(suffix: &str) -> Vec<String> {
    let mut candidates = vec![suffix.to_string()];
    let decapitalized = decapitalize(suffix);
    let snake = to_snake_case(suffix);
    for candidate in [decapitalized, snake] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
