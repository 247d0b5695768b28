//! Line-oriented document transformations
//!
//! Architectural Principle: Service Layer - One substitution primitive shared by every pass
//! - Domain variables, fixed settings, and operator overrides all flow through apply_variables
//! - Each decision (replace vs append) is surfaced to an observer for tracing and testability
//! - Section stripping and blank-line collapsing keep the document well-formed between passes

use crate::domain::{ForgeError, ForgeResult, VariableMap};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

/// What the substitution engine did for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionOutcome {
    /// An existing assignment (active or commented out) was rewritten in place
    Replaced,
    /// No assignment existed; a new line was inserted
    Appended,
}

impl SubstitutionOutcome {
    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::Appended => "appended",
        }
    }
}

/// Apply a variable map onto a line-structured document
///
/// For each key in map order, the first line matching an optional leading
/// `#`, the key, and `=` is rewritten to `KEY=value`; this activates
/// commented-out placeholders. Keys with no matching line are inserted
/// before the first blank-line boundary, or appended at the end when the
/// document has none. The observer is invoked once per key with the
/// decision taken.
///
/// A key duplicated in the source document is malformed input: only the
/// first matching line is rewritten and later duplicates are left as-is.
pub fn apply_variables<F>(
    content: &str,
    vars: &VariableMap,
    mut observe: F,
) -> ForgeResult<String>
where
    F: FnMut(&str, &str, SubstitutionOutcome),
{
    let mut content = content.to_string();

    for (key, value) in vars.iter() {
        let pattern = assignment_pattern(key)?;
        let replacement = format!("{key}={value}");

        if pattern.is_match(&content) {
            content = pattern.replace(&content, NoExpand(&replacement)).into_owned();
            observe(key, value, SubstitutionOutcome::Replaced);
        } else {
            content = insert_assignment(&content, &replacement);
            observe(key, value, SubstitutionOutcome::Appended);
        }
    }

    Ok(content)
}

/// Apply a variable map, tracing each decision through the log
pub fn apply(content: &str, vars: &VariableMap) -> ForgeResult<String> {
    apply_variables(content, vars, |key, value, outcome| {
        tracing::debug!("{} {} = {}", outcome.as_str(), key, value);
    })
}

/// Matches an assignment line for `key`, active or commented out
fn assignment_pattern(key: &str) -> ForgeResult<Regex> {
    Regex::new(&format!(r"(?m)^(#\s*)?{}=.*$", regex::escape(key)))
        .map_err(|e| ForgeError::pattern(format!("assignment pattern for '{key}' failed: {e}")))
}

/// Insert a new assignment before the first blank-line boundary, or append
fn insert_assignment(content: &str, assignment: &str) -> String {
    match content.find("\n\n") {
        Some(idx) => {
            let (head, tail) = content.split_at(idx);
            format!("{head}\n{assignment}\n\n{}", &tail[2..])
        }
        None => format!("{content}\n{assignment}\n"),
    }
}

/// Remove the first inclusive span between two markers
///
/// The span is matched non-greedily and may cross any number of lines,
/// blank ones included. Leftover blank-line runs are collapsed globally
/// afterwards. When either marker is absent the document passes through
/// untouched.
pub fn strip_section(content: &str, start_marker: &str, end_marker: &str) -> ForgeResult<String> {
    let pattern = Regex::new(&format!(
        "(?s){}.*?{}",
        regex::escape(start_marker),
        regex::escape(end_marker)
    ))
    .map_err(|e| ForgeError::pattern(format!("section pattern failed: {e}")))?;

    let stripped = pattern.replace(content, NoExpand("")).into_owned();
    Ok(collapse_blank_lines(&stripped))
}

/// Collapse runs of three or more newlines to exactly one blank line
pub fn collapse_blank_lines(content: &str) -> String {
    // Static pattern, cannot fail to compile
    let pattern = Regex::new(r"\n{3,}").expect("blank-line pattern is valid");
    pattern.replace_all(content, "\n\n").into_owned()
}
