//! JSON extraction for model replies
//!
//! Models asked for "only JSON" still wrap it in code fences, prose or cut it
//! off at the token limit. `extract_object` recovers the outermost object:
//!
//! 1. Strip BOM and markdown fences
//! 2. Slice from the first `{` to the last `}` and parse
//! 3. Otherwise repair the slice (trailing commas, unterminated strings,
//!    missing closers) and parse again

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{ReportError, Result};

const PREVIEW_CHARS: usize = 200;

/// Parse the outermost JSON object in `raw`
pub fn extract_object(raw: &str) -> Result<Value> {
    extract_object_with_status(raw).map(|(value, _)| value)
}

/// Like `extract_object`, also reporting whether repair was needed
pub fn extract_object_with_status(raw: &str) -> Result<(Value, bool)> {
    let cleaned = strip_code_fences(raw.trim().trim_start_matches('\u{feff}'));

    let Some(start) = cleaned.find('{') else {
        return Err(no_object(cleaned));
    };
    let candidate = match cleaned.rfind('}') {
        Some(end) if end > start => &cleaned[start..=end],
        _ => &cleaned[start..],
    };

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
        return Ok((value, false));
    }

    debug!("Reply is not clean JSON, attempting repair");
    let repaired = balance_brackets(&close_truncated_strings(&drop_trailing_commas(candidate)));
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value @ Value::Object(_)) => {
            warn!("JSON object recovered after repair");
            Ok((value, true))
        }
        _ => Err(no_object(cleaned)),
    }
}

fn no_object(cleaned: &str) -> ReportError {
    ReportError::Validation(format!(
        "No JSON object in model reply: {}...",
        cleaned.chars().take(PREVIEW_CHARS).collect::<String>()
    ))
}

fn strip_code_fences(s: &str) -> &str {
    let mut s = s;
    if s.starts_with("```")
        && let Some(newline) = s.find('\n')
    {
        s = &s[newline + 1..];
    }
    s.strip_suffix("```").map(str::trim_end).unwrap_or(s)
}

/// `,` directly before `}` or `]` (outside strings) is dropped
fn drop_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
        } else if ch == '\\' && in_string {
            escape = true;
        } else if ch == '"' {
            in_string = !in_string;
        } else if ch == ',' && !in_string {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// A string still open at a line break is closed there
fn close_truncated_strings(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
        } else if ch == '\\' && in_string {
            escape = true;
        } else if ch == '"' {
            in_string = !in_string;
        } else if (ch == '\n' || ch == '\r') && in_string {
            out.push('"');
            in_string = false;
        }
        out.push(ch);
    }
    if in_string {
        out.push('"');
    }
    out
}

/// Append the closers a truncated reply never wrote, innermost first
fn balance_brackets(s: &str) -> String {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => open.push('}'),
            '[' if !in_string => open.push(']'),
            '}' | ']' if !in_string => {
                open.pop();
            }
            _ => {}
        }
    }

    let mut out = drop_trailing_commas(s.trim_end().trim_end_matches(','));
    out.extend(open.into_iter().rev());
    out
}
