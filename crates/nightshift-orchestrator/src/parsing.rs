use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

const POSITIVE_KEYWORDS: &[&str] = &[
    "passed", "approved", "lgtm", "looks good", "ship it", "complete", "correct", "no issues",
];
const NEGATIVE_KEYWORDS: &[&str] = &[
    "failed", "rejected", "needs work", "issues found", "bug", "incomplete", "missing", "incorrect",
];

static PR_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://github\.com/[^/ ]+/[^/ ]+/pull/\d+").unwrap());

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanOutput {
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImplementOutput {
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewOutput {
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Extracts a balanced `{...}`/`[...]` region from `text` by scanning for
/// the first opening brace/bracket and matching its closer by nesting depth
/// (tracking string literals so braces inside them don't count). Returns the
/// whole input if it parses as JSON outright.
fn extract_json_region(text: &str) -> Option<&str> {
    if serde_json::from_str::<serde_json::Value>(text.trim()).is_ok() {
        return Some(text.trim());
    }

    let bytes = text.as_bytes();
    let start = text.find(['{', '['])?;
    let opener = bytes[start];
    let closer = if opener == b'{' { b'}' } else { b']' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == opener => depth += 1,
            b if b == closer => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_structured<T: for<'de> Deserialize<'de> + Default>(stdout: &str) -> Option<T> {
    let region = extract_json_region(stdout)?;
    serde_json::from_str(region).ok()
}

pub fn parse_plan(stdout: &str) -> Option<PlanOutput> {
    parse_structured(stdout)
}

pub fn parse_implement(stdout: &str) -> Option<ImplementOutput> {
    parse_structured(stdout)
}

/// Parses a review's JSON output; on failure, falls back to the keyword
/// heuristic. Empty stdout never passes.
pub fn parse_review(stdout: &str) -> ReviewOutput {
    if stdout.trim().is_empty() {
        return ReviewOutput {
            passed: false,
            feedback: "empty agent output".to_string(),
            issues: Vec::new(),
        };
    }
    if let Some(parsed) = parse_structured::<ReviewOutput>(stdout) {
        return parsed;
    }
    heuristic_review(stdout)
}

fn heuristic_review(stdout: &str) -> ReviewOutput {
    let lower = stdout.to_lowercase();
    let positive = POSITIVE_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    let negative = NEGATIVE_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    ReviewOutput {
        passed: positive > negative,
        feedback: stdout.trim().to_string(),
        issues: Vec::new(),
    }
}

/// Scans `stdout` and `summary` for PR URLs; returns the last match found
/// across both, or `None` if there are none.
pub fn extract_pr_url<'a>(stdout: &'a str, summary: &'a str) -> Option<String> {
    let combined = format!("{stdout}\n{summary}");
    PR_URL_RE.find_iter(&combined).last().map(|m| m.as_str().to_string())
}
