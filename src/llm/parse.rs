//! Coercing free-form completions into typed results.
//!
//! The provider gives no structured-output guarantee, so both parsers look
//! for a JSON object first (tolerating fences and surrounding prose) and fall
//! back to plain-text conventions. Neither ever invents a value: a response
//! without a usable score or title is a [`ParseError`].

use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::llm::prompt_builder::truncate;

pub const MAX_TITLE_CHARS: usize = 72;
const EXCERPT_CHARS: usize = 160;

static SCORE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bscore\b[*_\s]*[:=]?[*_\s]*(-?\d+)(?:\s*/\s*10)?").expect("static pattern")
});
static RATIONALE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[*_\s-]*(?:rationale|reason|why)[*_\s]*[:=][*_\s]*(.+)$").expect("static pattern")
});
static TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#+\s*|(?:title|subject|summary)\s*:\s*)").expect("static pattern")
});
static CONVENTIONAL_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]+(?:\([^)]*\))?!?:\s+\S").expect("static pattern")
});

/// A scored commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub commit_hash: String,
    /// Always within 1..=10.
    pub score: u8,
    pub rationale: String,
    /// Improved message the model proposes for weak commits.
    pub suggestion: Option<String>,
}

/// A proposed commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSuggestion {
    pub title: String,
    pub body: String,
    /// Changes the model noticed; shown to the user, never committed.
    pub changes: Vec<String>,
}

impl CommitSuggestion {
    /// Full commit message: title, blank line, body.
    pub fn message(&self) -> String {
        if self.body.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.body.trim_end())
        }
    }
}

pub fn parse_score(raw: &str, commit_hash: &str) -> Result<ScoreResult, ParseError> {
    let (score, rationale, hash, suggestion) = match extract_json_object(raw) {
        Some(obj) => (
            obj.get("score").and_then(value_to_int),
            first_string(&obj, &["rationale", "reason", "issue", "praise"]),
            first_string(&obj, &["hash", "commit"]),
            first_string(&obj, &["suggestion", "better"]),
        ),
        None => {
            let text = strip_fences(raw);
            let score = SCORE_LINE
                .captures(&text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<i64>().ok());
            (score, text_rationale(&text), None, None)
        }
    };

    let score = score.ok_or_else(|| ParseError::MissingScore {
        excerpt: truncate(raw.trim(), EXCERPT_CHARS),
    })?;
    if !(1..=10).contains(&score) {
        return Err(ParseError::ScoreOutOfRange(score));
    }

    if let Some(found) = hash
        && !same_commit(commit_hash, &found)
    {
        return Err(ParseError::HashMismatch {
            expected: commit_hash.to_string(),
            found,
        });
    }

    let rationale = rationale.ok_or(ParseError::MissingRationale)?;

    Ok(ScoreResult {
        commit_hash: commit_hash.to_string(),
        score: score as u8,
        rationale,
        suggestion,
    })
}

pub fn parse_suggestion(raw: &str) -> Result<CommitSuggestion, ParseError> {
    let (title, body, changes) = match extract_json_object(raw) {
        Some(obj) => (
            first_string(&obj, &["title", "summary", "subject"]).unwrap_or_default(),
            obj.get("body").map(body_text).unwrap_or_default(),
            ["changes", "changes_detected"]
                .iter()
                .find_map(|k| obj.get(*k).map(string_list))
                .unwrap_or_default(),
        ),
        None => {
            let (title, body) = text_suggestion(raw);
            (title, body, Vec::new())
        }
    };

    let title = clean_title(&title);
    if title.is_empty() {
        return Err(ParseError::MissingTitle {
            excerpt: truncate(raw.trim(), EXCERPT_CHARS),
        });
    }
    let len = title.chars().count();
    if len > MAX_TITLE_CHARS {
        return Err(ParseError::TitleTooLong { len, max: MAX_TITLE_CHARS, title });
    }

    Ok(CommitSuggestion { title, body, changes })
}

/// Find the first JSON object in a response that may be wrapped in markdown or prose.
fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_fences(raw);

    for (idx, _) in text.match_indices('{') {
        // The stream deserializer stops after one value, so trailing prose is fine.
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }

    None
}

/// Title and body from a plain-text answer.
///
/// A fenced block holds the message when there is one. Otherwise the title is
/// the first Conventional Commit subject, or failing that the first line that
/// is not a lead-in such as "Here is the message:".
fn text_suggestion(raw: &str) -> (String, String) {
    let text = fenced_block(raw).unwrap_or_else(|| strip_fences(raw));
    let lines: Vec<&str> = text.lines().collect();

    let start = lines
        .iter()
        .position(|l| CONVENTIONAL_SUBJECT.is_match(&clean_title(l)))
        .or_else(|| {
            lines.iter().position(|l| {
                let l = l.trim();
                !l.is_empty() && !l.ends_with(':')
            })
        });

    match start {
        Some(i) => (
            clean_title(lines[i]),
            lines[i + 1..].join("\n").trim().to_string(),
        ),
        None => (String::new(), String::new()),
    }
}

/// Contents of the first non-empty fenced block, if the answer has one.
fn fenced_block(raw: &str) -> Option<String> {
    let mut lines = raw.lines().skip_while(|l| !l.trim_start().starts_with("```"));
    lines.next()?;
    let inner = lines
        .take_while(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    (!inner.trim().is_empty()).then_some(inner)
}

fn strip_fences(raw: &str) -> String {
    raw.trim()
        .lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn value_to_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '-')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// `body` may be prose or a list of bullets.
fn body_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Array(_) => string_list(v)
            .iter()
            .map(|b| {
                let b = b.trim_start_matches(['-', '*', ' ']);
                format!("- {b}")
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn clean_title(line: &str) -> String {
    let line = TITLE_PREFIX.replace(line.trim(), "");
    line.trim()
        .trim_matches(|c| c == '*' || c == '`' || c == '"')
        .trim()
        .to_string()
}

fn text_rationale(text: &str) -> Option<String> {
    if let Some(m) = RATIONALE_LINE.captures(text).and_then(|c| c.get(1)) {
        let r = m.as_str().trim().trim_matches('*').trim();
        if !r.is_empty() {
            return Some(r.to_string());
        }
    }

    // No labelled rationale: whatever prose surrounds the score line.
    let prose = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !SCORE_LINE.is_match(l))
        .collect::<Vec<_>>()
        .join(" ");
    (!prose.is_empty()).then_some(prose)
}

fn same_commit(full: &str, reported: &str) -> bool {
    let full = full.trim().to_ascii_lowercase();
    let reported = reported.trim().to_ascii_lowercase();
    !reported.is_empty() && (full.starts_with(&reported) || reported.starts_with(&full))
}
