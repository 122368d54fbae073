use crate::git::CommitRecord;
use crate::llm::prompts;

/// Diffs beyond this are cut before being sent for a suggestion.
pub const MAX_WRITE_DIFF_CHARS: usize = 60_000;
/// Per-commit file list budget for analysis prompts.
pub const MAX_CHANGE_SUMMARY_CHARS: usize = 4_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

pub fn build_analysis_prompt(commit: &CommitRecord) -> PromptPair {
    let changes = if commit.diff.trim().is_empty() {
        "(no file changes recorded, e.g. a merge commit)".to_string()
    } else {
        truncate(&commit.diff, MAX_CHANGE_SUMMARY_CHARS)
    };

    let user = format!(
        "Hash: {hash}\n\
         Author: {author}\n\
         Date: {date}\n\n\
         Message:\n{message}\n\n\
         Changed files:\n{changes}",
        hash = commit.short_hash(),
        author = commit.author,
        date = commit.date,
        message = commit.message,
        changes = changes
    );

    PromptPair {
        system: prompts::ANALYSIS_INSTRUCTIONS.to_owned(),
        user,
    }
}

pub fn build_write_prompt(diff: &str) -> PromptPair {
    let (diff, truncated) = cut_at_chars(diff, MAX_WRITE_DIFF_CHARS);
    let marker = if truncated { "\n\n... [diff truncated] ..." } else { "" };

    let user = format!("Here is the `git diff --staged`:\n```diff\n{diff}{marker}\n```");

    PromptPair {
        system: prompts::WRITE_INSTRUCTIONS.to_owned(),
        user,
    }
}

/// Truncate long strings for prompts and debug logging.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match cut_at_chars(s, max_chars) {
        (head, false) => head.to_string(),
        (head, true) => format!(
            "{}...\n[truncated {} chars]",
            head,
            s.chars().count() - max_chars
        ),
    }
}

/// First `max_chars` characters of `s`, and whether anything was dropped.
fn cut_at_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(message: &str, diff: &str) -> CommitRecord {
        CommitRecord {
            hash: "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678".into(),
            author: "Ada".into(),
            date: "2024-05-01T10:00:00+00:00".into(),
            message: message.into(),
            diff: diff.into(),
        }
    }

    #[test]
    fn analysis_prompt_carries_commit_fields() {
        let c = commit("fix(api): handle empty body", "M\tsrc/api.rs");
        let prompt = build_analysis_prompt(&c);
        assert!(prompt.system.contains("1-2: meaningless"));
        assert!(prompt.user.contains("Hash: a1b2c3d4\n"));
        assert!(prompt.user.contains("fix(api): handle empty body"));
        assert!(prompt.user.contains("M\tsrc/api.rs"));
    }

    #[test]
    fn analysis_prompt_notes_missing_changes() {
        let prompt = build_analysis_prompt(&commit("Merge branch 'main'", ""));
        assert!(prompt.user.contains("no file changes recorded"));
    }

    #[test]
    fn building_does_not_touch_the_commit() {
        let c = commit("feat: x", "A\tx");
        let before = c.clone();
        let _ = build_analysis_prompt(&c);
        assert_eq!(c, before);
    }

    #[test]
    fn write_prompt_forbids_scoring() {
        let prompt = build_write_prompt("diff --git a/x b/x\n+hello");
        assert!(prompt.system.contains("Do not rate, score, or grade"));
        assert!(prompt.user.contains("+hello"));
        assert!(!prompt.user.contains("[diff truncated]"));
    }

    #[test]
    fn huge_diffs_are_truncated_on_char_boundaries() {
        let diff = "é".repeat(MAX_WRITE_DIFF_CHARS + 10);
        let prompt = build_write_prompt(&diff);
        assert!(prompt.user.contains("[diff truncated]"));
        assert_eq!(prompt.user.matches('é').count(), MAX_WRITE_DIFF_CHARS);
    }

    #[test]
    fn truncate_reports_dropped_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...\n[truncated 3 chars]");
    }
}
