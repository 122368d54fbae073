//! Analysis report: per-commit outcomes, aggregate statistics, rendering.

use std::io::{self, Write};

use colored::{ColoredString, Colorize};

use crate::git::CommitRecord;
use crate::llm::ScoreResult;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Score buckets from the scoring guide.
pub const BUCKETS: [(u8, u8); 5] = [(1, 2), (3, 4), (5, 6), (7, 8), (9, 10)];

#[derive(Debug)]
pub enum Outcome {
    Scored(ScoreResult),
    Unscored(String),
}

#[derive(Debug)]
pub struct Entry {
    pub commit: CommitRecord,
    pub outcome: Outcome,
}

impl Entry {
    pub fn score(&self) -> Option<u8> {
        match &self.outcome {
            Outcome::Scored(r) => Some(r.score),
            Outcome::Unscored(_) => None,
        }
    }
}

/// Everything one analyze run produced, in original commit order.
#[derive(Debug, Default)]
pub struct Report {
    pub entries: Vec<Entry>,
    /// Commits fetched from the repository.
    pub fetched: usize,
    /// Ctrl-C stopped dispatch before every commit was scored.
    pub interrupted: bool,
    /// Set when a permanent provider error stopped the run.
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub analyzed: usize,
    pub scored: usize,
    pub unscored: usize,
    pub buckets: [usize; 5],
    pub average: f64,
    pub vague: usize,
    pub one_word: usize,
    pub good: usize,
}

pub fn bucket_index(score: u8) -> usize {
    (usize::from(score.clamp(1, 10)) - 1) / 2
}

impl Report {
    pub fn summary(&self) -> Summary {
        let mut buckets = [0usize; 5];
        let mut total = 0u32;
        let mut scored = 0;
        let mut vague = 0;
        let mut one_word = 0;
        let mut good = 0;

        for entry in &self.entries {
            if entry.commit.subject().split_whitespace().count() <= 1 {
                one_word += 1;
            }
            if let Some(score) = entry.score() {
                buckets[bucket_index(score)] += 1;
                total += u32::from(score);
                scored += 1;
                if score < 5 {
                    vague += 1;
                }
                if score >= 7 {
                    good += 1;
                }
            }
        }

        Summary {
            analyzed: self.entries.len(),
            scored,
            unscored: self.entries.len() - scored,
            buckets,
            average: if scored == 0 { 0.0 } else { f64::from(total) / scored as f64 },
            vague,
            one_word,
            good,
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 * 100.0 / whole as f64 }
}

fn score_label(score: u8) -> ColoredString {
    let text = format!("{score:>2}/10");
    match score {
        1..=3 => text.red().bold(),
        4..=6 => text.yellow().bold(),
        _ => text.green().bold(),
    }
}

fn subject_excerpt(commit: &CommitRecord) -> String {
    let subject = commit.subject();
    if subject.chars().count() > 72 {
        format!("{}…", subject.chars().take(71).collect::<String>())
    } else {
        subject.to_string()
    }
}

pub fn render(report: &Report, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", RULE.cyan())?;
    writeln!(out, "{}", "COMMIT REVIEW (most recent first)".cyan().bold())?;
    writeln!(out, "{}", RULE.cyan())?;

    for entry in &report.entries {
        writeln!(out)?;
        let hash = entry.commit.short_hash().bright_black();
        let subject = subject_excerpt(&entry.commit);
        match &entry.outcome {
            Outcome::Scored(result) => {
                writeln!(out, "  {hash}  {}  {subject}", score_label(result.score))?;
                writeln!(out, "            Why:    {}", result.rationale)?;
                if let Some(better) = &result.suggestion {
                    writeln!(out, "            Better: {}", better.green())?;
                }
            }
            Outcome::Unscored(reason) => {
                writeln!(out, "  {hash}  {}  {subject}", "unscored".bright_black().bold())?;
                writeln!(out, "            {}", format!("unscored: {reason}").bright_black())?;
            }
        }
    }

    if report.entries.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "No commits were scored.".yellow())?;
    }

    render_summary(report, out)?;

    if report.interrupted {
        writeln!(
            out,
            "{}",
            format!(
                "Interrupted: report covers {} of {} commits.",
                report.entries.len(),
                report.fetched
            )
            .yellow()
            .bold()
        )?;
    }
    if let Some(reason) = &report.aborted {
        writeln!(out, "{}", format!("Stopped early: {reason}").red().bold())?;
    }

    Ok(())
}

fn render_summary(report: &Report, out: &mut dyn Write) -> io::Result<()> {
    let s = report.summary();

    writeln!(out)?;
    writeln!(out, "{}", RULE.magenta())?;
    writeln!(out, "{}", "STATS".magenta().bold())?;
    writeln!(out, "{}", RULE.magenta())?;
    writeln!(out, "  Total commits analyzed : {}", s.analyzed)?;
    writeln!(out, "  Unscored               : {}", s.unscored)?;
    writeln!(
        out,
        "  Average score          : {}",
        format!("{:.1}/10", s.average).bold()
    )?;
    for ((lo, hi), count) in BUCKETS.iter().zip(s.buckets) {
        writeln!(out, "  Score {lo:>2}-{hi:<2}            : {count}")?;
    }
    writeln!(
        out,
        "  Vague commits (<5)     : {} ({:.0}%)",
        s.vague,
        percent(s.vague, s.scored)
    )?;
    writeln!(
        out,
        "  One-word commits       : {} ({:.0}%)",
        s.one_word,
        percent(s.one_word, s.analyzed)
    )?;
    writeln!(
        out,
        "  Good commits (>=7)     : {} ({:.0}%)",
        s.good,
        percent(s.good, s.scored)
    )?;
    writeln!(out)?;
    Ok(())
}
