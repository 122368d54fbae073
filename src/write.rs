//! Write mode: one suggestion for the staged diff, then an accept/edit/quit
//! loop that reads a single line per step.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::ProgressBar;
use log::info;

use crate::git::StagingArea;
use crate::llm::{self, CommitSuggestion, LlmClient};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const PROMPT: &str = "Press Enter to accept, type a new message to edit, or q to quit: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteState {
    CheckStaged,
    NoChanges,
    Suggesting(String),
    /// Waiting for the user's verdict on the candidate message.
    Presenting(String),
    Editing(String),
    Accepted(String),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    NothingStaged,
    Committed(String),
    Quit,
}

/// Resolve one line of input typed at the `Presenting` prompt.
/// `None` is end of input, treated like quitting.
pub fn on_input(candidate: String, line: Option<&str>) -> WriteState {
    let Some(line) = line else {
        return WriteState::Quit;
    };
    let answer = line.trim();

    if answer.is_empty() {
        WriteState::Accepted(candidate)
    } else if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit") {
        WriteState::Quit
    } else {
        WriteState::Editing(answer.to_string())
    }
}

pub struct Writer<'a, R, W> {
    repo: &'a dyn StagingArea,
    llm: &'a dyn LlmClient,
    input: R,
    out: W,
    spinner: bool,
}

impl<'a, R: BufRead, W: Write> Writer<'a, R, W> {
    pub fn new(repo: &'a dyn StagingArea, llm: &'a dyn LlmClient, input: R, out: W) -> Self {
        Writer { repo, llm, input, out, spinner: false }
    }

    /// Show a spinner on stderr while waiting for the model.
    pub fn with_spinner(mut self) -> Self {
        self.spinner = true;
        self
    }

    pub fn run(mut self) -> Result<WriteOutcome> {
        let mut state = WriteState::CheckStaged;

        loop {
            info!("write: {}", state_name(&state));
            state = match state {
                WriteState::CheckStaged => match self.repo.staged_diff()? {
                    None => WriteState::NoChanges,
                    Some(diff) => WriteState::Suggesting(diff),
                },
                WriteState::NoChanges => {
                    writeln!(self.out, "{}", "Nothing staged.".yellow())?;
                    writeln!(self.out, "Stage some files first:  git add <files>")?;
                    return Ok(WriteOutcome::NothingStaged);
                }
                WriteState::Suggesting(diff) => {
                    let suggestion = self.suggest(&diff)?;
                    self.show_suggestion(&suggestion)?;
                    WriteState::Presenting(suggestion.message())
                }
                WriteState::Presenting(candidate) => {
                    write!(self.out, "{PROMPT}")?;
                    self.out.flush()?;
                    let line = self.read_line()?;
                    on_input(candidate, line.as_deref())
                }
                WriteState::Editing(message) => {
                    writeln!(self.out)?;
                    writeln!(self.out, "{}", "Edited commit message:".bold())?;
                    writeln!(self.out, "{}", message.cyan())?;
                    writeln!(self.out)?;
                    WriteState::Presenting(message)
                }
                WriteState::Accepted(message) => {
                    self.repo.commit(&message)?;
                    writeln!(self.out, "\n{}", "✓ Committed!".green().bold())?;
                    return Ok(WriteOutcome::Committed(message));
                }
                WriteState::Quit => {
                    writeln!(self.out, "Aborted. Nothing was committed.")?;
                    return Ok(WriteOutcome::Quit);
                }
            };
        }
    }

    fn suggest(&mut self, diff: &str) -> Result<CommitSuggestion> {
        let spinner = self.spinner.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_message("Analyzing staged changes…");
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        });

        let result = llm::suggest_commit(self.llm, diff);

        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }
        result.context("could not get a commit message suggestion")
    }

    fn show_suggestion(&mut self, suggestion: &CommitSuggestion) -> Result<()> {
        writeln!(self.out)?;
        if !suggestion.changes.is_empty() {
            writeln!(self.out, "{}", "Changes detected:".bold())?;
            for change in &suggestion.changes {
                writeln!(self.out, "  • {change}")?;
            }
            writeln!(self.out)?;
        }

        writeln!(self.out, "{}", "Suggested commit message:".bold())?;
        writeln!(self.out, "{}", RULE.cyan())?;
        writeln!(self.out, "{}", suggestion.title.cyan().bold())?;
        if !suggestion.body.trim().is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "{}", suggestion.body)?;
        }
        writeln!(self.out, "{}", RULE.cyan())?;
        writeln!(self.out)?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf).context("failed to read from stdin")?;
        Ok((n > 0).then_some(buf))
    }
}

fn state_name(state: &WriteState) -> &'static str {
    match state {
        WriteState::CheckStaged => "check staged",
        WriteState::NoChanges => "no changes",
        WriteState::Suggesting(_) => "suggesting",
        WriteState::Presenting(_) => "presenting",
        WriteState::Editing(_) => "editing",
        WriteState::Accepted(_) => "accepted",
        WriteState::Quit => "quit",
    }
}
