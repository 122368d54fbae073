mod analyze;
mod cli_args;
mod config;
mod error;
mod git;
mod llm;
mod logging;
mod report;
mod setup;
mod write;

use std::io;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use colored::Colorize;
use log::info;

use crate::analyze::Analyzer;
use crate::cli_args::{Cli, Mode};
use crate::config::SessionConfig;
use crate::git::{CommitSource, GitRepo};
use crate::llm::LlmClient;
use crate::llm::retry::RetryPolicy;
use crate::setup::Interrupt;
use crate::write::{WriteOutcome, Writer};

fn main() -> ExitCode {
    // Values from .env only fill variables that are not already set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = SessionConfig::from_sources(cli)?;
    info!("Model: {}, base URL: {}", cfg.model, cfg.base_url);

    match cli.mode() {
        Mode::Analyze => {
            let interrupt = Interrupt::install()?;
            let retry = RetryPolicy::default().with_cancel(interrupt.flag());
            let llm = setup::build_llm_client(&cfg, retry)?;
            run_analyze(&cfg, llm.as_ref(), &interrupt)
        }
        Mode::Write => {
            let llm = setup::build_llm_client(&cfg, RetryPolicy::default())?;
            run_write(llm.as_ref())
        }
    }
}

fn run_analyze(cfg: &SessionConfig, llm: &dyn LlmClient, interrupt: &Interrupt) -> Result<()> {
    let source = match &cfg.remote_url {
        Some(url) => {
            eprintln!("{} {url}", "Cloning".cyan().bold());
            CommitSource::Remote(url.clone())
        }
        None => CommitSource::Local,
    };
    let repo = GitRepo::for_source(&source)?;
    if cfg.remote_url.is_some() {
        interrupt.remove_on_exit(repo.path());
    }

    eprintln!(
        "{} up to {} commit(s) from {}",
        "Analyzing".cyan().bold(),
        cfg.count,
        cfg.remote_url.as_deref().unwrap_or("the current repository")
    );

    let report = Analyzer::new(llm, cfg.jobs)
        .with_cancel(interrupt.flag())
        .with_progress(Analyzer::progress_bar())
        .run(&repo, cfg.count)?;

    // Removes the temporary clone before the report is printed.
    drop(repo);

    report::render(&report, &mut io::stdout().lock())?;

    if let Some(reason) = report.aborted {
        bail!("analysis stopped early: {reason}");
    }
    Ok(())
}

fn run_write(llm: &dyn LlmClient) -> Result<()> {
    let repo = GitRepo::for_source(&CommitSource::Local)?;

    let stdin = io::stdin();
    let outcome = Writer::new(&repo, llm, stdin.lock(), io::stdout().lock())
        .with_spinner()
        .run()?;

    match outcome {
        WriteOutcome::Committed(message) => {
            info!("Committed {:?}", message.lines().next().unwrap_or_default());
        }
        WriteOutcome::NothingStaged | WriteOutcome::Quit => {}
    }
    Ok(())
}
