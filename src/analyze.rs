//! Analyze mode: fetch commits, score them with a bounded worker pool,
//! reassemble the results in commit order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::error::{LlmError, LlmFailure, RepositoryError};
use crate::git::{CommitLog, CommitRecord};
use crate::llm::{self, LlmClient, ScoreResult};
use crate::report::{Entry, Outcome, Report};

pub struct Analyzer<'a> {
    llm: &'a dyn LlmClient,
    jobs: usize,
    cancel: Arc<AtomicBool>,
    progress: ProgressBar,
}

impl<'a> Analyzer<'a> {
    pub fn new(llm: &'a dyn LlmClient, jobs: usize) -> Self {
        Analyzer {
            llm,
            jobs: jobs.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: ProgressBar::hidden(),
        }
    }

    /// Stop dispatching new commits once `flag` becomes true.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// A progress bar on stderr, styled for scoring.
    pub fn progress_bar() -> ProgressBar {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("  {spinner} scoring [{bar:30}] {pos}/{len} commits")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    /// Fetching → Scoring → Reporting. Only repository errors abort here;
    /// provider trouble is recorded in the returned report.
    pub fn run(&self, repo: &dyn CommitLog, count: u32) -> Result<Report, RepositoryError> {
        let commits = repo.list_commits(count)?;
        info!("Scoring {} commit(s) with {} worker(s)", commits.len(), self.jobs);

        self.progress.set_length(commits.len() as u64);
        let (results, aborted) = self.score_all(&commits);
        self.progress.finish_and_clear();

        let fetched = commits.len();
        let entries: Vec<Entry> = commits
            .into_iter()
            .zip(results)
            .filter_map(|(commit, result)| {
                let outcome = match result? {
                    // Abandoned after Ctrl-C: counts as never scored, not as a failure.
                    Err(LlmFailure::Llm(LlmError::Cancelled)) => return None,
                    Ok(score) => Outcome::Scored(score),
                    Err(failure) => {
                        warn!("{} left unscored: {failure}", commit.short_hash());
                        Outcome::Unscored(failure.to_string())
                    }
                };
                Some(Entry { commit, outcome })
            })
            .collect();

        let interrupted = aborted.is_none() && entries.len() < fetched;

        Ok(Report {
            entries,
            fetched,
            interrupted,
            aborted,
        })
    }

    /// One slot per commit; `None` marks commits never dispatched.
    fn score_all(
        &self,
        commits: &[CommitRecord],
    ) -> (Vec<Option<Result<ScoreResult, LlmFailure>>>, Option<String>) {
        let mut slots: Vec<Option<Result<ScoreResult, LlmFailure>>> =
            commits.iter().map(|_| None).collect();
        let stop = AtomicBool::new(false);
        let mut aborted = None;

        // Rendezvous channel: a commit is only handed out when a worker is idle,
        // so cancellation leaves at most `jobs` requests in flight.
        let (job_tx, job_rx) = bounded::<usize>(0);
        let (result_tx, result_rx) = unbounded();

        thread::scope(|scope| {
            for _ in 0..self.jobs.min(commits.len()) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let stop = &stop;
                let progress = &self.progress;
                let llm = self.llm;
                scope.spawn(move || {
                    for idx in job_rx {
                        let result = llm::score_commit(llm, &commits[idx]);
                        if let Err(LlmFailure::Llm(e)) = &result
                            && e.is_permanent()
                        {
                            stop.store(true, Ordering::SeqCst);
                        }
                        progress.inc(1);
                        if result_tx.send((idx, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for idx in 0..commits.len() {
                if self.cancel.load(Ordering::SeqCst) {
                    warn!("Interrupted; not sending the remaining {} commit(s)", commits.len() - idx);
                    break;
                }
                if stop.load(Ordering::SeqCst) || job_tx.send(idx).is_err() {
                    break;
                }
            }
            drop(job_tx);

            for (idx, result) in result_rx.iter() {
                if aborted.is_none()
                    && let Err(LlmFailure::Llm(e)) = &result
                    && e.is_permanent()
                {
                    aborted = Some(e.to_string());
                }
                slots[idx] = Some(result);
            }
        });

        (slots, aborted)
    }
}
