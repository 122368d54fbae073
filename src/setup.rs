use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use log::{debug, warn};
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

use crate::config::SessionConfig;
use crate::error::LlmError;
use crate::llm::LlmClient;
use crate::llm::openrouter::OpenRouterClient;
use crate::llm::retry::RetryPolicy;

/// Build the LLM client from the resolved session config.
pub fn build_llm_client(
    cfg: &SessionConfig,
    retry: RetryPolicy,
) -> Result<Box<dyn LlmClient>, LlmError> {
    debug!("Using OpenRouterClient with model {} at {}", cfg.model, cfg.base_url);

    let client = OpenRouterClient::new(cfg.api_key.clone(), cfg.model.clone(), cfg.base_url.clone())?
        .with_retry(retry);
    Ok(Box::new(client))
}

/// Ctrl-C handling for analyze mode.
///
/// The first SIGINT sets the flag, so no new requests go out. The second one
/// removes the registered directories and exits with 130 without waiting for
/// requests still in flight.
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    cleanup: Arc<Mutex<Vec<PathBuf>>>,
}

impl Interrupt {
    pub fn install() -> Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        let cleanup = Arc::new(Mutex::new(Vec::new()));
        let mut signals = Signals::new([SIGINT]).context("failed to install Ctrl-C handler")?;

        let (seen, paths) = (Arc::clone(&flag), Arc::clone(&cleanup));
        thread::spawn(move || {
            for _ in signals.forever() {
                if seen.swap(true, Ordering::SeqCst) {
                    remove_all(&paths);
                    process::exit(130);
                }
                eprintln!("\nInterrupted: finishing requests in flight. Press Ctrl-C again to quit now.");
            }
        });

        Ok(Interrupt { flag, cleanup })
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Delete `path` if the process is killed by a second Ctrl-C.
    pub fn remove_on_exit(&self, path: &Path) {
        if let Ok(mut paths) = self.cleanup.lock() {
            paths.push(path.to_path_buf());
        }
    }
}

fn remove_all(paths: &Mutex<Vec<PathBuf>>) {
    let Ok(paths) = paths.lock() else { return };
    for path in paths.iter() {
        if let Err(e) = fs::remove_dir_all(path) {
            warn!("could not remove {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_directories_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let clone = dir.path().join("clone");
        fs::create_dir_all(clone.join("objects/pack")).unwrap();
        fs::write(clone.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let paths = Mutex::new(vec![clone.clone(), dir.path().join("already-gone")]);
        remove_all(&paths);

        assert!(!clone.exists());
        assert!(dir.path().exists());
    }
}
