use crate::error::RepositoryError;
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Upper bound for `git clone` of a remote repository.
pub const CLONE_TIMEOUT: Duration = Duration::from_secs(300);
const CLONE_POLL: Duration = Duration::from_millis(100);

const RECORD_SEP: char = '\x1e';
const FIELD_SEP: char = '\x1f';

/// One commit as read from the log. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
    /// `--name-status` summary; empty for merges and empty commits.
    pub diff: String,
}

impl CommitRecord {
    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(8);
        &self.hash[..end]
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

/// Where `--analyze` reads history from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSource {
    Local,
    Remote(String),
}

/// Read access to commit history.
pub trait CommitLog {
    /// Up to `count` commits, most recent first.
    fn list_commits(&self, count: u32) -> Result<Vec<CommitRecord>, RepositoryError>;
}

/// The index of a working tree, and the ability to commit it.
pub trait StagingArea {
    /// `None` when nothing is staged.
    fn staged_diff(&self) -> Result<Option<String>, RepositoryError>;

    /// Commit the already staged changes with `message`.
    fn commit(&self, message: &str) -> Result<(), RepositoryError>;
}

/// A repository reached through the `git` binary.
///
/// For remote sources the repository lives in a temporary bare clone that is
/// deleted when this value is dropped.
#[derive(Debug)]
pub struct GitRepo {
    git: PathBuf,
    dir: PathBuf,
    _clone: Option<TempDir>,
}

impl GitRepo {
    /// Open the repository for a `CommitSource`, cloning remotes first.
    pub fn for_source(source: &CommitSource) -> Result<Self, RepositoryError> {
        match source {
            CommitSource::Local => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                Self::open(cwd)
            }
            CommitSource::Remote(url) => Self::clone_remote(url),
        }
    }

    /// Open the repository containing `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let git = locate_git()?;
        let dir = dir.into();

        let output = run(&git, &dir, &["rev-parse", "--git-dir"])?;
        if !output.status.success() {
            return Err(RepositoryError::NotARepository {
                path: dir,
                stderr: stderr_text(&output),
            });
        }

        Ok(GitRepo { git, dir, _clone: None })
    }

    /// Bare, blob-less clone of `url` into a fresh temporary directory.
    pub fn clone_remote(url: &str) -> Result<Self, RepositoryError> {
        Self::clone_remote_within(url, CLONE_TIMEOUT)
    }

    /// Like [`GitRepo::clone_remote`], killing git once `timeout` has passed.
    pub fn clone_remote_within(url: &str, timeout: Duration) -> Result<Self, RepositoryError> {
        let git = locate_git()?;
        let tmp = tempfile::Builder::new()
            .prefix("commit-critic-")
            .tempdir()
            .map_err(RepositoryError::TempDir)?;

        info!("Cloning {} into {}", url, tmp.path().display());

        let spawn_err = |source| RepositoryError::Spawn {
            command: "git clone".into(),
            source,
        };
        let child = Command::new(&git)
            .args(["clone", "--bare", "--quiet", "--filter=blob:none", "--", url])
            .arg(tmp.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // `tmp` is dropped on every early return, removing the partial clone.
        let Some(output) = wait_with_deadline(child, timeout).map_err(spawn_err)? else {
            warn!("git clone of {url} did not finish within {}s", timeout.as_secs());
            return Err(RepositoryError::CloneTimedOut {
                url: url.to_string(),
                secs: timeout.as_secs(),
            });
        };
        if !output.status.success() {
            return Err(classify_clone_failure(url, &stderr_text(&output)));
        }

        Ok(GitRepo {
            git,
            dir: tmp.path().to_path_buf(),
            _clone: Some(tmp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Run a git command and capture stdout as String.
    fn git_output(&self, args: &[&str]) -> Result<String, RepositoryError> {
        let output = run(&self.git, &self.dir, args)?;

        if !output.status.success() {
            return Err(RepositoryError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: stderr_text(&output),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn has_head(&self) -> Result<bool, RepositoryError> {
        let output = run(&self.git, &self.dir, &["rev-parse", "--verify", "--quiet", "HEAD"])?;
        Ok(output.status.success())
    }
}

impl CommitLog for GitRepo {
    fn list_commits(&self, count: u32) -> Result<Vec<CommitRecord>, RepositoryError> {
        if count == 0 || !self.has_head()? {
            return Ok(vec![]);
        }

        let max_count = format!("--max-count={count}");
        let format = "--format=%x1e%H%x1f%an%x1f%aI%x1f%B%x1f";
        // Rename detection would fetch blobs into a blob-less clone.
        let log = self.git_output(&["log", &max_count, "--no-renames", "--name-status", format])?;
        let commits = parse_log(&log);

        debug!("Read {} commit(s) from {}", commits.len(), self.dir.display());
        Ok(commits)
    }
}

impl StagingArea for GitRepo {
    fn staged_diff(&self) -> Result<Option<String>, RepositoryError> {
        let diff = self.git_output(&["diff", "--cached"])?;
        if diff.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(diff))
        }
    }

    fn commit(&self, message: &str) -> Result<(), RepositoryError> {
        info!("Creating commit in {}", self.dir.display());

        let mut child = Command::new(&self.git)
            .args(["commit", "--quiet", "--file=-"])
            .current_dir(&self.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RepositoryError::Spawn {
                command: "git commit".into(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .map_err(|source| RepositoryError::Spawn {
                    command: "git commit".into(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| RepositoryError::Spawn {
                command: "git commit".into(),
                source,
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = stderr_text(&output);
            if !stderr.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&stderr);
            }
            return Err(RepositoryError::CommitRejected { stderr: text });
        }

        Ok(())
    }
}

fn locate_git() -> Result<PathBuf, RepositoryError> {
    which::which("git").map_err(RepositoryError::GitNotFound)
}

fn run(git: &Path, dir: &Path, args: &[&str]) -> Result<Output, RepositoryError> {
    debug!("git {}", args.join(" "));
    Command::new(git)
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .map_err(|source| RepositoryError::Spawn {
            command: format!("git {}", args.join(" ")),
            source,
        })
}

/// Wait for `child`, killing it once `timeout` has passed. `None` means it was killed.
fn wait_with_deadline(mut child: Child, timeout: Duration) -> io::Result<Option<Output>> {
    // Drain stderr on the side so a chatty child never blocks on a full pipe.
    let reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    loop {
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        if let Some(status) = child.try_wait()? {
            let stderr = reader
                .map(|r| r.join().unwrap_or_default())
                .unwrap_or_default();
            return Ok(Some(Output {
                status,
                stdout: Vec::new(),
                stderr,
            }));
        }
        thread::sleep(CLONE_POLL.min(timeout.saturating_sub(started.elapsed())));
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn classify_clone_failure(url: &str, stderr: &str) -> RepositoryError {
    let lower = stderr.to_lowercase();
    let url = url.to_string();

    if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("terminal prompts disabled")
        || lower.contains("permission denied")
    {
        RepositoryError::CloneAuthRequired { url }
    } else if lower.contains("repository not found")
        || lower.contains("does not appear to be a git repository")
        || lower.contains("could not read from remote")
    {
        RepositoryError::CloneNotFound { url }
    } else {
        RepositoryError::CloneFailed {
            url,
            stderr: stderr.to_string(),
        }
    }
}

/// Parse `git log` output written with the record/field separators above.
fn parse_log(log: &str) -> Vec<CommitRecord> {
    let mut commits = Vec::new();

    for block in log.split(RECORD_SEP) {
        if block.trim().is_empty() {
            continue;
        }

        let mut fields = block.splitn(5, FIELD_SEP);
        let (Some(hash), Some(author), Some(date), Some(message)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let diff = fields.next().unwrap_or("");

        let hash = hash.trim();
        if hash.is_empty() {
            continue;
        }

        commits.push(CommitRecord {
            hash: hash.to_string(),
            author: author.trim().to_string(),
            date: date.trim().to_string(),
            message: message.trim().to_string(),
            diff: diff.trim().to_string(),
        });
    }

    commits
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    /// A throwaway repository driven through the git CLI.
    pub struct TestRepo {
        pub dir: TempDir,
        commits: Cell<u32>,
    }

    impl TestRepo {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().expect("Failed to create temp directory");
            let repo = TestRepo { dir, commits: Cell::new(0) };
            repo.git(&["init", "--quiet"]);
            repo.git(&["config", "user.name", "Test User"]);
            repo.git(&["config", "user.email", "test@example.com"]);
            repo.git(&["config", "commit.gpgsign", "false"]);
            repo
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn git(&self, args: &[&str]) -> String {
            let output = Command::new("git")
                .args(args)
                .current_dir(self.path())
                .output()
                .expect("Failed to run git");
            assert!(
                output.status.success(),
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr)
            );
            String::from_utf8_lossy(&output.stdout).to_string()
        }

        pub fn write(&self, name: &str, contents: &str) {
            fs::write(self.path().join(name), contents).expect("Failed to write file");
        }

        pub fn stage(&self, name: &str, contents: &str) {
            self.write(name, contents);
            self.git(&["add", name]);
        }

        /// Commit a new file; returns the full hash.
        pub fn commit(&self, message: &str) -> String {
            let n = self.commits.get();
            self.commits.set(n + 1);
            self.stage(&format!("file{n}.txt"), message);
            self.git(&["commit", "--quiet", "-m", message]);
            self.git(&["rev-parse", "HEAD"]).trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestRepo;
    use super::*;

    #[test]
    fn parses_log_blocks() {
        let log = "\x1eabc123\x1fAda\x1f2024-01-02T03:04:05+00:00\x1ffeat: add parser\n\nbody line\x1f\n\nA\tsrc/parser.rs\n\
                   \x1edef456\x1fBob\x1f2024-01-01T00:00:00+00:00\x1fMerge branch 'x'\x1f\n";
        let commits = parse_log(log);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc123");
        assert_eq!(commits[0].message, "feat: add parser\n\nbody line");
        assert_eq!(commits[0].diff, "A\tsrc/parser.rs");
        assert_eq!(commits[1].subject(), "Merge branch 'x'");
        assert!(commits[1].diff.is_empty());
    }

    #[test]
    fn short_hash_is_eight_chars() {
        let c = CommitRecord {
            hash: "0123456789abcdef".into(),
            author: String::new(),
            date: String::new(),
            message: "x".into(),
            diff: String::new(),
        };
        assert_eq!(c.short_hash(), "01234567");
    }

    #[test]
    fn lists_most_recent_first_and_respects_count() {
        let repo = TestRepo::new();
        let first = repo.commit("feat: first");
        let second = repo.commit("fix: second");
        let third = repo.commit("docs: third");

        let git = GitRepo::open(repo.path()).unwrap();

        let two = git.list_commits(2).unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].hash, third);
        assert_eq!(two[1].hash, second);
        assert_eq!(two[0].author, "Test User");
        assert!(two[0].diff.contains("file2.txt"));

        let all = git.list_commits(50).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].hash, first);
    }

    #[test]
    fn empty_repository_has_no_commits() {
        let repo = TestRepo::new();
        let git = GitRepo::open(repo.path()).unwrap();
        assert!(git.list_commits(10).unwrap().is_empty());
    }

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitRepo::open(dir.path()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotARepository { .. }));
    }

    #[test]
    fn staged_diff_signals_nothing_staged() {
        let repo = TestRepo::new();
        repo.commit("chore: init");
        let git = GitRepo::open(repo.path()).unwrap();
        assert_eq!(git.staged_diff().unwrap(), None);

        repo.write("unstaged.txt", "not added");
        assert_eq!(git.staged_diff().unwrap(), None);
    }

    #[test]
    fn staged_diff_is_stable_between_calls() {
        let repo = TestRepo::new();
        repo.commit("chore: init");
        repo.stage("new.txt", "hello\n");
        let git = GitRepo::open(repo.path()).unwrap();

        let first = git.staged_diff().unwrap().unwrap();
        let second = git.staged_diff().unwrap().unwrap();
        assert!(first.contains("new.txt"));
        assert_eq!(first, second);
    }

    #[test]
    fn commit_uses_message_verbatim() {
        let repo = TestRepo::new();
        repo.commit("chore: init");
        repo.stage("new.txt", "hello\n");
        let git = GitRepo::open(repo.path()).unwrap();

        git.commit("feat(io): add greeting\n\n- write hello").unwrap();

        let message = repo.git(&["log", "-1", "--format=%B"]);
        assert_eq!(message.trim(), "feat(io): add greeting\n\n- write hello");
        assert_eq!(git.staged_diff().unwrap(), None);
    }

    #[test]
    fn rejected_commit_surfaces_hook_output() {
        let repo = TestRepo::new();
        repo.commit("chore: init");
        repo.stage("new.txt", "hello\n");

        let hooks = repo.path().join(".git/hooks");
        std::fs::create_dir_all(&hooks).unwrap();
        let hook = hooks.join("pre-commit");
        std::fs::write(&hook, "#!/bin/sh\necho 'lint failed: trailing whitespace' >&2\nexit 1\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let git = GitRepo::open(repo.path()).unwrap();
        let err = git.commit("feat: blocked").unwrap_err();
        match err {
            RepositoryError::CommitRejected { stderr } => {
                assert!(stderr.contains("lint failed"), "got: {stderr}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(git.staged_diff().unwrap().is_some());
    }

    #[test]
    fn remote_clone_is_removed_on_drop() {
        let origin = TestRepo::new();
        origin.commit("feat: one");
        origin.commit("feat: two");

        let url = origin.path().to_string_lossy().to_string();
        let clone = GitRepo::clone_remote(&url).unwrap();
        let clone_path = clone.path().to_path_buf();
        assert!(clone_path.exists());

        let commits = clone.list_commits(50).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject(), "feat: two");

        drop(clone);
        assert!(!clone_path.exists());
    }

    #[test]
    fn failed_clone_is_a_repository_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").to_string_lossy().to_string();
        let err = GitRepo::clone_remote(&missing).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::CloneNotFound { .. } | RepositoryError::CloneFailed { .. }
        ));
    }

    #[test]
    fn clone_past_deadline_times_out() {
        let origin = TestRepo::new();
        origin.commit("feat: one");
        let url = origin.path().to_string_lossy().to_string();

        let err = GitRepo::clone_remote_within(&url, Duration::ZERO).unwrap_err();
        assert!(matches!(err, RepositoryError::CloneTimedOut { secs: 0, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn stalled_child_is_killed_at_deadline() {
        let child = Command::new("sleep")
            .arg("30")
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let started = Instant::now();
        let output = wait_with_deadline(child, Duration::from_millis(200)).unwrap();
        assert!(output.is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn finished_child_output_is_collected() {
        let child = Command::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let output = wait_with_deadline(child, Duration::from_secs(30)).unwrap().unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(stderr_text(&output), "oops");
    }

    #[test]
    fn clone_errors_are_classified() {
        let auth = classify_clone_failure(
            "https://github.com/me/private",
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled",
        );
        assert!(matches!(auth, RepositoryError::CloneAuthRequired { .. }));

        let missing = classify_clone_failure("https://x/y", "remote: Repository not found.");
        assert!(matches!(missing, RepositoryError::CloneNotFound { .. }));

        let other = classify_clone_failure("https://x/y", "fatal: unable to access: Could not resolve host");
        assert!(other.to_string().contains("Could not resolve host"));
    }
}
