use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of one git invocation that actually ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

/// The git process could not be run to completion at all.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args} timed out after {timeout:?}")]
    Timeout { args: String, timeout: Duration },
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs git with `args`. A non-zero exit is reported through
    /// `GitOutput::success`, never as an `Err`.
    async fn run(&self, args: &[&str]) -> Result<GitOutput, RunnerError>;
}

/// Repository selected for a session. `None` means the process working directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoContext {
    path: Option<PathBuf>,
}

impl RepoContext {
    pub fn current_dir() -> Self {
        Self { path: None }
    }

    pub fn select(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(anyhow::anyhow!("Path '{}' does not exist", path.display()));
        }
        let repo_path = path.canonicalize()?;
        if !repo_path.join(".git").exists() {
            return Err(anyhow::anyhow!(
                "'{}' is not a git repository",
                repo_path.display()
            ));
        }
        Ok(Self {
            path: Some(repo_path),
        })
    }

    /// Checks the working directory when no explicit repository was selected.
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.path {
            Some(path) if path.join(".git").exists() => Ok(()),
            Some(path) => Err(anyhow::anyhow!(
                "'{}' is not a git repository",
                path.display()
            )),
            None if Path::new(".git").exists() => Ok(()),
            None => Err(anyhow::anyhow!("Current directory is not a git repository")),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "Current directory".to_string(),
        }
    }

    pub fn runner(&self, timeout: Duration) -> GitCli {
        GitCli::new(self.path.clone(), timeout)
    }
}

/// Runs the real `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    repo_path: Option<PathBuf>,
    timeout: Duration,
}

impl GitCli {
    pub fn new(repo_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: "git".into(),
            repo_path,
            timeout,
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: &str) -> Self {
        self.program = program.into();
        self
    }

    fn full_args(&self, args: &[&str]) -> Vec<OsString> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(repo) = &self.repo_path {
            full.push("-C".into());
            full.push(repo.as_os_str().to_owned());
        }
        full.extend(args.iter().map(|a| a.into()));
        full
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    async fn run(&self, args: &[&str]) -> Result<GitOutput, RunnerError> {
        debug!(args = ?args, repo = ?self.repo_path, "Running git");

        let mut cmd = Command::new(&self.program);
        cmd.args(self.full_args(args))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RunnerError::Timeout {
                    args: args.join(" "),
                    timeout: self.timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        trace!(exit_code = output.status.code().unwrap_or(-1), "git finished");

        Ok(GitOutput {
            stdout,
            stderr,
            success: output.status.success(),
        })
    }
}

pub fn git_available() -> bool {
    which::which("git").is_ok()
}
