/// Publishing catalog changes to the static site repository
///
/// A synchronization stages everything, commits, and pushes to the configured
/// remote on a dedicated thread. The Publisher owns an in-flight token so at
/// most one run exists at a time; a request made while one is running is
/// refused with `Busy` instead of being queued. The result is delivered once
/// through the returned SyncJob.

pub mod git;

use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::{Config, TokenSource};
pub use git::{CommandOutput, GitCli, VersionControl};

/// Placeholder in the remote URL template replaced by the access token
const TOKEN_PLACEHOLDER: &str = "{token}";
const REDACTED: &str = "***";

/// The three commands a synchronization runs, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Stage,
    Commit,
    Push,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::Stage => "git add",
            SyncStep::Commit => "git commit",
            SyncStep::Push => "git push",
        };
        f.write_str(name)
    }
}

/// Everything that can stop a synchronization.
///
/// Errors carry text only so they can travel through UI messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("a synchronization is already running, please wait")]
    Busy,
    #[error("{} was not found; make sure it is installed and on PATH", .0.display())]
    ToolNotFound(PathBuf),
    #[error("cannot start the version control tool: {0}")]
    Launch(String),
    #[error("{step} failed\ncommand: {command}\nstdout: {stdout}\nstderr: {stderr}")]
    StepFailed {
        step: SyncStep,
        command: String,
        stdout: String,
        stderr: String,
    },
    #[error("no access token found in {0}")]
    MissingToken(String),
    #[error("no remote URL configured (publish.remote-url)")]
    RemoteNotConfigured,
    #[error("the synchronization stopped without reporting a result")]
    Interrupted,
}

/// What a synchronization acts on
#[derive(Debug, Clone)]
pub struct PublishTarget {
    /// Repository checkout the commands run in
    pub workdir: PathBuf,
    /// Push URL template containing `{token}`
    pub remote_url: String,
    pub branch: String,
    pub token_source: TokenSource,
    pub default_message: String,
}

impl PublishTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workdir: config.project_dir.clone(),
            remote_url: config.publish.remote_url.clone(),
            branch: config.publish.branch.clone(),
            token_source: config.token_source(),
            default_message: config.publish.default_message.clone(),
        }
    }
}

/// Successful synchronization
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub commit_message: String,
    pub branch: String,
    /// Remote URL with the token masked
    pub remote: String,
    pub finished_at: DateTime<Local>,
}

/// Pending result of a synchronization started by [`Publisher::synchronize`]
#[derive(Debug)]
pub struct SyncJob {
    rx: oneshot::Receiver<Result<SyncReport, PublishError>>,
}

impl SyncJob {
    /// Block the current thread until the run finishes.
    /// Must not be called from inside an async runtime.
    #[cfg(test)]
    pub fn wait(self) -> Result<SyncReport, PublishError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(PublishError::Interrupted))
    }

    /// Resolve when the run finishes
    pub async fn finished(self) -> Result<SyncReport, PublishError> {
        self.rx.await.unwrap_or(Err(PublishError::Interrupted))
    }
}

/// Releases the in-flight token on every exit path, panics included
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner<V> {
    vcs: V,
    target: PublishTarget,
}

/// Runs synchronizations, at most one at a time
pub struct Publisher<V: VersionControl = GitCli> {
    inner: Arc<Inner<V>>,
    in_flight: Arc<AtomicBool>,
}

impl<V: VersionControl> Clone for Publisher<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl Publisher<GitCli> {
    /// Publisher using the configured `git` binary
    pub fn from_config(config: &Config) -> Self {
        Publisher::new(
            GitCli::new(config.publish.git_program.clone()),
            PublishTarget::from_config(config),
        )
    }
}

impl<V: VersionControl> Publisher<V> {
    pub fn new(vcs: V, target: PublishTarget) -> Self {
        Self {
            inner: Arc::new(Inner { vcs, target }),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a synchronization is currently running
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a synchronization on a background thread.
    ///
    /// Returns `Busy` right away if one is already running; nothing is invoked
    /// in that case. A blank or missing message uses the configured default.
    pub fn synchronize(&self, message: Option<String>) -> Result<SyncJob, PublishError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Synchronization requested while another is running");
            return Err(PublishError::Busy);
        }
        let guard = InFlight(Arc::clone(&self.in_flight));

        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.inner.target.default_message.clone());

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);

        // If spawning fails the closure is dropped and the guard with it
        thread::Builder::new()
            .name("publisher".to_string())
            .spawn(move || {
                let result = inner.run(&message);
                match &result {
                    Ok(report) => info!("Synchronized to {} ({})", report.remote, report.branch),
                    Err(e) => error!("Synchronization failed: {}", e),
                }
                // Free the slot before anyone can observe the result
                drop(guard);
                if tx.send(result).is_err() {
                    warn!("Synchronization finished but nobody was waiting for it");
                }
            })
            .map_err(|e| PublishError::Launch(e.to_string()))?;

        Ok(SyncJob { rx })
    }
}

impl<V: VersionControl> Inner<V> {
    fn run(&self, message: &str) -> Result<SyncReport, PublishError> {
        let target = &self.target;

        self.step(SyncStep::Stage, vec!["add".into(), ".".into()], None)?;
        self.step(
            SyncStep::Commit,
            vec!["commit".into(), "-m".into(), message.to_string()],
            None,
        )?;

        let token = read_token(&target.token_source)?;
        if target.remote_url.trim().is_empty() {
            return Err(PublishError::RemoteNotConfigured);
        }
        let remote = target.remote_url.replace(TOKEN_PLACEHOLDER, &token);

        self.step(
            SyncStep::Push,
            vec!["push".into(), remote.clone(), target.branch.clone()],
            Some(&token),
        )?;

        Ok(SyncReport {
            commit_message: message.to_string(),
            branch: target.branch.clone(),
            remote: redact(&remote, Some(&token)),
            finished_at: Local::now(),
        })
    }

    fn step(
        &self,
        step: SyncStep,
        args: Vec<String>,
        secret: Option<&str>,
    ) -> Result<CommandOutput, PublishError> {
        let output = self.invoke(&args)?;

        if !output.success {
            return Err(PublishError::StepFailed {
                step,
                command: redact(&format!("git {}", args.join(" ")), secret),
                stdout: redact(output.stdout.trim(), secret),
                stderr: redact(output.stderr.trim(), secret),
            });
        }

        info!("{} successful", step);
        Ok(output)
    }

    fn invoke(&self, args: &[String]) -> Result<CommandOutput, PublishError> {
        self.vcs.run(&self.target.workdir, args)
    }
}

/// Read the access token; absent or blank is `MissingToken`
fn read_token(source: &TokenSource) -> Result<String, PublishError> {
    let (token, origin) = match source {
        TokenSource::File(path) => (
            std::fs::read_to_string(path).ok(),
            path.display().to_string(),
        ),
        TokenSource::Env(var) => (std::env::var(var).ok(), format!("${}", var)),
    };

    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(PublishError::MissingToken(origin))
}

fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, REDACTED),
        _ => text.to_string(),
    }
}
