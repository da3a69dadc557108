//! External collaborators the engine drives: the renderer, the platform
//! publisher, and the engagement metrics source.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reelbot_core::{EngagementCounts, PublishResult, RenderResult, ThemedCombination};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default upper bound on one render command run.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render command is empty")]
    EmptyCommand,
    #[error("failed to run render command: {0}")]
    Io(#[from] std::io::Error),
    #[error("render command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("render command produced invalid output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("render command timed out after {0:?}")]
    Timeout(Duration),
    #[error("render produced an empty {0}")]
    Incomplete(&'static str),
}

/// Publishing failures. Both kinds consume one retry; the split exists for
/// logging and for the adapter's own classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("transient publish failure: {0}")]
    Transient(String),
    #[error("permanent publish failure: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
    #[error("metrics source rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, combo: &ThemedCombination) -> Result<RenderResult, RenderError>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, locator: &str, caption: &str) -> Result<PublishResult, PublishError>;
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, external_media_id: &str) -> Result<EngagementCounts, MetricsError>;
}

/// Runs an external program per combination.
///
/// The combination is written to the program's stdin as JSON; the program
/// must print a [`RenderResult`] JSON object on stdout and exit zero. The
/// command line is split on whitespace; no shell is involved.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    /// # Errors
    ///
    /// Returns [`RenderError::EmptyCommand`] if `command` has no program.
    pub fn new(command: &str, timeout: Duration) -> Result<Self, RenderError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(RenderError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    async fn run(&self, input: Vec<u8>) -> Result<RenderResult, RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let result: RenderResult = serde_json::from_slice(&output.stdout)?;
        if result.output_locator.trim().is_empty() {
            return Err(RenderError::Incomplete("output_locator"));
        }
        if result.caption.trim().is_empty() {
            return Err(RenderError::Incomplete("caption"));
        }
        Ok(result)
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, combo: &ThemedCombination) -> Result<RenderResult, RenderError> {
        let input = serde_json::to_vec(combo)?;
        tokio::time::timeout(self.timeout, self.run(input))
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
    }
}
