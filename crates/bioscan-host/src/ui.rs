//! The UI surface: the unprivileged process the bridge talks to.
//!
//! The UI runs as a child process with piped stdio. Its stdout carries bridge
//! requests to the host and its stdin carries responses and notifications
//! back. It inherits stderr so its own logs land next to the host's. In
//! headless mode the host's own stdin/stdout stand in for the child.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::UiSection;

pub type UiReader = Box<dyn AsyncRead + Send + Unpin>;
pub type UiWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("no UI command configured (set ui.command or run with --stdio)")]
    NoCommand,

    #[error("failed to start UI '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("UI process has no piped {0}")]
    MissingPipe(&'static str),

    #[error("failed to wait for UI process: {0}")]
    Wait(#[source] std::io::Error),
}

/// A running UI surface with its bridge streams.
pub struct UiSurface {
    reader: UiReader,
    writer: UiWriter,
    process: UiProcess,
}

impl std::fmt::Debug for UiSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiSurface").field("process", &self.process).finish_non_exhaustive()
    }
}

impl UiSurface {
    /// Start the configured UI program.
    ///
    /// # Errors
    ///
    /// Fails when no command is configured or the program cannot be started.
    pub fn spawn(config: &UiSection) -> Result<Self, UiError> {
        if config.command.trim().is_empty() {
            return Err(UiError::NoCommand);
        }

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| UiError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(UiError::MissingPipe("stdout"))?;
        let stdin = child.stdin.take().ok_or(UiError::MissingPipe("stdin"))?;
        info!(command = %config.command, pid = child.id(), "UI surface started");

        Ok(Self {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            process: UiProcess { child: Some(child) },
        })
    }

    /// Serve the bridge over the host's own stdin/stdout.
    pub fn headless() -> Self {
        info!("Serving bridge on stdio");
        Self {
            reader: Box::new(tokio::io::stdin()),
            writer: Box::new(tokio::io::stdout()),
            process: UiProcess { child: None },
        }
    }

    /// Wrap arbitrary streams, e.g. an in-memory pipe.
    pub fn from_streams(reader: UiReader, writer: UiWriter) -> Self {
        Self {
            reader,
            writer,
            process: UiProcess { child: None },
        }
    }

    pub fn into_parts(self) -> (UiReader, UiWriter, UiProcess) {
        (self.reader, self.writer, self.process)
    }
}

/// Lifetime of the UI child process, if there is one.
#[derive(Debug)]
pub struct UiProcess {
    child: Option<Child>,
}

impl UiProcess {
    pub fn is_child(&self) -> bool {
        self.child.is_some()
    }

    /// Give the UI `grace` to exit on its own, then kill it.
    pub async fn reap(self, grace: Duration) -> Result<Option<ExitStatus>, UiError> {
        let Some(mut child) = self.child else {
            return Ok(None);
        };

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(UiError::Wait)?;
                debug!(%status, "UI surface exited");
                Ok(Some(status))
            }
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "UI surface did not exit, killing it");
                child.kill().await.map_err(UiError::Wait)?;
                let status = child.wait().await.map_err(UiError::Wait)?;
                Ok(Some(status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_without_command() {
        let error = UiSurface::spawn(&UiSection::default()).unwrap_err();
        assert!(matches!(error, UiError::NoCommand));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let config = UiSection {
            command: "/nonexistent/bioscan-ui".to_string(),
            ..UiSection::default()
        };

        let error = UiSurface::spawn(&config).unwrap_err();
        assert!(matches!(error, UiError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_reap_without_child() {
        let (reader, writer) = tokio::io::duplex(64);
        let surface = UiSurface::from_streams(Box::new(reader), Box::new(writer));
        let (_, _, process) = surface.into_parts();

        assert!(!process.is_child());
        assert!(process.reap(Duration::from_secs(1)).await.unwrap().is_none());
    }
}
