/// Signal handling for graceful shutdown.
///
/// Listeners are registered up front by [`SignalHandler::install`] so a
/// signal that arrives before anyone awaits [`SignalHandler::wait`] is not
/// lost. Handles SIGINT (Ctrl-C) and SIGTERM on Unix; Ctrl-C elsewhere.
/// SIGQUIT keeps its default quit-with-core-dump behavior.
use std::fmt;

/// Which termination request ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
        };
        f.write_str(name)
    }
}

#[cfg(unix)]
pub struct SignalHandler {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalHandler {
    /// Register the listeners. Must be called from within a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination request.
    pub async fn wait(&mut self) -> ShutdownReason {
        let reason = tokio::select! {
            _ = self.sigint.recv() => ShutdownReason::Interrupt,
            _ = self.sigterm.recv() => ShutdownReason::Terminate,
        };
        tracing::info!(signal = %reason, "termination signal received");
        reason
    }
}

#[cfg(not(unix))]
pub struct SignalHandler {
    _private: (),
}

#[cfg(not(unix))]
impl SignalHandler {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self { _private: () })
    }

    pub async fn wait(&mut self) -> ShutdownReason {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c listener failed, shutting down");
        }
        tracing::info!(signal = %ShutdownReason::Interrupt, "termination signal received");
        ShutdownReason::Interrupt
    }
}
