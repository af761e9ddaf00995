// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)
//
// There is no reload signal: the rewrite configuration is fixed for the
// lifetime of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Signal handler state
pub struct SignalHandler {
    /// Notified once when shutdown is requested
    pub shutdown: Arc<Notify>,
    /// Whether shutdown has been requested
    pub shutdown_requested: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record the request and wake the server loop
    ///
    /// Uses `notify_one` so a request that arrives before the loop awaits
    /// is not lost.
    pub fn request_shutdown(&self, signal: &str) {
        if !self.shutdown_requested.swap(true, Ordering::SeqCst) {
            logger::log_shutdown(signal);
            self.shutdown.notify_one();
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal listeners (Unix)
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => handler.request_shutdown("SIGTERM"),
            _ = sigint.recv() => handler.request_shutdown("SIGINT"),
        }
    });
    Ok(())
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            handler.request_shutdown("Ctrl+C");
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_shutdown_is_sticky_and_once() {
        let handler = SignalHandler::new();
        handler.request_shutdown("test");
        handler.request_shutdown("test");
        assert!(handler.shutdown_requested.load(Ordering::SeqCst));

        // Permit stored before anyone waited
        tokio::time::timeout(std::time::Duration::from_secs(1), handler.shutdown.notified())
            .await
            .unwrap();
    }
}
