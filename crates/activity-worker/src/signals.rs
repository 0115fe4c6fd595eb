//! Process termination signals that make the in-flight task fail.

use std::io;

#[cfg(unix)]
use futures::future::select_all;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
#[cfg(unix)]
use tracing::{debug, warn};

/// Signals converted into a task failure report before the process exits
pub const TERMINATION_SIGNALS: [(&str, i32); 9] = [
    ("SIGHUP", 1),
    ("SIGINT", 2),
    ("SIGQUIT", 3),
    ("SIGILL", 4),
    ("SIGABRT", 6),
    ("SIGFPE", 8),
    ("SIGSEGV", 11),
    ("SIGPIPE", 13),
    ("SIGTERM", 15),
];

/// Installed listeners for [`TERMINATION_SIGNALS`]
pub struct TerminationSignals {
    #[cfg(unix)]
    listeners: Vec<(i32, Signal)>,
}

impl TerminationSignals {
    /// Install listeners for every termination signal the runtime allows.
    ///
    /// Synchronous fault signals (SIGILL, SIGFPE, SIGSEGV) cannot be handled
    /// asynchronously and are skipped with a warning.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        let mut listeners = Vec::new();

        for (name, signo) in TERMINATION_SIGNALS {
            match signal(SignalKind::from_raw(signo)) {
                Ok(listener) => {
                    debug!("Listening for {}", name);
                    listeners.push((signo, listener));
                }
                Err(e) => warn!("Cannot listen for {}: {}", name, e),
            }
        }

        if listeners.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "no termination signal could be registered",
            ));
        }

        Ok(TerminationSignals { listeners })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(TerminationSignals {})
    }

    /// Wait for the first termination signal and return its number
    #[cfg(unix)]
    pub async fn recv(mut self) -> i32 {
        let waits = self.listeners.iter_mut().map(|(signo, listener)| {
            let signo = *signo;
            Box::pin(async move {
                match listener.recv().await {
                    Some(()) => signo,
                    None => std::future::pending().await,
                }
            })
        });

        let (signo, _, _) = select_all(waits).await;
        signo
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> i32 {
        match tokio::signal::ctrl_c().await {
            Ok(()) => 2,
            Err(_) => std::future::pending().await,
        }
    }
}
