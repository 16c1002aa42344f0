//! Shutdown signalling for the event loop.
//!
//! A `Shutdown` is a cloneable flag checked by the loop before every
//! iteration. Handles created with [`Shutdown::on_signals`] additionally
//! observe SIGINT/SIGTERM through a process-wide flag set by the handler.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set from the signal handler; only async-signal-safe work happens there.
static SIGNALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
}

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    watch_signals: bool,
}

impl Shutdown {
    /// A shutdown handle triggered only through [`Shutdown::trigger`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A shutdown handle that also fires on SIGINT or SIGTERM.
    pub fn on_signals() -> io::Result<Self> {
        for sig in [libc::SIGINT, libc::SIGTERM] {
            // SAFETY: the handler only stores to an atomic.
            let prev = unsafe {
                libc::signal(sig, on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t)
            };
            if prev == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(Self {
            requested: Arc::new(AtomicBool::new(false)),
            watch_signals: true,
        })
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
            || (self.watch_signals && SIGNALLED.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared_between_clones() {
        let shutdown = Shutdown::new();
        let observer = shutdown.clone();
        assert!(!observer.is_requested());

        shutdown.trigger();
        assert!(observer.is_requested());
    }

    #[test]
    fn test_manual_handle_ignores_signal_flag() {
        // A plain handle never consults the process-wide flag
        let shutdown = Shutdown::new();
        assert!(!shutdown.watch_signals);
        assert!(!shutdown.is_requested());
    }

    #[test]
    fn test_sigterm_requests_shutdown() {
        let shutdown = Shutdown::on_signals().unwrap();

        // Direct the signal at this thread so other tests' readiness
        // queries are not interrupted
        let rc = unsafe { libc::pthread_kill(libc::pthread_self(), libc::SIGTERM) };
        assert_eq!(rc, 0);

        assert!(shutdown.is_requested());
        assert!(shutdown.clone().is_requested());
    }
}
