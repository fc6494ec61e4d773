//! Cooperative cancellation for the long-running loops.
//!
//! Both the timelapse scheduler and the event monitor sleep between network
//! calls; a plain `thread::sleep` would make Ctrl-C wait out the remainder
//! of an interval before the summary prints. The token here is a
//! zero-message channel: waits are `recv_timeout` calls that return early
//! the moment the signal handler fires, so cancellation interrupts a sleep
//! but never an in-flight actuation.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::cell::Cell;
use std::time::Duration;

/// Receiving half of the cancellation channel.
///
/// Cancellation is sticky: once observed (directly or because the sending
/// half went away), every later query answers "cancelled".
pub struct CancelToken {
    rx: Receiver<()>,
    observed: Cell<bool>,
}

impl CancelToken {
    fn new(rx: Receiver<()>) -> Self {
        Self {
            rx,
            observed: Cell::new(false),
        }
    }

    /// Wait up to `timeout`. Returns true when cancelled during the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.observed.get() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.observed.set(true);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        if self.observed.get() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(()) => {
                self.observed.set(true);
                true
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                self.observed.set(true);
                true
            }
            Err(crossbeam_channel::TryRecvError::Empty) => false,
        }
    }
}

/// Install a Ctrl-C handler wired to a fresh token.
pub fn install_ctrlc() -> Result<CancelToken, ctrlc::Error> {
    let (tx, rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        // Full channel means cancellation is already pending.
        let _ = tx.try_send(());
    })?;
    Ok(CancelToken::new(rx))
}

/// Token plus a manual trigger, for tests and embedding.
pub fn manual() -> (Sender<()>, CancelToken) {
    let (tx, rx) = bounded::<()>(1);
    (tx, CancelToken::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_times_out_when_not_cancelled() {
        let (_tx, token) = manual();
        assert!(!token.wait(Duration::from_millis(10)));
    }

    #[test]
    fn wait_returns_early_on_cancel() {
        let (tx, token) = manual();
        tx.send(()).unwrap();
        let start = std::time::Instant::now();
        assert!(token.wait(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn dropped_sender_counts_as_cancelled() {
        let (tx, token) = manual();
        drop(tx);
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_is_sticky() {
        let (tx, token) = manual();
        tx.send(()).unwrap();
        assert!(token.is_cancelled());
        assert!(token.is_cancelled());
        assert!(token.wait(Duration::from_millis(1)));
    }

    #[test]
    fn not_cancelled_initially() {
        let (_tx, token) = manual();
        assert!(!token.is_cancelled());
    }
}
