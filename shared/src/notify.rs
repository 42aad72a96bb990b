/*!
Capture-done notification.

A single-slot flag between the interrupt source and the one thread waiting for
captures. Signals that arrive while the flag is already set are coalesced, so
a waiter may observe one wake for several interrupts. The status register is
authoritative for how many frames are pending, so nothing is lost by this.
*/

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use tracing::debug;

/// Create a connected notifier / waiter pair
pub fn ready_flag() -> (Notifier, ReadyWaiter) {
    let (tx, rx) = bounded(1);
    (Notifier { tx }, ReadyWaiter { rx })
}

/// Setter side, owned by the interrupt source
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<()>,
}

impl Notifier {
    /// Raise the flag. Returns false once the waiter is gone.
    pub fn signal(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("ready flag already set, coalescing");
                true
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Outcome of waiting on the flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Signalled,
    TimedOut,
    Closed,
}

/// Waiter side. Not cloneable: one waiter per device.
#[derive(Debug)]
pub struct ReadyWaiter {
    rx: Receiver<()>,
}

impl ReadyWaiter {
    /// Block until the flag is raised, then clear it
    pub fn wait(&self) -> Wake {
        match self.rx.recv() {
            Ok(()) => Wake::Signalled,
            Err(_) => Wake::Closed,
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Wake {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Wake::Signalled,
            Err(RecvTimeoutError::Timeout) => Wake::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Wake::Closed,
        }
    }

    /// Drop a stale flag without blocking
    pub fn clear(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signals_coalesce() {
        let (notifier, waiter) = ready_flag();
        assert!(notifier.signal());
        assert!(notifier.signal());
        assert!(notifier.signal());

        assert_eq!(waiter.wait_timeout(Duration::from_millis(10)), Wake::Signalled);
        assert_eq!(waiter.wait_timeout(Duration::from_millis(10)), Wake::TimedOut);
    }

    #[test]
    fn test_wake_clears_flag() {
        let (notifier, waiter) = ready_flag();
        notifier.signal();
        assert!(waiter.clear());
        assert!(!waiter.clear());
    }

    #[test]
    fn test_cross_thread_wake() {
        let (notifier, waiter) = ready_flag();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.signal();
        });
        assert_eq!(waiter.wait(), Wake::Signalled);
        handle.join().unwrap();
    }

    #[test]
    fn test_closed_source() {
        let (notifier, waiter) = ready_flag();
        drop(notifier);
        assert_eq!(waiter.wait(), Wake::Closed);

        let (notifier, waiter) = ready_flag();
        drop(waiter);
        assert!(!notifier.signal());
    }
}
