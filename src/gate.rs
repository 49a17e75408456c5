//! Single-flight gate.
//!
//! Coalesces concurrent refresh attempts: while one fetch is in flight,
//! every other caller queues on the gate and resumes once the fetch
//! settles, instead of issuing its own upstream request. The gate only
//! deduplicates logical upstream work; it is not a mutual exclusion
//! primitive over shared memory.

use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Default)]
struct GateState {
    busy: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

/// Busy flag plus a FIFO list of single-shot waiters.
#[derive(Debug, Default)]
pub struct FetchGate {
    state: Mutex<GateState>,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current flag value.
    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.busy
    }

    /// Transition free -> busy.
    ///
    /// Returns `false` when the gate is already held. The check and the
    /// flip happen under one lock, so exactly one of any number of
    /// concurrent callers wins.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.busy {
            false
        } else {
            state.busy = true;
            true
        }
    }

    /// Set the flag.
    ///
    /// Setting it to `true` only flips the flag. Setting it to `false`
    /// drains the waiter list, resuming every queued waiter in FIFO order
    /// exactly once.
    pub async fn set_busy(&self, busy: bool) {
        let mut state = self.state.lock().await;
        state.busy = busy;
        if !busy {
            for waiter in state.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    /// Release the gate, resuming all queued waiters.
    pub async fn release(&self) {
        self.set_busy(false).await;
    }

    /// Wait for the gate to be released.
    ///
    /// Resumes immediately when the gate is free. Otherwise the caller is
    /// queued until the next release; there is no timeout, so waiting on a
    /// gate whose holder never settles suspends forever.
    pub async fn wait(&self) {
        let rx = {
            let mut state = self.state.lock().await;
            if !state.busy {
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };
        // The sender only disappears if the gate itself is dropped.
        let _ = rx.await;
    }
}
