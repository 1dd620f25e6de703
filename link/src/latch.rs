//! Re-armable readiness latch.
//!
//! A connect attempt is represented by one *generation* of the latch.  Any
//! number of callers capture a [`ReadinessSignal`] for the current generation
//! and await it; the attempt settles the generation exactly once, releasing
//! every waiter with the same outcome.  [`ReadinessLatch::rearm`] starts a new
//! generation so later callers never observe a stale outcome, while callers
//! that captured the old generation still resolve against it.
//!
//! Settling is generation-checked: a late callback from an abandoned attempt
//! cannot resolve the signal of a newer attempt.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Reason used when a pending generation is replaced before it settled.
pub const RESET_REASON: &str = "connection reset";

/// State of one latch generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

impl Readiness {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Readiness::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

struct Slot {
    generation: u64,
    tx: watch::Sender<Readiness>,
}

impl Slot {
    fn settle(&self, outcome: Readiness) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_settled() {
                false
            } else {
                *state = outcome;
                true
            }
        })
    }
}

/// Broadcast one-shot gate that can be re-armed.
pub struct ReadinessLatch {
    slot: Mutex<Slot>,
}

impl Default for ReadinessLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadinessLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (generation, state) = self.snapshot();
        f.debug_struct("ReadinessLatch")
            .field("generation", &generation)
            .field("state", &state)
            .finish()
    }
}

impl ReadinessLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::Pending);
        Self {
            slot: Mutex::new(Slot { generation: 0, tx }),
        }
    }

    /// Capture the current generation.
    pub fn signal(&self) -> ReadinessSignal {
        let slot = self.slot.lock();
        ReadinessSignal {
            generation: slot.generation,
            rx: slot.tx.subscribe(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Current generation and its state.
    pub fn snapshot(&self) -> (u64, Readiness) {
        let slot = self.slot.lock();
        let state = slot.tx.borrow().clone();
        (slot.generation, state)
    }

    /// Mark `generation` as ready.  Returns `false` if it is stale or
    /// already settled.
    pub fn resolve(&self, generation: u64) -> bool {
        let slot = self.slot.lock();
        slot.generation == generation && slot.settle(Readiness::Ready)
    }

    /// Mark `generation` as failed.  Returns `false` if it is stale or
    /// already settled.
    pub fn reject(&self, generation: u64, reason: impl Into<String>) -> bool {
        let slot = self.slot.lock();
        slot.generation == generation && slot.settle(Readiness::Failed(reason.into()))
    }

    /// Start a fresh pending generation and return its number.
    ///
    /// A still-pending outgoing generation is failed with [`RESET_REASON`].
    pub fn rearm(&self) -> u64 {
        let mut slot = self.slot.lock();
        Self::replace(&mut slot)
    }

    /// Re-arm only if `generation` is current and failed.
    pub fn rearm_if_failed(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        let failed = matches!(*slot.tx.borrow(), Readiness::Failed(_));
        if slot.generation != generation || !failed {
            return false;
        }
        Self::replace(&mut slot);
        true
    }

    fn replace(slot: &mut Slot) -> u64 {
        slot.settle(Readiness::Failed(RESET_REASON.to_string()));
        let (tx, _rx) = watch::channel(Readiness::Pending);
        slot.tx = tx;
        slot.generation += 1;
        slot.generation
    }
}

/// A captured latch generation.  Cheap to clone; each clone waits independently.
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
    generation: u64,
    rx: watch::Receiver<Readiness>,
}

impl ReadinessSignal {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// State right now, without waiting.
    #[cfg(test)]
    fn peek(&self) -> Readiness {
        self.rx.borrow().clone()
    }

    /// Wait until this generation settles.
    pub async fn wait(mut self) -> Readiness {
        match self.rx.wait_for(Readiness::is_settled).await {
            Ok(state) => (*state).clone(),
            // The latch itself was dropped while we waited.
            Err(_) => Readiness::Failed("readiness latch closed".to_string()),
        }
    }

    /// Wait at most `limit`; `None` when the generation is still pending.
    pub async fn wait_timeout(self, limit: Duration) -> Option<Readiness> {
        tokio::time::timeout(limit, self.wait()).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolve_releases_all_waiters() {
        let latch = Arc::new(ReadinessLatch::new());
        let generation = latch.generation();

        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let signal = latch.signal();
                tokio::spawn(signal.wait())
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(latch.resolve(generation));

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Readiness::Ready);
        }
    }

    #[tokio::test]
    async fn test_settles_only_once() {
        let latch = ReadinessLatch::new();
        assert!(latch.reject(0, "bad token"));
        assert!(!latch.resolve(0));
        assert_eq!(latch.signal().wait().await, Readiness::Failed("bad token".into()));
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let latch = ReadinessLatch::new();
        let old = latch.generation();
        let new = latch.rearm();
        assert_ne!(old, new);

        assert!(!latch.resolve(old));
        assert_eq!(latch.snapshot(), (new, Readiness::Pending));
        assert!(latch.resolve(new));
    }

    #[tokio::test]
    async fn test_rearm_fails_pending_waiters_of_old_generation() {
        let latch = ReadinessLatch::new();
        let captured = latch.signal();

        latch.rearm();

        assert_eq!(captured.wait().await, Readiness::Failed(RESET_REASON.into()));
        assert_eq!(latch.signal().peek(), Readiness::Pending);
    }

    #[tokio::test]
    async fn test_rearm_keeps_settled_outcome_for_captured_signal() {
        let latch = ReadinessLatch::new();
        let captured = latch.signal();
        latch.resolve(0);
        latch.rearm();

        assert_eq!(captured.wait().await, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_rearm_if_failed() {
        let latch = ReadinessLatch::new();
        assert!(!latch.rearm_if_failed(0), "pending generation must not re-arm");

        latch.reject(0, "refused");
        assert!(!latch.rearm_if_failed(7), "stale generation must not re-arm");
        assert!(latch.rearm_if_failed(0));
        assert_eq!(latch.snapshot(), (1, Readiness::Pending));

        // A second observer of the same failure is a no-op.
        assert!(!latch.rearm_if_failed(0));
        assert_eq!(latch.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout() {
        let latch = ReadinessLatch::new();
        let outcome = latch.signal().wait_timeout(Duration::from_secs(1)).await;
        assert!(outcome.is_none());

        latch.resolve(0);
        let outcome = latch.signal().wait_timeout(Duration::from_secs(1)).await;
        assert_eq!(outcome, Some(Readiness::Ready));
    }

    #[tokio::test]
    async fn test_late_signal_sees_settled_state() {
        let latch = ReadinessLatch::new();
        latch.resolve(0);
        let signal = latch.signal();
        assert!(signal.peek().is_ready());
        assert_eq!(signal.wait().await, Readiness::Ready);
    }
}
