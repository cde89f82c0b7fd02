//! Queue of players awaiting a verdict from the dealer.
//!
//! The queue is a plain FIFO of player ids behind a [`FairGate`]: a player
//! holds the gate for its whole input-processing burst (submitting as its
//! last action), and the dealer holds it for a whole drain. That admission
//! discipline is what keeps a submitted proposal's tokens untouched until
//! the dealer has judged them.
//!
//! Each submission also rings the dealer's bell, cutting its 25 ms nap
//! short so verdicts arrive promptly.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::game::PlayerId;
use crate::sync::{lock_unpoisoned, FairGate, GatePermit};

/// Wake-up line from submitters to the sleeping dealer.
///
/// A rung bell stays rung until consumed, so a submission landing just
/// before the dealer goes to sleep is not lost.
#[derive(Debug, Default)]
struct DealerBell {
    rung: Mutex<bool>,
    bell: Condvar,
}

impl DealerBell {
    fn ring(&self) {
        let mut rung = lock_unpoisoned(&self.rung);
        *rung = true;
        self.bell.notify_one();
    }

    /// Wait until rung or until `timeout` elapses, consuming the signal.
    fn wait(&self, timeout: Duration) {
        let deadline = std::time::Instant::now() + timeout;
        let mut rung = lock_unpoisoned(&self.rung);
        while !*rung {
            let now = std::time::Instant::now();
            if now >= deadline {
                break;
            }
            rung = self
                .bell
                .wait_timeout(rung, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *rung = false;
    }
}

/// Error returned by [`ProposalQueue::submit`] after shutdown has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal queue is closed")
    }
}

impl std::error::Error for QueueClosed {}

/// FIFO of players whose tokens await validation.
#[derive(Debug)]
pub struct ProposalQueue {
    gate: FairGate,
    pending: Mutex<VecDeque<PlayerId>>,
    bell: DealerBell,
    closed: AtomicBool,
}

impl ProposalQueue {
    /// Create an empty queue for up to `players` concurrent proposals.
    #[must_use]
    pub fn new(players: usize) -> Self {
        Self {
            gate: FairGate::new(),
            pending: Mutex::new(VecDeque::with_capacity(players)),
            bell: DealerBell::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Block until admitted as the sole mutator, FIFO with other claimants.
    pub fn lock(&self) -> GatePermit<'_> {
        self.gate.acquire()
    }

    /// Claim mutator admission only if nobody holds or awaits it.
    pub fn try_lock(&self) -> Option<GatePermit<'_>> {
        self.gate.try_acquire()
    }

    /// Append `player` and wake the dealer. Requires mutator admission.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once shutdown has begun.
    pub fn submit(&self, _admission: &GatePermit<'_>, player: PlayerId) -> Result<(), QueueClosed> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueClosed);
        }
        {
            let mut pending = lock_unpoisoned(&self.pending);
            debug_assert!(
                !pending.contains(&player),
                "player {player} already has a pending proposal"
            );
            pending.push_back(player);
        }
        self.bell.ring();
        Ok(())
    }

    /// Pop the oldest pending player, if any. Requires mutator admission.
    pub fn drain_one(&self, _admission: &GatePermit<'_>) -> Option<PlayerId> {
        lock_unpoisoned(&self.pending).pop_front()
    }

    /// Advisory emptiness check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.pending).is_empty()
    }

    /// Refuse further submissions and wake the dealer one last time.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.bell.ring();
    }

    /// Dealer nap: returns when a submission arrives or `timeout` elapses.
    pub fn wait_for_submission(&self, timeout: Duration) {
        self.bell.wait(timeout);
    }
}
