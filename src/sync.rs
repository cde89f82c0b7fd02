//! Thread-coordination primitives shared across the engine.
//!
//! Two building blocks live here:
//!
//! - [`ShutdownToken`]: a cooperative stop flag every blocking wait in the
//!   engine observes. Tripping it wakes all sleepers, so a session can be
//!   torn down without waiting out freeze timers or card-reveal delays.
//! - [`FairGate`]: a FIFO ticket lock handing out RAII permits. The proposal
//!   queue uses it to admit one mutator at a time without starving anyone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
///
/// The engine's shared state stays consistent across unwinds (mutations are
/// completed before guards drop), so continuing past poison is sound.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cooperative shutdown flag shared by every thread in a session.
///
/// All blocking operations in the engine either poll [`is_shutdown`] or sleep
/// through [`sleep`], so a single [`shutdown`] call unblocks the whole thread
/// ensemble.
///
/// [`is_shutdown`]: ShutdownToken::is_shutdown
/// [`sleep`]: ShutdownToken::sleep
/// [`shutdown`]: ShutdownToken::shutdown
#[derive(Debug, Default)]
pub struct ShutdownToken {
    flag: AtomicBool,
    lock: Mutex<()>,
    waiters: Condvar,
}

impl ShutdownToken {
    /// Create a token in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Request shutdown and wake every sleeper on this token.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
        let _guard = lock_unpoisoned(&self.lock);
        self.waiters.notify_all();
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// sleep was cut short by shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_shutdown();
        }
        let deadline = Instant::now() + duration;
        let mut guard = lock_unpoisoned(&self.lock);
        while !self.is_shutdown() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            guard = self
                .waiters
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        false
    }
}

/// State of a [`FairGate`]: the next ticket to hand out and the ticket
/// currently allowed through.
#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// A FIFO ticket lock.
///
/// Contenders take a ticket and are admitted strictly in ticket order, so a
/// burst of activity from one thread cannot starve another. Admission is
/// represented by a [`GatePermit`] that reopens the gate on drop.
#[derive(Debug, Default)]
pub struct FairGate {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl FairGate {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until admitted, in FIFO order with other contenders.
    pub fn acquire(&self) -> GatePermit<'_> {
        let mut tickets = lock_unpoisoned(&self.tickets);
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        GatePermit { gate: self }
    }

    /// Take the gate only if nobody holds or awaits it.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        let mut tickets = lock_unpoisoned(&self.tickets);
        if tickets.serving == tickets.next {
            tickets.next += 1;
            Some(GatePermit { gate: self })
        } else {
            None
        }
    }
}

/// Exclusive admission through a [`FairGate`]; released on drop.
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a FairGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        let mut tickets = lock_unpoisoned(&self.gate.tickets);
        tickets.serving += 1;
        self.gate.turn.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sleep_runs_to_completion() {
        let token = ShutdownToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_interrupted_by_shutdown() {
        let token = Arc::new(ShutdownToken::new());
        let sleeper = Arc::clone(&token);
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(10));
        token.shutdown();

        let completed = handle.join().expect("sleeper panicked");
        assert!(!completed);
        assert!(token.is_shutdown());
    }

    #[test]
    fn test_sleep_after_shutdown_returns_immediately() {
        let token = ShutdownToken::new();
        token.shutdown();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_gate_try_acquire_fails_while_held() {
        let gate = FairGate::new();
        let permit = gate.try_acquire().expect("gate should be free");
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_gate_mutual_exclusion() {
        let gate = Arc::new(FairGate::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _permit = gate.acquire();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gate_admits_in_ticket_order() {
        let gate = Arc::new(FairGate::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        // Hold the gate while the contenders queue up, so their tickets are
        // taken in spawn order.
        let holder = gate.acquire();
        let mut handles = Vec::new();
        for i in 0..4 {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _permit = gate.acquire();
                order.lock().unwrap().push(i);
            }));
            // Give each contender time to take its ticket before the next.
            thread::sleep(Duration::from_millis(20));
        }
        drop(holder);

        for handle in handles {
            handle.join().expect("contender panicked");
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
