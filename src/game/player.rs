//! Player agents and the bot drivers that feed them.
//!
//! Each player runs its own thread: sleep until a key arrives, burn down the
//! input queue into grid token toggles, and submit a proposal when the last
//! token of a candidate set lands. The whole burst happens under the
//! proposal queue's admission gate, so a submitted proposal's tokens stay
//! frozen until the dealer rules on them.
//!
//! Non-human players additionally get a driver thread that synthesizes
//! random slot presses with a fixed back-off.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::GameConfig;
use crate::game::{Grid, ProposalQueue, SlotId};
use crate::sync::{lock_unpoisoned, ShutdownToken};
use crate::ui::UiSink;

/// Player id, also the index into every per-player structure.
pub type PlayerId = usize;

/// Back-off between synthesized bot key presses, keeping the dealer and the
/// other players scheduled.
pub const BOT_BREAK_MILLIS: u64 = 500;

/// Pause before a bot re-rolls after sampling only empty slots, which
/// happens while the dealer is redealing.
const BOT_EMPTY_GRID_BREAK_MILLIS: u64 = 10;

/// The dealer's ruling on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No ruling: the proposal dissolved before it could be judged (a
    /// racing card removal took one of its tokens). The player resumes.
    Neutral,
    /// The proposed cards form a legal set; the player scores a point.
    Legal,
    /// The proposed cards are not a set; the player serves a penalty.
    Illegal,
}

/// Verdict hand-off cell, guarded together with its condition variable.
///
/// `awaiting` is raised by the player when it submits and lowered by the
/// dealer just before notifying, so a spurious wake can tell the difference
/// between "no ruling yet" and "ruled neutral".
#[derive(Debug)]
struct VerdictCell {
    awaiting: bool,
    verdict: Verdict,
}

/// Pending key presses, bounded; overflow is dropped at the door.
#[derive(Debug)]
struct InputQueue {
    slots: VecDeque<SlotId>,
    capacity: usize,
}

/// One player agent.
pub struct Player {
    id: PlayerId,
    human: bool,
    score: AtomicU32,
    input: Mutex<InputQueue>,
    key_wake: Condvar,
    verdict: Mutex<VerdictCell>,
    verdict_wake: Condvar,
    stop: AtomicBool,
    exited: AtomicBool,
    feature_size: usize,
    point_freeze_millis: u64,
    penalty_freeze_millis: u64,
    grid: Arc<Grid>,
    queue: Arc<ProposalQueue>,
    ui: Arc<dyn UiSink>,
    shutdown: Arc<ShutdownToken>,
    placing_cards: Arc<AtomicBool>,
}

impl Player {
    /// Create a player agent.
    ///
    /// Bots get an input queue bounded by the set cardinality; they never
    /// need more presses in flight than one candidate set. Humans get room
    /// for a full grid of presses from every finger.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PlayerId,
        human: bool,
        config: &GameConfig,
        grid: Arc<Grid>,
        queue: Arc<ProposalQueue>,
        ui: Arc<dyn UiSink>,
        shutdown: Arc<ShutdownToken>,
        placing_cards: Arc<AtomicBool>,
    ) -> Self {
        let capacity = if human {
            config.table_size * config.players()
        } else {
            config.feature_size
        };
        Self {
            id,
            human,
            score: AtomicU32::new(0),
            input: Mutex::new(InputQueue {
                slots: VecDeque::with_capacity(capacity),
                capacity,
            }),
            key_wake: Condvar::new(),
            verdict: Mutex::new(VerdictCell {
                awaiting: false,
                verdict: Verdict::Neutral,
            }),
            verdict_wake: Condvar::new(),
            stop: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            feature_size: config.feature_size,
            point_freeze_millis: config.point_freeze_millis,
            penalty_freeze_millis: config.penalty_freeze_millis,
            grid,
            queue,
            ui,
            shutdown,
            placing_cards,
        }
    }

    /// This player's id.
    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Whether this player is fed by a human input source.
    #[must_use]
    pub fn is_human(&self) -> bool {
        self.human
    }

    /// Current score.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score.load(Ordering::Acquire)
    }

    /// Whether the agent thread has fully unwound.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Route a key press for this player.
    ///
    /// Called from the input source or a bot driver. Events arriving while
    /// the dealer is redealing are dropped, as are events that would
    /// overflow the input queue or that race the queue's admission gate.
    /// The agent thread is woken either way.
    pub fn key_pressed(&self, slot: SlotId) {
        if !self.placing_cards.load(Ordering::Acquire) {
            if let Some(_admission) = self.queue.try_lock() {
                let mut input = lock_unpoisoned(&self.input);
                if input.slots.len() < input.capacity {
                    input.slots.push_back(slot);
                }
            }
        }
        let _input = lock_unpoisoned(&self.input);
        self.key_wake.notify_one();
    }

    /// Stop this agent: raise its stop flag and wake both of its waits.
    ///
    /// Freeze and delay sleeps are woken separately by the session-wide
    /// shutdown token.
    pub fn terminate(&self) {
        self.stop.store(true, Ordering::Release);
        {
            let _input = lock_unpoisoned(&self.input);
            self.key_wake.notify_all();
        }
        {
            let _cell = lock_unpoisoned(&self.verdict);
            self.verdict_wake.notify_all();
        }
    }

    /// Agent thread body.
    pub fn run(&self) {
        info!(player = self.id, human = self.human, "player thread starting");
        while !self.stopping() {
            if !self.wait_for_input() {
                break;
            }
            if self.process_inputs() {
                match self.await_verdict() {
                    Some(Verdict::Legal) => self.point(),
                    Some(Verdict::Illegal) => self.penalty(),
                    Some(Verdict::Neutral) => {}
                    None => break,
                }
                // Presses buffered while the proposal was in flight aim at a
                // grid that may no longer exist.
                self.clear_input();
            }
        }
        self.exited.store(true, Ordering::Release);
        info!(player = self.id, "player thread terminated");
    }

    /// Hand down the dealer's ruling and wake the agent.
    pub(crate) fn deliver_verdict(&self, verdict: Verdict) {
        let mut cell = lock_unpoisoned(&self.verdict);
        cell.verdict = verdict;
        cell.awaiting = false;
        self.verdict_wake.notify_one();
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.shutdown.is_shutdown()
    }

    /// Sleep until a key press is queued. Returns `false` on stop.
    fn wait_for_input(&self) -> bool {
        let mut input = lock_unpoisoned(&self.input);
        while input.slots.is_empty() && !self.stopping() {
            input = self
                .key_wake
                .wait(input)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !self.stopping()
    }

    /// Drain queued presses into token toggles under the admission gate.
    ///
    /// Returns `true` when the burst ended in a submitted proposal; the
    /// caller must then await the verdict before touching tokens again.
    fn process_inputs(&self) -> bool {
        let admission = self.queue.lock();
        while let Some(slot) = self.pop_input() {
            let before = self.grid.token_count(self.id);
            self.grid.place_token(self.id, slot);
            let after = self.grid.token_count(self.id);
            if before + 1 == self.feature_size && after == self.feature_size {
                {
                    let mut cell = lock_unpoisoned(&self.verdict);
                    cell.awaiting = true;
                    cell.verdict = Verdict::Neutral;
                }
                if self.queue.submit(&admission, self.id).is_err() {
                    // Shutdown has begun; nobody will rule on this.
                    lock_unpoisoned(&self.verdict).awaiting = false;
                    return false;
                }
                return true;
            }
        }
        false
    }

    /// Sleep until the dealer rules. Returns `None` on stop.
    fn await_verdict(&self) -> Option<Verdict> {
        let mut cell = lock_unpoisoned(&self.verdict);
        while cell.awaiting && !self.stopping() {
            cell = self
                .verdict_wake
                .wait(cell)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if cell.awaiting {
            cell.awaiting = false;
            return None;
        }
        let verdict = cell.verdict;
        cell.verdict = Verdict::Neutral;
        Some(verdict)
    }

    fn pop_input(&self) -> Option<SlotId> {
        lock_unpoisoned(&self.input).slots.pop_front()
    }

    fn clear_input(&self) {
        lock_unpoisoned(&self.input).slots.clear();
    }

    /// Score the point and serve the reward freeze.
    fn point(&self) {
        let score = self.score.fetch_add(1, Ordering::AcqRel) + 1;
        self.ui.set_score(self.id, score);
        self.ui.set_freeze(self.id, self.point_freeze_millis);
        self.shutdown
            .sleep(Duration::from_millis(self.point_freeze_millis));
    }

    /// Serve the penalty freeze.
    fn penalty(&self) {
        self.ui.set_freeze(self.id, self.penalty_freeze_millis);
        self.shutdown
            .sleep(Duration::from_millis(self.penalty_freeze_millis));
    }
}

/// Bot driver thread body: press random occupied slots until stopped.
pub(crate) fn drive_bot(player: &Player, seed: u64) {
    info!(player = player.id, "bot driver starting");
    let mut rng = SmallRng::seed_from_u64(seed);
    let table_size = player.grid.slot_count();

    'driving: while !player.stopping() {
        let mut slot = rng.gen_range(0..table_size);
        let mut misses = 0usize;
        while !player.grid.has_card(slot) {
            if player.stopping() {
                break 'driving;
            }
            misses += 1;
            if misses % table_size == 0 {
                // Every slot sampled empty: the dealer is redealing.
                player
                    .shutdown
                    .sleep(Duration::from_millis(BOT_EMPTY_GRID_BREAK_MILLIS));
            }
            slot = rng.gen_range(0..table_size);
        }
        player.key_pressed(slot);
        player
            .shutdown
            .sleep(Duration::from_millis(BOT_BREAK_MILLIS));
    }
    info!(player = player.id, "bot driver terminated");
}
