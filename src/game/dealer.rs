//! The dealer: sole arbiter of the grid and owner of the game lifecycle.
//!
//! The dealer thread deals cards, naps in 25 ms slices (cut short by
//! proposal submissions), validates pending proposals against the oracle,
//! rewards and penalizes, reshuffles when the round timer expires, and
//! finally tears the player threads down in reverse id order before
//! announcing the winners.

// Timer arithmetic narrows u128 millisecond counts for the UI contract.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info};

use crate::config::GameConfig;
use crate::game::player::drive_bot;
use crate::game::{CardId, Grid, Player, PlayerId, ProposalQueue, Verdict};
use crate::oracle::Oracle;
use crate::sync::ShutdownToken;
use crate::ui::UiSink;

/// Nap length of the dealer's validation loop.
pub const DEALER_BREAK_MILLIS: u64 = 25;

/// Hint delay in elapsed mode, where no round timer exists to derive it
/// from.
const UNTIMED_HINT_MILLIS: u64 = 30_000;

/// Final standings of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    /// Ids tied for the top score, ascending.
    pub winners: Vec<PlayerId>,
    /// Final score per player, indexed by id.
    pub scores: Vec<u32>,
    /// Number of times the grid was dealt (including redeals).
    pub rounds_dealt: u32,
    /// Cards still in the deck when the game ended.
    pub cards_left: usize,
    /// The session seed, for reproducing the deal order.
    pub seed: u64,
}

/// Threads belonging to one player seat.
struct SeatHandles {
    agent: JoinHandle<()>,
    bot: Option<JoinHandle<()>>,
}

/// The dealer and everything it owns.
pub struct Dealer {
    config: GameConfig,
    grid: Arc<Grid>,
    queue: Arc<ProposalQueue>,
    players: Vec<Arc<Player>>,
    oracle: Arc<dyn Oracle>,
    ui: Arc<dyn UiSink>,
    shutdown: Arc<ShutdownToken>,
    placing_cards: Arc<AtomicBool>,
    deck: Vec<CardId>,
    rng: SmallRng,
    seed: u64,
    freeze_until: Vec<Option<Instant>>,
    /// Round end in countdown mode; `None` in elapsed and untimed modes.
    reshuffle_at: Option<Instant>,
    /// Last reshuffle or accepted set, the zero point of elapsed mode.
    last_action: Instant,
    /// When to log the next hint; disarmed after firing until the next
    /// reset.
    hint_at: Option<Instant>,
    rounds_dealt: u32,
}

impl Dealer {
    /// Create a dealer over an already-wired grid, queue, and player seats.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: GameConfig,
        grid: Arc<Grid>,
        queue: Arc<ProposalQueue>,
        players: Vec<Arc<Player>>,
        oracle: Arc<dyn Oracle>,
        ui: Arc<dyn UiSink>,
        shutdown: Arc<ShutdownToken>,
        placing_cards: Arc<AtomicBool>,
        seed: u64,
    ) -> Self {
        let deck: Vec<CardId> = (0..config.deck_size).collect();
        let freeze_until = vec![None; players.len()];
        Self {
            config,
            grid,
            queue,
            players,
            oracle,
            ui,
            shutdown,
            placing_cards,
            deck,
            rng: SmallRng::seed_from_u64(seed),
            seed,
            freeze_until,
            reshuffle_at: None,
            last_action: Instant::now(),
            hint_at: None,
            rounds_dealt: 0,
        }
    }

    /// Dealer thread body: run the game to completion and report standings.
    ///
    /// # Errors
    ///
    /// Returns an error if a player thread cannot be spawned.
    pub fn run(&mut self) -> Result<SessionResult, std::io::Error> {
        info!("dealer thread starting");
        let seats = self.start_players()?;

        while !self.should_finish() {
            self.place_cards_on_table();
            self.reset_timer();
            self.timer_loop();
            self.remove_all_cards_from_table();
        }

        self.stop_players(seats);
        let result = self.announce_winners();
        info!("dealer thread terminated");
        Ok(result)
    }

    /// Spawn each player's agent thread (and bot driver) in id order.
    ///
    /// A spawn failure tears down the seats already started before
    /// propagating the error.
    fn start_players(&mut self) -> Result<Vec<SeatHandles>, std::io::Error> {
        let mut seats = Vec::with_capacity(self.players.len());
        for idx in 0..self.players.len() {
            let bot_seed = self.rng.gen::<u64>();
            match Self::start_seat(&self.players[idx], bot_seed) {
                Ok(seat) => seats.push(seat),
                Err(e) => {
                    self.stop_players(seats);
                    return Err(e);
                }
            }
        }
        Ok(seats)
    }

    /// Spawn one player's agent thread, and its bot driver for non-humans.
    fn start_seat(player: &Arc<Player>, bot_seed: u64) -> Result<SeatHandles, std::io::Error> {
        let agent = Arc::clone(player);
        let handle = std::thread::Builder::new()
            .name(format!("player-{}", player.id()))
            .spawn(move || agent.run())?;

        let bot = if player.is_human() {
            None
        } else {
            let bot_player = Arc::clone(player);
            Some(
                std::thread::Builder::new()
                    .name(format!("bot-{}", player.id()))
                    .spawn(move || drive_bot(&bot_player, bot_seed))?,
            )
        };

        Ok(SeatHandles { agent: handle, bot })
    }

    /// Whether the game is over: shutdown was requested, or the deck can no
    /// longer produce a set.
    ///
    /// The deck-only check means a set still lying on the grid when the
    /// deck goes dry does not extend the game.
    fn should_finish(&self) -> bool {
        self.shutdown.is_shutdown() || self.oracle.find_sets(&self.deck, 1).is_empty()
    }

    /// Inner loop of one round: nap, tick the displays, validate, refill.
    fn timer_loop(&mut self) {
        while !self.shutdown.is_shutdown()
            && !self.round_expired()
            && self.grid.count_cards() > 0
        {
            self.queue
                .wait_for_submission(Duration::from_millis(DEALER_BREAK_MILLIS));
            self.update_timer_display();
            self.drain_and_validate();
            self.place_cards_on_table();
        }
    }

    /// Countdown-mode round expiry; elapsed and untimed modes never expire.
    fn round_expired(&self) -> bool {
        self.reshuffle_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Arm the round timer and the hint clock after a (re)deal.
    fn reset_timer(&mut self) {
        let timeout = self.config.turn_timeout_millis;
        if timeout > 0 {
            self.reshuffle_at = Some(Instant::now() + Duration::from_millis(timeout as u64));
            self.ui.set_countdown(timeout as u64, false);
        } else {
            self.reshuffle_at = None;
            if timeout == 0 {
                self.last_action = Instant::now();
                self.ui.set_elapsed(0);
            }
        }
        self.arm_hint();
    }

    /// Re-arm after an accepted set: a legal set extends the round.
    fn rearm_after_action(&mut self) {
        self.reset_timer();
    }

    fn arm_hint(&mut self) {
        if !self.config.hints {
            self.hint_at = None;
            return;
        }
        let delay = if self.config.turn_timeout_millis > 0 {
            (self.config.turn_timeout_millis as u64) / 3
        } else {
            UNTIMED_HINT_MILLIS
        };
        self.hint_at = Some(Instant::now() + Duration::from_millis(delay));
    }

    /// Tick the timer display, the per-player freeze displays, and the hint
    /// clock.
    fn update_timer_display(&mut self) {
        let now = Instant::now();
        let timeout = self.config.turn_timeout_millis;
        if timeout > 0 {
            let remaining = self
                .reshuffle_at
                .map_or(Duration::ZERO, |deadline| {
                    deadline.saturating_duration_since(now)
                })
                .as_millis() as u64;
            let warn = remaining < self.config.turn_timeout_warning_millis;
            self.ui.set_countdown(remaining, warn);
        } else if timeout == 0 {
            let elapsed = now.duration_since(self.last_action).as_millis() as u64;
            self.ui.set_elapsed(elapsed);
        }

        for player in 0..self.freeze_until.len() {
            if let Some(until) = self.freeze_until[player] {
                let remaining = until.saturating_duration_since(now).as_millis() as u64;
                self.ui.set_freeze(player, remaining);
                if remaining == 0 {
                    self.freeze_until[player] = None;
                }
            }
        }

        if self.hint_at.is_some_and(|at| now >= at) {
            self.grid.hints(self.oracle.as_ref());
            self.hint_at = None;
        }
    }

    /// Judge every pending proposal, FIFO, under the queue's admission
    /// gate.
    ///
    /// A proposal whose snapshot comes up short of a full set was gutted by
    /// an earlier removal in this same drain (or a reshuffle); it gets a
    /// neutral ruling so its owner resumes instead of deadlocking.
    fn drain_and_validate(&mut self) {
        let queue = Arc::clone(&self.queue);
        let admission = queue.lock();
        while let Some(player) = queue.drain_one(&admission) {
            let snapshot = self.grid.token_snapshot(player);
            let mut verdict = Verdict::Neutral;
            if snapshot.len() == self.config.feature_size {
                let cards: Vec<CardId> = snapshot.iter().map(|&(_, card)| card).collect();
                if self.oracle.test_set(&cards) {
                    verdict = Verdict::Legal;
                    info!(player, ?cards, "legal set accepted");
                    for &(slot, _) in &snapshot {
                        self.grid.remove_card(slot);
                    }
                    self.freeze_until[player] = Some(
                        Instant::now() + Duration::from_millis(self.config.point_freeze_millis),
                    );
                    self.rearm_after_action();
                } else {
                    verdict = Verdict::Illegal;
                    info!(player, ?cards, "illegal set rejected");
                    self.freeze_until[player] = Some(
                        Instant::now() + Duration::from_millis(self.config.penalty_freeze_millis),
                    );
                }
            }
            self.players[player].deliver_verdict(verdict);
        }
    }

    /// Fill every empty slot from the deck.
    ///
    /// In elapsed mode a setless grid is torn down and rebuilt around a set
    /// reserved from the deck; a deck with no set left ends the game.
    /// Clears `placing_cards` on the way out, reopening player input.
    fn place_cards_on_table(&mut self) {
        if self.config.turn_timeout_millis == 0 && !self.shutdown.is_shutdown() {
            let on_table = self.grid.cards_on_table();
            if self.oracle.find_sets(&on_table, 1).is_empty() {
                self.rebuild_with_set();
                self.placing_cards.store(false, Ordering::Release);
                return;
            }
        }

        self.deck.shuffle(&mut self.rng);
        let mut dealt = false;
        for slot in 0..self.grid.slot_count() {
            if self.grid.card_at(slot).is_none() {
                let Some(card) = self.deck.pop() else {
                    break;
                };
                self.grid.place_card(card, slot);
                dealt = true;
            }
        }
        if dealt {
            self.rounds_dealt = self.rounds_dealt.saturating_add(1);
        }
        self.placing_cards.store(false, Ordering::Release);
    }

    /// Elapsed-mode rescue: return the grid to the deck and redeal with an
    /// oracle-chosen set placed first.
    fn rebuild_with_set(&mut self) {
        for slot in 0..self.grid.slot_count() {
            if self.grid.card_at(slot).is_some() {
                self.deck.push(self.grid.remove_card(slot));
            }
        }
        self.deck.shuffle(&mut self.rng);

        let Some(reserved) = self.oracle.find_sets(&self.deck, 1).into_iter().next() else {
            info!("no set left anywhere; ending the game");
            self.shutdown.shutdown();
            return;
        };

        // The reserved cards deal first, then the rest of the deck.
        self.deck.retain(|card| !reserved.contains(card));
        let mut incoming: Vec<CardId> = reserved;
        incoming.extend(self.deck.drain(..));

        let mut next = 0;
        for slot in 0..self.grid.slot_count() {
            if next >= incoming.len() {
                break;
            }
            if self.grid.card_at(slot).is_none() {
                self.grid.place_card(incoming[next], slot);
                next += 1;
            }
        }
        self.deck.extend(incoming.drain(next..));

        self.rounds_dealt = self.rounds_dealt.saturating_add(1);
        self.last_action = Instant::now();
        self.ui.set_elapsed(0);
        self.arm_hint();
    }

    /// Close player input and return every card to the deck.
    fn remove_all_cards_from_table(&mut self) {
        self.placing_cards.store(true, Ordering::Release);
        for slot in 0..self.grid.slot_count() {
            if self.grid.card_at(slot).is_some() {
                self.deck.push(self.grid.remove_card(slot));
            }
        }
    }

    /// Stop every player in reverse id order, each fully exited before the
    /// next.
    fn stop_players(&self, seats: Vec<SeatHandles>) {
        self.shutdown.shutdown();
        self.queue.close();

        for (player, seat) in self.players.iter().zip(seats).rev() {
            player.terminate();
            while !player.has_exited() {
                std::thread::sleep(Duration::from_millis(1));
            }
            if seat.agent.join().is_err() {
                error!(player = player.id(), "player thread panicked");
            }
            if let Some(bot) = seat.bot {
                if bot.join().is_err() {
                    error!(player = player.id(), "bot driver panicked");
                }
            }
        }
    }

    /// Compute the final standings and emit the winner announcement, the
    /// session's last UI event.
    fn announce_winners(&self) -> SessionResult {
        let scores: Vec<u32> = self.players.iter().map(|p| p.score()).collect();
        let top = scores.iter().copied().max().unwrap_or(0);
        let winners: Vec<PlayerId> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score == top)
            .map(|(id, _)| id)
            .collect();

        self.ui.announce_winner(&winners);
        info!(?winners, top_score = top, "winners announced");

        SessionResult {
            winners,
            scores,
            rounds_dealt: self.rounds_dealt,
            cards_left: self.deck.len(),
            seed: self.seed,
        }
    }
}
