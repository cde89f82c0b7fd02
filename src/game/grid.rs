//! Shared card grid: the slot/card bijection and the per-player token bitmap.
//!
//! Every slot owns a mutex guarding its card and its token row, so token
//! placement is atomic per slot while unrelated slots stay concurrent. The
//! card-side of the bijection has its own per-card guards; only the dealer
//! thread writes it. Per-player token counts are atomics bumped only while
//! the mutated slot's guard is held.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::GameConfig;
use crate::game::PlayerId;
use crate::oracle::Oracle;
use crate::sync::{lock_unpoisoned, ShutdownToken};
use crate::ui::UiSink;

/// Opaque card id in `[0, deck_size)`.
pub type CardId = usize;

/// Grid slot index in `[0, table_size)`.
pub type SlotId = usize;

/// Outcome of [`Grid::place_token`], which toggles with a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    /// A token was placed on the slot.
    Placed,
    /// The player's existing token on the slot was removed.
    Removed,
    /// No change: the slot is empty or the player is at the token cap.
    Rejected,
}

/// One slot's guarded state: its card and one token flag per player.
#[derive(Debug)]
struct SlotCell {
    card: Option<CardId>,
    tokens: Box<[bool]>,
}

/// Consistent copy of the grid for invariant checks and diagnostics.
///
/// Assembled slot by slot; only quiescent grids yield a globally atomic
/// picture.
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    /// Card in each slot.
    pub slot_to_card: Vec<Option<CardId>>,
    /// Slot of each card.
    pub card_to_slot: Vec<Option<SlotId>>,
    /// Token flags, indexed `[slot][player]`.
    pub tokens: Vec<Vec<bool>>,
    /// Derived token count per player.
    pub token_counts: Vec<usize>,
}

/// The shared grid.
pub struct Grid {
    slots: Box<[Mutex<SlotCell>]>,
    card_slots: Box<[Mutex<Option<SlotId>>]>,
    token_counts: Box<[AtomicUsize]>,
    /// Token cap per player; equals the legal-set cardinality.
    max_tokens: usize,
    table_delay: Duration,
    ui: Arc<dyn UiSink>,
    shutdown: Arc<ShutdownToken>,
}

impl Grid {
    /// Create an empty grid sized from `config`.
    #[must_use]
    pub fn new(config: &GameConfig, ui: Arc<dyn UiSink>, shutdown: Arc<ShutdownToken>) -> Self {
        let players = config.players();
        let slots = (0..config.table_size)
            .map(|_| {
                Mutex::new(SlotCell {
                    card: None,
                    tokens: vec![false; players].into_boxed_slice(),
                })
            })
            .collect();
        let card_slots = (0..config.deck_size).map(|_| Mutex::new(None)).collect();
        let token_counts = (0..players).map(|_| AtomicUsize::new(0)).collect();

        Self {
            slots,
            card_slots,
            token_counts,
            max_tokens: config.feature_size,
            table_delay: Duration::from_millis(config.table_delay_millis),
            ui,
            shutdown,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of players with a token row.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.token_counts.len()
    }

    /// Per-player token cap; the legal-set cardinality.
    #[must_use]
    pub fn token_cap(&self) -> usize {
        self.max_tokens
    }

    /// Reveal `card` in `slot`.
    ///
    /// An interruptible reveal pause precedes the mutation so an external
    /// animation can run; shutdown cuts it short.
    ///
    /// # Panics
    ///
    /// Panics if the slot is occupied or the card is already on the grid.
    /// Both indicate a dealer bug.
    pub fn place_card(&self, card: CardId, slot: SlotId) {
        self.shutdown.sleep(self.table_delay);

        let mut cell = lock_unpoisoned(&self.slots[slot]);
        assert!(
            cell.card.is_none(),
            "place_card: slot {slot} already holds a card"
        );
        let mut mapping = lock_unpoisoned(&self.card_slots[card]);
        assert!(
            mapping.is_none(),
            "place_card: card {card} is already on the grid"
        );
        cell.card = Some(card);
        *mapping = Some(slot);
        self.ui.place_card(card, slot);
    }

    /// Empty `slot`, sweeping away every token on it, and return the card.
    ///
    /// Token owners are not notified here; a player whose proposal lost its
    /// cards discovers that when its snapshot comes up short at validation.
    ///
    /// # Panics
    ///
    /// Panics if the slot is empty; only the dealer removes cards and it
    /// checks occupancy first.
    pub fn remove_card(&self, slot: SlotId) -> CardId {
        self.shutdown.sleep(self.table_delay);

        let mut cell = lock_unpoisoned(&self.slots[slot]);
        let card = cell
            .card
            .take()
            .unwrap_or_else(|| panic!("remove_card: slot {slot} is empty"));
        *lock_unpoisoned(&self.card_slots[card]) = None;

        for player in 0..cell.tokens.len() {
            if cell.tokens[player] {
                self.clear_token(&mut cell, player, slot);
            }
        }
        self.ui.remove_card(slot);
        card
    }

    /// Toggle the player's token on `slot`, capped at the set cardinality.
    ///
    /// Placement requires the slot to hold a card and the player to be
    /// below the cap; otherwise the call is rejected. The toggle, the cap
    /// check, and the occupancy check are atomic per slot.
    pub fn place_token(&self, player: PlayerId, slot: SlotId) -> TokenAction {
        let mut cell = lock_unpoisoned(&self.slots[slot]);
        if cell.tokens[player] {
            self.clear_token(&mut cell, player, slot);
            return TokenAction::Removed;
        }
        if self.token_counts[player].load(Ordering::Acquire) < self.max_tokens
            && cell.card.is_some()
        {
            cell.tokens[player] = true;
            self.token_counts[player].fetch_add(1, Ordering::AcqRel);
            self.ui.place_token(player, slot);
            TokenAction::Placed
        } else {
            TokenAction::Rejected
        }
    }

    /// Remove the player's token from `slot` if present.
    ///
    /// Returns whether a token was removed.
    pub fn remove_token(&self, player: PlayerId, slot: SlotId) -> bool {
        let mut cell = lock_unpoisoned(&self.slots[slot]);
        if cell.tokens[player] {
            self.clear_token(&mut cell, player, slot);
            true
        } else {
            false
        }
    }

    /// Clear a known-set token bit under the caller's slot guard.
    fn clear_token(&self, cell: &mut SlotCell, player: PlayerId, slot: SlotId) {
        cell.tokens[player] = false;
        self.token_counts[player].fetch_sub(1, Ordering::AcqRel);
        self.ui.remove_token(player, slot);
    }

    /// Current number of tokens held by `player`.
    #[must_use]
    pub fn token_count(&self, player: PlayerId) -> usize {
        self.token_counts[player].load(Ordering::Acquire)
    }

    /// Whether `slot` currently holds a card.
    #[must_use]
    pub fn has_card(&self, slot: SlotId) -> bool {
        lock_unpoisoned(&self.slots[slot]).card.is_some()
    }

    /// Card currently in `slot`, if any.
    #[must_use]
    pub fn card_at(&self, slot: SlotId) -> Option<CardId> {
        lock_unpoisoned(&self.slots[slot]).card
    }

    /// Slot currently holding `card`, if it is on the grid.
    #[must_use]
    pub fn slot_of(&self, card: CardId) -> Option<SlotId> {
        *lock_unpoisoned(&self.card_slots[card])
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count_cards(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| lock_unpoisoned(slot).card.is_some())
            .count()
    }

    /// All cards currently on the grid, in slot order.
    #[must_use]
    pub fn cards_on_table(&self) -> Vec<CardId> {
        self.slots
            .iter()
            .filter_map(|slot| lock_unpoisoned(slot).card)
            .collect()
    }

    /// The player's tokens paired with the cards under them, in slot order.
    ///
    /// A token whose card was swept away in the same instant is skipped, so
    /// the result can be shorter than the player's token count.
    #[must_use]
    pub fn token_snapshot(&self, player: PlayerId) -> Vec<(SlotId, CardId)> {
        let mut snapshot = Vec::with_capacity(self.max_tokens);
        for (slot, cell) in self.slots.iter().enumerate() {
            let cell = lock_unpoisoned(cell);
            if cell.tokens[player] {
                if let Some(card) = cell.card {
                    snapshot.push((slot, card));
                }
            }
        }
        snapshot
    }

    /// Log every legal set currently on the grid, with its feature matrix.
    pub fn hints(&self, oracle: &dyn Oracle) {
        let cards = self.cards_on_table();
        for set in oracle.find_sets(&cards, usize::MAX) {
            let mut slots: Vec<SlotId> = set.iter().filter_map(|&c| self.slot_of(c)).collect();
            slots.sort_unstable();
            let features = oracle.cards_to_features(&set);
            tracing::info!(?slots, ?features, "hint: set on the grid");
        }
    }

    /// Copy the whole grid, slot by slot.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        let mut slot_to_card = Vec::with_capacity(self.slots.len());
        let mut tokens = Vec::with_capacity(self.slots.len());
        for cell in self.slots.iter() {
            let cell = lock_unpoisoned(cell);
            slot_to_card.push(cell.card);
            tokens.push(cell.tokens.to_vec());
        }
        let card_to_slot = self
            .card_slots
            .iter()
            .map(|mapping| *lock_unpoisoned(mapping))
            .collect();
        let token_counts = self
            .token_counts
            .iter()
            .map(|count| count.load(Ordering::Acquire))
            .collect();
        GridSnapshot {
            slot_to_card,
            card_to_slot,
            tokens,
            token_counts,
        }
    }
}
