//! UI sink contract and stock implementations.
//!
//! The engine never renders; it reports every observable transition through
//! a [`UiSink`]. Sinks are invoked from dealer and player threads, sometimes
//! while a grid slot guard is held, so implementations must be cheap and
//! must not call back into the engine.

use std::sync::Mutex;

use crate::game::{CardId, PlayerId, SlotId};
use crate::sync::lock_unpoisoned;

/// Receiver for game events.
pub trait UiSink: Send + Sync {
    /// A card was revealed in a slot.
    fn place_card(&self, card: CardId, slot: SlotId);
    /// A slot was emptied.
    fn remove_card(&self, slot: SlotId);
    /// A player placed a token on a slot.
    fn place_token(&self, player: PlayerId, slot: SlotId);
    /// A player's token left a slot.
    fn remove_token(&self, player: PlayerId, slot: SlotId);
    /// A player's score changed.
    fn set_score(&self, player: PlayerId, score: u32);
    /// Remaining freeze time for a player; `0` clears the freeze display.
    fn set_freeze(&self, player: PlayerId, remaining_millis: u64);
    /// Countdown-mode timer update.
    fn set_countdown(&self, remaining_millis: u64, warn: bool);
    /// Elapsed-mode timer update.
    fn set_elapsed(&self, elapsed_millis: u64);
    /// Final standings; `players` holds every id tied for the top score,
    /// in ascending order. The last event of a session.
    fn announce_winner(&self, players: &[PlayerId]);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUi;

impl UiSink for NullUi {
    fn place_card(&self, _card: CardId, _slot: SlotId) {}
    fn remove_card(&self, _slot: SlotId) {}
    fn place_token(&self, _player: PlayerId, _slot: SlotId) {}
    fn remove_token(&self, _player: PlayerId, _slot: SlotId) {}
    fn set_score(&self, _player: PlayerId, _score: u32) {}
    fn set_freeze(&self, _player: PlayerId, _remaining_millis: u64) {}
    fn set_countdown(&self, _remaining_millis: u64, _warn: bool) {}
    fn set_elapsed(&self, _elapsed_millis: u64) {}
    fn announce_winner(&self, _players: &[PlayerId]) {}
}

/// Sink that forwards events to the tracing subscriber.
///
/// Timer ticks go to `trace` (they fire every 25 ms); everything else is
/// `debug` except the final announcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUi;

impl UiSink for LogUi {
    fn place_card(&self, card: CardId, slot: SlotId) {
        tracing::debug!(card, slot, "card placed");
    }

    fn remove_card(&self, slot: SlotId) {
        tracing::debug!(slot, "card removed");
    }

    fn place_token(&self, player: PlayerId, slot: SlotId) {
        tracing::debug!(player, slot, "token placed");
    }

    fn remove_token(&self, player: PlayerId, slot: SlotId) {
        tracing::debug!(player, slot, "token removed");
    }

    fn set_score(&self, player: PlayerId, score: u32) {
        tracing::info!(player, score, "score updated");
    }

    fn set_freeze(&self, player: PlayerId, remaining_millis: u64) {
        tracing::trace!(player, remaining_millis, "freeze display");
    }

    fn set_countdown(&self, remaining_millis: u64, warn: bool) {
        tracing::trace!(remaining_millis, warn, "countdown");
    }

    fn set_elapsed(&self, elapsed_millis: u64) {
        tracing::trace!(elapsed_millis, "elapsed");
    }

    fn announce_winner(&self, players: &[PlayerId]) {
        tracing::info!(?players, "winners announced");
    }
}

/// One recorded [`UiSink`] callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// `place_card(card, slot)`.
    PlaceCard(CardId, SlotId),
    /// `remove_card(slot)`.
    RemoveCard(SlotId),
    /// `place_token(player, slot)`.
    PlaceToken(PlayerId, SlotId),
    /// `remove_token(player, slot)`.
    RemoveToken(PlayerId, SlotId),
    /// `set_score(player, score)`.
    Score(PlayerId, u32),
    /// `set_freeze(player, remaining_millis)`.
    Freeze(PlayerId, u64),
    /// `set_countdown(remaining_millis, warn)`.
    Countdown(u64, bool),
    /// `set_elapsed(elapsed_millis)`.
    Elapsed(u64),
    /// `announce_winner(players)`.
    AnnounceWinner(Vec<PlayerId>),
}

/// Sink that records every event, for assertions in tests and simulations.
#[derive(Debug, Default)]
pub struct CapturingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl CapturingUi {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<UiEvent> {
        lock_unpoisoned(&self.events).clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.events).len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: UiEvent) {
        lock_unpoisoned(&self.events).push(event);
    }
}

impl UiSink for CapturingUi {
    fn place_card(&self, card: CardId, slot: SlotId) {
        self.push(UiEvent::PlaceCard(card, slot));
    }

    fn remove_card(&self, slot: SlotId) {
        self.push(UiEvent::RemoveCard(slot));
    }

    fn place_token(&self, player: PlayerId, slot: SlotId) {
        self.push(UiEvent::PlaceToken(player, slot));
    }

    fn remove_token(&self, player: PlayerId, slot: SlotId) {
        self.push(UiEvent::RemoveToken(player, slot));
    }

    fn set_score(&self, player: PlayerId, score: u32) {
        self.push(UiEvent::Score(player, score));
    }

    fn set_freeze(&self, player: PlayerId, remaining_millis: u64) {
        self.push(UiEvent::Freeze(player, remaining_millis));
    }

    fn set_countdown(&self, remaining_millis: u64, warn: bool) {
        self.push(UiEvent::Countdown(remaining_millis, warn));
    }

    fn set_elapsed(&self, elapsed_millis: u64) {
        self.push(UiEvent::Elapsed(elapsed_millis));
    }

    fn announce_winner(&self, players: &[PlayerId]) {
        self.push(UiEvent::AnnounceWinner(players.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capturing_ui_records_in_order() {
        let ui = CapturingUi::new();
        ui.place_card(7, 3);
        ui.place_token(0, 3);
        ui.set_score(0, 1);
        ui.announce_winner(&[0, 1]);

        assert_eq!(
            ui.events(),
            vec![
                UiEvent::PlaceCard(7, 3),
                UiEvent::PlaceToken(0, 3),
                UiEvent::Score(0, 1),
                UiEvent::AnnounceWinner(vec![0, 1]),
            ]
        );
    }

    #[test]
    fn test_capturing_ui_starts_empty() {
        let ui = CapturingUi::new();
        assert!(ui.is_empty());
        ui.set_elapsed(10);
        assert_eq!(ui.len(), 1);
    }
}
