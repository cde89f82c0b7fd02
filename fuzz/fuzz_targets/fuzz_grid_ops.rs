#![no_main]

//! Grid operation sequence fuzzer.
//!
//! Drives arbitrary interleavings of card placement, card removal, and
//! token toggles against a single grid and checks the structural
//! guarantees after every step: the slot/card bijection, token-implies-
//! card, the per-player token cap, and count accuracy.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use trey::sync::ShutdownToken;
use trey::{check_invariants, GameConfig, Grid, NullUi};

const TABLE: usize = 9;
const DECK: usize = 27;
const PLAYERS: usize = 4;

/// A fuzzer-generated grid operation.
#[derive(Arbitrary, Debug, Clone)]
enum FuzzOp {
    /// Reveal a card in a slot (skipped when the bijection forbids it).
    PlaceCard { card: u8, slot: u8 },
    /// Empty a slot (skipped when already empty).
    RemoveCard { slot: u8 },
    /// Toggle a player's token on a slot.
    PlaceToken { player: u8, slot: u8 },
    /// Remove a player's token from a slot.
    RemoveToken { player: u8, slot: u8 },
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    // Cap sequence length to keep iterations fast.
    let ops: Vec<_> = ops.into_iter().take(256).collect();

    let config = GameConfig {
        human_players: PLAYERS,
        computer_players: 0,
        feature_size: 3,
        feature_count: 3,
        deck_size: DECK,
        table_size: TABLE,
        table_delay_millis: 0,
        ..GameConfig::default()
    };
    let grid = Grid::new(&config, Arc::new(NullUi), Arc::new(ShutdownToken::new()));

    for op in &ops {
        match *op {
            FuzzOp::PlaceCard { card, slot } => {
                let card = card as usize % DECK;
                let slot = slot as usize % TABLE;
                // The dealer only places unmapped cards into empty slots.
                if grid.card_at(slot).is_none() && grid.slot_of(card).is_none() {
                    grid.place_card(card, slot);
                }
            }
            FuzzOp::RemoveCard { slot } => {
                let slot = slot as usize % TABLE;
                if grid.card_at(slot).is_some() {
                    grid.remove_card(slot);
                }
            }
            FuzzOp::PlaceToken { player, slot } => {
                grid.place_token(player as usize % PLAYERS, slot as usize % TABLE);
            }
            FuzzOp::RemoveToken { player, slot } => {
                grid.remove_token(player as usize % PLAYERS, slot as usize % TABLE);
            }
        }

        let violations = check_invariants(&grid);
        assert!(
            violations.is_empty(),
            "after {:?}: {:?}",
            op,
            violations
        );
    }
});
