//! Grid sanity checks that detect engine bugs.
//!
//! These should never trigger; they are bug detectors for the fuzzer, the
//! property suite, and debug builds, not gameplay limits. All checks run
//! over a [`crate::game::GridSnapshot`], so they describe the grid between
//! guarded operations, the only moments the guarantees are promised to
//! hold.

use crate::game::Grid;

/// Invariant violation with a human-readable description.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check every grid invariant, returning all violations found.
///
/// Checked guarantees:
/// - the slot→card and card→slot maps are a bijection;
/// - a token only rests on a slot that holds a card;
/// - no player holds more tokens than the set cardinality;
/// - each per-player token count matches its column of the token bitmap.
#[must_use]
pub fn check_invariants(grid: &Grid) -> Vec<InvariantViolation> {
    let snapshot = grid.snapshot();
    let cap = grid.token_cap();
    let mut violations = Vec::new();

    for (slot, &card) in snapshot.slot_to_card.iter().enumerate() {
        if let Some(card) = card {
            if snapshot.card_to_slot.get(card).copied().flatten() != Some(slot) {
                violations.push(InvariantViolation {
                    message: format!("slot {slot} holds card {card} but the card map disagrees"),
                });
            }
        }
    }
    for (card, &slot) in snapshot.card_to_slot.iter().enumerate() {
        if let Some(slot) = slot {
            if snapshot.slot_to_card.get(slot).copied().flatten() != Some(card) {
                violations.push(InvariantViolation {
                    message: format!("card {card} maps to slot {slot} but the slot map disagrees"),
                });
            }
        }
    }

    for (slot, row) in snapshot.tokens.iter().enumerate() {
        if snapshot.slot_to_card[slot].is_none() {
            for (player, &token) in row.iter().enumerate() {
                if token {
                    violations.push(InvariantViolation {
                        message: format!("player {player} has a token on empty slot {slot}"),
                    });
                }
            }
        }
    }

    for (player, &count) in snapshot.token_counts.iter().enumerate() {
        if count > cap {
            violations.push(InvariantViolation {
                message: format!("player {player} holds {count} tokens, above the cap {cap}"),
            });
        }
        let actual = snapshot.tokens.iter().filter(|row| row[player]).count();
        if actual != count {
            violations.push(InvariantViolation {
                message: format!("player {player} count is {count} but the bitmap holds {actual}"),
            });
        }
    }

    violations
}

/// Assert every grid invariant, panicking with details on violation.
///
/// Only active in debug builds.
///
/// # Panics
///
/// Panics with all violation messages if any invariant is broken.
#[cfg(debug_assertions)]
pub fn assert_invariants(grid: &Grid) {
    let violations = check_invariants(grid);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("grid invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_grid: &Grid) {}
