//! Set detection oracle.
//!
//! Cards are opaque ids; this module is the only place that knows their
//! feature encoding. A card id decodes positionally into `feature_count`
//! digits of base `feature_size`, and a legal set is `feature_size` cards
//! where every feature dimension is either uniform or pairwise distinct.

use crate::game::CardId;

/// Pure, thread-safe set detection.
///
/// Implementations must be deterministic: the same inputs always produce the
/// same answers, in the same order.
pub trait Oracle: Send + Sync {
    /// Find up to `limit` legal sets among `cards`.
    ///
    /// Sets are returned in a deterministic order derived from the input
    /// order. Pass `usize::MAX` to enumerate all of them.
    fn find_sets(&self, cards: &[CardId], limit: usize) -> Vec<Vec<CardId>>;

    /// Test whether `cards` form exactly one legal set.
    fn test_set(&self, cards: &[CardId]) -> bool;

    /// Decode each card into its feature vector.
    fn cards_to_features(&self, cards: &[CardId]) -> Vec<Vec<u8>>;
}

/// The canonical oracle over the positional feature encoding.
#[derive(Debug, Clone, Copy)]
pub struct SetOracle {
    feature_size: usize,
    feature_count: usize,
}

impl SetOracle {
    /// Create an oracle for cards with `feature_count` features of
    /// `feature_size` options each.
    #[must_use]
    pub fn new(feature_size: usize, feature_count: usize) -> Self {
        Self {
            feature_size,
            feature_count,
        }
    }

    /// Decode one card id into its feature digits, least significant first.
    fn features_of(&self, card: CardId) -> Vec<u8> {
        let mut rest = card;
        let mut features = Vec::with_capacity(self.feature_count);
        for _ in 0..self.feature_count {
            features.push((rest % self.feature_size) as u8);
            rest /= self.feature_size;
        }
        features
    }

    /// Check one feature dimension: all values equal, or all distinct.
    fn dimension_ok(values: &[u8]) -> bool {
        let all_same = values.iter().all(|&v| v == values[0]);
        if all_same {
            return true;
        }
        let mut seen = [false; u8::MAX as usize + 1];
        values.iter().all(|&v| {
            let fresh = !seen[v as usize];
            seen[v as usize] = true;
            fresh
        })
    }

    /// Recursively extend `chosen` with cards from `cards[from..]`, pushing
    /// each complete legal set into `found` until `limit` is reached.
    fn search(
        &self,
        cards: &[CardId],
        from: usize,
        chosen: &mut Vec<CardId>,
        found: &mut Vec<Vec<CardId>>,
        limit: usize,
    ) {
        if found.len() >= limit {
            return;
        }
        if chosen.len() == self.feature_size {
            if self.test_set(chosen) {
                found.push(chosen.clone());
            }
            return;
        }
        let needed = self.feature_size - chosen.len();
        for i in from..cards.len() {
            if cards.len() - i < needed {
                break;
            }
            chosen.push(cards[i]);
            self.search(cards, i + 1, chosen, found, limit);
            chosen.pop();
            if found.len() >= limit {
                return;
            }
        }
    }
}

impl Oracle for SetOracle {
    fn find_sets(&self, cards: &[CardId], limit: usize) -> Vec<Vec<CardId>> {
        let mut found = Vec::new();
        if limit == 0 || cards.len() < self.feature_size {
            return found;
        }
        let mut chosen = Vec::with_capacity(self.feature_size);
        self.search(cards, 0, &mut chosen, &mut found, limit);
        found
    }

    fn test_set(&self, cards: &[CardId]) -> bool {
        if cards.len() != self.feature_size {
            return false;
        }
        let features: Vec<Vec<u8>> = cards.iter().map(|&c| self.features_of(c)).collect();
        let mut values = Vec::with_capacity(cards.len());
        for dim in 0..self.feature_count {
            values.clear();
            values.extend(features.iter().map(|f| f[dim]));
            if !Self::dimension_ok(&values) {
                return false;
            }
        }
        true
    }

    fn cards_to_features(&self, cards: &[CardId]) -> Vec<Vec<u8>> {
        cards.iter().map(|&c| self.features_of(c)).collect()
    }
}
