//! End-to-end session tests over real threads.
//!
//! Each test wires a full session (dealer, players, bot drivers) with a
//! capturing UI sink and asserts on the observable event stream. Timings
//! are kept short and waits generous, so the tests are stable under load.
//! Run with: cargo test --release session_integration

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use trey::{CapturingUi, GameConfig, Oracle, Session, SetOracle, UiEvent};

/// Nine-card geometry: the whole card space fits the grid, so a freshly
/// dealt full table is guaranteed to contain legal sets.
fn nine_card_config() -> GameConfig {
    GameConfig {
        human_players: 2,
        computer_players: 0,
        feature_size: 3,
        feature_count: 2,
        deck_size: 9,
        table_size: 9,
        turn_timeout_millis: 60_000,
        point_freeze_millis: 20,
        penalty_freeze_millis: 40,
        table_delay_millis: 0,
        ..GameConfig::default()
    }
}

fn wait_for(
    ui: &CapturingUi,
    timeout: Duration,
    mut predicate: impl FnMut(&[UiEvent]) -> bool,
) -> bool {
    let start = Instant::now();
    loop {
        let events = ui.events();
        if predicate(&events) {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Slot -> card map implied by a prefix of the event stream.
fn table_from(events: &[UiEvent], table_size: usize) -> Vec<Option<usize>> {
    let mut table = vec![None; table_size];
    for event in events {
        match *event {
            UiEvent::PlaceCard(card, slot) => table[slot] = Some(card),
            UiEvent::RemoveCard(slot) => table[slot] = None,
            _ => {}
        }
    }
    table
}

fn slot_of(table: &[Option<usize>], card: usize) -> usize {
    table
        .iter()
        .position(|&c| c == Some(card))
        .expect("card should be on the table")
}

fn count_score_events(events: &[UiEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, UiEvent::Score(_, _)))
        .count()
}

/// Press a slot until the token lands.
///
/// `key_pressed` legitimately drops events that race the admission gate, so
/// a single press is not guaranteed to stick. Re-pressing is only safe once
/// the previous press has had ample time to land, because a late duplicate
/// would toggle the token back off.
fn press_until_token(session: &Session, ui: &CapturingUi, player: usize, slot: usize) {
    for _ in 0..20 {
        session.key_pressed(player, slot);
        if wait_for(ui, Duration::from_secs(1), |events| {
            events.contains(&UiEvent::PlaceToken(player, slot))
        }) {
            return;
        }
    }
    panic!("token for player {player} never landed on slot {slot}");
}

#[test]
fn test_setless_deck_finishes_immediately() {
    // Two cards cannot form a set, so the dealer never deals.
    let config = GameConfig {
        human_players: 2,
        computer_players: 0,
        deck_size: 2,
        table_delay_millis: 0,
        ..GameConfig::default()
    };
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        1,
        Arc::new(SetOracle::new(3, 4)),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();
    let result = session.join().unwrap();

    assert_eq!(result.winners, vec![0, 1]);
    assert_eq!(result.scores, vec![0, 0]);
    assert_eq!(result.rounds_dealt, 0);
    assert_eq!(result.cards_left, 2);

    // The announcement is the only event of the session.
    assert_eq!(ui.events(), vec![UiEvent::AnnounceWinner(vec![0, 1])]);
}

#[test]
fn test_legal_set_scores_and_rearms_round() {
    let config = nine_card_config();
    let oracle = SetOracle::new(3, 2);
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        7,
        Arc::new(oracle),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        table_from(events, 9).iter().all(Option::is_some)
    }));

    let table = table_from(&ui.events(), 9);
    let cards: Vec<usize> = table.iter().map(|c| c.unwrap()).collect();
    let set = oracle.find_sets(&cards, 1).remove(0);

    for &card in &set {
        press_until_token(&session, &ui, 0, slot_of(&table, card));
    }

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        events.contains(&UiEvent::Score(0, 1))
    }));

    let events = ui.events();
    assert!(events.contains(&UiEvent::Freeze(0, 20)));
    let removals = events
        .iter()
        .filter(|e| matches!(e, UiEvent::RemoveCard(_)))
        .count();
    assert_eq!(removals, 3);
    // The accepted set re-armed the round: a fresh full countdown follows
    // the initial one.
    let resets = events
        .iter()
        .filter(|e| matches!(e, UiEvent::Countdown(60_000, false)))
        .count();
    assert!(resets >= 2, "expected a countdown re-arm, got {resets}");

    session.terminate();
    let result = session.join().unwrap();
    assert_eq!(result.scores[0], 1);
    assert_eq!(result.winners, vec![0]);
}

#[test]
fn test_illegal_set_freezes_without_score_and_keeps_tokens() {
    let config = nine_card_config();
    let oracle = SetOracle::new(3, 2);
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        11,
        Arc::new(oracle),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        table_from(events, 9).iter().all(Option::is_some)
    }));

    let table = table_from(&ui.events(), 9);
    let cards: Vec<usize> = table.iter().map(|c| c.unwrap()).collect();
    let bad_triple = first_non_set(&oracle, &cards);

    for &card in &bad_triple {
        press_until_token(&session, &ui, 1, slot_of(&table, card));
    }

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        events.contains(&UiEvent::Freeze(1, 40))
    }));

    // Frozen, unscored, and the tokens stay down until the player acts.
    let events = ui.events();
    assert!(!events.iter().any(|e| matches!(e, UiEvent::Score(1, _))));
    let placed = events
        .iter()
        .filter(|e| matches!(e, UiEvent::PlaceToken(1, _)))
        .count();
    let removed = events
        .iter()
        .filter(|e| matches!(e, UiEvent::RemoveToken(1, _)))
        .count();
    assert_eq!(placed, 3);
    assert_eq!(removed, 0);

    session.terminate();
    let result = session.join().unwrap();
    assert_eq!(result.scores, vec![0, 0]);
}

#[test]
fn test_overlapping_proposals_yield_one_score() {
    // A reveal delay widens the validation window so both proposals are
    // usually pending together; the outcome is one winner either way.
    let config = GameConfig {
        table_delay_millis: 50,
        ..nine_card_config()
    };
    let oracle = SetOracle::new(3, 2);
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        13,
        Arc::new(oracle),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    assert!(wait_for(&ui, Duration::from_secs(20), |events| {
        table_from(events, 9).iter().all(Option::is_some)
    }));

    let table = table_from(&ui.events(), 9);
    let cards: Vec<usize> = table.iter().map(|c| c.unwrap()).collect();
    let (first, second) = overlapping_sets(&oracle, &cards);

    // The first two tokens of each proposal must land; the final presses
    // fire together so the proposals race for the queue.
    press_until_token(&session, &ui, 0, slot_of(&table, first[0]));
    press_until_token(&session, &ui, 0, slot_of(&table, first[1]));
    press_until_token(&session, &ui, 1, slot_of(&table, second[0]));
    press_until_token(&session, &ui, 1, slot_of(&table, second[1]));
    press_until_token(&session, &ui, 0, slot_of(&table, first[2]));
    session.key_pressed(1, slot_of(&table, second[2]));

    assert!(wait_for(&ui, Duration::from_secs(20), |events| {
        count_score_events(events) == 1
    }));

    // Give a trailing validation time to land, then confirm the losing
    // proposal collapsed silently: still exactly one score.
    thread::sleep(Duration::from_millis(500));
    let events = ui.events();
    assert_eq!(count_score_events(&events), 1);

    session.terminate();
    let result = session.join().unwrap();
    assert_eq!(result.scores.iter().sum::<u32>(), 1);
}

#[test]
fn test_consuming_the_deck_ends_the_game() {
    // A three-card deck that is itself a set: one deal, one score, and the
    // deck can never produce a set again.
    let config = GameConfig {
        human_players: 1,
        computer_players: 0,
        feature_size: 3,
        feature_count: 2,
        deck_size: 3,
        table_size: 9,
        turn_timeout_millis: 60_000,
        point_freeze_millis: 10,
        penalty_freeze_millis: 10,
        table_delay_millis: 0,
        ..GameConfig::default()
    };
    let oracle = SetOracle::new(3, 2);
    assert!(oracle.test_set(&[0, 1, 2]));

    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        3,
        Arc::new(oracle),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        events
            .iter()
            .filter(|e| matches!(e, UiEvent::PlaceCard(_, _)))
            .count()
            == 3
    }));

    let table = table_from(&ui.events(), 9);
    for slot in 0..9 {
        if table[slot].is_some() {
            press_until_token(&session, &ui, 0, slot);
        }
    }

    // No terminate: the game ends on its own once the set is claimed.
    let result = session.join().unwrap();
    assert_eq!(result.scores, vec![1]);
    assert_eq!(result.winners, vec![0]);
    assert_eq!(result.cards_left, 0);
    assert_eq!(result.rounds_dealt, 1);
    assert_eq!(
        ui.events().last(),
        Some(&UiEvent::AnnounceWinner(vec![0]))
    );
}

#[test]
fn test_elapsed_mode_keeps_a_set_on_the_grid() {
    let config = GameConfig {
        human_players: 1,
        computer_players: 0,
        turn_timeout_millis: 0,
        table_delay_millis: 0,
        ..GameConfig::default()
    };
    let oracle = SetOracle::new(3, 4);
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        17,
        Arc::new(oracle),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        table_from(events, 12).iter().all(Option::is_some)
            && events.iter().any(|e| matches!(e, UiEvent::Elapsed(_)))
    }));

    let events = ui.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, UiEvent::Countdown(_, _))));

    // The dealer dealt around a reserved set.
    let cards: Vec<usize> = table_from(&events, 12)
        .iter()
        .filter_map(|&c| c)
        .collect();
    assert!(!oracle.find_sets(&cards, 1).is_empty());

    session.terminate();
    session.join().unwrap();
}

#[test]
fn test_bot_session_terminates_cleanly() {
    let config = GameConfig {
        human_players: 0,
        computer_players: 2,
        feature_size: 3,
        feature_count: 3,
        deck_size: 27,
        table_size: 9,
        turn_timeout_millis: 300,
        point_freeze_millis: 5,
        penalty_freeze_millis: 5,
        table_delay_millis: 0,
        ..GameConfig::default()
    };
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        19,
        Arc::new(SetOracle::new(3, 3)),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    // Let the bots play through a few reshuffles.
    thread::sleep(Duration::from_millis(1200));
    session.terminate();
    let result = session.join().unwrap();

    assert_eq!(result.scores.len(), 2);
    assert!(result.rounds_dealt >= 1);
    assert!(!result.winners.is_empty());

    let events = ui.events();
    let announcements = events
        .iter()
        .filter(|e| matches!(e, UiEvent::AnnounceWinner(_)))
        .count();
    assert_eq!(announcements, 1);
    assert!(matches!(events.last(), Some(UiEvent::AnnounceWinner(_))));
}

#[test]
fn test_mid_round_termination_announces_last() {
    let config = GameConfig {
        human_players: 2,
        computer_players: 0,
        table_delay_millis: 0,
        ..GameConfig::default()
    };
    let ui = Arc::new(CapturingUi::new());
    let session = Session::start(
        config,
        23,
        Arc::new(SetOracle::new(3, 4)),
        Arc::clone(&ui) as Arc<dyn trey::UiSink>,
    )
    .unwrap();

    assert!(wait_for(&ui, Duration::from_secs(10), |events| {
        events
            .iter()
            .any(|e| matches!(e, UiEvent::PlaceCard(_, _)))
    }));

    session.terminate();
    let result = session.join().unwrap();

    // Nobody scored: a full tie, announced once, as the final event.
    assert_eq!(result.winners, vec![0, 1]);
    assert!(matches!(ui.events().last(), Some(UiEvent::AnnounceWinner(_))));
}

/// First triple of `cards` that is not a legal set.
fn first_non_set(oracle: &SetOracle, cards: &[usize]) -> Vec<usize> {
    for a in 0..cards.len() {
        for b in (a + 1)..cards.len() {
            for c in (b + 1)..cards.len() {
                let triple = vec![cards[a], cards[b], cards[c]];
                if !oracle.test_set(&triple) {
                    return triple;
                }
            }
        }
    }
    panic!("every triple is a set; geometry too small");
}

/// Two legal sets sharing exactly one card.
fn overlapping_sets(oracle: &SetOracle, cards: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let sets = oracle.find_sets(cards, usize::MAX);
    for first in &sets {
        for second in &sets {
            let shared = first.iter().filter(|c| second.contains(c)).count();
            if shared == 1 {
                return (first.clone(), second.clone());
            }
        }
    }
    panic!("no overlapping sets on the table");
}
