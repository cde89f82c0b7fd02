// Allow unwrap in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Trey: a real-time multi-player Set engine.
//!
//! This crate is the concurrency core of a Set-style card-matching game:
//! player agent threads race to mark candidate sets on a shared card grid,
//! and a single dealer thread validates their proposals, keeps the round
//! timer, and reshuffles the grid.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Session (wiring, input routing)        │
//! ├─────────────────────────────────────────┤
//! │  Dealer ── ProposalQueue ── Players     │
//! ├─────────────────────────────────────────┤
//! │  Grid (per-slot guards, token bitmap)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The engine never renders: every observable transition flows out through
//! a [`UiSink`], set detection is delegated to an [`Oracle`], and human
//! input arrives through [`Session::key_pressed`].

pub mod config;
pub mod game;
pub mod oracle;
pub mod sync;
pub mod ui;

pub use config::{ConfigError, GameConfig};
pub use game::{
    check_invariants, run_session, CardId, Grid, Player, PlayerId, ProposalQueue, Session,
    SessionError, SessionResult, SlotId, TokenAction, Verdict,
};
pub use oracle::{Oracle, SetOracle};
pub use ui::{CapturingUi, LogUi, NullUi, UiEvent, UiSink};
