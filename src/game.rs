//! Game layer: the shared grid, the proposal pipeline, the player agents,
//! and the dealer that arbitrates them.
//!
//! The synchronization protocol in one breath: key events land in a
//! player's input queue; the player turns them into grid token toggles
//! under the proposal queue's admission gate; the token that completes a
//! candidate set submits the player for validation and rings the dealer's
//! bell; the dealer drains the queue FIFO, judges each snapshot against the
//! oracle, mutates the grid, and hands each submitter its verdict; the
//! player serves its freeze and resumes.

mod dealer;
mod grid;
mod invariants;
mod player;
mod proposals;
mod session;

pub(crate) use dealer::Dealer;
pub use dealer::{SessionResult, DEALER_BREAK_MILLIS};
pub use grid::{CardId, Grid, GridSnapshot, SlotId, TokenAction};
pub use invariants::{assert_invariants, check_invariants, InvariantViolation};
pub use player::{Player, PlayerId, Verdict, BOT_BREAK_MILLIS};
pub use proposals::{ProposalQueue, QueueClosed};
pub use session::{run_session, Session, SessionError};
