//! Session wiring: build the shared state, run the dealer, route input.
//!
//! [`run_session`] is the blocking entry point the CLI and the simulator
//! use. [`Session`] is the handle form: it runs the dealer on its own
//! thread and exposes `key_pressed` for an external input source plus
//! `terminate` for early shutdown.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::{ConfigError, GameConfig};
use crate::game::{Dealer, Grid, Player, PlayerId, ProposalQueue, SessionResult, SlotId};
use crate::oracle::Oracle;
use crate::sync::ShutdownToken;
use crate::ui::UiSink;

/// Error type for session setup and teardown.
#[derive(Debug)]
pub enum SessionError {
    /// The configuration does not describe a playable session.
    Config(ConfigError),
    /// A thread could not be spawned.
    Spawn(std::io::Error),
    /// The dealer thread panicked.
    DealerPanicked,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Spawn(e) => write!(f, "failed to spawn thread: {e}"),
            Self::DealerPanicked => write!(f, "dealer thread panicked"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Spawn(e)
    }
}

/// A running game session.
///
/// Dropping the handle without [`join`](Session::join) detaches the dealer
/// thread; it will still run the game to completion.
pub struct Session {
    players: Vec<Arc<Player>>,
    table_size: usize,
    shutdown: Arc<ShutdownToken>,
    dealer: Option<JoinHandle<Result<SessionResult, std::io::Error>>>,
}

impl Session {
    /// Validate `config`, wire the shared state, and start the dealer on
    /// its own thread. Human players as lower ids, bots after them.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the dealer thread
    /// cannot be spawned.
    pub fn start(
        config: GameConfig,
        seed: u64,
        oracle: Arc<dyn Oracle>,
        ui: Arc<dyn UiSink>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let shutdown = Arc::new(ShutdownToken::new());
        // Closed until the first deal finishes, so early presses are
        // dropped rather than aimed at an empty grid.
        let placing_cards = Arc::new(AtomicBool::new(true));
        let grid = Arc::new(Grid::new(
            &config,
            Arc::clone(&ui),
            Arc::clone(&shutdown),
        ));
        let queue = Arc::new(ProposalQueue::new(config.players()));

        let players: Vec<Arc<Player>> = (0..config.players())
            .map(|id| {
                Arc::new(Player::new(
                    id,
                    id < config.human_players,
                    &config,
                    Arc::clone(&grid),
                    Arc::clone(&queue),
                    Arc::clone(&ui),
                    Arc::clone(&shutdown),
                    Arc::clone(&placing_cards),
                ))
            })
            .collect();

        let table_size = config.table_size;
        let mut dealer = Dealer::new(
            config,
            grid,
            queue,
            players.clone(),
            oracle,
            ui,
            Arc::clone(&shutdown),
            placing_cards,
            seed,
        );
        let handle = std::thread::Builder::new()
            .name("dealer".into())
            .spawn(move || dealer.run())?;

        Ok(Self {
            players,
            table_size,
            shutdown,
            dealer: Some(handle),
        })
    }

    /// Route an input-source key event to its player.
    ///
    /// Out-of-range ids and slots are dropped; the input source is outside
    /// the trust boundary of the engine.
    pub fn key_pressed(&self, player: PlayerId, slot: SlotId) {
        if slot < self.table_size {
            if let Some(agent) = self.players.get(player) {
                agent.key_pressed(slot);
            }
        }
    }

    /// Current score of a player, if the id is valid.
    #[must_use]
    pub fn score(&self, player: PlayerId) -> Option<u32> {
        self.players.get(player).map(|p| p.score())
    }

    /// Request early shutdown; the dealer winds the session down in order.
    pub fn terminate(&self) {
        self.shutdown.shutdown();
    }

    /// Wait for the game to end and return the final standings.
    ///
    /// # Errors
    ///
    /// Returns an error if the dealer thread panicked or failed to spawn a
    /// player thread.
    pub fn join(mut self) -> Result<SessionResult, SessionError> {
        let handle = self
            .dealer
            .take()
            .ok_or(SessionError::DealerPanicked)?;
        match handle.join() {
            Ok(result) => result.map_err(SessionError::Spawn),
            Err(_) => Err(SessionError::DealerPanicked),
        }
    }
}

/// Run a complete headless session to completion on the calling thread's
/// watch.
///
/// # Errors
///
/// Returns an error if the config is invalid or a thread fails to spawn.
pub fn run_session(
    config: GameConfig,
    seed: u64,
    oracle: Arc<dyn Oracle>,
    ui: Arc<dyn UiSink>,
) -> Result<SessionResult, SessionError> {
    Session::start(config, seed, oracle, ui)?.join()
}
