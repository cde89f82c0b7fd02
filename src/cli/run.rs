//! Run command implementation: one headless session with bot players.

use super::{CliError, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use trey::{run_session, GameConfig, LogUi, SessionResult, SetOracle};

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the config is invalid or the session fails.
#[allow(clippy::too_many_arguments)]
pub(crate) fn execute(
    config_path: Option<PathBuf>,
    players: Option<usize>,
    turn_timeout_millis: Option<i64>,
    hints: bool,
    seed: Option<u64>,
    format: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;

    // Headless runs are bot-only; humans need an input source.
    config.human_players = 0;
    if let Some(players) = players {
        config.computer_players = players;
    }
    if let Some(timeout) = turn_timeout_millis {
        config.turn_timeout_millis = timeout;
    }
    if hints {
        config.hints = true;
    }
    config.validate()?;

    let seed = seed.unwrap_or_else(random_seed);
    let oracle = SetOracle::new(config.feature_size, config.feature_count);

    if !quiet {
        println!(
            "Running session with seed {seed}: {} bots, deck {}...",
            config.computer_players, config.deck_size
        );
    }

    let result = run_session(config, seed, Arc::new(oracle), Arc::new(LogUi))?;

    match format {
        OutputFormat::Text => print!("{}", format_text(&result)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Load the base config from a file, or fall back to defaults.
pub(crate) fn load_config(path: Option<PathBuf>) -> Result<GameConfig, CliError> {
    match path {
        Some(path) => Ok(GameConfig::from_json_file(&path)?),
        None => Ok(GameConfig::default()),
    }
}

/// Derive a seed from the wall clock when none was given.
pub(crate) fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

fn format_text(result: &SessionResult) -> String {
    let mut out = String::new();
    out.push_str("=== SESSION RESULT ===\n\n");
    for (player, score) in result.scores.iter().enumerate() {
        let marker = if result.winners.contains(&player) {
            " (winner)"
        } else {
            ""
        };
        out.push_str(&format!("Player {player}: {score} sets{marker}\n"));
    }
    out.push_str(&format!(
        "\nRounds dealt: {}\nCards left in deck: {}\nSeed: {}\n",
        result.rounds_dealt, result.cards_left, result.seed
    ));
    out
}
