//! Simulate command implementation: mass parallel sessions with aggregate
//! statistics.

use super::run::{load_config, random_seed};
use super::{CliError, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use trey::{run_session, NullUi, SessionResult, SetOracle};

/// Aggregate statistics over many sessions.
#[derive(Debug, Serialize)]
struct SimulationStats {
    games_played: u64,
    /// Wins per player id; a tie counts for every tied player.
    wins: Vec<u64>,
    /// Total sets claimed per player id.
    sets: Vec<u64>,
    rounds_dealt: u64,
}

impl SimulationStats {
    fn new(players: usize) -> Self {
        Self {
            games_played: 0,
            wins: vec![0; players],
            sets: vec![0; players],
            rounds_dealt: 0,
        }
    }

    fn add_result(&mut self, result: &SessionResult) {
        self.games_played += 1;
        for &winner in &result.winners {
            if let Some(wins) = self.wins.get_mut(winner) {
                *wins += 1;
            }
        }
        for (player, &score) in result.scores.iter().enumerate() {
            if let Some(sets) = self.sets.get_mut(player) {
                *sets += u64::from(score);
            }
        }
        self.rounds_dealt += u64::from(result.rounds_dealt);
    }
}

/// Execute the simulate command.
///
/// # Errors
///
/// Returns an error if the config is invalid or serialization fails.
#[allow(clippy::too_many_arguments)]
pub(crate) fn execute(
    games: u64,
    config_path: Option<PathBuf>,
    players: Option<usize>,
    turn_timeout_millis: Option<i64>,
    seed: Option<u64>,
    threads: Option<usize>,
    format: OutputFormat,
    progress: bool,
) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;
    config.human_players = 0;
    if let Some(players) = players {
        config.computer_players = players;
    }
    if let Some(timeout) = turn_timeout_millis {
        config.turn_timeout_millis = timeout;
    }
    config.validate()?;

    if let Some(num_threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let base_seed = seed.unwrap_or_else(random_seed);
    let oracle = Arc::new(SetOracle::new(config.feature_size, config.feature_count));

    let pb = if progress {
        let pb = ProgressBar::new(games);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} games ({per_sec})",
                )
                .expect("valid template")
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let stats = Mutex::new(SimulationStats::new(config.players()));
    let completed = AtomicU64::new(0);

    (0..games).into_par_iter().for_each(|i| {
        let game_seed = base_seed.wrapping_add(i);

        if let Ok(result) = run_session(
            config.clone(),
            game_seed,
            Arc::clone(&oracle) as Arc<dyn trey::Oracle>,
            Arc::new(NullUi),
        ) {
            if let Ok(mut stats) = stats.lock() {
                stats.add_result(&result);
            }
        }

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = pb {
            pb.set_position(done);
        }
    });

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    let duration = start.elapsed();
    let stats = stats
        .into_inner()
        .map_err(|e| CliError::new(format!("Lock error: {e}")))?;

    let games_per_sec = if duration.as_secs_f64() > 0.0 {
        stats.games_played as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    match format {
        OutputFormat::Text => {
            println!();
            print!("{}", format_text(&stats));
            println!();
            println!(
                "Duration: {:.2}s ({:.1} games/sec)",
                duration.as_secs_f64(),
                games_per_sec
            );
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&stats)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    Ok(())
}

fn format_text(stats: &SimulationStats) -> String {
    let mut out = String::new();
    out.push_str("=== SIMULATION RESULTS ===\n\n");
    out.push_str(&format!("Games played: {}\n", stats.games_played));
    out.push_str(&format!("Rounds dealt: {}\n\n", stats.rounds_dealt));
    for (player, (&wins, &sets)) in stats.wins.iter().zip(stats.sets.iter()).enumerate() {
        let rate = if stats.games_played > 0 {
            100.0 * wins as f64 / stats.games_played as f64
        } else {
            0.0
        };
        out.push_str(&format!(
            "Player {player}: {wins} wins ({rate:.1}%), {sets} sets\n"
        ));
    }
    out
}
