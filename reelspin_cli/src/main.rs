use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use reelspin_core::{
    derive_hash_hex, GameConfig, Grid, InMemoryLedger, Ledger, ProvablyFairRng, RandomSource,
    RoundError, RoundEvent, RoundOrchestrator, RoundOutcome, SeededRandom, SpinReel, SymbolId,
    ROWS,
};
use reelspin_shared::{RoundLogEntry, SessionSummary};

#[derive(Parser)]
#[command(name = "reelspin", about = "Three-reel slot machine in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// JSON game configuration; built-in defaults when absent
    #[arg(long, global = true, env = "REELSPIN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct SeedArgs {
    /// Server seed for reproducible reels (OS entropy when absent)
    #[arg(long, env = "REELSPIN_SEED")]
    seed: Option<String>,
    #[arg(long, default_value = "player")]
    client_seed: String,
    #[arg(long, default_value_t = 1)]
    nonce: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Play rounds with the full reel animation timing
    Play {
        #[arg(long, default_value_t = 1)]
        rounds: u32,
        /// Keep spinning after a losing round until something wins
        #[arg(long)]
        auto: bool,
        #[arg(long, default_value_t = 1000)]
        balance: u64,
        /// Raise the bet this many steps above the initial bet
        #[arg(long, default_value_t = 0)]
        raise: u32,
        /// Skip all waiting
        #[arg(long)]
        turbo: bool,
        /// Export the round log as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Print the round log as JSON lines
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        seed: SeedArgs,
    },
    /// Play many rounds without waiting and report the return ratio
    Simulate {
        #[arg(long, default_value_t = 10_000)]
        rounds: u32,
        #[arg(long, default_value_t = 1_000_000)]
        balance: u64,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[command(flatten)]
        seed: SeedArgs,
    },
    /// Score a grid given as columns, e.g. "1,4,3 5,4,6 7,4,1"
    Score {
        grid: String,
        #[arg(long, default_value_t = 10)]
        bet: u64,
    },
    /// Print the SHA-256 commitment of a server seed
    VerifySeed { seed: String },
}

const GLYPHS: [&str; 9] = ["--", "Ch", "Le", "Or", "Pl", "Be", "Ba", "Di", "77"];

fn glyph(symbol: SymbolId) -> String {
    GLYPHS
        .get(symbol as usize)
        .map(|g| g.to_string())
        .unwrap_or_else(|| format!("{symbol:>2}"))
}

fn render(grid: &Grid) -> String {
    grid.rows()
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|s| glyph(*s)).collect();
            format!("| {} |", cells.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GameConfig> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    GameConfig::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
}

fn sources(seed: &SeedArgs) -> impl FnMut(usize) -> Box<dyn RandomSource> + '_ {
    move |reel| -> Box<dyn RandomSource> {
        match &seed.seed {
            Some(server) => Box::new(ProvablyFairRng::new(
                server.clone(),
                format!("{}:reel{}", seed.client_seed, reel),
                seed.nonce,
            )),
            None => Box::new(SeededRandom::from_entropy()),
        }
    }
}

fn log_entry(outcome: &RoundOutcome) -> RoundLogEntry {
    RoundLogEntry {
        round: outcome.round,
        ts: Utc::now(),
        bet: outcome.bet,
        win: outcome.win,
        balance: outcome.balance,
        reels: outcome.grid.rows(),
        winning_lines: outcome.line_wins.iter().map(|w| w.line).collect(),
    }
}

/// Play `rounds` calls of `play_round`, logging every round each call played.
/// Stops early once the balance cannot cover the bet.
async fn run_rounds<R: SpinReel, L: Ledger>(
    orchestrator: &RoundOrchestrator<R, L>,
    rounds: u32,
    stagger: Duration,
    auto: bool,
) -> anyhow::Result<Vec<RoundLogEntry>> {
    let mut log = Vec::new();
    for _ in 0..rounds {
        match orchestrator.play_round(stagger, auto).await {
            Ok(report) => log.extend(report.history.iter().map(log_entry)),
            Err(RoundError::InsufficientFunds { balance, bet }) => {
                println!("balance {balance} cannot cover bet {bet}");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(log)
}

/// Print round events as they come. Ends when the orchestrator is dropped.
async fn show(mut rx: broadcast::Receiver<RoundEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                warn!(missed = n, "display fell behind the reels");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            RoundEvent::RoundStarted { round, bet, balance } => {
                println!("round {round}: bet {bet}, balance {balance}");
            }
            RoundEvent::ReelStopped { reel, symbols, .. } => {
                let cells: Vec<String> = symbols.iter().map(|s| glyph(*s)).collect();
                println!("  reel {} stopped: {}", reel + 1, cells.join(" "));
            }
            RoundEvent::RoundFinished { outcome } => {
                println!("{}", render(&outcome.grid));
                for win in &outcome.line_wins {
                    println!("  line {} pays {} ({})", win.line + 1, win.amount, glyph(win.symbol));
                }
                if outcome.win > 0 {
                    println!("WIN: {}", outcome.win);
                }
            }
            RoundEvent::BetChanged { bet } => println!("bet is now {bet}"),
            RoundEvent::AutoSpinStopped { rounds, reason } => {
                println!("auto-spin stopped after {rounds} rounds: {reason:?}");
            }
            RoundEvent::BalanceChanged { .. } => {}
        }
    }
}

fn export_csv(path: &Path, log: &[RoundLogEntry]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(RoundLogEntry::CSV_HEADER)?;
    for entry in log {
        wtr.write_record(entry.csv_record()?)?;
    }
    wtr.flush()?;
    println!("Exported {} rows to {}", log.len(), path.display());
    Ok(())
}

fn parse_grid(text: &str, symbol_count: u8) -> anyhow::Result<Grid> {
    let mut columns = Vec::new();
    for column in text.split(|c: char| c.is_whitespace() || c == ';').filter(|c| !c.is_empty()) {
        let symbols = column
            .split(',')
            .map(|s| s.trim().parse::<SymbolId>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("bad column {column:?}"))?;
        let Ok(symbols) = <[SymbolId; ROWS]>::try_from(symbols) else {
            bail!("column {column:?} must hold {ROWS} symbols");
        };
        if let Some(s) = symbols.iter().find(|s| **s >= symbol_count) {
            bail!("symbol {s} is outside the alphabet of {symbol_count}");
        }
        columns.push(symbols);
    }
    Ok(Grid::new(columns))
}

#[allow(clippy::too_many_arguments)]
async fn play(
    config: GameConfig,
    rounds: u32,
    auto: bool,
    balance: u64,
    raise: u32,
    turbo: bool,
    csv: Option<PathBuf>,
    json: bool,
    seed: SeedArgs,
) -> anyhow::Result<()> {
    let mut config = config;
    if turbo {
        config.timing = config.timing.scaled(0.0);
    }
    if let Some(server) = &seed.seed {
        println!("server seed commitment: {}", derive_hash_hex(server.as_bytes()));
    }
    let orchestrator =
        RoundOrchestrator::from_config(&config, InMemoryLedger::new(balance), sources(&seed))?;
    let display = tokio::spawn(show(orchestrator.subscribe()));
    for _ in 0..raise {
        orchestrator.raise_bet()?;
    }

    let log = run_rounds(&orchestrator, rounds, config.timing.stagger(), auto).await?;
    let final_balance = orchestrator.balance();
    drop(orchestrator);
    display.await?;
    println!("final balance: {final_balance}");
    if json {
        for entry in &log {
            println!("{}", serde_json::to_string(entry)?);
        }
    }
    if let Some(path) = csv {
        export_csv(&path, &log)?;
    }
    Ok(())
}

async fn simulate(
    mut config: GameConfig,
    rounds: u32,
    balance: u64,
    csv: Option<PathBuf>,
    seed: SeedArgs,
) -> anyhow::Result<()> {
    config.timing = config.timing.scaled(0.0);
    let orchestrator =
        RoundOrchestrator::from_config(&config, InMemoryLedger::new(balance), sources(&seed))?;
    let log = run_rounds(&orchestrator, rounds, config.timing.stagger(), false).await?;

    let mut summary = SessionSummary::default();
    for entry in &log {
        summary.record(entry);
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("return ratio: {:.4}", summary.return_ratio());
    if let Some(path) = csv {
        export_csv(&path, &log)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            rounds,
            auto,
            balance,
            raise,
            turbo,
            csv,
            json,
            seed,
        } => play(config, rounds, auto, balance, raise, turbo, csv, json, seed).await?,
        Commands::Simulate {
            rounds,
            balance,
            csv,
            seed,
        } => simulate(config, rounds, balance, csv, seed).await?,
        Commands::Score { grid, bet } => {
            let grid = parse_grid(&grid, config.symbol_count)?;
            let eval = config.evaluator()?.evaluate(&grid, bet);
            println!("{}", render(&grid));
            for win in &eval.line_wins {
                println!("line {} pays {} ({})", win.line + 1, win.amount, glyph(win.symbol));
            }
            println!("total win: {}", eval.total);
        }
        Commands::VerifySeed { seed } => {
            println!("{}", derive_hash_hex(seed.as_bytes()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_parses_columns_top_to_bottom() {
        let grid = parse_grid("1,4,3 5,4,6; 7,4,1", 9).unwrap();
        assert_eq!(grid.columns(), &[[1, 4, 3], [5, 4, 6], [7, 4, 1]]);
    }

    #[test]
    fn grid_rejects_short_columns_and_unknown_symbols() {
        assert!(parse_grid("1,4 5,4,6", 9).is_err());
        assert!(parse_grid("1,4,9", 9).is_err());
        assert!(parse_grid("a,b,c", 9).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn round_log_survives_a_listener_that_never_reads() {
        let mut config = GameConfig::default();
        config.timing = config.timing.scaled(0.0);
        let seed = SeedArgs {
            seed: Some("log-test".into()),
            client_seed: "player".into(),
            nonce: 1,
        };
        let orchestrator =
            RoundOrchestrator::from_config(&config, InMemoryLedger::new(1_000_000), sources(&seed))
                .unwrap();
        let _idle = orchestrator.subscribe();

        let log = run_rounds(&orchestrator, 100, Duration::ZERO, false).await.unwrap();

        assert_eq!(log.len(), 100);
        assert!(log.windows(2).all(|w| w[1].round == w[0].round + 1));
        assert_eq!(log.last().map(|e| e.balance), Some(orchestrator.balance()));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_spin_logs_every_round_of_the_call() {
        let mut config = GameConfig::default();
        config.timing = config.timing.scaled(0.0);
        config.max_auto_rounds = Some(5);
        let seed = SeedArgs {
            seed: Some("auto-log".into()),
            client_seed: "player".into(),
            nonce: 1,
        };
        let orchestrator =
            RoundOrchestrator::from_config(&config, InMemoryLedger::new(10_000), sources(&seed))
                .unwrap();

        let log = run_rounds(&orchestrator, 1, Duration::ZERO, true).await.unwrap();

        assert_eq!(log.len() as u64, orchestrator.rounds_played());
        assert!((1..=5).contains(&log.len()));
    }

    #[test]
    fn unknown_glyphs_fall_back_to_numbers() {
        assert_eq!(glyph(8), "77");
        assert_eq!(glyph(12), "12");
    }
}
