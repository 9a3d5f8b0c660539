use anyhow::{Context, Result};
use clap::Parser;
use prismata_core::Player;
use prismata_replay::{
    ConsoleObserver, ConsoleOptions, EndCondition, ErrorKind, EventLogObserver, MatchResult,
    ReplayError, ReplayOptions, ReplayParser,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Parser, Debug)]
#[command(name = "prismata-replay")]
#[command(about = "Replay recorded Prismata matches through the rules engine")]
struct Args {
    /// Replay files (JSON)
    files: Vec<PathBuf>,

    /// Run every query and the full replay, then print how many succeeded
    #[arg(long)]
    test: bool,

    /// Show the recorded commands behind each action
    #[arg(short = 'c', long)]
    commands: bool,

    /// Mark undo points in the listing
    #[arg(short = 'u', long)]
    undo_points: bool,

    /// Reject records with unknown top-level fields
    #[arg(long, env = "PRISMATA_REPLAY_STRICT")]
    strict: bool,

    /// Emit every event as a JSON line instead of the listing
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if args.files.is_empty() {
        anyhow::bail!("No input files.");
    }
    let options = ReplayOptions {
        strict: args.strict,
    };

    if args.test {
        run_tests(&args.files, &options);
        return Ok(());
    }

    let mut failed = 0;
    for path in &args.files {
        if let Err(e) = list_gameplay_events(path, &args, &options) {
            eprintln!("{}: {:#}", path.display(), e);
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} replays failed.", failed, args.files.len());
    }
    Ok(())
}

fn load(path: &Path, options: &ReplayOptions) -> Result<ReplayParser, ReplayError> {
    let text = std::fs::read_to_string(path)?;
    ReplayParser::from_json(&text, options)
}

/// Every query plus the full replay, as batch validation does.
fn check_replay(path: &Path, options: &ReplayOptions) -> Result<(), ReplayError> {
    let mut parser = load(path, options)?;
    let data = parser.data();
    data.server_version()?;
    for player in [Player::First, Player::Second] {
        data.player_info(player)?;
        data.time_control(player)?;
        data.deck(player)?;
        data.start_position(player)?;
    }
    data.game_format()?;
    data.result()?;
    parser.run()?;
    Ok(())
}

fn run_tests(files: &[PathBuf], options: &ReplayOptions) {
    let mut errors = 0;
    let mut not_implemented = 0;
    for path in files {
        if let Err(e) = check_replay(path, options) {
            errors += 1;
            if e.kind() == ErrorKind::NotImplemented {
                not_implemented += 1;
            }
            log::debug!("{}: {}", path.display(), e);
        }
    }
    println!("Ran into an error in {} replays.", errors - not_implemented);
    println!("Found unimplemented feature in {} replays.", not_implemented);
    println!("Succesfully parsed {} replays.", files.len() - errors);
}

fn format_time(time: Option<SystemTime>) -> String {
    time.map_or_else(
        || "unknown".to_string(),
        |t| humantime::format_rfc3339_seconds(t).to_string(),
    )
}

fn json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize match info")
}

fn print_header(parser: &ReplayParser) -> Result<()> {
    let data = parser.data();
    println!("Code: {}", data.code().unwrap_or("unknown"));
    println!("Start time: {}", format_time(data.start_time()));
    println!("End time: {}", format_time(data.end_time()));
    println!("Server version: {}", data.server_version()?);
    for player in [Player::First, Player::Second] {
        println!("{}: {}", player, json(&data.player_info(player)?)?);
    }
    println!("Game format: {}", data.game_format()?);
    for player in [Player::First, Player::Second] {
        println!("Time control {}: {}", player, json(&data.time_control(player)?)?);
    }
    for player in [Player::First, Player::Second] {
        println!("Deck {}: {}", player, json(&data.deck(player)?)?);
    }
    for player in [Player::First, Player::Second] {
        println!(
            "Start position {}: {}",
            player,
            json(&data.start_position(player)?)?
        );
    }
    Ok(())
}

fn describe_result(result: &MatchResult) -> String {
    let Some(winner) = result.winner else {
        return match result.end_condition {
            EndCondition::Repetition => "Game ended in a draw by repetition.".to_string(),
            EndCondition::DoubleDisconnect => {
                "Game ended in a draw by double disconnect.".to_string()
            }
            _ => "Game ended in a draw.".to_string(),
        };
    };
    let loser = winner.opponent();
    match result.end_condition {
        EndCondition::Resign => format!("{} defeated {} by resignation.", winner, loser),
        EndCondition::Elimination => format!("{} defeated {} by elimination.", winner, loser),
        EndCondition::Disconnect => format!("{} defeated {} by disconnect.", winner, loser),
        _ => format!("{} defeated {}.", winner, loser),
    }
}

fn list_gameplay_events(path: &Path, args: &Args, options: &ReplayOptions) -> Result<()> {
    log::info!("Loading replay: {}", path.display());
    let mut parser = load(path, options)?;

    if args.json {
        parser.register(Box::new(EventLogObserver::stdout()));
        parser.run()?;
        return Ok(());
    }

    print_header(&parser)?;
    parser.register(Box::new(ConsoleObserver::stdout(ConsoleOptions {
        show_commands: args.commands,
        show_undo_points: args.undo_points,
    })));
    parser.run()?;
    let result = parser.data().result()?;
    // The listing is buffered; flush it before the closing line.
    drop(parser);
    println!("{}", describe_result(&result));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_result() {
        let result = MatchResult {
            winner: Some(Player::Second),
            end_condition: EndCondition::Resign,
        };
        assert_eq!(describe_result(&result), "P2 defeated P1 by resignation.");

        let result = MatchResult {
            winner: Some(Player::First),
            end_condition: EndCondition::Defeated,
        };
        assert_eq!(describe_result(&result), "P1 defeated P2.");

        let result = MatchResult {
            winner: None,
            end_condition: EndCondition::DoubleDisconnect,
        };
        assert_eq!(
            describe_result(&result),
            "Game ended in a draw by double disconnect."
        );
    }
}
