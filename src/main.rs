use std::io;

use clap::{CommandFactory, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use shoutbox_sync::cli::{Args, Command};
use shoutbox_sync::config::ClientConfig;
use shoutbox_sync::model::Room;
use shoutbox_sync::poller::{PollOutcome, RoomPollerBuilder};
use shoutbox_sync::stats::StatsHeader;
use shoutbox_sync::terminal::{print_stats, TerminalContainer, TerminalTab};
use shoutbox_sync::transport::ApiClient;

fn init_tracing(verbose: bool) {
    let default = if verbose { "shoutbox_sync=debug,shoutbox=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn watch(config: ClientConfig, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config)?;
    let mut poller = RoomPollerBuilder::new(client)
        .poll_interval(config.poll_interval())
        .limit(config.limit)
        .since_overlap(config.since_overlap_secs)
        .page_location(config.base_url()?)
        .build();

    let focus = config
        .focus
        .clone()
        .or_else(|| config.rooms.first().map(|r| r.id.clone()));
    for room in &config.rooms {
        let active = focus.as_deref() == Some(room.id.as_str());
        poller.add_room(
            Room::new(room.id.clone(), room.network_id),
            TerminalContainer::stdout(room.id.clone()),
            TerminalTab::stdout(room.id.clone(), active),
        );
    }

    if once {
        for (room, outcome) in poller.poll_all().await {
            if outcome == PollOutcome::Failed {
                warn!(room = %room, "room could not be fetched");
            }
        }
        return Ok(());
    }

    // Typing a room id on stdin switches focus to that room.
    let (focus_tx, focus_rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let id = line.trim().trim_start_matches('#').to_string();
            if id.is_empty() {
                continue;
            }
            if focus_tx.send(id).await.is_err() {
                break;
            }
        }
        debug!("stdin closed, focus switching disabled");
    });

    poller.run(focus_rx).await;
    Ok(())
}

async fn stats(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config)?;
    let stats = client.fetch_stats().await?;
    print_stats(&mut io::stdout(), &StatsHeader::from(&stats))?;
    Ok(())
}

async fn say(config: ClientConfig, room: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let room = config
        .room(room)
        .ok_or_else(|| format!("unknown room '{room}'"))?
        .clone();
    let client = ApiClient::new(&config)?;
    match client.publish(room.network_id, message).await? {
        Some(posted) => info!(room = %room.id, id = %posted.id, "message posted"),
        None => info!(room = %room.id, "message posted"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Command::Completions { shell } = &args.command {
        clap_complete::generate(*shell, &mut Args::command(), "shoutbox", &mut io::stdout());
        return Ok(());
    }

    init_tracing(args.verbose);
    let config = load_config(&args)?;

    match &args.command {
        Command::Watch { once, .. } => watch(config, *once).await,
        Command::Stats => stats(config).await,
        Command::Say { room, message } => say(config, room, message).await,
        Command::Completions { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults_without_file() {
        let args = Args::parse_from(["shoutbox", "stats"]);
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_load_config_rejects_unknown_focus_flag() {
        let args = Args::parse_from(["shoutbox", "watch", "--focus", "lobby"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_load_config_reads_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"poll_interval_secs = 30\nlimit = 5\n").unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let args = Args::parse_from(["shoutbox", "--config", &path, "watch", "--interval", "7"]);
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.poll_interval_secs, 7);
        assert_eq!(cfg.limit, Some(5));
    }

    #[test]
    fn test_completions_generate_for_bash() {
        let mut buf = Vec::new();
        clap_complete::generate(clap_complete::Shell::Bash, &mut Args::command(), "shoutbox", &mut buf);
        assert!(String::from_utf8_lossy(&buf).contains("shoutbox"));
    }
}
