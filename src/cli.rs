use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "shoutbox")]
#[command(version)]
#[command(about = "Follow tracker shoutboxes from the terminal")]
pub struct Args {
    /// TOML config file (defaults are used when omitted)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Tracker origin, e.g. https://tracker.example
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Session cookie sent with every request, e.g. "session=abc123"
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Poll all configured rooms and print new lines as they arrive
    Watch {
        /// Room whose tab starts active; others collect unread badges
        #[arg(long)]
        focus: Option<String>,

        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Maximum messages per fetch
        #[arg(long)]
        limit: Option<u32>,

        /// Poll once and exit
        #[arg(long)]
        once: bool,
    },

    /// Print the current user's transfer statistics
    Stats,

    /// Post a message to a room
    Say {
        /// Room id from the config
        #[arg(long, default_value = "public")]
        room: String,

        message: String,
    },

    /// Generate shell completions
    Completions { shell: Shell },
}

impl Args {
    /// Fold global flags and `watch` options into `config`. Flags win.
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(session) = &self.session {
            config.session_cookie = Some(session.clone());
        }
        if let Command::Watch { focus, interval, limit, .. } = &self.command {
            if focus.is_some() {
                config.focus = focus.clone();
            }
            if let Some(interval) = interval {
                config.poll_interval_secs = *interval;
            }
            if limit.is_some() {
                config.limit = *limit;
            }
        }
    }
}
