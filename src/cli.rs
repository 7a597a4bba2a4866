//! Command-line interface.

use crate::config::LogFormat;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const LOG_LEVELS: [&str; 5] = ["critical", "error", "warning", "info", "debug"];

#[derive(Debug, Parser)]
#[command(
    name = "wdmta",
    version,
    about = "Start WD-MTA (WhatsApp-Discord Message Transfer Automation), \
             a Discord bot to forward chat messages between WhatsApp and Discord."
)]
pub struct Cli {
    /// Set the log level; one of: critical, error, warning, info, debug [default: info]
    #[arg(short = 'L', long, value_name = "LEVEL", value_parser = parse_log_level_name)]
    pub log_level: Option<String>,

    /// Log output format [default: text]
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Also write daily-rotated logs to FILE
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// The TOML settings file [default: <config dir>/wdmta/wdmta.toml if present]
    #[arg(short = 'S', long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// The path to the JSON bindings file [default: config.json]
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the effective settings, with tokens hidden, and exit
    #[arg(long)]
    pub print_settings: bool,

    /// The bot token
    #[arg(
        short = 't',
        long,
        value_name = "TOKEN",
        env = "WDMTA_DISCORD_TOKEN",
        hide_env_values = true,
        help_heading = "Discord bot options"
    )]
    pub token: Option<String>,

    /// Sync application commands to the guild GUILD_ID upon startup
    #[arg(short = 's', long, value_name = "GUILD_ID", help_heading = "Discord bot options")]
    pub sync_to_guild: Option<u64>,

    /// Allow the user USER_ID to run owner commands, in addition to the actual owner
    /// (can be given multiple times)
    #[arg(
        short = 'o',
        long = "owner",
        value_name = "USER_ID",
        conflicts_with = "allow_all",
        help_heading = "Discord bot options"
    )]
    pub owners: Vec<u64>,

    /// Allow all users to run owner commands
    #[arg(long, help_heading = "Discord bot options")]
    pub allow_all: bool,

    /// Disable automatic reconnection
    #[arg(long, help_heading = "Discord bot options")]
    pub no_reconnect: bool,

    /// Enable commands intended for testing purposes
    #[arg(long, help_heading = "Discord bot options")]
    pub enable_test_commands: bool,

    /// The endpoint URL [default: http://127.0.0.1:8080]
    #[arg(short = 'u', long, value_name = "URL", help_heading = "WuzAPI options")]
    pub url: Option<String>,

    /// The user token
    #[arg(
        short = 'x',
        value_name = "TOKEN",
        env = "WDMTA_WUZAPI_TOKEN",
        hide_env_values = true,
        help_heading = "WuzAPI options"
    )]
    pub wuzapi_token: Option<String>,

    /// Host the webhook on HOSTNAME [default: localhost]
    #[arg(long, value_name = "HOSTNAME", help_heading = "WuzAPI options")]
    pub webhook_host: Option<String>,

    /// Host the webhook on port NUMBER [default: 8000]
    #[arg(long, value_name = "NUMBER", help_heading = "WuzAPI options")]
    pub webhook_port: Option<u16>,

    /// URL WuzAPI posts events to [default: http://HOSTNAME:NUMBER/]
    #[arg(long, value_name = "URL", help_heading = "WuzAPI options")]
    pub webhook_url: Option<String>,

    /// Do not download media files beyond SIZE bytes [default: 10000000]
    #[arg(short = 'm', long, value_name = "SIZE", help_heading = "WuzAPI options")]
    pub media_maxsize: Option<u64>,

    /// Keep track of no more than NUMBER messages per chat (used for replies) [default: 1000]
    #[arg(short = 'l', long, value_name = "NUMBER", help_heading = "WuzAPI options")]
    pub message_limit: Option<usize>,

    /// Append received WuzAPI event data to FILE
    #[arg(short = 'd', long, value_name = "FILE", help_heading = "WuzAPI options")]
    pub dump_file: Option<PathBuf>,
}

fn parse_log_level_name(level: &str) -> Result<String, String> {
    let level = level.to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(format!("unknown log level '{level}'"))
    }
}

/// Ask for a token on the terminal until a non-empty one is entered.
pub fn prompt_token<R: BufRead, W: Write>(desc: &str, mut input: R, mut output: W) -> io::Result<String> {
    loop {
        write!(output, "Enter the {desc} token: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no {desc} token given"),
            ));
        }
        let token = line.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }
}
