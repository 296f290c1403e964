use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod run;
pub mod send;
pub mod spy;
pub mod topics;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the serial ↔ bus bridge.
    Run(RunArgs),
    /// Subscribe to bus channels and print decoded messages.
    Spy(SpyArgs),
    /// Print the compiled-in topic registry.
    Topics(TopicsArgs),
    /// Publish one typed message on a bus channel.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Spy(args) => spy::run(args, format),
        Command::Topics(args) => topics::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serial endpoint path (tty device or Unix socket).
    pub link_path: PathBuf,
    /// Bus multicast URL.
    #[arg(long, default_value = botlink_bus::DEFAULT_UDPM_URL)]
    pub bus: String,
    /// Baud rate for tty endpoints.
    #[arg(long, default_value_t = botlink_link::DEFAULT_BAUD)]
    pub baud: u32,
    /// Timesync emission period (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timesync_period: String,
    /// Link read timeout (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub read_timeout: String,
    /// Link-health timeout: treat the link as down when no valid frame
    /// arrives for this long. "none" disables.
    #[arg(long, default_value = "5s")]
    pub link_timeout: String,
    /// Delay before reopening a lost link.
    #[arg(long, default_value = "1s")]
    pub reconnect_backoff: String,
    /// Serialize reads and writes behind one transport guard.
    #[arg(long)]
    pub half_duplex: bool,
}

#[derive(Args, Debug)]
pub struct SpyArgs {
    /// Bus multicast URL.
    #[arg(long, default_value = botlink_bus::DEFAULT_UDPM_URL)]
    pub bus: String,
    /// Only print these channels (comma-separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<String>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct TopicsArgs {}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel to publish on.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// JSON message body.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,
    /// Read the JSON message body from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
    /// Bus multicast URL.
    #[arg(long, default_value = botlink_bus::DEFAULT_UDPM_URL)]
    pub bus: String,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

/// Like `parse_duration`, but "none" (or "0") disables the setting.
pub(crate) fn parse_optional_duration(input: &str) -> CliResult<Option<Duration>> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("none") || trimmed == "0" {
        return Ok(None);
    }
    parse_duration(trimmed).map(Some)
}
