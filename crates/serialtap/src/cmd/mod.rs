use std::time::Duration;

use clap::{Args, Subcommand};
use serialtap_session::SessionConfig;
use serialtap_transport::{
    DataBits, FlowControl, Parity, SerialConfig, SerialPortTransport, StopBits, DEFAULT_BAUD_RATE,
};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device, print everything it says, send what you type.
    Monitor(MonitorArgs),
    /// Send a single command and print the transcript.
    Send(SendArgs),
    /// List serial devices.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Line settings and session options shared by commands that open a device.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Symbol rate.
    #[arg(long, short = 'b', env = "SERIALTAP_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Data bits (5, 6, 7, 8).
    #[arg(long, default_value = "8")]
    pub data_bits: DataBits,
    /// Parity (none, odd, even).
    #[arg(long, default_value = "none")]
    pub parity: Parity,
    /// Stop bits (1, 2).
    #[arg(long, default_value = "1")]
    pub stop_bits: StopBits,
    /// Flow control (none, software, hardware).
    #[arg(long, default_value = "none")]
    pub flow_control: FlowControl,
    /// How long one read may block (e.g. 100ms); bounds disconnect latency.
    #[arg(long, default_value = "100ms")]
    pub read_timeout: String,
    /// Name shown for the device in the transcript.
    #[arg(long, default_value = serialtap_session::DEFAULT_DEVICE_LABEL)]
    pub label: String,
}

impl ConnectionArgs {
    pub fn session_config(&self, max_events: Option<usize>) -> CliResult<SessionConfig> {
        Ok(SessionConfig {
            serial: SerialConfig {
                baud_rate: self.baud,
                data_bits: self.data_bits,
                parity: self.parity,
                stop_bits: self.stop_bits,
                flow_control: self.flow_control,
                read_timeout: parse_duration(&self.read_timeout)?,
            },
            device_label: self.label.clone(),
            max_events,
        })
    }
}

pub fn transport_for(port: Option<&str>) -> SerialPortTransport {
    match port {
        Some(port) => SerialPortTransport::with_port(port),
        None => SerialPortTransport::new(),
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial port (e.g. /dev/ttyACM0, COM3). Picked automatically when omitted.
    #[arg(env = "SERIALTAP_PORT")]
    pub port: Option<String>,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Keep at most N events in memory (default: unbounded).
    #[arg(long, value_name = "N")]
    pub max_events: Option<usize>,
    /// Keep monitoring after stdin closes (until the device closes or Ctrl-C).
    #[arg(long)]
    pub keep_open: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial port to open.
    #[arg(env = "SERIALTAP_PORT")]
    pub port: String,
    /// Command text; a newline is appended.
    pub command: String,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Wait after opening before sending (boards that reset on open need ~2s).
    #[arg(long, value_name = "DURATION")]
    pub settle: Option<String>,
    /// Wait for this many lines from the device before closing.
    #[arg(long, default_value_t = 0)]
    pub wait_lines: usize,
    /// Maximum time to wait for --wait-lines (e.g. 5s, 500ms).
    #[arg(long, default_value = "2s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {
    /// Include ports that are not USB devices.
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
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
