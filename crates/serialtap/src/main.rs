mod cmd;
mod exit;
mod input;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "serialtap", version, about = "Serial line monitor")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monitor_with_line_settings() {
        let cli = Cli::try_parse_from([
            "serialtap",
            "monitor",
            "/dev/ttyACM0",
            "--baud",
            "9600",
            "--parity",
            "even",
            "--max-events",
            "500",
        ])
        .expect("monitor args should parse");

        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(args.connection.baud, 9600);
        assert_eq!(args.max_events, Some(500));
    }

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "serialtap",
            "send",
            "/dev/ttyUSB0",
            "led on",
            "--wait-lines",
            "1",
            "--format",
            "json",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.command, "led on");
        assert_eq!(args.wait_lines, 1);
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn parses_ports_subcommand() {
        let cli = Cli::try_parse_from(["serialtap", "ports", "--all"])
            .expect("ports args should parse");
        assert!(matches!(cli.command, Command::Ports(args) if args.all));
    }

    #[test]
    fn rejects_invalid_line_settings() {
        let err = Cli::try_parse_from(["serialtap", "monitor", "--data-bits", "9"])
            .expect_err("nine data bits should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
