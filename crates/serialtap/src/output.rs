use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use serde::Serialize;
use serialtap_session::{Event, EventKind};
use serialtap_transport::DeviceInfo;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    seq: u64,
    kind: EventKind,
    label: &'a str,
    message: &'a str,
    timestamp_ms: u64,
    time: String,
}

impl<'a> EventOutput<'a> {
    fn new(event: &'a Event, device_label: &'a str) -> Self {
        Self {
            seq: event.seq,
            kind: event.kind,
            label: kind_label(event.kind, device_label),
            message: &event.message,
            timestamp_ms: event.timestamp_ms,
            time: event.display_time(),
        }
    }
}

/// Render one event as it happens.
///
/// A table needs the whole transcript, so `Table` renders like `Pretty` here.
pub fn print_event(event: &Event, device_label: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&EventOutput::new(event, device_label))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => print_pretty(event, device_label),
        OutputFormat::Raw => {
            if event.kind == EventKind::Device {
                println!("{}", event.message);
            }
        }
    }
}

/// Render a whole transcript at once.
pub fn print_transcript(events: &[Event], device_label: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<EventOutput<'_>> = events
                .iter()
                .map(|event| EventOutput::new(event, device_label))
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = event_table();
            for event in events {
                table.add_row(event_row(event, device_label));
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for event in events {
                print_event(event, device_label, format);
            }
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    #[serde(flatten)]
    device: &'a DeviceInfo,
    description: String,
}

pub fn print_ports(devices: &[DeviceInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = devices
                .iter()
                .map(|device| PortOutput {
                    device,
                    description: device.describe(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "DESCRIPTION"]);
            for device in devices {
                table.add_row(vec![device.name.clone(), device.describe()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if devices.is_empty() {
                println!("no serial devices found");
            }
            for device in devices {
                println!("{}  {}", device.name, device.describe());
            }
        }
        OutputFormat::Raw => {
            for device in devices {
                println!("{}", device.name);
            }
        }
    }
}

/// Report a rejected user action (blank command, not connected).
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

pub fn kind_label(kind: EventKind, device_label: &str) -> &str {
    match kind {
        EventKind::Device => device_label,
        other => other.label(),
    }
}

pub fn kind_color(kind: EventKind) -> Color {
    match kind {
        EventKind::You => Color::Blue,
        EventKind::Device => Color::Green,
        EventKind::Error => Color::Red,
        EventKind::System => Color::Yellow,
    }
}

fn print_pretty(event: &Event, device_label: &str) {
    let label = kind_label(event.kind, device_label);
    let mut out = std::io::stdout();

    if !out.is_terminal() {
        let _ = writeln!(out, "{}", pretty_line(event, label));
        return;
    }

    let _ = crossterm::execute!(
        out,
        Print(format!("[{}] ", event.display_time())),
        SetForegroundColor(kind_color(event.kind)),
        Print(format!("{label:<8}")),
        ResetColor,
        Print(format!(" {}\n", event.message))
    );
}

fn pretty_line(event: &Event, label: &str) -> String {
    format!("[{}] {label:<8} {}", event.display_time(), event.message)
}

fn event_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "TIME", "FROM", "MESSAGE"]);
    table
}

fn event_row(event: &Event, device_label: &str) -> Vec<String> {
    vec![
        event.seq.to_string(),
        event.display_time(),
        kind_label(event.kind, device_label).to_string(),
        event.message.clone(),
    ]
}
