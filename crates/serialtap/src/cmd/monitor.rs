use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serialtap_session::{Event, ReadLoopExit, Session, SessionError};
use serialtap_transport::Transport;
use tracing::debug;

use crate::cmd::{transport_for, MonitorArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::input::CommandInput;
use crate::output::{print_event, print_warning, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const QUIT_COMMAND: &str = "/quit";

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    check_live_format(format)?;
    let config = args.connection.session_config(args.max_events)?;
    let label = config.device_label.clone();
    let mut session = Session::new(transport_for(args.port.as_deref()), config);
    let events = session.subscribe();

    if let Err(err) = session.connect() {
        drain(&events, &label, format);
        return Err(session_error("connect failed", err));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let lines = spawn_stdin_reader()?;
    let ended = pump(&mut session, &events, lines, &running, args.keep_open, &label, format);

    let code = match ended {
        Some(ReadLoopExit::Failed) => FAILURE,
        _ => SUCCESS,
    };
    match session.disconnect() {
        Ok(()) | Err(SessionError::NotConnected) => {}
        Err(err) => return Err(session_error("disconnect failed", err)),
    }
    drain(&events, &label, format);
    Ok(code)
}

fn check_live_format(format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => Err(CliError::new(
            USAGE,
            "table output needs a finished transcript; use pretty, json or raw with monitor",
        )),
        OutputFormat::Json | OutputFormat::Pretty | OutputFormat::Raw => Ok(()),
    }
}

/// Print events and forward typed lines until the user quits or the device goes away.
///
/// Returns how the read loop ended if it ended on its own.
fn pump<T: Transport>(
    session: &mut Session<T>,
    events: &Receiver<Event>,
    lines: Receiver<String>,
    running: &AtomicBool,
    keep_open: bool,
    label: &str,
    format: OutputFormat,
) -> Option<ReadLoopExit> {
    let mut input = CommandInput::default();
    let mut stdin_open = true;

    while running.load(Ordering::SeqCst) {
        drain(events, label, format);

        if !session.is_reading() {
            return session.wait_for_reader();
        }

        if !stdin_open {
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) if line.trim() == QUIT_COMMAND => break,
            Ok(line) => {
                input.set(line);
                match input.submit(session) {
                    Ok(()) => {}
                    Err(err) if err.is_user_input() => print_warning(&err.to_string()),
                    // Device failures are already in the transcript.
                    Err(err) => debug!(error = %err, "send failed"),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if !keep_open {
                    break;
                }
                debug!("stdin closed, still monitoring");
                stdin_open = false;
            }
        }
    }
    None
}

fn drain(events: &Receiver<Event>, label: &str, format: OutputFormat) {
    for event in events.try_iter() {
        print_event(&event, label, format);
    }
}

fn spawn_stdin_reader() -> CliResult<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("serialtap-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("stdin reader setup failed: {err}")))?;
    Ok(rx)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
