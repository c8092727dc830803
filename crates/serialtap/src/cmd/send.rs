use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use serialtap_frame::trim_line;
use serialtap_session::{Event, EventKind, Session, SessionError};

use crate::cmd::{parse_duration, transport_for, SendArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_transcript, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    if trim_line(&args.command).is_empty() {
        return Err(CliError::new(USAGE, "command must not be empty"));
    }
    let config = args.connection.session_config(None)?;
    let settle = args.settle.as_deref().map(parse_duration).transpose()?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let label = config.device_label.clone();

    let mut session = Session::new(transport_for(Some(&args.port)), config);
    let events = session.subscribe();

    if let Err(err) = session.connect() {
        print_transcript(&session.snapshot(), &label, format);
        return Err(session_error("connect failed", err));
    }

    if let Some(settle) = settle {
        thread::sleep(settle);
    }

    let sent = session.send(&args.command);
    let received = match sent {
        Ok(()) if args.wait_lines > 0 => wait_for_lines(&events, args.wait_lines, wait_timeout),
        _ => 0,
    };

    match session.disconnect() {
        Ok(()) | Err(SessionError::NotConnected) => {}
        Err(err) => return Err(session_error("disconnect failed", err)),
    }
    print_transcript(&session.snapshot(), &label, format);

    sent.map_err(|err| session_error("send failed", err))?;
    if received < args.wait_lines {
        return Err(CliError::new(
            TIMEOUT,
            format!(
                "received {received} of {} lines within {}",
                args.wait_lines, args.wait_timeout
            ),
        ));
    }
    Ok(SUCCESS)
}

/// Count device lines until `wanted` arrive, the connection ends, or time runs out.
fn wait_for_lines(events: &Receiver<Event>, wanted: usize, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    let mut received = 0;

    while received < wanted {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(event) = events.recv_timeout(remaining) else {
            break;
        };
        match event.kind {
            EventKind::Device => received += 1,
            // After connect, System and Error events only report the link going away.
            EventKind::System | EventKind::Error => break,
            EventKind::You => {}
        }
    }
    received
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn event(kind: EventKind, message: &str) -> Event {
        Event {
            seq: 0,
            kind,
            message: message.to_string(),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn stops_once_enough_lines_arrive() {
        let (tx, rx) = mpsc::channel();
        tx.send(event(EventKind::You, "status")).unwrap();
        tx.send(event(EventKind::Device, "ok")).unwrap();
        tx.send(event(EventKind::Device, "temp=21")).unwrap();
        tx.send(event(EventKind::Device, "extra")).unwrap();

        assert_eq!(wait_for_lines(&rx, 2, Duration::from_secs(5)), 2);
        assert_eq!(rx.try_recv().unwrap().message, "extra");
    }

    #[test]
    fn gives_up_at_the_deadline() {
        let (tx, rx) = mpsc::channel();
        tx.send(event(EventKind::Device, "ok")).unwrap();

        let started = Instant::now();
        assert_eq!(wait_for_lines(&rx, 3, Duration::from_millis(50)), 1);
        assert!(started.elapsed() >= Duration::from_millis(50));
        drop(tx);
    }

    #[test]
    fn stops_when_the_device_goes_away() {
        let (tx, rx) = mpsc::channel();
        tx.send(event(EventKind::Device, "bye")).unwrap();
        tx.send(event(EventKind::System, "Connection closed by Arduino"))
            .unwrap();

        assert_eq!(wait_for_lines(&rx, 5, Duration::from_secs(5)), 1);
    }
}
