use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serialtap_frame::{trim_line, FrameError, LineReader, LineWriter, ReadOutcome};
use serialtap_transport::{DeviceInfo, SerialConfig, SerialStream, Transport};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::log::{Event, EventKind, EventLog, SharedLog};
use crate::state::{ConnectionState, StateCell};

/// Label used for the device in lifecycle messages.
pub const DEFAULT_DEVICE_LABEL: &str = "Arduino";

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Line settings used for every open. Default: 115200 8N1.
    pub serial: SerialConfig,
    /// How the device is named in System events. Default: "Arduino".
    pub device_label: String,
    /// Cap on retained events. Default: unbounded.
    pub max_events: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            device_label: DEFAULT_DEVICE_LABEL.to_string(),
            max_events: None,
        }
    }
}

/// Why a read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLoopExit {
    /// The device closed the stream.
    EndOfStream,
    /// `disconnect` asked the loop to stop.
    Stopped,
    /// A read failed. The failure is in the log.
    Failed,
}

struct ActiveConnection {
    device: DeviceInfo,
    writer: LineWriter<SerialStream>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<ReadLoopExit>>,
}

/// One device connection at a time, plus the transcript of everything that
/// happened on it.
///
/// Each successful `connect` starts a dedicated read loop thread that owns the
/// line framer for that connection. Sends happen on the caller's thread.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    log: SharedLog,
    state: StateCell,
    active: Option<ActiveConnection>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let log = SharedLog::new(EventLog::with_max_events(config.max_events));
        Self {
            transport,
            config,
            log,
            state: StateCell::new(),
            active: None,
        }
    }

    /// Select and open a device, then start reading from it.
    ///
    /// Failures are logged as Error events and also returned so the caller
    /// can alert the user.
    pub fn connect(&mut self) -> Result<DeviceInfo> {
        self.reap_finished();

        if !self
            .state
            .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            return Err(SessionError::AlreadyConnected);
        }

        match self.open_connection() {
            Ok(device) => Ok(device),
            Err(err) => {
                warn!(error = %err, "connection failed");
                self.state.set(ConnectionState::Disconnected);
                self.log
                    .append(EventKind::Error, format!("Connection failed: {err}"));
                Err(err)
            }
        }
    }

    fn open_connection(&mut self) -> Result<DeviceInfo> {
        let device = self.transport.request_device()?;
        let stream = self.transport.open(&device, &self.config.serial)?;
        let (reader, writer) = serialtap_frame::split(stream)?;

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = ReadLoop {
            log: self.log.clone(),
            state: self.state.clone(),
            stop: Arc::clone(&stop),
            label: self.config.device_label.clone(),
        };

        // The loop waits for `start` so no Device line can precede "Connected".
        let (start, started) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("serialtap-reader".to_string())
            .spawn(move || ctx.run(reader, started))
            .map_err(SessionError::Spawn)?;

        self.state.set(ConnectionState::Connected);
        self.log.append(
            EventKind::System,
            format!("Connected to {} successfully", self.config.device_label),
        );
        let _ = start.send(());

        info!(port = %device.name, settings = %self.config.serial, "connected");
        self.active = Some(ActiveConnection {
            device: device.clone(),
            writer,
            stop,
            reader: Some(handle),
        });
        Ok(device)
    }

    /// Send one command line.
    ///
    /// Rejected without touching the device or the log when nothing is
    /// connected or the command is blank. A write failure is logged and the
    /// connection stays open.
    pub fn send(&mut self, command: &str) -> Result<()> {
        let active = match (self.active.as_mut(), self.state.get()) {
            (Some(active), ConnectionState::Connected) => active,
            _ => return Err(SessionError::NotConnected),
        };
        if trim_line(command).is_empty() {
            return Err(SessionError::EmptyCommand);
        }

        match active.writer.send_line(command) {
            Ok(()) => {
                debug!(bytes = command.len() + 1, "sent command");
                self.log.append(EventKind::You, command);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "write failed");
                self.log
                    .append(EventKind::Error, format!("Failed to send: {}", cause(&err)));
                Err(err.into())
            }
        }
    }

    /// Stop the read loop and close the device.
    pub fn disconnect(&mut self) -> Result<()> {
        let active = self.active.take().ok_or(SessionError::NotConnected)?;
        let was_live = self
            .state
            .transition(ConnectionState::Connected, ConnectionState::Disconnecting);

        let exit = shutdown(active);
        self.state.set(ConnectionState::Disconnected);
        debug!(?exit, "read loop joined");

        if was_live {
            info!("disconnected");
            self.log.append(
                EventKind::System,
                format!("Disconnected from {}", self.config.device_label),
            );
        }
        Ok(())
    }

    /// Block until the current read loop ends on its own.
    ///
    /// Returns `None` if there is no read loop to wait for.
    pub fn wait_for_reader(&mut self) -> Option<ReadLoopExit> {
        let handle = self.active.as_mut()?.reader.take()?;
        join_reader(handle)
    }

    /// Whether a read loop is currently running.
    pub fn is_reading(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|active| active.reader.as_ref())
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// The device of the current (or last, until reaped) connection.
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.active.as_ref().map(|active| &active.device)
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.log.snapshot()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.log.subscribe()
    }

    /// Handle to the shared transcript.
    pub fn log(&self) -> SharedLog {
        self.log.clone()
    }

    // A connection whose read loop already ended is cleaned up before reopening.
    fn reap_finished(&mut self) {
        if self.state.get() == ConnectionState::Disconnected {
            if let Some(active) = self.active.take() {
                let exit = shutdown(active);
                debug!(?exit, "reaped finished connection");
            }
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            shutdown(active);
        }
    }
}

fn shutdown(active: ActiveConnection) -> Option<ReadLoopExit> {
    active.stop.store(true, Ordering::SeqCst);
    let exit = active.reader.and_then(join_reader);
    drop(active.writer);
    exit
}

fn join_reader(handle: JoinHandle<ReadLoopExit>) -> Option<ReadLoopExit> {
    match handle.join() {
        Ok(exit) => Some(exit),
        Err(_) => {
            warn!("read loop panicked");
            None
        }
    }
}

/// Everything the read loop thread owns besides its reader.
struct ReadLoop {
    log: SharedLog,
    state: StateCell,
    stop: Arc<AtomicBool>,
    label: String,
}

impl ReadLoop {
    fn run<R: Read>(self, mut reader: LineReader<R>, start: Receiver<()>) -> ReadLoopExit {
        if start.recv().is_err() {
            debug!("read loop abandoned before start");
            return ReadLoopExit::Stopped;
        }
        debug!("read loop started");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                debug!(pending = reader.pending().len(), "read loop stopped");
                return ReadLoopExit::Stopped;
            }

            match reader.read_lines() {
                Ok(ReadOutcome::Lines(lines)) => {
                    for line in lines {
                        self.log.append(EventKind::Device, line);
                    }
                }
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::EndOfStream) => {
                    info!("device closed the stream");
                    self.finish();
                    self.log.append(
                        EventKind::System,
                        format!("Connection closed by {}", self.label),
                    );
                    return ReadLoopExit::EndOfStream;
                }
                Err(err) => {
                    warn!(error = %err, "read failed");
                    self.finish();
                    self.log
                        .append(EventKind::Error, format!("Read error: {}", cause(&err)));
                    return ReadLoopExit::Failed;
                }
            }
        }
    }

    fn finish(&self) {
        self.state
            .transition(ConnectionState::Connected, ConnectionState::Disconnected);
    }
}

fn cause(err: &FrameError) -> String {
    match err {
        FrameError::Io(io) => io.to_string(),
        other => other.to_string(),
    }
}
