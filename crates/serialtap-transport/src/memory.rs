//! In-process scripted links.
//!
//! A [`MemoryLink`] plays back queued read steps and records everything
//! written to it. Clones share state, so a test can keep one handle while the
//! stream owns another.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};
use crate::traits::{DeviceInfo, SerialStream, Transport};

/// How long an idle hold-open link waits before reporting a timeout.
const IDLE_POLL: Duration = Duration::from_millis(5);

#[derive(Debug)]
enum ReadStep {
    Data(Vec<u8>),
    Fail(io::ErrorKind, String),
}

#[derive(Debug, Default)]
struct LinkState {
    reads: VecDeque<ReadStep>,
    written: Vec<u8>,
    hold_open: bool,
    write_failure: Option<String>,
}

/// A scripted duplex link.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    state: Arc<Mutex<LinkState>>,
}

impl MemoryLink {
    /// A link that reports end-of-stream once its script runs out.
    pub fn new() -> Self {
        Self::default()
    }

    /// A link that stays open after its script runs out, timing out reads
    /// until more data is pushed.
    pub fn hold_open() -> Self {
        let link = Self::default();
        link.lock().hold_open = true;
        link
    }

    /// Queue a chunk to be returned by a later read.
    pub fn push_chunk(&self, chunk: impl AsRef<[u8]>) -> &Self {
        self.lock()
            .reads
            .push_back(ReadStep::Data(chunk.as_ref().to_vec()));
        self
    }

    /// Queue a read failure.
    pub fn push_error(&self, kind: io::ErrorKind, message: impl Into<String>) -> &Self {
        self.lock()
            .reads
            .push_back(ReadStep::Fail(kind, message.into()));
        self
    }

    /// Stop holding the link open; reads report end-of-stream once drained.
    pub fn close(&self) {
        self.lock().hold_open = false;
    }

    /// Make every subsequent write fail with `message`, or succeed again with `None`.
    pub fn fail_writes(&self, message: Option<&str>) {
        self.lock().write_failure = message.map(str::to_string);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        match state.reads.pop_front() {
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    state.reads.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
            Some(ReadStep::Fail(kind, message)) => Err(io::Error::new(kind, message)),
            None if state.hold_open => {
                drop(state);
                std::thread::sleep(IDLE_POLL);
                Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
            }
            None => Ok(0),
        }
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if let Some(message) = &state.write_failure {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, message.clone()));
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A transport handing out queued [`MemoryLink`]s, one per successful open.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    device: Option<DeviceInfo>,
    links: VecDeque<MemoryLink>,
    open_failure: Option<String>,
    opens: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// A transport exposing one device named `mem0` and no links yet.
    pub fn new() -> Self {
        Self {
            device: Some(DeviceInfo::named("mem0")),
            ..Self::default()
        }
    }

    /// A transport with no device to select.
    pub fn without_device() -> Self {
        Self::default()
    }

    /// Queue a link for the next successful open.
    pub fn with_link(mut self, link: MemoryLink) -> Self {
        self.links.push_back(link);
        self
    }

    /// Fail every open with `message`.
    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_failure = Some(message.into());
        self
    }

    /// Shared counter of open attempts that reached the device.
    pub fn open_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

impl Transport for MemoryTransport {
    fn request_device(&mut self) -> Result<DeviceInfo> {
        self.device
            .clone()
            .ok_or_else(|| TransportError::Selection("no serial devices found".to_string()))
    }

    fn open(&mut self, device: &DeviceInfo, config: &SerialConfig) -> Result<SerialStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let open_error = |message: String| TransportError::Open {
            port: device.name.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, message),
        };

        if let Some(message) = &self.open_failure {
            return Err(open_error(message.clone()));
        }
        let link = self
            .links
            .pop_front()
            .ok_or_else(|| open_error("device busy".to_string()))?;

        debug!(port = %device.name, settings = %config, "opened memory link");
        Ok(SerialStream::from_memory(device.name.clone(), link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_play_back_script_then_eof() {
        let mut link = MemoryLink::new();
        link.push_chunk(b"abc").push_chunk(b"de");

        let mut buf = [0u8; 8];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn oversized_chunk_is_split_across_reads() {
        let mut link = MemoryLink::new();
        link.push_chunk(b"abcdef");

        let mut buf = [0u8; 4];
        assert_eq!(link.read(&mut buf).unwrap(), 4);
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn hold_open_link_times_out_until_closed() {
        let mut link = MemoryLink::hold_open();
        let mut buf = [0u8; 4];

        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        link.close();
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn scripted_error_surfaces_once() {
        let mut link = MemoryLink::new();
        link.push_error(io::ErrorKind::Other, "device unplugged");

        let mut buf = [0u8; 4];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.to_string(), "device unplugged");
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_failure_can_be_toggled() {
        let mut link = MemoryLink::new();
        link.fail_writes(Some("cable pulled"));
        assert!(link.write(b"x").is_err());

        link.fail_writes(None);
        link.write_all(b"ok").unwrap();
        assert_eq!(link.written(), b"ok");
    }

    #[test]
    fn transport_hands_out_links_in_order() {
        let first = MemoryLink::new();
        let mut transport = MemoryTransport::new().with_link(first.clone());
        let opens = transport.open_count();

        let device = transport.request_device().unwrap();
        let mut stream = transport.open(&device, &SerialConfig::default()).unwrap();
        stream.write_all(b"hi").unwrap();
        assert_eq!(first.written(), b"hi");

        let err = transport
            .open(&device, &SerialConfig::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transport_without_device_fails_selection() {
        let mut transport = MemoryTransport::without_device();
        assert!(matches!(
            transport.request_device(),
            Err(TransportError::Selection(_))
        ));
    }
}
