//! Append-only session transcript.
//!
//! Every connection lifecycle step, received line, sent command and failure
//! becomes one [`Event`]. Insertion order is the only ordering; timestamps
//! are for display.

use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Origin of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Connection lifecycle.
    System,
    /// A line received from the device.
    Device,
    /// A command sent by the user.
    You,
    /// A connection, read or write failure.
    Error,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::System => "System",
            EventKind::Device => "Device",
            EventKind::You => "You",
            EventKind::Error => "Error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub kind: EventKind,
    pub message: String,
    /// Wall-clock creation time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Event {
    /// Creation time in the local time zone.
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        let millis = i64::try_from(self.timestamp_ms).ok()?;
        Local.timestamp_millis_opt(millis).single()
    }

    /// `HH:MM:SS` local wall-clock time of creation.
    pub fn display_time(&self) -> String {
        self.local_time()
            .map(|time| time.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string())
    }
}

/// Ordered transcript with live subscribers.
///
/// Unbounded unless a cap is set, in which case the oldest entries are evicted
/// first. Sequence numbers keep counting either way.
#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<Event>,
    max_events: Option<usize>,
    next_seq: u64,
    subscribers: Vec<Sender<Event>>,
}

impl EventLog {
    /// An unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A log keeping at most `max_events` entries. `None` means unbounded.
    pub fn with_max_events(max_events: Option<usize>) -> Self {
        Self {
            max_events: max_events.map(|max| max.max(1)),
            ..Self::default()
        }
    }

    /// Stamp, append and publish a new event.
    pub fn append(&mut self, kind: EventKind, message: impl Into<String>) -> Event {
        self.next_seq += 1;
        let event = Event {
            seq: self.next_seq,
            kind,
            message: message.into(),
            timestamp_ms: now_millis(),
        };

        if let Some(max) = self.max_events {
            while self.events.len() >= max {
                self.events.pop_front();
            }
        }
        self.events.push_back(event.clone());

        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        event
    }

    /// The retained events in insertion order.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Receive every event appended from now on.
    pub fn subscribe(&mut self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events of `kind` currently retained.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// An [`EventLog`] shared between the read loop and the controller.
#[derive(Debug, Clone, Default)]
pub struct SharedLog {
    inner: Arc<Mutex<EventLog>>,
}

impl SharedLog {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(log)),
        }
    }

    pub fn append(&self, kind: EventKind, message: impl Into<String>) -> Event {
        self.lock().append(kind, message)
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().snapshot()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.lock().subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().count(kind)
    }

    // Poison is ignored: append is a single push, the log is never half-written.
    fn lock(&self) -> MutexGuard<'_, EventLog> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let mut log = EventLog::new();
        log.append(EventKind::System, "Connected");
        let first = log.append(EventKind::Device, "E1");
        let second = log.append(EventKind::You, "E2");

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1], first);
        assert_eq!(snapshot[2], second);
        assert!(first.seq < second.seq);
    }

    #[test]
    fn snapshot_has_no_side_effects() {
        let mut log = EventLog::new();
        log.append(EventKind::Device, "a");
        assert_eq!(log.snapshot(), log.snapshot());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut log = EventLog::new();
        log.append(EventKind::Device, "tick");
        log.append(EventKind::Device, "tick");
        assert_eq!(log.count(EventKind::Device), 2);
    }

    #[test]
    fn subscribers_see_later_events_only() {
        let mut log = EventLog::new();
        log.append(EventKind::System, "before");
        let rx = log.subscribe();
        log.append(EventKind::Device, "after");

        let received: Vec<String> = rx.try_iter().map(|e| e.message).collect();
        assert_eq!(received, vec!["after"]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut log = EventLog::new();
        drop(log.subscribe());
        log.append(EventKind::System, "x");
        assert!(log.subscribers.is_empty());
    }

    #[test]
    fn capped_log_evicts_oldest() {
        let mut log = EventLog::with_max_events(Some(2));
        log.append(EventKind::Device, "1");
        log.append(EventKind::Device, "2");
        log.append(EventKind::Device, "3");

        let messages: Vec<String> = log.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["2", "3"]);
        assert_eq!(log.snapshot()[1].seq, 3);
    }

    #[test]
    fn display_time_is_local_wall_clock() {
        let millis = 1_700_000_000_999_i64;
        let event = Event {
            seq: 1,
            kind: EventKind::System,
            message: "x".into(),
            timestamp_ms: millis as u64,
        };

        let expected = DateTime::from_timestamp_millis(millis)
            .unwrap()
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string();
        assert_eq!(event.display_time(), expected);
        assert_eq!(
            event.local_time().unwrap().timestamp_millis(),
            millis,
            "local time keeps the instant"
        );
    }

    #[test]
    fn append_stamps_current_time() {
        let before = Local::now();
        let event = EventLog::new().append(EventKind::System, "now");
        let after = Local::now();

        let stamped = event.local_time().unwrap();
        assert!(stamped.timestamp_millis() >= before.timestamp_millis());
        assert!(stamped.timestamp_millis() <= after.timestamp_millis());
        assert_eq!(stamped.offset(), after.offset());
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&EventKind::Device).unwrap();
        assert_eq!(json, "\"device\"");
        assert_eq!(EventKind::You.to_string(), "You");
    }

    #[test]
    fn shared_log_appends_from_threads_in_lock_order() {
        let log = SharedLog::default();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.append(EventKind::Device, format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seqs: Vec<u64> = log.snapshot().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=100).collect::<Vec<u64>>());
    }
}
