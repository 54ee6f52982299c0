//! Progress and log channel between a running engine and its caller.
//!
//! The engine is the only producer; the caller drains the receiver in
//! order. Every event is mirrored to `tracing` at the matching level so log
//! files hold the same story the caller sees.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Severity of a progress event.
///
/// Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        };
        f.write_str(name)
    }
}

/// One message on the progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    /// Severity.
    pub level: LogLevel,
    /// Human readable text.
    pub text: String,
    /// Items completed so far.
    pub current: usize,
    /// Items expected in the current stage.
    pub total: usize,
}

impl SyncEvent {
    /// Create an event.
    pub fn new(level: LogLevel, text: impl Into<String>, current: usize, total: usize) -> Self {
        Self {
            level,
            text: text.into(),
            current,
            total,
        }
    }

    /// Completion ratio in `0.0..=1.0`; zero when the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Sender half of the progress channel.
pub type EventSender = mpsc::UnboundedSender<SyncEvent>;

/// Receiver half of the progress channel.
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

/// Create a progress channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Publishes events for one run.
pub(crate) struct ProgressPublisher {
    run_id: u64,
    sender: EventSender,
}

impl ProgressPublisher {
    pub(crate) fn new(run_id: u64, sender: EventSender) -> Self {
        Self { run_id, sender }
    }

    /// Mirror an event to tracing and send it to the caller.
    ///
    /// A caller that dropped its receiver no longer gets events; the run
    /// carries on regardless.
    pub(crate) fn publish(
        &self,
        level: LogLevel,
        text: impl Into<String>,
        current: usize,
        total: usize,
    ) {
        let event = SyncEvent::new(level, text, current, total);
        let run_id = self.run_id;
        match event.level {
            LogLevel::Critical | LogLevel::Error => {
                error!(run_id, current, total, "{}", event.text)
            }
            LogLevel::Warning => warn!(run_id, current, total, "{}", event.text),
            LogLevel::Info => info!(run_id, current, total, "{}", event.text),
            LogLevel::Debug => debug!(run_id, current, total, "{}", event.text),
        }
        let _ = self.sender.send(event);
    }

    pub(crate) fn info(&self, text: impl Into<String>, current: usize, total: usize) {
        self.publish(LogLevel::Info, text, current, total);
    }

    pub(crate) fn debug(&self, text: impl Into<String>, current: usize, total: usize) {
        self.publish(LogLevel::Debug, text, current, total);
    }

    pub(crate) fn warning(&self, text: impl Into<String>, current: usize, total: usize) {
        self.publish(LogLevel::Warning, text, current, total);
    }

    pub(crate) fn error(&self, text: impl Into<String>, current: usize, total: usize) {
        self.publish(LogLevel::Error, text, current, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_order() {
        assert!(LogLevel::Critical < LogLevel::Error);
        assert!(LogLevel::Warning < LogLevel::Debug);
        assert_eq!(LogLevel::Warning.to_string(), "WARNING");
    }

    #[test]
    fn test_event_fraction() {
        assert_eq!(SyncEvent::new(LogLevel::Info, "x", 0, 0).fraction(), 0.0);
        assert_eq!(SyncEvent::new(LogLevel::Info, "x", 1, 4).fraction(), 0.25);
        assert_eq!(SyncEvent::new(LogLevel::Info, "x", 5, 4).fraction(), 1.0);
    }

    #[test]
    fn test_publisher_preserves_order() {
        let (tx, mut rx) = event_channel();
        let publisher = ProgressPublisher::new(1, tx);

        publisher.info("first", 0, 2);
        publisher.debug("second", 1, 2);
        publisher.error("third", 2, 2);

        assert_eq!(rx.try_recv().unwrap().text, "first");
        assert_eq!(rx.try_recv().unwrap().level, LogLevel::Debug);
        assert_eq!(rx.try_recv().unwrap().text, "third");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publisher_survives_dropped_receiver() {
        let (tx, rx) = event_channel();
        drop(rx);
        let publisher = ProgressPublisher::new(1, tx);
        publisher.warning("nobody listening", 0, 0);
    }
}
