//! Sources of key events.

use crate::error::KeyloggerError;
use crate::keyboard::KeyEvent;
use crate::KeyloggerResult;
use futures::{ready, Stream, StreamExt};
use pin_project::pin_project;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Sleep;

/// A stream of key events read from one or more devices.
///
/// Errors yielded by the stream are not fatal: the source keeps producing events afterwards.
/// The stream ends once the source has nothing left to read from.
pub trait EventSource: Stream<Item = KeyloggerResult<KeyEvent>> + Unpin {
    /// Release the underlying devices.
    fn close(self);
}

/// The result of waiting on an [`EventSource`].
#[derive(Debug)]
pub enum Wake {
    /// The source produced an event, or failed to read one.
    Event(KeyloggerResult<KeyEvent>),
    /// Nothing happened before the timeout expired.
    Timeout,
    /// The source has no devices left.
    Closed,
}

/// Wait for the next event from `source`, for at most `timeout` (forever if `None`).
pub fn next_event<S: EventSource>(source: &mut S, timeout: Option<Duration>) -> NextEvent<'_, S> {
    NextEvent {
        source,
        deadline: timeout.map(tokio::time::sleep),
    }
}

/// The future returned by [`next_event`].
#[pin_project]
#[must_use = "futures do nothing unless polled"]
pub struct NextEvent<'a, S> {
    source: &'a mut S,
    #[pin]
    deadline: Option<Sleep>,
}

impl<S: EventSource> Future for NextEvent<'_, S> {
    type Output = Wake;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        // Events that are already available win over an expired deadline.
        match this.source.poll_next_unpin(cx) {
            Poll::Ready(Some(item)) => return Poll::Ready(Wake::Event(item)),
            Poll::Ready(None) => return Poll::Ready(Wake::Closed),
            Poll::Pending => {}
        }

        match this.deadline.as_pin_mut() {
            Some(deadline) => {
                ready!(deadline.poll(cx));
                Poll::Ready(Wake::Timeout)
            }
            None => Poll::Pending,
        }
    }
}

/// One step of a [`ScriptedSource`].
#[derive(Debug)]
pub enum Step {
    /// Yield an event.
    Event(KeyEvent),
    /// Yield an error.
    Fail(KeyloggerError),
    /// Never become ready again.
    Stall,
}

/// An [`EventSource`] that replays a fixed script, for driving the interpreter without
/// hardware.
///
/// The stream ends when the script runs out, unless the script ends with [`Step::Stall`].
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            closed: Arc::default(),
        }
    }

    /// A script that yields `events` and then ends.
    pub fn from_events(events: impl IntoIterator<Item = KeyEvent>) -> Self {
        Self::new(events.into_iter().map(Step::Event))
    }

    /// A counter of how many times the source was closed.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }
}

impl Stream for ScriptedSource {
    type Item = KeyloggerResult<KeyEvent>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.steps.front() {
            None => return Poll::Ready(None),
            Some(Step::Stall) => return Poll::Pending,
            Some(_) => {}
        }

        match this.steps.pop_front() {
            Some(Step::Event(ev)) => Poll::Ready(Some(Ok(ev))),
            Some(Step::Fail(e)) => Poll::Ready(Some(Err(e))),
            Some(Step::Stall) | None => Poll::Pending,
        }
    }
}

impl EventSource for ScriptedSource {
    fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_code::KeyCode;
    use crate::keyboard::{KeyEventCause, SourceId};
    use chrono::Utc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            source: SourceId(0),
            ts: Utc::now(),
            cause: KeyEventCause::Press,
            code,
        }
    }

    #[tokio::test]
    async fn yields_script_then_closes() {
        let mut source = ScriptedSource::new([
            Step::Event(press(KeyCode::KEY_A)),
            Step::Fail(KeyloggerError::SourcesExhausted),
        ]);

        assert!(matches!(
            next_event(&mut source, None).await,
            Wake::Event(Ok(ev)) if ev.code == KeyCode::KEY_A
        ));
        assert!(matches!(
            next_event(&mut source, None).await,
            Wake::Event(Err(KeyloggerError::SourcesExhausted))
        ));
        assert!(matches!(next_event(&mut source, None).await, Wake::Closed));
    }

    #[tokio::test]
    async fn stalled_source_times_out() {
        let mut source = ScriptedSource::new([Step::Stall]);

        assert!(matches!(
            next_event(&mut source, Some(Duration::from_millis(10))).await,
            Wake::Timeout
        ));
    }

    #[tokio::test]
    async fn ready_event_beats_zero_timeout() {
        let mut source = ScriptedSource::from_events([press(KeyCode::KEY_B)]);

        assert!(matches!(
            next_event(&mut source, Some(Duration::ZERO)).await,
            Wake::Event(Ok(_))
        ));
    }

    #[test]
    fn close_is_counted() {
        let source = ScriptedSource::default();
        let closed = source.close_counter();

        source.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
