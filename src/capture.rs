//! Capture-ISR side: turns raw transitions into batched [`EdgeEvent`]s.

use std::sync::Arc;

use crate::event::{EdgeEvent, EventBatch};
use crate::stream::EventStream;

/// A hardware capture channel: a free-running timer with both-edge input
/// capture. Each call blocks (from the ISR's point of view, "blocks" means
/// "is invoked once per transition") until the next transition and reports
/// the elapsed time since the previous one plus the resulting pin level.
pub trait CaptureSource {
    /// Returns `(t_us, level)`. `t_us` is not yet range-filtered; the
    /// `EdgeEventSource` does that.
    fn poll_event(&mut self) -> (u16, bool);
}

/// Drains a [`CaptureSource`], batches [`EdgeEvent`]s, and hands whole
/// batches to an [`EventStream`].
///
/// Mirrors the capture ISR: never blocks on the stream (a full or contended
/// stream just drops the batch), never allocates per event (the in-flight
/// batch is reused), and filters `t_us` before an event is ever batched.
pub struct EdgeEventSource<S: CaptureSource> {
    source: S,
    batch: EventBatch,
    stream: Arc<EventStream>,
}

impl<S: CaptureSource> EdgeEventSource<S> {
    pub fn new(source: S, stream: Arc<EventStream>) -> Self {
        Self {
            source,
            batch: EventBatch::new(),
            stream,
        }
    }

    /// Poll one transition from the capture source and fold it into the
    /// in-flight batch, pushing to the stream when the batch fills.
    pub fn run_once(&mut self) {
        let (t_us, level) = self.source.poll_event();
        if !EdgeEvent::in_range(t_us) {
            tracing::trace!(t_us, "capture event filtered out of range");
            return;
        }
        let event = EdgeEvent::new(t_us, crate::event::Edge::from_level(level));
        if self.batch.push(event) {
            let full = std::mem::take(&mut self.batch);
            if !self.stream.send_from_producer(full) {
                tracing::trace!("capture batch dropped, stream full or contended");
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.batch.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Edge;

    struct ScriptedSource {
        events: std::vec::IntoIter<(u16, bool)>,
    }

    impl CaptureSource for ScriptedSource {
        fn poll_event(&mut self) -> (u16, bool) {
            self.events.next().unwrap_or((500, true))
        }
    }

    #[test]
    fn batches_fill_and_flush_to_the_stream() {
        let stream = Arc::new(EventStream::new(2));
        let events: Vec<(u16, bool)> = (0..crate::event::BATCH_LEN)
            .map(|i| (100 + i as u16, i % 2 == 0))
            .collect();
        let mut source = EdgeEventSource::new(
            ScriptedSource {
                events: events.clone().into_iter(),
            },
            stream.clone(),
        );
        for _ in 0..events.len() {
            source.run_once();
        }
        assert_eq!(source.pending_len(), 0);
        let batch = stream.receive(None).unwrap();
        assert_eq!(batch.len(), crate::event::BATCH_LEN);
        assert_eq!(batch.as_slice()[0].t_us, 100);
        assert_eq!(batch.as_slice()[0].edge, Edge::Rise);
    }

    #[test]
    fn out_of_range_durations_are_dropped_silently() {
        let stream = Arc::new(EventStream::new(2));
        let mut source = EdgeEventSource::new(
            ScriptedSource {
                events: vec![(3, true), (2000, false)].into_iter(),
            },
            stream.clone(),
        );
        source.run_once();
        source.run_once();
        assert_eq!(source.pending_len(), 0);
    }
}
