//! Timed edge events captured from the analog front end.

/// Direction of a level transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rise,
    Fall,
}

impl Edge {
    /// Map a sampled GPIO level (post-transition) to its edge direction.
    ///
    /// The capture hardware reports the level after the transition, not a
    /// semantic tag, so `level == 1` means the line just rose.
    pub fn from_level(level: bool) -> Self {
        if level {
            Edge::Rise
        } else {
            Edge::Fall
        }
    }

    pub fn level(self) -> bool {
        matches!(self, Edge::Rise)
    }

    pub fn opposite(self) -> Edge {
        match self {
            Edge::Rise => Edge::Fall,
            Edge::Fall => Edge::Rise,
        }
    }
}

/// Minimum and maximum accepted edge duration, in microseconds.
///
/// Durations outside this window are filter noise or a stalled line and are
/// dropped at the source rather than handed to a decoder.
pub const MIN_EDGE_US: u16 = 7;
pub const MAX_EDGE_US: u16 = 1000;

/// A single timed transition: time elapsed since the previous edge, and the
/// direction of this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub t_us: u16,
    pub edge: Edge,
}

impl EdgeEvent {
    pub fn new(t_us: u16, edge: Edge) -> Self {
        Self { t_us, edge }
    }

    /// `true` if `t_us` lies within the accepted capture window.
    pub fn in_range(t_us: u16) -> bool {
        (MIN_EDGE_US..=MAX_EDGE_US).contains(&t_us)
    }
}

/// Number of [`EdgeEvent`]s the producer batches before handing them to the
/// [`crate::stream::EventStream`].
pub const BATCH_LEN: usize = 60;

/// A fixed-size batch of edge events, as produced by the capture source.
///
/// The producer only ever emits whole batches; partial batches are never
/// written to the stream.
#[derive(Debug, Clone)]
pub struct EventBatch {
    events: Vec<EdgeEvent>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(BATCH_LEN),
        }
    }

    pub fn as_slice(&self) -> &[EdgeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= BATCH_LEN
    }

    /// Append an event. Returns `true` if the batch became full as a result.
    pub fn push(&mut self, event: EdgeEvent) -> bool {
        debug_assert!(!self.is_full(), "push into a full batch");
        self.events.push(event);
        self.is_full()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn into_vec(self) -> Vec<EdgeEvent> {
        self.events
    }
}

impl Default for EventBatch {
    fn default() -> Self {
        Self::new()
    }
}
