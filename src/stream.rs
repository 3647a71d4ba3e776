//! Single-producer/single-consumer handoff of edge-event batches.
//!
//! Models the capture ISR pushing whole batches into a stream buffer that a
//! cooperative worker task drains. The producer side never blocks: a push
//! that can't fit is dropped in its entirety rather than torn in half.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::EventBatch;

struct RingState {
    batches: VecDeque<EventBatch>,
    capacity: usize,
    stopped: bool,
}

/// Bounded queue of [`EventBatch`]es shared between the capture source and
/// its worker.
pub struct EventStream {
    state: Mutex<RingState>,
    not_empty: Condvar,
}

impl EventStream {
    /// `capacity_batches` bounds how many whole batches may be in flight at
    /// once before the producer starts dropping (two, by default: one being
    /// drained, one being filled).
    pub fn new(capacity_batches: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                batches: VecDeque::with_capacity(capacity_batches),
                capacity: capacity_batches,
                stopped: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Producer-side push. Non-blocking: if the lock is contended or the
    /// stream is at capacity, the whole batch is discarded and `false` is
    /// returned. Never partially enqueues a batch.
    pub fn send_from_producer(&self, batch: EventBatch) -> bool {
        let mut guard = match self.state.try_lock() {
            Ok(g) => g,
            Err(_) => {
                tracing::trace!("event stream contended, dropping batch");
                return false;
            }
        };
        if guard.stopped || guard.batches.len() >= guard.capacity {
            tracing::trace!("event stream full, dropping batch");
            return false;
        }
        guard.batches.push_back(batch);
        self.not_empty.notify_one();
        true
    }

    /// Worker-side receive. Blocks until a batch is available or the stream
    /// is stopped. `timeout: None` waits indefinitely.
    pub fn receive(&self, timeout: Option<Duration>) -> Result<EventBatch> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(batch) = guard.batches.pop_front() {
                return Ok(batch);
            }
            if guard.stopped {
                return Err(Error::StreamStopped);
            }
            guard = match timeout {
                None => self.not_empty.wait(guard).unwrap(),
                Some(d) => {
                    let (g, result) = self.not_empty.wait_timeout(guard, d).unwrap();
                    if result.timed_out() {
                        return Err(Error::StreamStopped);
                    }
                    g
                }
            };
        }
    }

    /// Wake any blocked receiver and make future receives fail.
    pub fn stop(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.stopped = true;
        self.not_empty.notify_all();
    }

    /// Reopen a stopped stream, dropping any queued batches.
    pub fn reset(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.stopped = false;
        guard.batches.clear();
    }

    pub fn pending_batches(&self) -> usize {
        self.state.lock().unwrap().batches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Edge, EdgeEvent};
    use std::sync::Arc;
    use std::thread;

    fn sample_batch(n: u16) -> EventBatch {
        let mut b = EventBatch::new();
        b.push(EdgeEvent::new(n, Edge::Rise));
        b
    }

    #[test]
    fn send_then_receive_preserves_order() {
        let stream = EventStream::new(2);
        assert!(stream.send_from_producer(sample_batch(10)));
        assert!(stream.send_from_producer(sample_batch(20)));
        let a = stream.receive(None).unwrap();
        let b = stream.receive(None).unwrap();
        assert_eq!(a.as_slice()[0].t_us, 10);
        assert_eq!(b.as_slice()[0].t_us, 20);
    }

    #[test]
    fn overflow_drops_whole_batch() {
        let stream = EventStream::new(1);
        assert!(stream.send_from_producer(sample_batch(1)));
        assert!(!stream.send_from_producer(sample_batch(2)));
        assert_eq!(stream.pending_batches(), 1);
    }

    #[test]
    fn stop_wakes_blocked_receiver() {
        let stream = Arc::new(EventStream::new(2));
        let s2 = stream.clone();
        let handle = thread::spawn(move || s2.receive(None));
        thread::sleep(Duration::from_millis(20));
        stream.stop();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Error::StreamStopped)));
    }
}
