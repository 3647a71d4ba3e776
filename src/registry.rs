//! Protocol decoder registry: table-driven dispatch over edge-event batches.

use crate::event::EdgeEvent;
use crate::tag::TagInfo;

/// Demodulation features a protocol uses, mirroring the firmware's
/// `LFRFIDFeature` bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features(u32);

impl Features {
    pub const ASK: Features = Features(1 << 0);
    pub const PSK: Features = Features(1 << 1);

    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Features {
    type Output = Features;
    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

/// Static description of one supported protocol.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolDescriptor {
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub data_size: usize,
    pub features: Features,
}

/// A protocol's decode half: a resynchronizing state machine fed one edge
/// event at a time (actually a whole batch per call, but scans internally
/// one event at a time, same as the reference decoders).
pub trait Decoder: Send {
    fn descriptor(&self) -> &'static ProtocolDescriptor;

    /// Drop all accumulated state and start scanning fresh.
    fn reset(&mut self);

    /// Feed one batch of edge events. Returns `Some(TagInfo)` as soon as a
    /// complete, valid frame is assembled; otherwise the decoder keeps its
    /// partial state for the next batch.
    fn feed(&mut self, events: &[EdgeEvent]) -> Option<TagInfo>;
}

/// Holds every registered decoder and dispatches batches to them in
/// registration order; the first decoder to report a match wins and the
/// rest are left untouched for this batch.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new(decoders: Vec<Box<dyn Decoder>>) -> Self {
        Self { decoders }
    }

    /// Construct the default registry: three EM4100 bit-rate instances, then
    /// H10301.
    pub fn with_builtin_protocols() -> Self {
        use crate::decoders::em4100::Em4100Decoder;
        use crate::decoders::hid_h10301::H10301Decoder;
        Self::new(vec![
            Box::new(Em4100Decoder::new(64)),
            Box::new(Em4100Decoder::new(32)),
            Box::new(Em4100Decoder::new(16)),
            Box::new(H10301Decoder::new()),
        ])
    }

    pub fn begin(&mut self) {
        for d in &mut self.decoders {
            d.reset();
        }
    }

    pub fn end(&mut self) {
        self.begin();
    }

    /// Feed one batch to every decoder in order; the first match is
    /// returned. Non-matching decoders retain their partial state.
    pub fn process_batch(&mut self, events: &[EdgeEvent]) -> Option<TagInfo> {
        for decoder in &mut self.decoders {
            if let Some(tag) = decoder.feed(events) {
                return Some(tag);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}
