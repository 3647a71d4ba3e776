//! 125 kHz LF RFID capture, decode, emulate, and T5577 clone core.
//!
//! Hardware (timer/GPIO/capture) is not part of this crate — it is
//! represented by the [`capture::CaptureSource`], [`waveform::WaveformSink`],
//! and [`t5577::CarrierSink`] traits, which an embedding application
//! implements against its own peripherals.

pub mod capture;
pub mod config;
pub mod decoders;
pub mod encoders;
pub mod error;
pub mod event;
pub mod profile;
pub mod registry;
pub mod session;
pub mod stream;
pub mod t5577;
pub mod tag;
pub mod waveform;

pub use error::{Error, Result};
pub use event::{Edge, EdgeEvent, EventBatch};
pub use registry::DecoderRegistry;
pub use session::{Mode, Session};
pub use tag::TagInfo;
