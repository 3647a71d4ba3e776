//! Top-level mode state machine owning the shared capture/carrier resource.
//!
//! Exactly one of {Idle, Read, Write, Emulate, Error} is active at a time;
//! switching modes always fully leaves the old one (stopping the stream,
//! dropping decoder state) before entering the new one, so read/write/
//! emulate never contend for the GPIO/timer they share.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::registry::DecoderRegistry;
use crate::stream::EventStream;
use crate::tag::TagInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Read,
    Write,
    Emulate,
    Error,
}

pub struct Session {
    mode: Mode,
    registry: DecoderRegistry,
    stream: Arc<EventStream>,
    config: Config,
    last_tag: Option<TagInfo>,
    write_failures: u32,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let stream = Arc::new(EventStream::new(config.stream_capacity_batches));
        Self {
            mode: Mode::Idle,
            registry: DecoderRegistry::with_builtin_protocols(),
            stream,
            config,
            last_tag: None,
            write_failures: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stream(&self) -> &Arc<EventStream> {
        &self.stream
    }

    pub fn last_tag(&self) -> Option<&TagInfo> {
        self.last_tag.as_ref()
    }

    fn leave(&mut self) {
        match self.mode {
            Mode::Read => {
                self.stream.stop();
                self.registry.end();
            }
            Mode::Write | Mode::Emulate | Mode::Idle | Mode::Error => {}
        }
    }

    fn enter(&mut self, mode: Mode) {
        match mode {
            Mode::Read => {
                self.stream.reset();
                self.registry.begin();
            }
            Mode::Idle => {
                self.registry.begin();
            }
            Mode::Error => {
                tracing::warn!("session entering Error mode after repeated write failures");
            }
            Mode::Write | Mode::Emulate => {}
        }
        self.mode = mode;
    }

    /// Leave the current mode fully, then enter `mode`. Never overlaps the
    /// two: `leave()` always completes before `enter()` starts.
    pub fn transition(&mut self, mode: Mode) {
        tracing::debug!(from = ?self.mode, to = ?mode, "session mode transition");
        self.leave();
        self.enter(mode);
    }

    /// Worker-loop step while in `Read` mode: blocks for one batch and
    /// dispatches it to the decoder registry. A no-op outside `Read`.
    pub fn worker_tick(&mut self, timeout: Option<Duration>) -> Result<Option<TagInfo>> {
        if self.mode != Mode::Read {
            return Ok(None);
        }
        let batch = self.stream.receive(timeout)?;
        let tag = self.registry.process_batch(batch.as_slice());
        if let Some(tag) = &tag {
            self.last_tag = Some(tag.clone());
            self.transition(Mode::Idle);
        }
        Ok(tag)
    }

    /// Record the outcome of a write-verify attempt. After
    /// `config.write_error_count` consecutive failures the session moves to
    /// `Error`.
    pub fn record_write_result(&mut self, ok: bool) {
        if ok {
            self.write_failures = 0;
        } else {
            self.write_failures += 1;
            if self.write_failures >= self.config.write_error_count {
                self.transition(Mode::Error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let session = Session::new(Config::default());
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[test]
    fn repeated_write_failures_trip_error_mode() {
        let mut config = Config::default();
        config.write_error_count = 3;
        let mut session = Session::new(config);
        session.record_write_result(false);
        session.record_write_result(false);
        assert_eq!(session.mode(), Mode::Idle);
        session.record_write_result(false);
        assert_eq!(session.mode(), Mode::Error);
    }

    #[test]
    fn successful_write_resets_failure_count() {
        let mut config = Config::default();
        config.write_error_count = 2;
        let mut session = Session::new(config);
        session.record_write_result(false);
        session.record_write_result(true);
        session.record_write_result(false);
        assert_eq!(session.mode(), Mode::Idle);
    }
}
