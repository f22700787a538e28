//! Audible cue handler: rings the terminal bell.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::progress::aggregate::AggregateState;
use crate::progress::events::ProgressEvent;
use crate::progress::handlers::throttle::{RenderThrottle, ThrottleConfig};
use crate::progress::handlers::Handler;

const BELL: &[u8] = b"\x07";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeepConfig {
    #[serde(default = "default_true")]
    pub on_start: bool,

    /// Ring on intermediate updates too (rate limited by `throttle`).
    #[serde(default)]
    pub on_update: bool,

    #[serde(default = "default_true")]
    pub on_finish: bool,

    #[serde(default = "default_beep_throttle")]
    pub throttle: ThrottleConfig,
}

fn default_true() -> bool {
    true
}

fn default_beep_throttle() -> ThrottleConfig {
    ThrottleConfig {
        interval_ms: 1000,
        ..ThrottleConfig::default()
    }
}

impl Default for BeepConfig {
    fn default() -> Self {
        Self {
            on_start: true,
            on_update: false,
            on_finish: true,
            throttle: default_beep_throttle(),
        }
    }
}

pub struct BeepHandler {
    config: BeepConfig,
    writer: Box<dyn Write + Send>,
    throttle: RenderThrottle,
    started: bool,
    rings: u32,
}

impl BeepHandler {
    pub fn new(config: BeepConfig) -> Self {
        Self::with_writer(config, Box::new(std::io::stderr()))
    }

    pub fn with_writer(config: BeepConfig, writer: Box<dyn Write + Send>) -> Self {
        let throttle = RenderThrottle::new(&config.throttle);
        Self {
            config,
            writer,
            throttle,
            started: false,
            rings: 0,
        }
    }

    pub fn rings(&self) -> u32 {
        self.rings
    }

    fn ring(&mut self) -> Result<(), HandlerError> {
        self.writer.write_all(BELL)?;
        self.writer.flush()?;
        self.rings += 1;
        Ok(())
    }
}

impl Handler for BeepHandler {
    fn name(&self) -> &str {
        "beep"
    }

    fn render(
        &mut self,
        _event: &ProgressEvent,
        _state: &AggregateState,
    ) -> Result<(), HandlerError> {
        if !self.started {
            self.started = true;
            if self.config.on_start {
                return self.ring();
            }
            return Ok(());
        }
        if self.config.on_update && self.throttle.allow() {
            self.ring()?;
        }
        Ok(())
    }

    fn finalize(&mut self, state: &AggregateState) -> Result<(), HandlerError> {
        if self.config.on_finish && state.events_received > 0 {
            self.ring()?;
        }
        Ok(())
    }
}
