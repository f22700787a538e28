//! Render rate limiting shared by the output handlers.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Limits on how often a handler redraws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum gap between two intermediate renders (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Hold back intermediate renders until this long after scope entry.
    #[serde(default)]
    pub delay_ms: u64,

    /// Upper bound on intermediate renders; `None` means unlimited.
    #[serde(default)]
    pub max_renders: Option<u32>,
}

fn default_interval_ms() -> u64 {
    100
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            delay_ms: 0,
            max_renders: None,
        }
    }
}

impl ThrottleConfig {
    /// No limits at all; every update renders.
    pub fn unthrottled() -> Self {
        Self {
            interval_ms: 0,
            delay_ms: 0,
            max_renders: None,
        }
    }
}

/// Gate for intermediate renders. Final renders bypass it.
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    interval: Duration,
    delay: Duration,
    max_renders: Option<u32>,
    started: Instant,
    last: Option<Instant>,
    renders: u32,
}

impl RenderThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    pub fn starting_at(config: &ThrottleConfig, started: Instant) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            delay: Duration::from_millis(config.delay_ms),
            max_renders: config.max_renders,
            started,
            last: None,
            renders: 0,
        }
    }

    /// Decide whether to render now; records the render when it allows one.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.started) < self.delay {
            return false;
        }
        if let Some(max) = self.max_renders {
            if self.renders >= max {
                return false;
            }
        }
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last = Some(now);
        self.renders += 1;
        true
    }

    pub fn renders(&self) -> u32 {
        self.renders
    }
}
