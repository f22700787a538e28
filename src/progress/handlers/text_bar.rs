//! Textual progress bar drawn on a single terminal line.

use std::io::Write;

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::progress::aggregate::AggregateState;
use crate::progress::events::ProgressEvent;
use crate::progress::handlers::throttle::{RenderThrottle, ThrottleConfig};
use crate::progress::handlers::Handler;

/// Text bar settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBarConfig {
    /// Number of cells inside the brackets.
    #[serde(default = "default_width")]
    pub width: usize,

    /// Colour the filled part of the bar.
    #[serde(default)]
    pub color: bool,

    /// Erase the bar on finish instead of leaving the final line.
    #[serde(default)]
    pub clear_on_finish: bool,

    #[serde(default)]
    pub throttle: ThrottleConfig,
}

fn default_width() -> usize {
    40
}

impl Default for TextBarConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            color: false,
            clear_on_finish: false,
            throttle: ThrottleConfig::default(),
        }
    }
}

pub struct TextBarHandler {
    config: TextBarConfig,
    writer: Box<dyn Write + Send>,
    throttle: RenderThrottle,
    last_len: usize,
    drawn: bool,
}

impl TextBarHandler {
    /// Bar on stderr.
    pub fn new(config: TextBarConfig) -> Self {
        Self::with_writer(config, Box::new(std::io::stderr()))
    }

    pub fn with_writer(config: TextBarConfig, writer: Box<dyn Write + Send>) -> Self {
        let throttle = RenderThrottle::new(&config.throttle);
        Self {
            config,
            writer,
            throttle,
            last_len: 0,
            drawn: false,
        }
    }

    /// The bar line for a state, without carriage control.
    pub fn format_line(&self, state: &AggregateState) -> String {
        let width = self.config.width.max(1);
        let (bar, counts) = match (state.fraction, state.total) {
            (Some(fraction), total) => {
                let filled = ((fraction * width as f64).round() as usize).min(width);
                let mut bar = "=".repeat(filled);
                if filled < width {
                    bar.push('>');
                    bar.push_str(&" ".repeat(width - filled - 1));
                }
                let counts = match total {
                    Some(total) => format!("{:>3.0}% ({}/{})", fraction * 100.0, state.done, total),
                    None => format!("{:>3.0}% ({})", fraction * 100.0, state.done),
                };
                (bar, counts)
            }
            (None, _) => {
                // Unknown total: bounce a marker with the step count.
                let marker = "<=>";
                let span = width.saturating_sub(marker.len()).max(1);
                let pos = (state.done as usize) % span;
                let mut bar = " ".repeat(pos);
                bar.push_str(marker);
                bar.push_str(&" ".repeat(width.saturating_sub(pos + marker.len())));
                (bar, format!("{} steps", state.done))
            }
        };

        let bar = if self.config.color {
            format!("{}", bar.green())
        } else {
            bar
        };

        let mut line = format!("[{}] {}", bar, counts);
        if let Some(label) = &state.label {
            line = format!("{}: {}", label, line);
        }
        if let Some(message) = &state.message {
            line.push(' ');
            line.push_str(message);
        }
        line
    }

    fn draw(&mut self, state: &AggregateState) -> Result<(), HandlerError> {
        let line = self.format_line(state);
        let len = line.chars().count();
        let pad = self.last_len.saturating_sub(len);
        write!(self.writer, "\r{}{}", line, " ".repeat(pad))?;
        self.writer.flush()?;
        self.last_len = len;
        self.drawn = true;
        Ok(())
    }
}

impl Handler for TextBarHandler {
    fn name(&self) -> &str {
        "text_bar"
    }

    fn render(
        &mut self,
        _event: &ProgressEvent,
        state: &AggregateState,
    ) -> Result<(), HandlerError> {
        if !self.throttle.allow() {
            return Ok(());
        }
        self.draw(state)
    }

    fn finalize(&mut self, state: &AggregateState) -> Result<(), HandlerError> {
        if state.events_received == 0 && !self.drawn {
            return Ok(());
        }
        self.draw(state)?;
        if self.config.clear_on_finish {
            write!(self.writer, "\r{}\r", " ".repeat(self.last_len))?;
        } else {
            writeln!(self.writer)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
