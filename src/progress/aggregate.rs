//! Aggregation of signaler events into the state handlers render.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::progress::events::{EventKind, ProgressEvent};
use crate::progress::types::SignalerId;

/// How events from several signalers in one scope combine into one display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Only the first signaler to emit drives the display; the rest are
    /// counted but not rendered.
    #[default]
    FirstOnly,
    /// Steps and totals are summed across every signaler.
    SumAll,
    /// Each signaler contributes its completed fraction scaled by its weight.
    Weighted,
}

impl AggregationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationStrategy::FirstOnly => "first_only",
            AggregationStrategy::SumAll => "sum_all",
            AggregationStrategy::Weighted => "weighted",
        }
    }
}

impl std::str::FromStr for AggregationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "first_only" => Ok(AggregationStrategy::FirstOnly),
            "sum_all" => Ok(AggregationStrategy::SumAll),
            "weighted" => Ok(AggregationStrategy::Weighted),
            other => Err(format!(
                "Unknown aggregation strategy '{}' (expected first_only, sum_all or weighted)",
                other
            )),
        }
    }
}

/// Accumulated progress as seen by handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    pub done: u64,
    /// `None` while the total is unknown or unbounded.
    pub total: Option<u64>,
    /// Completed fraction in `[0, 1]`, when one can be derived.
    pub fraction: Option<f64>,
    pub message: Option<String>,
    pub label: Option<String>,
    /// Every event the dispatcher consumed, rendered or not.
    pub events_received: u64,
    /// Step events among `events_received`.
    pub steps_received: u64,
    /// Events that the strategy chose not to render.
    pub ignored_events: u64,
    pub signalers: usize,
    pub finished: bool,
}

impl AggregateState {
    /// Completed percentage in `[0, 100]`, when known.
    pub fn percent(&self) -> Option<f64> {
        self.fraction.map(|f| f * 100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.finished || self.fraction.map(|f| f >= 1.0).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
struct SignalerTally {
    expected: Option<u64>,
    weight: f64,
    /// Steps actually received; a finish never adds to it.
    done: u64,
    finished: bool,
    label: Option<String>,
    message: Option<String>,
}

impl SignalerTally {
    fn new(expected: Option<u64>, weight: f64) -> Self {
        Self {
            expected,
            weight,
            done: 0,
            finished: false,
            label: None,
            message: None,
        }
    }

    /// Displayed count: a finished signaler shows at least its expected total.
    fn shown_done(&self) -> u64 {
        match self.expected {
            Some(total) if self.finished => self.done.max(total),
            _ => self.done,
        }
    }

    fn fraction(&self) -> Option<f64> {
        match self.expected {
            Some(0) => Some(1.0),
            Some(total) => Some((self.shown_done() as f64 / total as f64).min(1.0)),
            None if self.finished => Some(1.0),
            None => None,
        }
    }
}

/// Folds events into an [`AggregateState`] under a chosen strategy.
#[derive(Debug)]
pub struct Aggregator {
    strategy: AggregationStrategy,
    tallies: HashMap<SignalerId, SignalerTally>,
    order: Vec<SignalerId>,
    first_emitter: Option<SignalerId>,
    latest_message: Option<String>,
    events_received: u64,
    steps_received: u64,
    ignored_events: u64,
}

impl Aggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self {
            strategy,
            tallies: HashMap::new(),
            order: Vec::new(),
            first_emitter: None,
            latest_message: None,
            events_received: 0,
            steps_received: 0,
            ignored_events: 0,
        }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Apply one event. Returns true when the event should be rendered.
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        self.events_received += 1;
        if event.is_step() {
            self.steps_received += 1;
        }

        if let EventKind::Registered {
            expected_steps,
            weight,
        } = event.kind
        {
            if !self.tallies.contains_key(&event.signaler) {
                self.order.push(event.signaler);
            }
            let tally = self
                .tallies
                .entry(event.signaler)
                .or_insert_with(|| SignalerTally::new(expected_steps, weight));
            tally.expected = expected_steps;
            tally.weight = weight;
            tally.label = event.label.clone();
            return false;
        }

        // Events can outrun a lost registration; track them as unbounded.
        if !self.tallies.contains_key(&event.signaler) {
            self.order.push(event.signaler);
        }
        let tally = self
            .tallies
            .entry(event.signaler)
            .or_insert_with(|| SignalerTally::new(None, 1.0));
        match event.kind {
            EventKind::Step => tally.done = tally.done.saturating_add(event.amount),
            EventKind::Finished => tally.finished = true,
            EventKind::Message | EventKind::Registered { .. } => {}
        }
        if event.message.is_some() {
            tally.message = event.message.clone();
        }

        let first = *self.first_emitter.get_or_insert(event.signaler);
        if self.strategy == AggregationStrategy::FirstOnly && first != event.signaler {
            self.ignored_events += 1;
            return false;
        }
        if event.message.is_some() {
            self.latest_message = event.message.clone();
        }
        true
    }

    /// Snapshot the current aggregate.
    pub fn state(&self) -> AggregateState {
        let mut state = AggregateState {
            events_received: self.events_received,
            steps_received: self.steps_received,
            ignored_events: self.ignored_events,
            signalers: self.tallies.len(),
            message: self.latest_message.clone(),
            ..AggregateState::default()
        };

        match self.strategy {
            AggregationStrategy::FirstOnly => {
                let tracked = self.first_emitter.or_else(|| self.order.first().copied());
                if let Some(tally) = tracked.and_then(|id| self.tallies.get(&id)) {
                    state.done = tally.shown_done();
                    state.total = tally.expected;
                    state.fraction = tally.fraction();
                    state.finished = tally.finished;
                    state.label = tally.label.clone();
                }
            }
            AggregationStrategy::SumAll => {
                state.done = self.tallies.values().map(|t| t.shown_done()).sum();
                state.total = self.summed_total();
                state.fraction = match state.total {
                    Some(0) => Some(1.0),
                    Some(total) => Some((state.done as f64 / total as f64).min(1.0)),
                    None => None,
                };
                state.finished = self.all_finished();
            }
            AggregationStrategy::Weighted => {
                state.done = self.tallies.values().map(|t| t.shown_done()).sum();
                state.total = self.summed_total();
                let weight_sum: f64 = self.tallies.values().map(|t| t.weight).sum();
                if weight_sum > 0.0 {
                    let weighted: f64 = self
                        .tallies
                        .values()
                        .map(|t| t.weight * t.fraction().unwrap_or(0.0))
                        .sum();
                    state.fraction = Some((weighted / weight_sum).min(1.0));
                }
                state.finished = self.all_finished();
            }
        }
        state
    }

    fn summed_total(&self) -> Option<u64> {
        if self.tallies.is_empty() {
            return None;
        }
        self.tallies
            .values()
            .try_fold(0u64, |acc, t| t.expected.map(|e| acc.saturating_add(e)))
    }

    fn all_finished(&self) -> bool {
        !self.tallies.is_empty() && self.tallies.values().all(|t| t.finished)
    }
}
