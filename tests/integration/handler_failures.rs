//! Misbehaving handlers never disturb the computation or other handlers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proscope::progress::handlers::webhook::WebhookConfig;
use proscope::{
    create_signaler, with_progress, AggregateState, Handler, HandlerError, HandlerRegistry,
    HandlerSpec, ProgressEvent, ScopeOptions,
};

use crate::integration::{http_endpoint, RecordingHandler};

/// Fails (or panics) on every render and counts how often it was asked.
struct Broken {
    panic: bool,
    renders: Arc<AtomicU32>,
    finalized: Arc<AtomicU32>,
}

impl Handler for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn render(&mut self, _: &ProgressEvent, _: &AggregateState) -> Result<(), HandlerError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("renderer crashed");
        }
        Err(HandlerError::Rejected { status: 503 })
    }

    fn finalize(&mut self, _: &AggregateState) -> Result<(), HandlerError> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Blocks on every render until the scope gives up on it.
struct Stuck;

impl Handler for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }

    fn render(&mut self, _: &ProgressEvent, _: &AggregateState) -> Result<(), HandlerError> {
        std::thread::sleep(Duration::from_secs(2));
        Ok(())
    }

    fn finalize(&mut self, _: &AggregateState) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn slow_steps(count: u64) {
    let p = create_signaler(Some(count)).unwrap();
    for _ in 0..count {
        p.tick();
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn failing_handler_is_disabled_and_others_keep_rendering() {
    let renders = Arc::new(AtomicU32::new(0));
    let finalized = Arc::new(AtomicU32::new(0));
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new()
        .with_handler(Broken {
            panic: false,
            renders: renders.clone(),
            finalized: finalized.clone(),
        })
        .with_handler(recorder.clone())
        .with_max_handler_failures(3);

    let (value, report) = with_progress(options, |_| {
        slow_steps(20);
        "done"
    })
    .unwrap();

    assert_eq!(value, "done");
    assert_eq!(report.state.done, 20);
    assert_eq!(renders.load(Ordering::SeqCst), 3);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    let recording = recorder.recording();
    assert_eq!(recording.finalized.len(), 1);
    assert!(recording.step_events() > 3);
}

#[test]
fn panicking_handler_does_not_reach_the_caller() {
    let renders = Arc::new(AtomicU32::new(0));
    let finalized = Arc::new(AtomicU32::new(0));
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new()
        .with_handler(Broken {
            panic: true,
            renders: renders.clone(),
            finalized: finalized.clone(),
        })
        .with_handler(recorder.clone())
        .with_max_handler_failures(0);

    let ((), report) = with_progress(options, |_| slow_steps(5)).unwrap();

    assert_eq!(report.state.done, 5);
    assert!(renders.load(Ordering::SeqCst) >= 1);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.recording().finalized.len(), 1);
}

#[test]
fn stuck_handler_is_detached_after_drain_timeout() {
    let options = ScopeOptions::new()
        .with_handler(Stuck)
        .with_drain_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let ((), report) = with_progress(options, |_| {
        let p = create_signaler(Some(3)).unwrap();
        p.tick();
        std::thread::sleep(Duration::from_millis(50));
        p.tick();
    })
    .unwrap();

    assert!(report.timed_out);
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[test]
fn rejected_webhook_is_logged_not_raised() {
    let (url, bodies) = http_endpoint(500);
    let options = ScopeOptions::new().with_registry(HandlerRegistry::from_specs(vec![
        HandlerSpec::Webhook(WebhookConfig::new(url)),
    ]));

    let (value, report) = with_progress(options, |_| {
        slow_steps(3);
        42
    })
    .unwrap();

    assert_eq!(value, 42);
    assert_eq!(report.state.done, 3);
    assert!(!report.timed_out);

    let kinds: Vec<String> = bodies
        .try_iter()
        .map(|body| body["kind"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(kinds.last().map(String::as_str), Some("finish"));
}
