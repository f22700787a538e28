//! Scope entry, exit and cleanup on every exit path.

use std::panic::{catch_unwind, AssertUnwindSafe};

use proscope::progress::handlers::VoidHandler;
use proscope::{
    create_signaler, current_scope_id, enter_scope, try_with_progress, with_progress,
    without_progress, HandlerRegistry, HandlerSpec, ProgressError, ScopeOptions,
};

use crate::integration::{with_default_registry, RecordingHandler};

#[test]
fn ten_signals_render_ten_times_and_finalize_once() {
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new().with_handler(recorder.clone());

    let ((), report) = with_progress(options, |_| {
        let p = create_signaler(Some(10)).unwrap();
        for _ in 0..10 {
            p.signal(None);
            // One render per step instead of a coalesced batch.
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
    })
    .unwrap();

    let recording = recorder.recording();
    assert_eq!(recording.finalized.len(), 1);
    assert!(recording.step_events() >= 1 && recording.step_events() <= 10);
    let last = recording.last_state().unwrap();
    assert_eq!(last.done, 10);
    assert_eq!(last.percent(), Some(100.0));
    assert_eq!(recording.finalized[0].done, 10);
    assert_eq!(report.state.done, 10);
    assert_eq!(report.state.steps_received, 10);
}

#[test]
fn signaler_outside_scope_fails_even_with_defaults_configured() {
    let registry = HandlerRegistry::new().with(HandlerSpec::Void);
    with_default_registry(registry, || {
        assert!(current_scope_id().is_none());
        let err = create_signaler(Some(5)).unwrap_err();
        assert!(matches!(err, ProgressError::NoActiveScope));
    });
}

#[test]
fn signaler_after_scope_exit_fails() {
    let guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    assert!(create_signaler(None).is_ok());
    guard.close();
    assert!(matches!(
        create_signaler(None),
        Err(ProgressError::NoActiveScope)
    ));
}

#[test]
fn error_path_still_finalizes_handlers() {
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new().with_handler(recorder.clone());

    let result: Result<((), _), ProgressError> = try_with_progress(options, |_| {
        let p = create_signaler(Some(4))?;
        p.tick();
        p.tick();
        Err(ProgressError::Config("computation failed".to_string()))
    });

    assert!(matches!(result, Err(ProgressError::Config(_))));
    let recording = recorder.recording();
    assert_eq!(recording.finalized.len(), 1);
    assert_eq!(recording.finalized[0].done, 2);
    assert!(current_scope_id().is_none());
}

#[test]
fn panic_path_still_finalizes_handlers() {
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new().with_handler(recorder.clone());

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        with_progress(options, |_| {
            let p = create_signaler(Some(3)).unwrap();
            p.tick();
            panic!("worker blew up");
        })
    }));

    assert!(outcome.is_err());
    let recording = recorder.recording();
    assert_eq!(recording.finalized.len(), 1);
    assert_eq!(recording.finalized[0].done, 1);
    assert!(current_scope_id().is_none());
    // The thread is free for a new scope.
    assert!(enter_scope(ScopeOptions::new().with_handler(VoidHandler)).is_ok());
}

#[test]
fn nested_scope_is_rejected_and_outer_survives() {
    let outer = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    let err = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap_err();
    assert!(matches!(err, ProgressError::ScopeAlreadyActive(id) if id == outer.id()));

    let p = create_signaler(Some(1)).unwrap();
    assert_eq!(p.scope_id(), outer.id());
    p.tick();
    let report = outer.close();
    assert_eq!(report.state.done, 1);
}

#[test]
fn disabled_scope_runs_work_silently() {
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new()
        .with_handler(recorder.clone())
        .enabled(false);

    let (value, report) = with_progress(options, |_| {
        let p = create_signaler(Some(3)).unwrap();
        (0..3).map(|i| {
            p.tick();
            i
        })
        .sum::<i32>()
    })
    .unwrap();

    assert_eq!(value, 3);
    assert_eq!(report.state.events_received, 0);
    let recording = recorder.recording();
    assert!(recording.events.is_empty());
    assert!(recording.finalized.is_empty());
}

#[test]
fn without_progress_hides_signals_from_the_outer_scope() {
    let recorder = RecordingHandler::new("recorder");
    let ((), report) = with_progress(ScopeOptions::new().with_handler(recorder.clone()), |_| {
        let outer = create_signaler(Some(2)).unwrap();
        outer.tick();
        without_progress(|| {
            let inner = create_signaler(Some(50)).unwrap();
            for _ in 0..50 {
                inner.tick();
            }
        });
        outer.tick();
    })
    .unwrap();

    assert_eq!(report.state.done, 2);
    assert_eq!(report.state.total, Some(2));
    assert_eq!(report.state.signalers, 1);
}

#[test]
fn unbounded_signaler_reports_counts_without_percent() {
    let guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    let p = create_signaler(None).unwrap();
    for _ in 0..7 {
        p.signal(Some("item"));
    }
    let mid = guard.snapshot();
    assert!(mid.done <= 7);
    let report = guard.close();
    assert_eq!(report.state.done, 7);
    assert_eq!(report.state.total, None);
    assert_eq!(report.state.percent(), None);
    assert_eq!(report.state.message.as_deref(), Some("item"));
}

#[test]
fn zero_step_signaler_is_complete() {
    let guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    let p = create_signaler(Some(0)).unwrap();
    p.finish();
    let report = guard.close();
    assert_eq!(report.state.percent(), Some(100.0));
    assert!(report.state.is_complete());
}

#[test]
fn overshoot_keeps_count_but_caps_percent() {
    let guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    let p = create_signaler(Some(3)).unwrap();
    for _ in 0..5 {
        p.tick();
    }
    let report = guard.close();
    assert_eq!(report.state.done, 5);
    assert_eq!(report.state.percent(), Some(100.0));
}
