//! Process-wide default handlers and explicit registries.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use proscope::progress::handlers::FnHandlerFactory;
use proscope::{
    create_signaler, default_handlers, enter_scope, with_progress, Handler, HandlerRegistry,
    HandlerSpec, ScopeOptions,
};

use crate::integration::{with_default_registry, RecordingHandler};

fn recording_registry(recorder: &RecordingHandler) -> HandlerRegistry {
    let recorder = recorder.clone();
    HandlerRegistry::new().with_factory(FnHandlerFactory::new("recorder", move || {
        Box::new(recorder.clone()) as Box<dyn Handler>
    }))
}

#[test]
fn scope_without_handlers_uses_process_default() {
    let recorder = RecordingHandler::new("recorder");
    with_default_registry(recording_registry(&recorder), || {
        let ((), report) = with_progress(ScopeOptions::new(), |_| {
            let p = create_signaler(Some(2)).unwrap();
            p.tick();
            p.tick();
        })
        .unwrap();
        assert_eq!(report.state.done, 2);
    });
    assert_eq!(recorder.recording().finalized.len(), 1);
}

#[test]
fn default_registry_is_copied_at_scope_entry() {
    let recorder = RecordingHandler::new("recorder");
    let late = RecordingHandler::new("late");
    with_default_registry(recording_registry(&recorder), || {
        let guard = enter_scope(ScopeOptions::new()).unwrap();
        // Changing the default mid-scope leaves this scope alone.
        proscope::set_default_handlers(recording_registry(&late));
        let p = create_signaler(Some(1)).unwrap();
        p.tick();
        guard.close();
    });
    assert_eq!(recorder.recording().finalized.len(), 1);
    assert!(late.recording().finalized.is_empty());
}

#[test]
fn returned_default_is_a_copy() {
    let registry = HandlerRegistry::new().with(HandlerSpec::Void);
    with_default_registry(registry, || {
        let mut copy = default_handlers();
        copy.push(HandlerSpec::Debug);
        assert_eq!(copy.names(), vec!["void", "debug"]);
        assert_eq!(default_handlers().names(), vec!["void"]);
    });
}

#[test]
fn explicit_registry_overrides_default_and_builds_fresh_handlers() {
    let builds = Arc::new(AtomicU32::new(0));
    let counter = builds.clone();
    let registry = HandlerRegistry::new().with_factory(FnHandlerFactory::new("counted", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::new(proscope::progress::handlers::VoidHandler) as Box<dyn Handler>
    }));

    let default_recorder = RecordingHandler::new("default");
    with_default_registry(recording_registry(&default_recorder), || {
        for _ in 0..3 {
            let guard = enter_scope(ScopeOptions::new().with_registry(registry.clone())).unwrap();
            create_signaler(Some(1)).unwrap().tick();
            guard.close();
        }
    });

    assert_eq!(builds.load(Ordering::SeqCst), 3);
    assert!(default_recorder.recording().finalized.is_empty());
}

#[test]
fn explicit_handlers_take_precedence_over_registry() {
    let recorder = RecordingHandler::new("explicit");
    let registry_recorder = RecordingHandler::new("registry");
    let options = ScopeOptions::new()
        .with_registry(recording_registry(&registry_recorder))
        .with_handler(recorder.clone());

    let _ = with_progress(options, |_| create_signaler(Some(1)).unwrap().tick()).unwrap();

    assert_eq!(recorder.recording().finalized.len(), 1);
    assert!(registry_recorder.recording().finalized.is_empty());
}

#[test]
fn empty_registry_gives_a_silent_scope() {
    let ((), report) = with_progress(
        ScopeOptions::new().with_registry(HandlerRegistry::new()),
        |_| {
            let p = create_signaler(Some(4)).unwrap();
            for _ in 0..4 {
                p.tick();
            }
        },
    )
    .unwrap();
    assert_eq!(report.state.done, 4);
}
