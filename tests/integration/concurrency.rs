//! Signalers used from worker threads and async tasks.

use std::time::{Duration, Instant};

use proscope::progress::handlers::VoidHandler;
use proscope::{
    create_signaler, enter_scope, with_progress, AggregationStrategy, ScopeOptions, Signaler,
};

use crate::integration::RecordingHandler;

#[test]
fn every_step_from_every_thread_is_counted() {
    const WORKERS: u64 = 8;
    const STEPS: u64 = 250;

    let options = ScopeOptions::new()
        .with_handler(VoidHandler)
        .with_strategy(AggregationStrategy::SumAll)
        .with_channel_capacity(16);

    let ((), report) = with_progress(options, |scope| {
        let signalers: Vec<Signaler> = (0..WORKERS)
            .map(|_| scope.signaler(Some(STEPS)).unwrap())
            .collect();
        std::thread::scope(|s| {
            for signaler in &signalers {
                s.spawn(move || {
                    for _ in 0..STEPS {
                        signaler.tick();
                    }
                });
            }
        });
    })
    .unwrap();

    assert_eq!(report.state.steps_received, WORKERS * STEPS);
    assert_eq!(report.state.done, WORKERS * STEPS);
    assert_eq!(report.state.total, Some(WORKERS * STEPS));
    assert!(report.state.finished);
    assert!(!report.timed_out);
}

#[test]
fn shared_signaler_counts_steps_from_all_threads() {
    let options = ScopeOptions::new().with_handler(VoidHandler);
    let ((), report) = with_progress(options, |_| {
        let shared = create_signaler(Some(400)).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let p = shared.clone();
                s.spawn(move || {
                    for _ in 0..100 {
                        p.tick();
                    }
                });
            }
        });
        assert_eq!(shared.count(), 400);
    })
    .unwrap();

    assert_eq!(report.state.done, 400);
    assert_eq!(report.state.percent(), Some(100.0));
}

#[test]
fn shared_signaler_total_is_exact_under_a_tight_buffer() {
    for _ in 0..50 {
        let options = ScopeOptions::new()
            .with_handler(VoidHandler)
            .with_channel_capacity(1);
        let ((), report) = with_progress(options, |_| {
            let shared = create_signaler(Some(400)).unwrap();
            std::thread::scope(|s| {
                for _ in 0..16 {
                    let p = shared.clone();
                    s.spawn(move || {
                        for _ in 0..25 {
                            p.tick();
                        }
                    });
                }
            });
        })
        .unwrap();

        assert_eq!(report.state.done, 400);
        assert_eq!(report.state.steps_received, 400);
        assert!(report.state.finished);
    }
}

#[test]
fn per_signaler_sequence_numbers_are_unique_and_increasing() {
    let recorder = RecordingHandler::new("recorder");
    let options = ScopeOptions::new()
        .with_handler(recorder.clone())
        .with_strategy(AggregationStrategy::SumAll);

    let _ = with_progress(options, |_| {
        let p = create_signaler(None).unwrap();
        for _ in 0..20 {
            p.tick();
            std::thread::sleep(Duration::from_millis(1));
        }
    })
    .unwrap();

    let seqs: Vec<u64> = recorder.recording().events.iter().map(|e| e.seq).collect();
    assert!(!seqs.is_empty());
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn tokio_tasks_report_through_moved_signalers() {
    let options = ScopeOptions::new()
        .with_handler(VoidHandler)
        .with_strategy(AggregationStrategy::SumAll);

    let ((), report) = with_progress(options, |scope| {
        let signalers: Vec<Signaler> = (0..6).map(|_| scope.signaler(Some(50)).unwrap()).collect();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(3)
            .build()
            .unwrap();
        runtime.block_on(async move {
            let handles: Vec<_> = signalers
                .into_iter()
                .map(|p| {
                    tokio::spawn(async move {
                        for _ in 0..50 {
                            p.tick();
                            tokio::task::yield_now().await;
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
        });
    })
    .unwrap();

    assert_eq!(report.state.done, 300);
    assert_eq!(report.state.signalers, 6);
}

#[test]
fn scopes_on_different_threads_are_independent() {
    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            std::thread::spawn(move || {
                let guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
                let p = create_signaler(Some(10 + i)).unwrap();
                for _ in 0..(10 + i) {
                    p.tick();
                }
                (guard.id(), guard.close())
            })
        })
        .collect();

    let mut ids = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let (id, report) = handle.join().unwrap();
        assert_eq!(report.scope_id, id);
        assert_eq!(report.state.done, 10 + i as u64);
        ids.push(id);
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn worker_thread_without_a_scope_cannot_create_signalers() {
    let _guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    let result = std::thread::spawn(|| create_signaler(Some(1)).is_err())
        .join()
        .unwrap();
    assert!(result);
}

#[test]
fn signals_after_scope_exit_are_silently_dropped() {
    let guard = enter_scope(ScopeOptions::new().with_handler(VoidHandler)).unwrap();
    let p = create_signaler(Some(10)).unwrap();
    p.tick();
    let report = guard.close();
    assert_eq!(report.state.done, 1);

    // Neither panics nor blocks.
    for _ in 0..100 {
        p.tick();
    }
    p.update_message("late");
    p.finish();
    assert_eq!(p.count(), 101);
}

#[test]
fn leaked_signaler_clone_does_not_hang_scope_exit() {
    let guard = enter_scope(
        ScopeOptions::new()
            .with_handler(VoidHandler)
            .with_drain_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    let p = create_signaler(None).unwrap();
    let leaked = p.clone();
    let holder = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        leaked.tick();
    });

    let started = Instant::now();
    let report = guard.close();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!report.timed_out);
    holder.join().unwrap();
}
