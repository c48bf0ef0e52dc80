//! Integration tests for the UI lifecycle and exit coordination

use crate::integration::test_utils::{puppy, strip_ansi, ui_constructor, Capture, RecordingUi};
use clio::bus::Event;
use clio::{Application, LoggingConfig, ProcessContext, SetupConfig, State};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn publish_all(state: &State, n: usize) -> anyhow::Result<()> {
    let bus = state
        .bus()
        .ok_or_else(|| anyhow::anyhow!("no bus"))?;
    for i in 0..n {
        bus.publish(Event::new("progress", json!({ "i": i })));
    }
    Ok(())
}

fn indices(events: &[Event]) -> Vec<u64> {
    events.iter().filter_map(|e| e.data["i"].as_u64()).collect()
}

#[tokio::test]
async fn test_every_ui_receives_every_event_in_order() {
    let uis: Vec<_> = (0..3).map(|_| RecordingUi::new()).collect();
    let calls: Vec<_> = uis.iter().map(|(_, c)| Arc::clone(c)).collect();
    let app = Application::new(
        puppy().with_ui_constructor(ui_constructor(uis.into_iter().map(|(u, _)| u).collect())),
    );
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app
        .run(state, |state| async move { publish_all(&state, 25) })
        .await;

    assert!(report.success());
    let total: usize = calls.iter().map(|c| c.lock().handled.len()).sum();
    assert_eq!(total, 25 * 3);
    for c in &calls {
        assert_eq!(indices(&c.lock().handled), (0..25).collect::<Vec<u64>>());
        assert_eq!(c.lock().teardowns, vec![false]);
    }
}

#[tokio::test]
async fn test_failed_setup_still_reaches_body_and_reports() {
    let (bad, bad_calls) = RecordingUi::new();
    let (good, good_calls) = RecordingUi::new();
    let app = Application::new(
        puppy().with_ui_constructor(ui_constructor(vec![bad.failing_setup("E: no tty"), good])),
    );
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let body_ran = Arc::new(Mutex::new(false));
    let report = app
        .run(state, {
            let body_ran = Arc::clone(&body_ran);
            move |state| async move {
                *body_ran.lock() = true;
                publish_all(&state, 5)
            }
        })
        .await;

    assert!(*body_ran.lock());
    assert_eq!(report.exit_code(), 0);
    assert!(report.headline().is_none());
    assert_eq!(report.diagnostics().len(), 1);
    assert!(report.diagnostics()[0].contains("E: no tty"));

    let bad_calls = bad_calls.lock();
    assert_eq!(bad_calls.setups, 1);
    assert!(bad_calls.handled.is_empty());
    assert_eq!(bad_calls.teardowns, vec![false]);
    assert_eq!(indices(&good_calls.lock().handled), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_no_ui_constructor_drains_bus() {
    let app = Application::new(puppy());
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();
    assert!(state.uis().is_empty());

    let report = app
        .run(state, |state| async move { publish_all(&state, 10) })
        .await;
    assert!(report.success());
    assert!(report.diagnostics().is_empty());
}

#[tokio::test]
async fn test_handle_errors_do_not_stop_delivery() {
    let (flaky, flaky_calls) = RecordingUi::new();
    let (steady, steady_calls) = RecordingUi::new();
    let app = Application::new(puppy().with_ui_constructor(ui_constructor(vec![
        flaky.failing_on("progress"),
        steady,
    ])));
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app
        .run(state, |state| async move { publish_all(&state, 3) })
        .await;

    assert!(report.success());
    assert_eq!(report.diagnostics().len(), 3);
    assert_eq!(flaky_calls.lock().handled.len(), 3);
    assert_eq!(steady_calls.lock().handled.len(), 3);
}

#[tokio::test]
async fn test_command_error_forces_teardown_after_drain() {
    let (ui, calls) = RecordingUi::new();
    let app = Application::new(puppy().with_ui_constructor(ui_constructor(vec![ui])));
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app
        .run(state, |state| async move {
            publish_all(&state, 4)?;
            Err::<(), anyhow::Error>(anyhow::anyhow!("scan failed"))
        })
        .await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.headline(), Some("scan failed"));
    assert!(report.forced());
    let calls = calls.lock();
    assert_eq!(calls.handled.len(), 4);
    assert_eq!(calls.teardowns, vec![true]);
}

#[tokio::test]
async fn test_interrupt_forces_teardown() {
    let (ui, calls) = RecordingUi::new();
    let app = Application::new(puppy().with_ui_constructor(ui_constructor(vec![ui])));
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let cancel = CancellationToken::new();
    let report = app
        .run_until(state, cancel.clone(), move |state| async move {
            publish_all(&state, 2)?;
            cancel.cancel();
            std::future::pending::<()>().await;
            Ok::<_, anyhow::Error>(())
        })
        .await;

    assert_eq!(report.exit_code(), 130);
    assert!(report.interrupted());
    assert!(report.forced());
    assert_eq!(calls.lock().teardowns, vec![true]);
}

#[tokio::test]
async fn test_hung_teardown_times_out() {
    let (slow, _slow_calls) = RecordingUi::new();
    let (next, next_calls) = RecordingUi::new();
    let app = Application::new(
        puppy()
            .with_teardown_timeout(Duration::from_millis(20))
            .with_ui_constructor(ui_constructor(vec![
                slow.slow_teardown(Duration::from_millis(300)),
                next,
            ])),
    );
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app
        .run(state, |_| async { Err::<(), _>(anyhow::anyhow!("abort")) })
        .await;

    assert_eq!(report.exit_code(), 1);
    assert!(report
        .diagnostics()
        .iter()
        .any(|d| d.contains("UI #0 teardown did not finish")));
    assert_eq!(next_calls.lock().teardowns, vec![true]);
}

#[tokio::test]
async fn test_exit_event_loop_stops_delivery() {
    let (ui, calls) = RecordingUi::new();
    let app = Application::new(
        puppy().with_ui_constructor(ui_constructor(vec![ui.exiting_on("done")])),
    );
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app
        .run(state, |state| async move {
            let bus = state.bus().cloned().ok_or_else(|| anyhow::anyhow!("no bus"))?;
            bus.publish(Event::new("done", json!(null)));
            tokio::time::sleep(Duration::from_millis(20)).await;
            bus.publish(Event::new("late", json!(null)));
            Ok::<_, anyhow::Error>(())
        })
        .await;

    assert!(report.success());
    assert!(report.diagnostics().is_empty());
    let calls = calls.lock();
    assert_eq!(calls.handled.len(), 1);
    assert_eq!(calls.teardowns, vec![false]);
}

#[tokio::test]
async fn test_post_run_hooks_see_report() {
    let seen = Arc::new(Mutex::new(None));
    let app = Application::new(puppy().with_post_run({
        let seen = Arc::clone(&seen);
        move |_, report| {
            *seen.lock() = Some(report.exit_code());
            anyhow::bail!("post-run hooks cannot change the outcome")
        }
    }));
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app.run(state, |_| async { Ok::<_, anyhow::Error>(()) }).await;
    assert!(report.success());
    assert_eq!(*seen.lock(), Some(0));
}

fn console_app(level: &str, capture: &Capture) -> Application {
    Application::new(
        SetupConfig::new("puppy", "2.0")
            .without_config_search()
            .without_interrupt_handler()
            .with_logging_config(LoggingConfig {
                level: level.into(),
                ..LoggingConfig::default()
            })
            .with_initializer({
                let capture = capture.clone();
                move |_, state, _| {
                    let controller = state
                        .logger()
                        .controller()
                        .ok_or_else(|| anyhow::anyhow!("expected logger to be a controller"))?;
                    controller.set_output(Box::new(capture.clone()));
                    Ok(())
                }
            }),
    )
}

#[tokio::test]
async fn test_framework_diagnostics_reach_state_logger() {
    let capture = Capture::default();
    let app = console_app("debug", &capture);
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app
        .run(state, |state| async move { publish_all(&state, 2) })
        .await;
    assert!(report.success());

    let output = strip_ansi(&capture.contents());
    assert!(output.contains("DEBUG UIs set up"), "output: {output}");
    assert!(output.contains("DEBUG Run finished"), "output: {output}");
}

#[tokio::test]
async fn test_framework_diagnostics_respect_level() {
    let capture = Capture::default();
    let app = console_app("warn", &capture);
    let (_, state) = app
        .setup_without_config(&mut ProcessContext::default())
        .unwrap();

    let report = app.run(state, |_| async { Ok::<_, anyhow::Error>(()) }).await;
    assert!(report.success());
    assert!(!capture.contents().contains("Run finished"));
}
