//! End-to-end resilience scenarios across logger, widgets and orchestrator

use aegis_core::{Context, Fault, LogLevel, LoggerConfig, RecoveryConfig, RetryOptions, Severity, WidgetConfig};
use aegis_log::{BufferedSink, StructuredLogger};
use aegis_recovery::{
    EscalationLevel, FailureDisposition, Notification, RecoveryOrchestrator, RetryOutcome, SystemStatus,
};
use aegis_test_utils::{
    fail_widget, network_fault, plugin_context, severe_context, small_logger, type_fault, FailingStore, FlakySink,
    PanickingSink, RecordingNotifier, ScriptedComponentHandler,
};
use aegis_widget::WidgetFailureHandler;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn primary_failing_every_call_lands_in_fallback() {
    let primary = FlakySink::broken();
    let fallback = Arc::new(BufferedSink::new(100));
    let orchestrator = RecoveryOrchestrator::builder()
        .primary_sink(primary.clone())
        .fallback_sink(fallback.clone())
        .build()
        .unwrap();

    orchestrator.safe_log(LogLevel::Info, "first", &Context::new());
    assert!(orchestrator.get_system_health().fallback_logging_active);

    for n in 0..10 {
        orchestrator.safe_log(LogLevel::Info, &format!("line {n}"), &Context::new());
    }

    let stored: Vec<_> = fallback.records().into_iter().map(|r| r.message).collect();
    assert!(stored.contains(&"first".to_string()));
    for n in 0..10 {
        assert!(stored.contains(&format!("line {n}")));
    }
    // Primary is skipped once fallback logging is active
    assert_eq!(primary.attempts(), 1);
}

#[tokio::test]
async fn structured_logger_with_dead_store_falls_back() {
    let logger = Arc::new(StructuredLogger::with_store(LoggerConfig::default(), Arc::new(FailingStore)));
    let fallback = Arc::new(BufferedSink::new(10));
    let orchestrator = RecoveryOrchestrator::builder()
        .primary_sink(logger)
        .fallback_sink(fallback.clone())
        .build()
        .unwrap();

    orchestrator.safe_log(LogLevel::Error, "payment widget crashed", &Context::new());

    assert_eq!(fallback.records()[1].message, "payment widget crashed");
    assert!(!orchestrator.check_and_restore_main_logging());
}

#[tokio::test]
async fn both_sinks_failing_never_raises() {
    let orchestrator = RecoveryOrchestrator::builder()
        .primary_sink(Arc::new(PanickingSink))
        .fallback_sink(FlakySink::broken())
        .build()
        .unwrap();

    orchestrator.safe_log(LogLevel::Critical, "nowhere to go", &Context::new());
    orchestrator.handle_component_failure("chart", &Fault::new("boom"), &Context::new());

    assert!(orchestrator.get_system_health().fallback_logging_active);
}

#[tokio::test(start_paused = true)]
async fn scheduled_retry_restores_component() {
    let handler = Arc::new(
        ScriptedComponentHandler::new(FailureDisposition::None)
            .with_restore_script([Err("still booting".to_string()), Ok(false), Ok(true)]),
    );
    let orchestrator = RecoveryOrchestrator::builder()
        .component_handler(handler.clone())
        .build()
        .unwrap();

    orchestrator.handle_component_failure("chart", &Fault::new("timeout"), &Context::new());
    assert_eq!(orchestrator.get_system_health().status, SystemStatus::Degraded);

    let started = tokio::time::Instant::now();
    let outcome = orchestrator
        .schedule_component_retry("chart", &Fault::new("timeout"), RetryOptions::new(5, Duration::from_secs(1), true))
        .await
        .unwrap();

    assert_eq!(outcome, RetryOutcome::Restored { attempt: 3 });
    assert_eq!(handler.attempts(), 3);
    // 1s + 2s + 4s
    assert_eq!(started.elapsed().as_secs(), 7);

    let health = orchestrator.get_system_health();
    assert!(health.failed_components.is_empty());
    assert_eq!(health.status, SystemStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retry_keeps_component_failed() {
    let handler = Arc::new(ScriptedComponentHandler::new(FailureDisposition::None));
    let orchestrator = RecoveryOrchestrator::builder()
        .component_handler(handler.clone())
        .build()
        .unwrap();

    orchestrator.handle_component_failure("chart", &Fault::new("timeout"), &Context::new());
    let outcome = orchestrator
        .schedule_component_retry("chart", &Fault::new("timeout"), RetryOptions::new(2, Duration::from_millis(10), false))
        .await
        .unwrap();

    assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 2 });
    assert!(orchestrator.get_system_health().failed_components.contains("chart"));
}

#[tokio::test(start_paused = true)]
async fn retry_disposition_schedules_in_background() {
    let handler = Arc::new(
        ScriptedComponentHandler::new(FailureDisposition::Retry).with_restore_script([Ok(true)]),
    );
    let config = RecoveryConfig::default().with_retry(RetryOptions::new(3, Duration::from_millis(500), true));
    let orchestrator = RecoveryOrchestrator::builder()
        .config(config)
        .component_handler(handler.clone())
        .build()
        .unwrap();

    let disposition = orchestrator.handle_component_failure("feed", &Fault::new("stalled"), &Context::new());
    assert_eq!(disposition, FailureDisposition::Retry);
    assert_eq!(handler.attempts(), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(handler.attempts(), 1);
    assert!(orchestrator.get_system_health().is_healthy());
}

#[tokio::test]
async fn isolate_disposition_marks_unhealthy() {
    let handler = Arc::new(ScriptedComponentHandler::new(FailureDisposition::Isolate).with_fallback("chart-lite"));
    let orchestrator = RecoveryOrchestrator::builder()
        .component_handler(handler.clone())
        .build()
        .unwrap();

    orchestrator.handle_component_failure("chart", &network_fault(), &severe_context("chart"));

    assert_eq!(*handler.unhealthy.lock(), vec!["chart".to_string()]);
    assert_eq!(*handler.failures.lock(), vec!["chart".to_string()]);
}

#[tokio::test]
async fn widget_failures_forwarded_when_high() {
    let notifier = RecordingNotifier::new();
    let orchestrator = RecoveryOrchestrator::builder()
        .notifier(notifier.clone())
        .component_handler(Arc::new(ScriptedComponentHandler::new(FailureDisposition::Isolate)))
        .build()
        .unwrap();
    let widgets = WidgetFailureHandler::new(WidgetConfig::default());
    widgets.set_failure_listener(Arc::new(orchestrator.clone()));

    let records = fail_widget(&widgets, "w1", "p1", 3);
    assert_eq!(records[2].severity, Severity::Medium);
    assert!(orchestrator.get_system_health().is_healthy());

    fail_widget(&widgets, "w1", "p1", 1);
    orchestrator.flush_notifications().await;

    let health = orchestrator.get_system_health();
    assert!(health.failed_components.contains("w1"));
    assert_eq!(notifier.count_kind("error"), 1);
}

#[tokio::test]
async fn system_wide_failure_goes_straight_to_executive() {
    let notifier = RecordingNotifier::new();
    let orchestrator = RecoveryOrchestrator::builder()
        .notifier(notifier.clone())
        .component_handler(Arc::new(ScriptedComponentHandler::new(FailureDisposition::None)))
        .build()
        .unwrap();

    orchestrator.handle_system_wide_failure(&Fault::new("cluster lost quorum"), &Context::new().with_component("db"));
    orchestrator.flush_notifications().await;

    let health = orchestrator.get_system_health();
    assert_eq!(health.status, SystemStatus::Critical);
    assert!(!health.critical_systems_operational);
    assert!(health.fallback_logging_active);
    assert!(health.failed_components.contains("db"));

    let levels: Vec<_> = notifier
        .notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::Escalation(e) => Some(e.escalation_level),
            _ => None,
        })
        .collect();
    assert_eq!(levels, vec![EscalationLevel::Executive]);

    // Critical is sticky even after logging recovers
    assert!(orchestrator.check_and_restore_main_logging());
    assert_eq!(orchestrator.get_system_health().status, SystemStatus::Critical);
}

#[tokio::test]
async fn concurrent_failures_keep_consistent_health() {
    let orchestrator = RecoveryOrchestrator::builder()
        .component_handler(Arc::new(ScriptedComponentHandler::new(FailureDisposition::None)))
        .build()
        .unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator.handle_component_failure(&format!("c{n}"), &Fault::new("down"), &Context::new());
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let health = orchestrator.get_system_health();
    assert_eq!(health.failed_components.len(), 16);
    assert_eq!(orchestrator.error_occurrences(&Fault::new("down")), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn instant_restores_never_leave_components_failed() {
    let handler = Arc::new(
        ScriptedComponentHandler::new(FailureDisposition::Retry).with_restore_script((0..32).map(|_| Ok(true))),
    );
    let config = RecoveryConfig::default().with_retry(RetryOptions::new(1, Duration::ZERO, false));
    let orchestrator = RecoveryOrchestrator::builder()
        .config(config)
        .component_handler(handler.clone())
        .build()
        .unwrap();

    for n in 0..32 {
        orchestrator.handle_component_failure(&format!("svc-{n}"), &Fault::new("crashed"), &Context::new());
    }

    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        while !orchestrator.get_system_health().failed_components.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert!(settled.is_ok(), "components still failed: {:?}", orchestrator.get_system_health().failed_components);
    assert_eq!(handler.attempts(), 32);
    assert_eq!(orchestrator.get_system_health().status, SystemStatus::Healthy);
}

#[tokio::test]
async fn distinct_one_off_faults_stay_bounded() {
    let orchestrator = RecoveryOrchestrator::new(RecoveryConfig::default().with_max_tracked_errors(100)).unwrap();

    for n in 0..20_000 {
        orchestrator.handle_recurring_error(&Fault::new(format!("request {n} failed")), &Context::new());
    }

    assert_eq!(orchestrator.error_occurrences(&Fault::new("request 0 failed")), 0);
    assert_eq!(orchestrator.error_occurrences(&Fault::new("request 19999 failed")), 1);
}

#[tokio::test]
async fn plugin_failure_isolates_plugin() {
    let handler = Arc::new(ScriptedComponentHandler::new(FailureDisposition::None));
    let orchestrator = RecoveryOrchestrator::builder()
        .component_handler(handler.clone())
        .build()
        .unwrap();

    let fault = type_fault("widget.render is not a function");
    orchestrator.handle_plugin_failure("charts", &fault, &plugin_context("charts"));
    orchestrator.handle_plugin_failure("charts", &fault, &plugin_context("charts"));

    assert!(orchestrator.is_isolated("charts"));
    assert_eq!(orchestrator.isolated_plugins(), vec!["charts".to_string()]);
    assert_eq!(*handler.unhealthy.lock(), vec!["charts".to_string(), "charts".to_string()]);
    assert_eq!(orchestrator.error_occurrences(&fault), 2);
}

#[tokio::test]
async fn bounded_primary_logger_keeps_latest_lines() {
    let logger = Arc::new(small_logger(3));
    let orchestrator = RecoveryOrchestrator::builder()
        .primary_sink(logger.clone())
        .build()
        .unwrap();

    for n in 0..5 {
        orchestrator.safe_log(LogLevel::Info, &format!("line {n}"), &Context::new());
    }

    let kept: Vec<_> = logger.recent(3).into_iter().map(|e| e.message).collect();
    assert_eq!(logger.len(), 3);
    assert!(kept.contains(&"line 4".to_string()));
    assert!(!kept.contains(&"line 0".to_string()));
    assert!(!orchestrator.get_system_health().fallback_logging_active);
}
