//! Failure-storm simulator
//!
//! Drives the widget handler, structured logger and recovery orchestrator
//! with seeded random widget failures and reports what the resilience layer
//! made of them. The same seed always yields the same failure sequence.

use aegis_core::{AegisConfig, AegisError, Context, Fault};
use aegis_log::{AggregatedError, ErrorStatistics, ErrorSuggestion, StructuredLogger};
use aegis_recovery::{RecoveryOrchestrator, SystemHealthStatus};
use aegis_widget::{WidgetErrorRecord, WidgetFailureHandler, WidgetStatistics};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const PLUGINS: [&str; 4] = ["weather", "calendar", "news", "billing"];

const FAULTS: [(&str, &str); 6] = [
    ("NetworkError", "ECONNREFUSED upstream api"),
    ("TimeoutError", "request timeout after 30s"),
    ("TypeError", "Cannot read properties of undefined"),
    ("PermissionError", "403 Forbidden"),
    ("RenderError", "canvas context lost"),
    ("RangeError", "out of memory while decoding image"),
];

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Widgets on the simulated dashboard
    pub widgets: usize,
    /// Failure events to inject
    pub failures: u64,
    /// Chance that a retry succeeds and clears the widget
    pub recovery_rate: f64,
    /// Subsystem configuration
    #[serde(skip)]
    pub aegis: AegisConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            widgets: 12,
            failures: 200,
            recovery_rate: 0.25,
            aegis: AegisConfig::default(),
        }
    }
}

/// Final report from the simulator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorReport {
    /// Inputs
    pub config: SimulatorConfig,
    /// Widget ledger view at the end of the run
    pub widgets: WidgetStatistics,
    /// Widgets cleared after a successful retry
    pub recovered: u64,
    /// Auto-remove hook invocations
    pub auto_remove_calls: u64,
    /// Logger statistics
    pub log_statistics: ErrorStatistics,
    /// Most frequent errors
    pub top_errors: Vec<AggregatedError>,
    /// Remediation hints
    pub suggestions: Vec<ErrorSuggestion>,
    /// System health at the end of the run
    pub health: SystemHealthStatus,
}

impl SimulatorReport {
    /// Whether the run stayed internally consistent
    ///
    /// Every failure is counted once and the auto-remove hook fired once per
    /// retired widget.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.widgets.total_errors == self.config.failures
            && self.auto_remove_calls == self.widgets.auto_removed
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Aegis Simulation Report");
        let _ = writeln!(out, "=======================");
        let _ = writeln!(out, "Seed: {}", self.config.seed);
        let _ = writeln!(out, "Widgets: {}", self.config.widgets);
        let _ = writeln!(out, "Failures injected: {}", self.config.failures);
        let _ = writeln!(out);
        let _ = writeln!(out, "Widget ledger:");
        let _ = writeln!(out, "  Failure events: {}", self.widgets.total_errors);
        let _ = writeln!(out, "  Still failing: {}", self.widgets.failed_widgets);
        let _ = writeln!(out, "  Recovered: {}", self.recovered);
        let _ = writeln!(out, "  Auto-removed: {}", self.widgets.auto_removed);
        for (severity, count) in &self.widgets.by_severity {
            let _ = writeln!(out, "  {severity}: {count}");
        }
        if let Some(widget) = &self.widgets.most_failing {
            let _ = writeln!(out, "  Most failing: {widget}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Logged errors: {}", self.log_statistics.total_errors);
        for error in &self.top_errors {
            let _ = writeln!(
                out,
                "  {:>4} x {} ({} components)",
                error.count,
                error.message,
                error.affected_components.len()
            );
        }
        if !self.suggestions.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Suggestions:");
            for suggestion in &self.suggestions {
                let _ = writeln!(out, "  - {} ({})", suggestion.suggestion, suggestion.action);
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "System status: {}", self.health.status);
        let _ = writeln!(out, "Failed components: {}", self.health.failed_components.len());
        let _ = writeln!(out, "Fallback logging: {}", self.health.fallback_logging_active);
        let _ = writeln!(out, "Result: {}", if self.passed() { "CONSISTENT" } else { "INCONSISTENT" });
        out
    }
}

/// Run a seeded failure storm
///
/// # Errors
/// Returns `AegisError::Runtime` when called outside a tokio runtime.
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, AegisError> {
    let logger = Arc::new(StructuredLogger::new(config.aegis.logger.clone()));
    let orchestrator = RecoveryOrchestrator::builder()
        .config(config.aegis.recovery.clone())
        .primary_sink(logger.clone())
        .build()?;

    let widgets = WidgetFailureHandler::new(config.aegis.widget.clone());
    widgets.set_failure_listener(Arc::new(orchestrator.clone()));

    let auto_remove_calls = Arc::new(AtomicU64::new(0));
    let removals = auto_remove_calls.clone();
    widgets.set_auto_remove_callback(move |_: &WidgetErrorRecord| {
        removals.fetch_add(1, Ordering::Relaxed);
    });

    let mut rng = StdRng::seed_from_u64(config.seed);
    let widget_count = config.widgets.max(1);
    let mut recovered = 0u64;

    for _ in 0..config.failures {
        let index = rng.gen_range(0..widget_count);
        let widget_id = format!("widget-{index}");
        let plugin_id = PLUGINS[index % PLUGINS.len()];
        let (name, message) = FAULTS[rng.gen_range(0..FAULTS.len())];
        let fault = Fault::named(name, message);

        let record = widgets.handle_widget_error(&widget_id, plugin_id, &fault);
        logger.log_error(
            &fault,
            Context::new()
                .with_plugin(plugin_id)
                .with_component(widget_id.clone())
                .with_severity(record.severity),
        );

        let retryable = !widgets.is_auto_removed(&widget_id) && widgets.can_retry(&widget_id);
        if retryable && rng.gen_bool(config.recovery_rate.clamp(0.0, 1.0)) {
            widgets.clear_widget_error(&widget_id);
            recovered += 1;
        }
    }

    orchestrator.flush_notifications().await;
    tracing::info!(
        seed = config.seed,
        failures = config.failures,
        recovered,
        "simulation finished"
    );

    let mut top_errors = logger.aggregated_errors();
    top_errors.truncate(5);

    Ok(SimulatorReport {
        widgets: widgets.error_statistics(),
        recovered,
        auto_remove_calls: auto_remove_calls.load(Ordering::Relaxed),
        log_statistics: logger.error_statistics(),
        top_errors,
        suggestions: logger.error_suggestions(),
        health: orchestrator.get_system_health(),
        config,
    })
}
