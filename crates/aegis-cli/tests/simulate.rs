//! Simulator driven from a configuration file

use aegis_cli::{run_simulator, SimulatorConfig};
use aegis_core::AegisConfig;
use std::io::Write;

#[tokio::test]
async fn config_file_shapes_the_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[widget]
auto_remove_after_failures = 2

[recovery]
recurring_error_threshold = 2
"#
    )
    .unwrap();

    let aegis = AegisConfig::load(file.path()).unwrap();
    assert_eq!(aegis.widget.auto_remove_after_failures, 2);
    assert_eq!(aegis.widget.max_retries, 3);

    let report = run_simulator(SimulatorConfig {
        widgets: 1,
        failures: 6,
        recovery_rate: 0.0,
        aegis,
        ..SimulatorConfig::default()
    })
    .await
    .unwrap();

    assert!(report.passed());
    assert_eq!(report.widgets.auto_removed, 1);
    assert!(report.log_statistics.total_errors >= 6);
}

#[test]
fn invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[widget]\nmax_retries = 0").unwrap();
    assert!(AegisConfig::load(file.path()).is_err());
}

#[test]
fn rendered_config_loads_back() {
    let rendered = AegisConfig::default().to_toml_string().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(rendered.as_bytes()).unwrap();
    assert_eq!(AegisConfig::load(file.path()).unwrap(), AegisConfig::default());
}
