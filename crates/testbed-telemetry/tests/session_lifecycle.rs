use std::sync::Arc;
use tempfile::TempDir;
use testbed_telemetry::{
    read_report, AttachOutcome, EnvSnapshot, Execution, OptionKey, ParallelHarness, ProcessRole,
    ScriptedExecutor, SessionPhase, SuppliedConfig, TelemetryError, TelemetrySession,
};
use testbed_types::{NodeId, Outcome, TestItem};

fn reporting_config(dir: &TempDir, omit: bool) -> SuppliedConfig {
    let path = dir.path().join("artifacts/report.csv");
    SuppliedConfig::from_toml(&format!(
        r#"
        [testbed]
        mandate_requirement_markers = true

        [testbed.reporting]
        csv_export_path = "{}"
        omit_unexecuted_tests = {}
        "#,
        path.display().to_string().replace('\\', "/"),
        omit
    ))
    .unwrap()
}

fn tagged_suite() -> Vec<TestItem> {
    vec![
        TestItem::new("tests/test_login.py::test_ok").with_requirements(["REQ-001-001"]),
        TestItem::new("tests/test_login.py::test_locked")
            .with_requirements(["REQ-001-002", "REQ-002-001"]),
        TestItem::new("tests/test_logout.py::test_ok").with_requirements(["NA"]),
    ]
}

#[tokio::test]
async fn configured_session_exports_one_row_per_item() {
    let dir = TempDir::new().unwrap();
    let mut session = TelemetrySession::configure(
        reporting_config(&dir, false),
        EnvSnapshot::empty(),
        ProcessRole::Controller,
    )
    .unwrap();

    let report = ParallelHarness::with_workers(2)
        .run(&mut session, tagged_suite(), Arc::new(ScriptedExecutor::new()))
        .await
        .unwrap();

    let summary = report.export.unwrap().unwrap();
    assert_eq!(summary.rows_written, 3);

    let rows = read_report(&summary.path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[1].requirements,
        vec!["REQ-001-002".to_string(), "REQ-002-001".to_string()]
    );
    assert!(rows.iter().all(|r| r.outcome == Outcome::Passed));
    assert!(rows.iter().all(|r| r.started_at.is_some()));
}

#[tokio::test]
async fn second_session_overwrites_previous_report() {
    let dir = TempDir::new().unwrap();

    for _ in 0..2 {
        let mut session = TelemetrySession::configure(
            reporting_config(&dir, false),
            EnvSnapshot::empty(),
            ProcessRole::Controller,
        )
        .unwrap();
        ParallelHarness::with_workers(1)
            .run(&mut session, tagged_suite(), Arc::new(ScriptedExecutor::new()))
            .await
            .unwrap();
    }

    let rows = read_report(dir.path().join("artifacts/report.csv")).unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn omitted_rows_are_left_out_of_the_artifact() {
    let dir = TempDir::new().unwrap();
    let mut session = TelemetrySession::configure(
        reporting_config(&dir, true),
        EnvSnapshot::empty(),
        ProcessRole::Controller,
    )
    .unwrap();
    let executor = ScriptedExecutor::new().with("tests/test_login.py::test_ok", Execution::WorkerLost);

    let report = ParallelHarness::with_workers(1)
        .run(&mut session, tagged_suite(), Arc::new(executor))
        .await
        .unwrap();

    // The single worker died on its first item
    assert_eq!(report.results.summary().not_executed, 3);
    let summary = report.export.unwrap().unwrap();
    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.rows_omitted, 3);
}

#[tokio::test]
async fn missing_requirement_stops_the_run_before_execution() {
    let dir = TempDir::new().unwrap();
    let mut session = TelemetrySession::configure(
        reporting_config(&dir, false),
        EnvSnapshot::empty(),
        ProcessRole::Controller,
    )
    .unwrap();
    let items = vec![
        TestItem::new("A"),
        TestItem::new("B").with_requirements(["REQ-1"]),
    ];

    let err = ParallelHarness::new()
        .run(&mut session, items, Arc::new(ScriptedExecutor::new()))
        .await
        .unwrap_err();
    let TelemetryError::MissingRequirements(missing) = err else {
        panic!("expected a requirement error");
    };
    assert_eq!(missing.offenders(), vec![&NodeId::new("A")]);
    assert!(missing.to_string().contains("A missing `requirements` marker"));

    // Finalizing an aborted session still reports every item
    assert!(session.is_aborted());
    let report = session.on_session_finish().unwrap();
    assert_eq!(report.results.summary().not_executed, 2);
    let rows = read_report(dir.path().join("artifacts/report.csv")).unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn ci_suppresses_auto_debug_override() {
    let env = EnvSnapshot::empty()
        .with_var("CI", "true")
        .with_var("TESTBED_AUTO_DEBUG", "1");
    let mut session =
        TelemetrySession::configure(SuppliedConfig::new(), env, ProcessRole::Controller).unwrap();

    assert!(!session.config().debugger.auto_debug);
    assert_eq!(session.on_session_start().await.unwrap(), AttachOutcome::Disabled);
    assert_eq!(session.phase(), SessionPhase::Collecting);
}

#[test]
fn invalid_option_value_is_fatal_at_configure() {
    let mut supplied = SuppliedConfig::new();
    supplied.set(OptionKey::MandateRequirementMarkers, "perhaps");

    let err = TelemetrySession::configure(supplied, EnvSnapshot::empty(), ProcessRole::Controller)
        .err()
        .unwrap();
    assert!(matches!(err, TelemetryError::ConfigType { .. }));
}

#[test]
fn unknown_option_in_config_file_is_rejected() {
    let err = SuppliedConfig::from_toml("[testbed]\nauto_debgu = true\n").unwrap_err();
    assert!(matches!(err, TelemetryError::ConfigParse(_)));
}
