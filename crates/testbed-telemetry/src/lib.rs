//! Testbed Telemetry - Test session plugin for requirement tracking and reporting
//!
//! Observes a test runner's lifecycle and adds three things to it:
//!
//! - **Debugger arbitration**: optionally opens a remote debug listener on the
//!   controller process, once, and never on workers.
//! - **Requirement tagging**: every collected test can be required to name the
//!   requirements it covers; offenders stop the run before anything executes.
//! - **Distributed reporting**: results from any number of workers are merged
//!   into one ordered set and exported as a CSV artifact.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use testbed_telemetry::{
//!     EnvSnapshot, ParallelHarness, ProcessRole, ScriptedExecutor, SuppliedConfig,
//!     TelemetrySession,
//! };
//! use testbed_types::TestItem;
//!
//! # async fn run() -> testbed_telemetry::Result<()> {
//! let supplied = SuppliedConfig::load("testbed.toml")?;
//! let mut session =
//!     TelemetrySession::configure(supplied, EnvSnapshot::from_process(), ProcessRole::Controller)?;
//!
//! let items = vec![TestItem::new("tests/test_api.py::test_login").with_requirements(["REQ-001-001"])];
//! let report = ParallelHarness::with_workers(4)
//!     .run(&mut session, items, Arc::new(ScriptedExecutor::new()))
//!     .await?;
//! println!("{}", report.results.to_text());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod aggregator;
pub mod config;
pub mod debug;
pub mod error;
pub mod export;
pub mod harness;
pub mod logging;
pub mod report;
pub mod requirements;
pub mod session;
pub mod transport;

pub use aggregator::{RecordDisposition, ResultAggregator, WorkerStatus};
pub use config::{
    ConfigResolver, DebuggerConfig, EnvSnapshot, OptionKey, PluginConfig, ReportingConfig,
    RequirementPolicy, SuppliedConfig,
};
pub use debug::{AttachOutcome, DebugArbiter, DebugBackend, TcpDebugBackend};
pub use error::{ExportIoError, MissingRequirementError, RequirementViolation, Result, TelemetryError};
pub use export::{export, read_report, ExportSummary, ReportRow};
pub use harness::{Execution, HarnessConfig, ParallelHarness, ScriptedExecutor, TestExecutor};
pub use logging::init_tracing;
pub use report::{ResultSet, ResultSummary};
pub use requirements::{validate, ValidationResult};
pub use session::{ProcessRole, SessionPhase, SessionReport, TelemetrySession};
pub use transport::{ControllerInbox, WorkerLink};
