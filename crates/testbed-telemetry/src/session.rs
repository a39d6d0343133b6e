//! Session lifecycle
//!
//! A [`TelemetrySession`] is created once per test run and threaded through
//! every host callback. Phases only move forward:
//! `Configured -> Collecting -> Executing -> Aggregation -> Finished`.

use crate::aggregator::{RecordDisposition, ResultAggregator};
use crate::config::{EnvSnapshot, PluginConfig, SuppliedConfig};
use crate::debug::{AttachOutcome, DebugArbiter};
use crate::error::{ExportIoError, Result, TelemetryError};
use crate::export::{self, ExportSummary};
use crate::report::ResultSet;
use crate::requirements;
use std::fmt;
use testbed_types::{NodeId, ResultRecord, TestItem, WorkerId, WorkerMessage};

/// Which side of a distributed run this process is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRole {
    Controller,
    Worker(WorkerId),
}

impl ProcessRole {
    pub fn is_controller(&self) -> bool {
        matches!(self, ProcessRole::Controller)
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Controller => f.pad(WorkerId::CONTROLLER),
            ProcessRole::Worker(worker) => f.pad(worker.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Configured,
    Collecting,
    Executing,
    Aggregation,
    Finished,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Configured => "configured",
            SessionPhase::Collecting => "collecting",
            SessionPhase::Executing => "executing",
            SessionPhase::Aggregation => "aggregation",
            SessionPhase::Finished => "finished",
        };
        f.pad(name)
    }
}

/// What the end of a session produced
#[derive(Debug)]
pub struct SessionReport {
    pub results: ResultSet,
    /// `None` when no export path is configured
    pub export: Option<std::result::Result<ExportSummary, ExportIoError>>,
}

impl SessionReport {
    /// Whether a configured export failed
    pub fn export_failed(&self) -> bool {
        matches!(self.export, Some(Err(_)))
    }
}

/// Per-run plugin state owned by the controller
pub struct TelemetrySession {
    config: PluginConfig,
    role: ProcessRole,
    phase: SessionPhase,
    arbiter: DebugArbiter,
    attach: Option<AttachOutcome>,
    aggregator: Option<ResultAggregator>,
    early_workers: Vec<WorkerId>,
    aborted: bool,
}

impl TelemetrySession {
    /// Create a session that arbitrates through the process-wide debugger
    pub fn new(config: PluginConfig, role: ProcessRole) -> Self {
        Self::with_arbiter(config, role, DebugArbiter::process())
    }

    /// Use a custom debug backend
    pub fn with_arbiter(config: PluginConfig, role: ProcessRole, arbiter: DebugArbiter) -> Self {
        Self {
            config,
            role,
            phase: SessionPhase::Configured,
            arbiter,
            attach: None,
            aggregator: None,
            early_workers: Vec::new(),
            aborted: false,
        }
    }

    /// Resolve configuration and create the session.
    ///
    /// Invalid option values are fatal here, before anything is collected.
    pub fn configure(supplied: SuppliedConfig, env: EnvSnapshot, role: ProcessRole) -> Result<Self> {
        let config = PluginConfig::from_sources(supplied, env)?;
        tracing::info!(
            role = %role,
            mandated = config.requirements.mandated,
            reporting = config.reporting.is_some(),
            "telemetry session configured"
        );
        Ok(Self::new(config, role))
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn role(&self) -> &ProcessRole {
        &self.role
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Result of the debugger arbitration, once it has run
    pub fn attach_outcome(&self) -> Option<&AttachOutcome> {
        self.attach.as_ref()
    }

    /// Whether collection failed and the run was stopped before execution
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Collected items after validation; empty before collection finishes
    pub fn items(&self) -> &[TestItem] {
        self.aggregator.as_ref().map(|a| a.items()).unwrap_or(&[])
    }

    pub fn aggregator(&self) -> Option<&ResultAggregator> {
        self.aggregator.as_ref()
    }

    fn require_phase(&self, expected: SessionPhase, hook: &str) -> Result<()> {
        if self.phase != expected {
            return Err(TelemetryError::Lifecycle(format!(
                "{} called while session is {} (expected {})",
                hook, self.phase, expected
            )));
        }
        Ok(())
    }

    fn require_controller(&self, hook: &str) -> Result<()> {
        if let ProcessRole::Worker(worker) = &self.role {
            return Err(TelemetryError::Lifecycle(format!(
                "{} is controller-only (called on worker {})",
                hook, worker
            )));
        }
        Ok(())
    }

    fn executing_aggregator(&mut self, hook: &str) -> Result<&mut ResultAggregator> {
        self.require_phase(SessionPhase::Executing, hook)?;
        self.aggregator.as_mut().ok_or_else(|| {
            TelemetryError::Lifecycle(format!("{} called before collection finished", hook))
        })
    }

    /// First hook of a run: arbitrate the debugger and begin collection
    pub async fn on_session_start(&mut self) -> Result<AttachOutcome> {
        self.require_phase(SessionPhase::Configured, "on_session_start")?;
        let outcome = self
            .arbiter
            .maybe_attach(&self.config.debugger, &self.role)
            .await;
        self.attach = Some(outcome.clone());
        self.phase = SessionPhase::Collecting;
        tracing::info!(role = %self.role, "telemetry session started");
        Ok(outcome)
    }

    /// Validate the collected items and open the session for results.
    ///
    /// On a requirement violation the session is aborted: no results are
    /// accepted afterwards, but [`on_session_finish`](Self::on_session_finish)
    /// still reports every item as not executed.
    pub fn on_collection_finish(&mut self, items: Vec<TestItem>) -> Result<&[TestItem]> {
        if self.phase == SessionPhase::Configured {
            // Hosts without a distinct start hook go straight to collection
            self.phase = SessionPhase::Collecting;
        }
        self.require_phase(SessionPhase::Collecting, "on_collection_finish")?;

        let validation = requirements::validate(items, self.config.requirements);
        let mut aggregator = ResultAggregator::new(validation.items.clone());
        for worker in self.early_workers.drain(..) {
            aggregator.register_worker(worker);
        }
        self.aggregator = Some(aggregator);

        if let Err(e) = validation.into_result() {
            self.aborted = true;
            self.phase = SessionPhase::Aggregation;
            tracing::error!("{}", e);
            return Err(e.into());
        }

        self.phase = SessionPhase::Executing;
        tracing::info!(collected = self.items().len(), "collection finished");
        Ok(self.items())
    }

    /// Register a worker; workers may come up before collection finishes
    pub fn on_worker_start(&mut self, worker: WorkerId) -> Result<()> {
        self.require_controller("on_worker_start")?;
        match self.phase {
            SessionPhase::Configured | SessionPhase::Collecting => {
                if !self.early_workers.contains(&worker) {
                    self.early_workers.push(worker);
                }
                Ok(())
            }
            _ => {
                self.executing_aggregator("on_worker_start")?
                    .register_worker(worker);
                Ok(())
            }
        }
    }

    /// Record which items a worker was handed
    pub fn assign<I>(&mut self, worker: &WorkerId, node_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.require_controller("assign")?;
        self.executing_aggregator("assign")?.assign(worker, node_ids);
        Ok(())
    }

    pub fn on_test_result(&mut self, worker: &WorkerId, record: ResultRecord) -> Result<RecordDisposition> {
        self.require_controller("on_test_result")?;
        Ok(self
            .executing_aggregator("on_test_result")?
            .record_result(worker, record))
    }

    pub fn on_worker_finish(&mut self, worker: &WorkerId) -> Result<()> {
        self.require_controller("on_worker_finish")?;
        self.executing_aggregator("on_worker_finish")?
            .worker_finished(worker);
        Ok(())
    }

    /// Single entry point for messages delivered by the transport
    pub fn handle_message(&mut self, message: WorkerMessage) -> Result<Option<RecordDisposition>> {
        match message {
            WorkerMessage::Started { worker } => self.on_worker_start(worker).map(|_| None),
            WorkerMessage::Result { worker, record } => {
                self.on_test_result(&worker, record).map(Some)
            }
            WorkerMessage::Finished { worker } => self.on_worker_finish(&worker).map(|_| None),
        }
    }

    /// Finalize results and export the report if one is configured.
    ///
    /// Works in any phase before `Finished`, including after an aborted
    /// collection. A failed export is returned in the report and does not
    /// change any outcome.
    pub fn on_session_finish(&mut self) -> Result<SessionReport> {
        self.require_controller("on_session_finish")?;
        if self.phase == SessionPhase::Finished {
            return Err(TelemetryError::Lifecycle(
                "on_session_finish called twice".to_string(),
            ));
        }
        self.phase = SessionPhase::Aggregation;

        let results = match &self.aggregator {
            Some(aggregator) => aggregator.finalize(),
            None => {
                tracing::warn!("session finished before collection; report is empty");
                ResultSet::new(Vec::new())
            }
        };

        let export = self.config.reporting.as_ref().map(|reporting| {
            let outcome = export::export(
                &results,
                &reporting.csv_export_path,
                reporting.omit_unexecuted_tests,
            );
            if let Err(e) = &outcome {
                tracing::error!("{}", e);
            }
            outcome
        });

        let summary = results.summary();
        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            not_executed = summary.not_executed,
            aborted = self.aborted,
            "telemetry session finished"
        );

        self.phase = SessionPhase::Finished;
        Ok(SessionReport { results, export })
    }
}
