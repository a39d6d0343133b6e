//! Harness for driving a session with parallel workers
//!
//! Each worker is a tokio task holding only its partition of the collected
//! items. Workers talk to the controller through the transport channel, the
//! same way out-of-process workers would.

use crate::error::Result;
use crate::session::{SessionPhase, SessionReport, TelemetrySession};
use crate::transport::{ControllerInbox, WorkerLink};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use testbed_types::{NodeId, Outcome, TestItem, WorkerId};

/// What running one item on a worker produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Completed(Outcome),
    /// The worker went away mid-run; nothing more is reported from it
    WorkerLost,
}

/// Runs a single test item on a worker
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, worker: &WorkerId, item: &TestItem) -> Execution;
}

/// Executor with a fixed script of per-node results; everything else passes
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    script: HashMap<NodeId, Execution>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, node_id: impl Into<NodeId>, execution: Execution) -> Self {
        self.script.insert(node_id.into(), execution);
        self
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn execute(&self, _worker: &WorkerId, item: &TestItem) -> Execution {
        self.script
            .get(&item.node_id)
            .copied()
            .unwrap_or(Execution::Completed(Outcome::Passed))
    }
}

/// Harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of worker tasks; zero is treated as one
    pub workers: usize,
    /// Prefix for generated worker ids
    pub worker_prefix: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            worker_prefix: "gw".to_string(),
        }
    }
}

/// Drives a [`TelemetrySession`] through a complete parallel run
pub struct ParallelHarness {
    config: HarnessConfig,
}

impl ParallelHarness {
    /// Create a harness with default configuration
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
        }
    }

    /// Create a harness with custom configuration
    pub fn with_config(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Shortcut for a harness with `workers` workers
    pub fn with_workers(workers: usize) -> Self {
        Self::with_config(HarnessConfig {
            workers,
            ..Default::default()
        })
    }

    /// Round-robin split of items across the configured workers
    pub fn partition(&self, items: &[TestItem]) -> Vec<(WorkerId, Vec<TestItem>)> {
        let count = self.config.workers.max(1);
        let mut partitions: Vec<(WorkerId, Vec<TestItem>)> = (0..count)
            .map(|i| {
                (
                    WorkerId::new(format!("{}{}", self.config.worker_prefix, i)),
                    Vec::new(),
                )
            })
            .collect();
        for (i, item) in items.iter().enumerate() {
            partitions[i % count].1.push(item.clone());
        }
        partitions
    }

    /// Run the whole session: start, collect, execute on workers, finish.
    ///
    /// A collection failure is returned as is; the session stays usable and
    /// `on_session_finish` still reports every item as not executed.
    pub async fn run(
        &self,
        session: &mut TelemetrySession,
        items: Vec<TestItem>,
        executor: Arc<dyn TestExecutor>,
    ) -> Result<SessionReport> {
        if session.phase() == SessionPhase::Configured {
            session.on_session_start().await?;
        }
        let collected = session.on_collection_finish(items)?.to_vec();

        let inbox = ControllerInbox::new();
        let mut handles = Vec::new();
        for (worker, partition) in self.partition(&collected) {
            session.assign(&worker, partition.iter().map(|item| item.node_id.clone()))?;
            let link = inbox.link(worker);
            let executor = executor.clone();
            handles.push(tokio::spawn(run_worker(link, partition, executor)));
        }
        tracing::info!(
            workers = handles.len(),
            items = collected.len(),
            "parallel execution started"
        );

        let mut rx = inbox.close_intake();
        while let Some(message) = rx.recv().await {
            if let Err(e) = session.handle_message(message) {
                tracing::warn!("worker message rejected: {}", e);
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("worker task failed: {}", e);
            }
        }

        session.on_session_finish()
    }

    /// Run and panic unless every collected item passed or was skipped
    pub async fn assert_clean(
        &self,
        session: &mut TelemetrySession,
        items: Vec<TestItem>,
        executor: Arc<dyn TestExecutor>,
    ) -> SessionReport {
        let report = match self.run(session, items, executor).await {
            Ok(report) => report,
            Err(e) => panic!("session failed: {}", e),
        };
        let summary = report.results.summary();
        if !summary.is_clean() || summary.not_executed > 0 {
            panic!("session is not clean:\n{}", report.results.to_text());
        }
        report
    }
}

impl Default for ParallelHarness {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(link: WorkerLink, items: Vec<TestItem>, executor: Arc<dyn TestExecutor>) {
    if link.started().is_err() {
        return;
    }
    for item in &items {
        let started_at = Utc::now();
        match executor.execute(link.worker(), item).await {
            Execution::Completed(outcome) => {
                if let Err(e) = link.report_outcome(item, outcome, started_at) {
                    tracing::warn!(worker = %link.worker(), "{}", e);
                    return;
                }
            }
            Execution::WorkerLost => {
                tracing::warn!(worker = %link.worker(), node_id = %item.node_id, "worker lost");
                return;
            }
        }
    }
    let _ = link.finished();
}
