//! Distributed result aggregation
//!
//! The controller owns one aggregator per session. Workers never touch it
//! directly; their messages are applied here one at a time, in whatever order
//! the transport delivers them. The finalized set is always ordered by
//! collection order and always has exactly one row per collected item.

use crate::report::ResultSet;
use std::collections::{BTreeMap, HashMap};
use testbed_types::{NodeId, ResultRecord, TestItem, WorkerId, WorkerMessage};

/// Lifecycle of a registered worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Finished,
}

/// What `record_result` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    /// First record for this node
    Inserted,
    /// Replaced an earlier record for this node
    Replaced,
    /// Node was never collected; record dropped
    UnknownNode,
}

/// Merges per-test outcomes from every worker into one ordered result set
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    items: Vec<TestItem>,
    positions: HashMap<NodeId, usize>,
    assignments: HashMap<NodeId, WorkerId>,
    workers: BTreeMap<WorkerId, WorkerStatus>,
    records: HashMap<NodeId, ResultRecord>,
}

impl ResultAggregator {
    /// Create an aggregator for the collected items, in collection order.
    ///
    /// A repeated node id keeps its first position.
    pub fn new(items: Vec<TestItem>) -> Self {
        let mut unique = Vec::with_capacity(items.len());
        let mut positions = HashMap::with_capacity(items.len());
        for item in items {
            if positions.contains_key(&item.node_id) {
                tracing::warn!(node_id = %item.node_id, "duplicate node id in collection ignored");
                continue;
            }
            positions.insert(item.node_id.clone(), unique.len());
            unique.push(item);
        }

        Self {
            items: unique,
            positions,
            ..Default::default()
        }
    }

    /// Add a worker to the registry; returns false if it was already known
    pub fn register_worker(&mut self, worker: WorkerId) -> bool {
        if self.workers.contains_key(&worker) {
            return false;
        }
        tracing::debug!(worker = %worker, "worker registered");
        self.workers.insert(worker, WorkerStatus::Running);
        true
    }

    /// Record which worker owns which items, so items it never reports are
    /// attributed to it
    pub fn assign<I>(&mut self, worker: &WorkerId, node_ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.register_worker(worker.clone());
        for node_id in node_ids {
            if self.positions.contains_key(&node_id) {
                self.assignments.insert(node_id, worker.clone());
            } else {
                tracing::warn!(node_id = %node_id, worker = %worker, "assignment for unknown node ignored");
            }
        }
    }

    /// Store a result; a later record for the same node replaces the earlier one
    pub fn record_result(&mut self, worker: &WorkerId, mut record: ResultRecord) -> RecordDisposition {
        let Some(&position) = self.positions.get(&record.node_id) else {
            tracing::warn!(
                node_id = %record.node_id,
                worker = %worker,
                "result for uncollected node dropped"
            );
            return RecordDisposition::UnknownNode;
        };

        if !self.workers.contains_key(worker) {
            self.register_worker(worker.clone());
        }

        // The delivering worker and the collected tags are authoritative
        record.worker = worker.clone();
        record.requirements = self.items[position].requirements.clone();

        tracing::debug!(node_id = %record.node_id, outcome = %record.outcome, worker = %worker, "result recorded");
        match self.records.insert(record.node_id.clone(), record) {
            Some(_) => RecordDisposition::Replaced,
            None => RecordDisposition::Inserted,
        }
    }

    /// Mark a worker as done with its partition
    pub fn worker_finished(&mut self, worker: &WorkerId) {
        self.workers.insert(worker.clone(), WorkerStatus::Finished);
        tracing::debug!(worker = %worker, "worker finished");
    }

    /// Apply one transport message
    pub fn apply(&mut self, message: WorkerMessage) -> Option<RecordDisposition> {
        match message {
            WorkerMessage::Started { worker } => {
                self.register_worker(worker);
                None
            }
            WorkerMessage::Result { worker, record } => Some(self.record_result(&worker, record)),
            WorkerMessage::Finished { worker } => {
                self.worker_finished(&worker);
                None
            }
        }
    }

    pub fn worker_status(&self, worker: &WorkerId) -> Option<WorkerStatus> {
        self.workers.get(worker).copied()
    }

    /// Registered workers that have not signalled completion
    pub fn pending_workers(&self) -> Vec<&WorkerId> {
        self.workers
            .iter()
            .filter(|(_, status)| **status == WorkerStatus::Running)
            .map(|(worker, _)| worker)
            .collect()
    }

    pub fn all_workers_finished(&self) -> bool {
        self.pending_workers().is_empty()
    }

    pub fn collected_count(&self) -> usize {
        self.items.len()
    }

    pub fn reported_count(&self) -> usize {
        self.records.len()
    }

    pub fn items(&self) -> &[TestItem] {
        &self.items
    }

    /// Build the session-wide result set.
    ///
    /// Never fails: items nobody reported come out as not-executed, so this
    /// is safe to call after an aborted session too.
    pub fn finalize(&self) -> ResultSet {
        let pending = self.pending_workers();
        if !pending.is_empty() {
            tracing::warn!(
                "{} worker(s) never signalled completion: {}",
                pending.len(),
                pending
                    .iter()
                    .map(|w| w.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let records: Vec<ResultRecord> = self
            .items
            .iter()
            .map(|item| match self.records.get(&item.node_id) {
                Some(record) => record.clone(),
                None => {
                    let owner = self
                        .assignments
                        .get(&item.node_id)
                        .cloned()
                        .unwrap_or_else(WorkerId::controller);
                    ResultRecord::not_executed(item, owner)
                }
            })
            .collect();

        let missing = self.items.len() - self.records.len();
        if missing > 0 {
            tracing::warn!("{} collected test(s) were never reported", missing);
        }

        ResultSet::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use testbed_types::Outcome;

    fn items(ids: &[&str]) -> Vec<TestItem> {
        ids.iter().map(|id| TestItem::new(*id)).collect()
    }

    fn record(id: &str, outcome: Outcome, worker: &WorkerId) -> ResultRecord {
        ResultRecord::new(id, outcome, worker.clone())
    }

    #[test]
    fn test_later_record_overwrites() {
        let w1 = WorkerId::new("w1");
        let mut agg = ResultAggregator::new(items(&["t1"]));
        agg.register_worker(w1.clone());

        assert_eq!(
            agg.record_result(&w1, record("t1", Outcome::Failed, &w1)),
            RecordDisposition::Inserted
        );
        assert_eq!(
            agg.record_result(&w1, record("t1", Outcome::Passed, &w1)),
            RecordDisposition::Replaced
        );

        let set = agg.finalize();
        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].outcome, Outcome::Passed);
    }

    #[test]
    fn test_output_follows_collection_order() {
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");
        let mut agg = ResultAggregator::new(items(&["a", "b", "c"]));
        agg.record_result(&w2, record("c", Outcome::Passed, &w2));
        agg.record_result(&w1, record("a", Outcome::Failed, &w1));
        agg.record_result(&w2, record("b", Outcome::Skipped, &w2));

        let ids: Vec<_> = agg
            .finalize()
            .records()
            .iter()
            .map(|r| r.node_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crashed_worker_items_are_not_executed() {
        let w1 = WorkerId::new("w1");
        let mut agg = ResultAggregator::new(items(&["a", "b", "c", "d"]));
        agg.assign(&w1, ["a", "b", "c"].map(NodeId::from));
        agg.record_result(&w1, record("a", Outcome::Passed, &w1));

        let set = agg.finalize();
        assert_eq!(set.len(), 4);
        let outcomes: Vec<_> = set.records().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Passed,
                Outcome::NotExecuted,
                Outcome::NotExecuted,
                Outcome::NotExecuted
            ]
        );
        assert_eq!(set.records()[1].worker, w1);
        assert!(set.records()[3].worker.is_controller());
    }

    #[test]
    fn test_unknown_node_dropped() {
        let w1 = WorkerId::new("w1");
        let mut agg = ResultAggregator::new(items(&["a"]));
        assert_eq!(
            agg.record_result(&w1, record("zzz", Outcome::Passed, &w1)),
            RecordDisposition::UnknownNode
        );
        assert_eq!(agg.finalize().len(), 1);
    }

    #[test]
    fn test_collected_tags_are_authoritative() {
        let w1 = WorkerId::new("w1");
        let mut agg = ResultAggregator::new(vec![
            TestItem::new("a").with_requirements(["REQ-001-001"])
        ]);
        let stray = record("a", Outcome::Passed, &WorkerId::new("other"))
            .with_requirements(vec!["bogus".to_string()]);
        agg.record_result(&w1, stray);

        let set = agg.finalize();
        assert_eq!(set.records()[0].requirements, vec!["REQ-001-001".to_string()]);
        assert_eq!(set.records()[0].worker, w1);
    }

    #[test]
    fn test_worker_registry_via_messages() {
        let w1 = WorkerId::new("w1");
        let mut agg = ResultAggregator::new(items(&["a"]));
        agg.apply(WorkerMessage::Started { worker: w1.clone() });
        assert_eq!(agg.pending_workers(), vec![&w1]);
        agg.apply(WorkerMessage::Finished { worker: w1.clone() });
        assert!(agg.all_workers_finished());
        assert_eq!(agg.worker_status(&w1), Some(WorkerStatus::Finished));
    }

    #[test]
    fn test_finalize_with_no_workers() {
        let agg = ResultAggregator::new(items(&["a", "b"]));
        let set = agg.finalize();
        assert!(set
            .records()
            .iter()
            .all(|r| r.outcome == Outcome::NotExecuted && r.worker.is_controller()));
    }

    #[test]
    fn test_duplicate_collection_entry_keeps_first() {
        let agg = ResultAggregator::new(items(&["a", "b", "a"]));
        assert_eq!(agg.collected_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_every_item_reported_once_in_collection_order(
            n in 1usize..40,
            workers in 1usize..5,
            seed in any::<u64>(),
            dup_every in 1usize..7,
        ) {
            let ids: Vec<String> = (0..n).map(|i| format!("tests/test_mod.py::test_{}", i)).collect();
            let mut agg = ResultAggregator::new(ids.iter().map(|id| TestItem::new(id.as_str())).collect());

            // deterministic shuffle of arrival order
            let mut arrival: Vec<usize> = (0..n).collect();
            let mut state = seed | 1;
            for i in (1..n).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                arrival.swap(i, (state as usize) % (i + 1));
            }

            for (k, index) in arrival.iter().enumerate() {
                let worker = WorkerId::new(format!("gw{}", index % workers));
                agg.record_result(&worker, ResultRecord::new(ids[*index].as_str(), Outcome::Passed, worker.clone()));
                if k % dup_every == 0 {
                    agg.record_result(&worker, ResultRecord::new(ids[*index].as_str(), Outcome::Failed, worker.clone()));
                }
            }

            let set = agg.finalize();
            prop_assert_eq!(set.len(), n);
            let got: Vec<String> = set.records().iter().map(|r| r.node_id.to_string()).collect();
            prop_assert_eq!(got, ids);
        }
    }
}
