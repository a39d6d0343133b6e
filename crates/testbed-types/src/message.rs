//! Messages sent from workers to the controller
//!
//! Delivery is at-least-once: a recovering worker may resend a result it
//! already reported. The controller treats a repeated `Result` for the same
//! node as a replacement, never as an extra row.

use crate::{ResultRecord, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Worker process came up
    Started { worker: WorkerId },

    /// One test finished on the worker
    Result {
        worker: WorkerId,
        record: ResultRecord,
    },

    /// Worker drained its partition and is exiting
    Finished { worker: WorkerId },
}

impl WorkerMessage {
    pub fn worker(&self) -> &WorkerId {
        match self {
            WorkerMessage::Started { worker }
            | WorkerMessage::Result { worker, .. }
            | WorkerMessage::Finished { worker } => worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;

    #[test]
    fn test_message_tagging() {
        let msg = WorkerMessage::Finished {
            worker: WorkerId::new("gw0"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "finished");
        assert_eq!(json["worker"], "gw0");
    }

    #[test]
    fn test_result_message_worker() {
        let worker = WorkerId::new("gw3");
        let msg = WorkerMessage::Result {
            worker: worker.clone(),
            record: ResultRecord::new("a::b", Outcome::Passed, worker.clone()),
        };
        assert_eq!(msg.worker(), &worker);
    }
}
