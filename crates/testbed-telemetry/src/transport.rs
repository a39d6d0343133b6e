//! Worker to controller message passing
//!
//! In-process workers share an unbounded channel with the controller. Workers
//! in other processes write one JSON message per line to any byte stream
//! (a pipe, a socket) and the controller pumps those lines into the same
//! channel. Delivery is at-least-once; the aggregator tolerates repeats.

use crate::error::{Result, TelemetryError};
use chrono::Utc;
use testbed_types::{Outcome, ResultRecord, TestItem, WorkerId, WorkerMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Controller end of the channel
pub struct ControllerInbox {
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl ControllerInbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Handle a worker uses to report back
    pub fn link(&self, worker: WorkerId) -> WorkerLink {
        WorkerLink {
            worker,
            tx: self.tx.clone(),
        }
    }

    /// Raw sender, for pumping messages decoded from another process
    pub fn sender(&self) -> mpsc::UnboundedSender<WorkerMessage> {
        self.tx.clone()
    }

    /// Stop accepting new links; `recv` returns `None` once every existing
    /// link is dropped and the queue is drained
    pub fn close_intake(self) -> mpsc::UnboundedReceiver<WorkerMessage> {
        self.rx
    }

    /// Next message, if any are queued right now
    pub fn try_recv(&mut self) -> Option<WorkerMessage> {
        self.rx.try_recv().ok()
    }
}

impl Default for ControllerInbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker end of the channel
#[derive(Debug, Clone)]
pub struct WorkerLink {
    worker: WorkerId,
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl WorkerLink {
    pub fn worker(&self) -> &WorkerId {
        &self.worker
    }

    fn send(&self, message: WorkerMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| TelemetryError::Transport("controller inbox closed".to_string()))
    }

    pub fn started(&self) -> Result<()> {
        self.send(WorkerMessage::Started {
            worker: self.worker.clone(),
        })
    }

    pub fn report(&self, record: ResultRecord) -> Result<()> {
        self.send(WorkerMessage::Result {
            worker: self.worker.clone(),
            record,
        })
    }

    /// Report an outcome for `item`, stamping the end time now
    pub fn report_outcome(
        &self,
        item: &TestItem,
        outcome: Outcome,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let record = ResultRecord::new(item.node_id.clone(), outcome, self.worker.clone())
            .with_requirements(item.requirements.clone())
            .with_timing(started_at, Utc::now());
        self.report(record)
    }

    pub fn finished(&self) -> Result<()> {
        self.send(WorkerMessage::Finished {
            worker: self.worker.clone(),
        })
    }
}

/// Encode a message as a single JSON line, without the trailing newline
pub fn encode_message(message: &WorkerMessage) -> Result<String> {
    serde_json::to_string(message).map_err(|e| TelemetryError::Transport(e.to_string()))
}

pub fn decode_message(line: &str) -> Result<WorkerMessage> {
    serde_json::from_str(line.trim())
        .map_err(|e| TelemetryError::Transport(format!("malformed worker message: {}", e)))
}

/// Write one message followed by a newline
pub async fn write_message<W>(writer: &mut W, message: &WorkerMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = encode_message(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| TelemetryError::Transport(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TelemetryError::Transport(e.to_string()))
}

/// Forward JSON lines from `reader` into the controller channel until EOF.
///
/// Malformed lines are logged and skipped so that one garbled write from a
/// dying worker cannot take down the whole report. Returns the number of
/// messages forwarded.
pub async fn pump_lines<R>(reader: R, tx: mpsc::UnboundedSender<WorkerMessage>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| TelemetryError::Transport(e.to_string()))?
    {
        if line.trim().is_empty() {
            continue;
        }
        match decode_message(&line) {
            Ok(message) => {
                if tx.send(message).is_err() {
                    return Err(TelemetryError::Transport(
                        "controller inbox closed".to_string(),
                    ));
                }
                forwarded += 1;
            }
            Err(e) => tracing::warn!("skipping worker line: {}", e),
        }
    }
    Ok(forwarded)
}
