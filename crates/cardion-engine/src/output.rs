//! Snapshot delivery.
//!
//! The orchestrator hands a [`Snapshot`] of the owned voltage to its
//! [`OutputSink`] every `output_frequency` steps. Snapshots are plain
//! serializable data, so file formats live outside the engine.

use cardion_core::{NodeId, PartitionId, StepIndex};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Owned `Vm` values of one partition at one step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// Global step index (counted across runs).
    pub step: StepIndex,
    /// Simulation time.
    pub time: f64,
    /// Partition the values come from.
    pub partition: PartitionId,
    /// Owned node ids, ascending.
    pub nodes: Vec<NodeId>,
    /// `Vm` at each node in `nodes`.
    pub vm: Vec<f64>,
}

/// Receives snapshots during a run.
pub trait OutputSink: Send {
    /// Accept one snapshot.
    fn record(&mut self, snapshot: Snapshot);
}

/// Discards every snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn record(&mut self, _snapshot: Snapshot) {}
}

/// Keeps every snapshot in memory.
///
/// Clones share one buffer, so a clone kept by the caller sees what the
/// orchestrator's copy records.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl RecordingSink {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots recorded so far, in delivery order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.lock().clone()
    }

    /// Number of snapshots recorded.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Snapshot>> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for RecordingSink {
    fn record(&mut self, snapshot: Snapshot) {
        self.lock().push(snapshot);
    }
}

/// Logs a voltage summary of each snapshot at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn record(&mut self, snapshot: Snapshot) {
        let (min, max) = snapshot
            .vm
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        tracing::info!(
            step = %snapshot.step,
            time = snapshot.time,
            partition = %snapshot.partition,
            nodes = snapshot.nodes.len(),
            vm_min = min,
            vm_max = max,
            "snapshot"
        );
    }
}

/// Forwards snapshots over a channel, e.g. from cluster workers to a
/// collecting thread. Sends to a dropped receiver are ignored.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: Sender<Snapshot>,
}

impl ChannelSink {
    /// Wrap a sender.
    pub fn new(tx: Sender<Snapshot>) -> Self {
        Self { tx }
    }
}

impl OutputSink for ChannelSink {
    fn record(&mut self, snapshot: Snapshot) {
        if self.tx.send(snapshot).is_err() {
            tracing::debug!("snapshot receiver dropped");
        }
    }
}
