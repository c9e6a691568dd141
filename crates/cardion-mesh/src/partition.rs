//! The local view of one partition: owned nodes, halo nodes and exchange lists.

use cardion_core::{ElementId, NodeId, PartitionId};
use indexmap::IndexSet;

/// Local node indices exchanged with one peer.
///
/// Entries are ordered by ascending global node id, so the sender's list
/// and the receiver's list line up value for value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HaloLink {
    /// The other partition.
    pub peer: PartitionId,
    /// Local node indices on this side.
    pub local: Vec<u32>,
}

/// One worker's portion of the mesh.
///
/// Local node numbering puts owned nodes first (`0..owned_count`), then halo
/// nodes. Halo nodes are read-only copies of nodes owned by other partitions.
#[derive(Clone, Debug)]
pub struct Partition {
    pub(crate) id: PartitionId,
    pub(crate) partitions: u32,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) lookup: IndexSet<NodeId>,
    pub(crate) owned_count: usize,
    pub(crate) elements: Vec<ElementId>,
    pub(crate) connectivity: Vec<[u32; 4]>,
    pub(crate) positions: Vec<[f64; 2]>,
    pub(crate) send: Vec<HaloLink>,
    pub(crate) recv: Vec<HaloLink>,
}

impl Partition {
    /// This partition's id.
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Total number of partitions in the decomposition.
    pub fn partition_count(&self) -> u32 {
        self.partitions
    }

    /// Number of owned nodes.
    pub fn owned_count(&self) -> usize {
        self.owned_count
    }

    /// Number of local nodes (owned + halo).
    pub fn local_count(&self) -> usize {
        self.nodes.len()
    }

    /// Global ids of owned nodes, ascending.
    pub fn owned(&self) -> &[NodeId] {
        &self.nodes[..self.owned_count]
    }

    /// Global ids of halo nodes, ascending.
    pub fn halo(&self) -> &[NodeId] {
        &self.nodes[self.owned_count..]
    }

    /// Global ids of all local nodes in local order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Local index of a global node, if present in this partition.
    pub fn local(&self, node: NodeId) -> Option<u32> {
        self.lookup.get_index_of(&node).map(|i| i as u32)
    }

    /// Global id of a local node index.
    ///
    /// # Panics
    ///
    /// Panics if `local` is out of range.
    pub fn global(&self, local: u32) -> NodeId {
        self.nodes[local as usize]
    }

    /// Whether a local index refers to an owned node.
    pub fn is_owned(&self, local: u32) -> bool {
        (local as usize) < self.owned_count
    }

    /// Global ids of the elements touching owned nodes.
    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    /// Element connectivity in local node indices, parallel to [`Self::elements`].
    pub fn connectivity(&self) -> &[[u32; 4]] {
        &self.connectivity
    }

    /// Positions of local nodes.
    pub fn positions(&self) -> &[[f64; 2]] {
        &self.positions
    }

    /// Owned nodes to send, per peer holding them as halo copies.
    pub fn send_links(&self) -> &[HaloLink] {
        &self.send
    }

    /// Halo nodes to receive, per owning peer.
    pub fn recv_links(&self) -> &[HaloLink] {
        &self.recv
    }

    /// Peers this partition exchanges halo values with, ascending.
    pub fn peers(&self) -> Vec<PartitionId> {
        let mut peers: Vec<PartitionId> = self
            .send
            .iter()
            .chain(&self.recv)
            .map(|l| l.peer)
            .collect();
        peers.sort_unstable();
        peers.dedup();
        peers
    }
}
