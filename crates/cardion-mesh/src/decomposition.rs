//! Element-to-domain decomposition and node ownership.

use crate::mesh::Mesh;
use crate::partition::{HaloLink, Partition};
use cardion_core::{ConfigError, ElementId, NodeId, PartitionId};
use indexmap::IndexSet;
use std::collections::{BTreeMap, BTreeSet};

/// Assignment of every element to a domain and every node to an owner.
///
/// Node ownership is derived from element domains: a node is owned by the
/// lowest-numbered domain among the elements containing it, so every node
/// has exactly one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decomposition {
    partitions: u32,
    element_domain: Vec<PartitionId>,
    node_owner: Vec<PartitionId>,
}

impl Decomposition {
    /// Split elements into `partitions` contiguous blocks of near-equal size.
    ///
    /// The first `elements % partitions` blocks get one extra element.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDecomposition`] if `partitions` is zero, exceeds
    /// the element count, or some domain would own no node.
    pub fn calculated(mesh: &Mesh, partitions: u32) -> Result<Self, ConfigError> {
        if partitions == 0 || partitions as usize > mesh.element_count() {
            return Err(ConfigError::InvalidDecomposition {
                reason: format!(
                    "cannot split {} elements into {partitions} partitions",
                    mesh.element_count()
                ),
            });
        }
        let count = mesh.element_count();
        let base = count / partitions as usize;
        let rem = count % partitions as usize;
        let mut domains = Vec::with_capacity(count);
        for d in 0..partitions as usize {
            let len = base + usize::from(d < rem);
            domains.extend(std::iter::repeat(PartitionId(d as u32)).take(len));
        }
        Self::from_element_domains(mesh, domains, partitions)
    }

    /// Use an explicit element-to-domain assignment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDecomposition`] if the assignment length does not
    /// match the mesh, a domain id is out of range, or some domain owns no
    /// node.
    pub fn from_element_domains(
        mesh: &Mesh,
        element_domain: Vec<PartitionId>,
        partitions: u32,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDecomposition { reason };
        if partitions == 0 {
            return Err(invalid("at least one partition is required".into()));
        }
        if element_domain.len() != mesh.element_count() {
            return Err(invalid(format!(
                "{} domain entries for {} elements",
                element_domain.len(),
                mesh.element_count()
            )));
        }
        if let Some(d) = element_domain.iter().find(|d| d.0 >= partitions) {
            return Err(invalid(format!("domain {d} out of range 0..{partitions}")));
        }

        let mut node_owner = vec![PartitionId(u32::MAX); mesh.node_count()];
        for (nodes, &domain) in mesh.elements().iter().zip(&element_domain) {
            for node in nodes {
                let owner = &mut node_owner[node.index()];
                *owner = (*owner).min(domain);
            }
        }

        let mut owned = vec![0usize; partitions as usize];
        for owner in &node_owner {
            owned[owner.index()] += 1;
        }
        if let Some(d) = owned.iter().position(|&n| n == 0) {
            return Err(invalid(format!("partition {d} would own no nodes")));
        }

        Ok(Self {
            partitions,
            element_domain,
            node_owner,
        })
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> u32 {
        self.partitions
    }

    /// Owner of a node.
    pub fn owner(&self, node: NodeId) -> PartitionId {
        self.node_owner[node.index()]
    }

    /// Domain of an element.
    pub fn domain(&self, element: ElementId) -> PartitionId {
        self.element_domain[element.index()]
    }

    /// Build the local view of partition `id`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDecomposition`] if `id` is out of range or the
    /// mesh does not match this decomposition.
    pub fn partition(&self, mesh: &Mesh, id: PartitionId) -> Result<Partition, ConfigError> {
        if id.0 >= self.partitions {
            return Err(ConfigError::InvalidDecomposition {
                reason: format!("partition {id} out of range 0..{}", self.partitions),
            });
        }
        if mesh.node_count() != self.node_owner.len()
            || mesh.element_count() != self.element_domain.len()
        {
            return Err(ConfigError::InvalidDecomposition {
                reason: "decomposition was built for a different mesh".into(),
            });
        }

        let owned: Vec<NodeId> = (0..mesh.node_count() as u32)
            .map(NodeId)
            .filter(|&n| self.owner(n) == id)
            .collect();

        let mut elements = Vec::new();
        let mut halo = BTreeSet::new();
        // Peers sharing an element with one of our owned nodes hold that
        // node as a halo copy.
        let mut send: BTreeMap<PartitionId, Vec<NodeId>> = BTreeMap::new();

        for (e, element_nodes) in mesh.elements().iter().enumerate() {
            if !element_nodes.iter().any(|&n| self.owner(n) == id) {
                continue;
            }
            elements.push(ElementId(e as u32));
            for &n in element_nodes {
                let owner = self.owner(n);
                if owner != id {
                    halo.insert(n);
                    continue;
                }
                for &m in element_nodes {
                    let peer = self.owner(m);
                    if peer != id {
                        send.entry(peer).or_default().push(n);
                    }
                }
            }
        }

        // Owned nodes first, then halo nodes, each in ascending id order.
        let owned_count = owned.len();
        let ordered: IndexSet<NodeId> = owned.into_iter().chain(halo.iter().copied()).collect();

        let local = |n: &NodeId| ordered.get_index_of(n).map(|i| i as u32);

        let mut recv_map: BTreeMap<PartitionId, Vec<u32>> = BTreeMap::new();
        for n in &halo {
            if let Some(i) = local(n) {
                recv_map.entry(self.owner(*n)).or_default().push(i);
            }
        }
        let recv = recv_map
            .into_iter()
            .map(|(peer, local)| HaloLink { peer, local })
            .collect();

        let send = send
            .into_iter()
            .map(|(peer, mut ids)| {
                ids.sort_unstable();
                ids.dedup();
                HaloLink {
                    peer,
                    local: ids.iter().filter_map(local).collect(),
                }
            })
            .collect();

        let connectivity = elements
            .iter()
            .map(|&e| {
                let nodes = mesh.element(e);
                let mut out = [0u32; 4];
                for (slot, n) in out.iter_mut().zip(nodes) {
                    *slot = local(n).unwrap_or(u32::MAX);
                }
                out
            })
            .collect();
        let positions = ordered.iter().map(|&n| mesh.position(n)).collect();

        tracing::debug!(
            partition = %id,
            owned = owned_count,
            halo = halo.len(),
            elements = elements.len(),
            "partition built"
        );

        Ok(Partition {
            id,
            partitions: self.partitions,
            nodes: ordered.iter().copied().collect(),
            lookup: ordered,
            owned_count,
            elements,
            connectivity,
            positions,
            send,
            recv,
        })
    }
}
