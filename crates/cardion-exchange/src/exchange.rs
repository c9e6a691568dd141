//! Halo exchange and reductions for one partition.

use crate::communicator::Communicator;
use cardion_core::{ConfigError, ExchangeError, FieldReader, FieldRef, FieldWriter};
use cardion_mesh::{HaloLink, Partition};

/// Halo exchange bound to one partition's send and receive lists.
///
/// ```
/// use cardion_exchange::{LocalCommunicator, PartitionExchange};
/// use cardion_mesh::{Decomposition, RectMeshBuilder};
/// use cardion_core::PartitionId;
///
/// let mesh = RectMeshBuilder::new(1.0, 1.0, 2, 2).build().unwrap();
/// let dec = Decomposition::calculated(&mesh, 1).unwrap();
/// let part = dec.partition(&mesh, PartitionId(0)).unwrap();
/// let mut ex = PartitionExchange::new(&part, Box::new(LocalCommunicator)).unwrap();
/// assert_eq!(ex.all_reduce_sum(2.5).unwrap(), 2.5);
/// ```
pub struct PartitionExchange {
    send: Vec<HaloLink>,
    recv: Vec<HaloLink>,
    comm: Box<dyn Communicator>,
}

impl std::fmt::Debug for PartitionExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionExchange")
            .field("rank", &self.comm.rank())
            .field("send", &self.send)
            .field("recv", &self.recv)
            .finish()
    }
}

impl PartitionExchange {
    /// Bind a communicator to a partition.
    ///
    /// # Errors
    ///
    /// [`ConfigError::CommunicatorMismatch`] if the communicator's rank or
    /// size disagrees with the partition.
    pub fn new(partition: &Partition, comm: Box<dyn Communicator>) -> Result<Self, ConfigError> {
        if comm.rank() != partition.id() || comm.size() != partition.partition_count() {
            return Err(ConfigError::CommunicatorMismatch {
                rank: comm.rank().0,
                size: comm.size(),
                partition: partition.id(),
                partitions: partition.partition_count(),
            });
        }
        Ok(Self {
            send: partition.send_links().to_vec(),
            recv: partition.recv_links().to_vec(),
            comm,
        })
    }

    /// The underlying communicator.
    pub fn communicator(&mut self) -> &mut dyn Communicator {
        self.comm.as_mut()
    }

    /// Overwrite the halo entries of a local vector with the owners' values.
    pub fn update_halo(&mut self, values: &mut [f64]) -> Result<(), ExchangeError> {
        for link in &self.send {
            let payload = link.local.iter().map(|&i| values[i as usize]).collect();
            self.comm.send(link.peer, payload)?;
        }
        for link in &self.recv {
            let payload = self.comm.recv(link.peer)?;
            check_len(link, payload.len())?;
            for (&i, v) in link.local.iter().zip(payload) {
                values[i as usize] = v;
            }
        }
        Ok(())
    }

    /// Refresh the halo copies of several field slots in one message per peer.
    ///
    /// Payloads are the slots' values concatenated in `slots` order, so every
    /// partition must pass the same list. Calling this twice without
    /// intervening writes leaves the store unchanged.
    ///
    /// Ends with a [`barrier`](Self::barrier): no partition returns before
    /// every partition has entered, including those it shares no halo with.
    pub fn reconcile<S>(&mut self, store: &mut S, slots: &[FieldRef]) -> Result<(), ExchangeError>
    where
        S: FieldReader + FieldWriter,
    {
        if let Some(missing) = slots.iter().find(|&&s| store.read(s).is_none()) {
            return Err(ExchangeError::UnknownSlot {
                slot: missing.to_string(),
            });
        }
        for link in &self.send {
            let mut payload = Vec::with_capacity(link.local.len() * slots.len());
            for &slot in slots {
                if let Some(values) = store.read(slot) {
                    payload.extend(link.local.iter().map(|&i| values[i as usize]));
                }
            }
            self.comm.send(link.peer, payload)?;
        }
        for link in &self.recv {
            let payload = self.comm.recv(link.peer)?;
            if payload.len() != link.local.len() * slots.len() {
                return Err(ExchangeError::MessageLength {
                    peer: link.peer,
                    expected: link.local.len() * slots.len(),
                    actual: payload.len(),
                });
            }
            if link.local.is_empty() {
                continue;
            }
            for (&slot, chunk) in slots.iter().zip(payload.chunks_exact(link.local.len())) {
                if let Some(values) = store.write(slot) {
                    for (&i, &v) in link.local.iter().zip(chunk) {
                        values[i as usize] = v;
                    }
                }
            }
        }
        self.barrier()?;
        tracing::trace!(slots = slots.len(), peers = self.recv.len(), "halo reconciled");
        Ok(())
    }

    /// Sum `x` over all partitions, added in rank order on every partition.
    pub fn all_reduce_sum(&mut self, x: f64) -> Result<f64, ExchangeError> {
        let gathered = self.comm.all_gather(&[x])?;
        Ok(gathered.iter().map(|v| v[0]).sum())
    }

    /// Element-wise [`all_reduce_sum`](Self::all_reduce_sum) of several values.
    pub fn all_reduce_sum_many(&mut self, xs: &[f64]) -> Result<Vec<f64>, ExchangeError> {
        let gathered = self.comm.all_gather(xs)?;
        let mut out = vec![0.0; xs.len()];
        for contribution in &gathered {
            for (o, v) in out.iter_mut().zip(contribution) {
                *o += v;
            }
        }
        Ok(out)
    }

    /// Block until every partition reaches this point.
    pub fn barrier(&mut self) -> Result<(), ExchangeError> {
        self.comm.all_gather(&[]).map(|_| ())
    }
}

fn check_len(link: &HaloLink, actual: usize) -> Result<(), ExchangeError> {
    if actual != link.local.len() {
        return Err(ExchangeError::MessageLength {
            peer: link.peer,
            expected: link.local.len(),
            actual,
        });
    }
    Ok(())
}
