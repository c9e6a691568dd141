//! The [`Communicator`] trait and the single-partition implementation.

use cardion_core::{ExchangeError, PartitionId};

/// Point-to-point and collective transport between partition ranks.
///
/// # Contract
///
/// - `send` never blocks; `recv` blocks until the next message from that
///   peer arrives.
/// - Messages between a pair of ranks are delivered in send order.
/// - Collectives must be called by every rank in the same order.
/// - A rank whose communicator has been dropped is reported as
///   [`ExchangeError::Disconnected`] by its peers.
pub trait Communicator: Send {
    /// This rank.
    fn rank(&self) -> PartitionId;

    /// Number of ranks.
    fn size(&self) -> u32;

    /// Queue `payload` for `peer`.
    fn send(&mut self, peer: PartitionId, payload: Vec<f64>) -> Result<(), ExchangeError>;

    /// Receive the next payload from `peer`.
    fn recv(&mut self, peer: PartitionId) -> Result<Vec<f64>, ExchangeError>;

    /// Gather `value` from every rank, indexed by rank.
    ///
    /// The default sends to every peer, then receives from every peer in
    /// rank order.
    fn all_gather(&mut self, value: &[f64]) -> Result<Vec<Vec<f64>>, ExchangeError> {
        let me = self.rank();
        let size = self.size();
        for peer in (0..size).map(PartitionId).filter(|&p| p != me) {
            self.send(peer, value.to_vec())?;
        }
        let mut out = Vec::with_capacity(size as usize);
        for peer in (0..size).map(PartitionId) {
            if peer == me {
                out.push(value.to_vec());
            } else {
                let got = self.recv(peer)?;
                if got.len() != value.len() {
                    return Err(ExchangeError::MessageLength {
                        peer,
                        expected: value.len(),
                        actual: got.len(),
                    });
                }
                out.push(got);
            }
        }
        Ok(out)
    }
}

/// Communicator for a run with a single partition.
///
/// Collectives return immediately; point-to-point calls fail because there
/// is no peer.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalCommunicator;

impl Communicator for LocalCommunicator {
    fn rank(&self) -> PartitionId {
        PartitionId(0)
    }

    fn size(&self) -> u32 {
        1
    }

    fn send(&mut self, peer: PartitionId, _payload: Vec<f64>) -> Result<(), ExchangeError> {
        Err(ExchangeError::UnknownPeer { peer, size: 1 })
    }

    fn recv(&mut self, peer: PartitionId) -> Result<Vec<f64>, ExchangeError> {
        Err(ExchangeError::UnknownPeer { peer, size: 1 })
    }

    fn all_gather(&mut self, value: &[f64]) -> Result<Vec<Vec<f64>>, ExchangeError> {
        Ok(vec![value.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_gather_is_identity() {
        let mut comm = LocalCommunicator;
        assert_eq!(comm.all_gather(&[1.0, 2.0]).unwrap(), vec![vec![1.0, 2.0]]);
        assert!(matches!(
            comm.send(PartitionId(1), vec![]),
            Err(ExchangeError::UnknownPeer { .. })
        ));
    }
}
