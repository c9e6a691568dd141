//! Crossbeam-channel communicator connecting worker threads.

use crate::communicator::Communicator;
use cardion_core::{ExchangeError, PartitionId};
use crossbeam_channel::{Receiver, Sender};

/// A sequence-tagged payload.
#[derive(Debug)]
struct Packet {
    sequence: u64,
    payload: Vec<f64>,
}

/// One rank of a fully connected set of in-process workers.
///
/// Each ordered pair of ranks has its own unbounded channel, so sends never
/// block and messages from different peers never interleave. Packets carry
/// a per-pair sequence number that the receiver checks.
pub struct ChannelCommunicator {
    rank: PartitionId,
    size: u32,
    outgoing: Vec<Option<Sender<Packet>>>,
    incoming: Vec<Option<Receiver<Packet>>>,
    sent: Vec<u64>,
    received: Vec<u64>,
}

impl std::fmt::Debug for ChannelCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCommunicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl ChannelCommunicator {
    /// Create `size` connected communicators, one per rank, in rank order.
    pub fn mesh(size: u32) -> Vec<Self> {
        let n = size as usize;
        let mut outgoing: Vec<Vec<Option<Sender<Packet>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();
        let mut incoming: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();
        for from in 0..n {
            for to in (0..n).filter(|&to| to != from) {
                let (tx, rx) = crossbeam_channel::unbounded();
                outgoing[from][to] = Some(tx);
                incoming[to][from] = Some(rx);
            }
        }
        outgoing
            .into_iter()
            .zip(incoming)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| Self {
                rank: PartitionId(rank as u32),
                size,
                outgoing,
                incoming,
                sent: vec![0; n],
                received: vec![0; n],
            })
            .collect()
    }

    fn check_peer(&self, peer: PartitionId) -> Result<usize, ExchangeError> {
        if peer.0 >= self.size || peer == self.rank {
            return Err(ExchangeError::UnknownPeer {
                peer,
                size: self.size,
            });
        }
        Ok(peer.index())
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> PartitionId {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn send(&mut self, peer: PartitionId, payload: Vec<f64>) -> Result<(), ExchangeError> {
        let p = self.check_peer(peer)?;
        let tx = self.outgoing[p]
            .as_ref()
            .ok_or(ExchangeError::Disconnected { peer })?;
        let packet = Packet {
            sequence: self.sent[p],
            payload,
        };
        tx.send(packet)
            .map_err(|_| ExchangeError::Disconnected { peer })?;
        self.sent[p] += 1;
        Ok(())
    }

    fn recv(&mut self, peer: PartitionId) -> Result<Vec<f64>, ExchangeError> {
        let p = self.check_peer(peer)?;
        let rx = self.incoming[p]
            .as_ref()
            .ok_or(ExchangeError::Disconnected { peer })?;
        let packet = rx
            .recv()
            .map_err(|_| ExchangeError::Disconnected { peer })?;
        if packet.sequence != self.received[p] {
            return Err(ExchangeError::ProtocolMismatch {
                peer,
                expected: self.received[p],
                actual: packet.sequence,
            });
        }
        self.received[p] += 1;
        Ok(packet.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn all_gather_across_threads_is_rank_ordered() {
        let comms = ChannelCommunicator::mesh(3);
        let results: Vec<Vec<Vec<f64>>> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let r = f64::from(c.rank().0);
                        c.all_gather(&[r, r * 10.0]).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for gathered in results {
            assert_eq!(
                gathered,
                vec![vec![0.0, 0.0], vec![1.0, 10.0], vec![2.0, 20.0]]
            );
        }
    }

    #[test]
    fn dropped_peer_reports_disconnected() {
        let mut comms = ChannelCommunicator::mesh(2);
        let gone = comms.pop().unwrap();
        drop(gone);
        let mut c0 = comms.pop().unwrap();
        assert_eq!(
            c0.recv(PartitionId(1)),
            Err(ExchangeError::Disconnected {
                peer: PartitionId(1)
            })
        );
        assert!(matches!(
            c0.send(PartitionId(1), vec![1.0]),
            Err(ExchangeError::Disconnected { .. })
        ));
    }

    #[test]
    fn messages_arrive_in_order() {
        let mut comms = ChannelCommunicator::mesh(2);
        let mut c1 = comms.pop().unwrap();
        let mut c0 = comms.pop().unwrap();
        c0.send(PartitionId(1), vec![1.0]).unwrap();
        c0.send(PartitionId(1), vec![2.0]).unwrap();
        assert_eq!(c1.recv(PartitionId(0)).unwrap(), vec![1.0]);
        assert_eq!(c1.recv(PartitionId(0)).unwrap(), vec![2.0]);
        assert!(matches!(
            c0.send(PartitionId(0), vec![]),
            Err(ExchangeError::UnknownPeer { .. })
        ));
    }
}
