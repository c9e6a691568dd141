//! Communication between cardion worker partitions.
//!
//! A [`Communicator`] moves `f64` payloads between ranks. Two
//! implementations ship: [`LocalCommunicator`] for a single partition and
//! [`ChannelCommunicator`] connecting worker threads through crossbeam
//! channels. [`PartitionExchange`] builds the halo update, field
//! reconciliation and reductions on top of a communicator and a
//! [`Partition`](cardion_mesh::Partition)'s exchange lists.
//!
//! All operations are blocking collectives: every partition must call them
//! in the same order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod communicator;
pub mod exchange;

pub use channel::ChannelCommunicator;
pub use communicator::{Communicator, LocalCommunicator};
pub use exchange::PartitionExchange;
