//! A connectionist-network engine: neuron-like nodes joined by
//! weighted, directed arcs, organized into named layers and reusable
//! composite modules, with recall, local learning rules (Hebbian
//! family, Oja), and incremental back-propagation over arbitrary layer
//! graphs, recurrent and self-referencing ones included.
//!
//! Topology lives in flat, index-addressed arenas owned by
//! [`network::Network`]. Update hazards on shared state are handled by
//! the derived execution/learning orders and a one-step activation
//! history, not by locking; execution is single-threaded and
//! synchronous, one input vector per call.

pub mod activation;
pub mod blueprint;
pub mod error;
pub mod graph;
pub mod link;
pub mod network;
pub mod rng;
