//! Per-channel Markov chains.
//!
//! [`MarkovChain`] is a plain order-1 chain. [`ChainEngine`] keeps one chain
//! per channel id behind a readers-writer lock: any number of generations
//! run together, while learning, rebuilding and removal are exclusive.

mod chain;
#[cfg(feature = "tokio")]
mod engine;

pub use self::chain::{MarkovChain, DEFAULT_MAX_TOKENS};
#[cfg(feature = "tokio")]
pub use self::engine::ChainEngine;
