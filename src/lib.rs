//! Capacity constrained multi-path routing and emitter coverage for the
//! green network puzzle levels.
//!
//! A level is loaded into an [`Engine`] from a [`GraphDescription`]. Players
//! draw colored connections between endpoints over links of limited
//! capacity, switch emitters on and off, and compare what they built with a
//! greedy or stored solution.

pub mod dsa;
pub mod network;

pub use network::{
    Color, ConnectionId, Engine, EngineConfig, EngineError, GraphDescription,
    LevelGenerator, SavedSolution, Snapshot, TopologyError,
};
