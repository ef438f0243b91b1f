// routing and coverage engine of the green network levels
// 链路容量约束下的多路径布线, 以及发射器的贪心覆盖

pub mod color;
pub mod config;
pub mod connection;
pub mod coverage;
pub mod description;
pub mod engine;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod optimizer;
pub mod path_finder;
pub mod snapshot;
pub mod state;
pub mod topology;

#[cfg(test)]
mod fixtures;

pub use color::{Color, ConnectionId};
pub use config::{EngineConfig, RoutingWeight};
pub use connection::{AutoConnectReport, Connection, ConnectionManager, Extension};
pub use coverage::{CoverageRelation, GeometricCoverage};
pub use description::{GraphDescription, LinkDescription, NodeDescription, NodeKindDescription};
pub use engine::{Engine, EnergyReport};
pub use error::{EngineError, TopologyError};
pub use generator::LevelGenerator;
pub use ledger::UsageLedger;
pub use optimizer::CoverageOptimizer;
pub use path_finder::{Path, PathFinder};
pub use snapshot::{SavedSolution, Snapshot, StoredPath};
pub use state::{ActiveEmitterSet, CoverageAssignment, EngineState};
pub use topology::{Demand, DemandKind, Link, LinkIdx, Network, Node, NodeIdx, NodeKind, Position};
