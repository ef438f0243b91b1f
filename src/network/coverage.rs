use log::warn;

use crate::dsa::graph::HashMap;

use super::config::EngineConfig;
use super::error::{EngineError, Result};
use super::topology::{Network, NodeIdx, NodeKind};

/// Anything that can tell whether an emitter reaches an endpoint.
pub trait CoverageRelation {
    fn covers(&self,emitter:NodeIdx,endpoint:NodeIdx) -> bool;
}

impl<F:Fn(NodeIdx,NodeIdx) -> bool> CoverageRelation for F {
    fn covers(&self,emitter:NodeIdx,endpoint:NodeIdx) -> bool {
        self(emitter,endpoint)
    }
}

/// Euclidean coverage of endpoints by emitter radii, computed once per
/// network. Whether an emitter is switched on plays no part here.
#[derive(Clone,Debug)]
pub struct GeometricCoverage {
    // endpoint -> covering emitters, ascending
    by_endpoint:HashMap<NodeIdx,Vec<NodeIdx>>,
    // emitter -> covered endpoints, ascending
    by_emitter:HashMap<NodeIdx,Vec<NodeIdx>>,
}

impl GeometricCoverage {
    pub fn new(network:&Network,config:&EngineConfig) -> Self {
        let mut by_endpoint = HashMap::with_capacity_and_hasher(
            network.nodes().len(), nohash::BuildNoHashHasher::default()
        );
        let mut by_emitter = HashMap::with_capacity_and_hasher(
            network.nodes().len(), nohash::BuildNoHashHasher::default()
        );
        for endpoint in network.endpoints() {
            let covering:Vec<NodeIdx> = network.emitters()
                .filter(|emitter| match emitter.kind {
                    NodeKind::Emitter{radius,..} => {
                        emitter.position.distance(&endpoint.position) <= radius + config.coverage_epsilon
                    }
                    _ => false
                })
                .map(|emitter| emitter.idx)
                .collect();
            by_endpoint.insert(endpoint.idx,covering);
        }
        for emitter in network.emitters() {
            by_emitter.insert(emitter.idx,Vec::new());
        }
        // endpoints are visited in ascending order, so the lists stay sorted
        for endpoint in network.endpoints() {
            for emitter in by_endpoint[&endpoint.idx].iter() {
                if let Some(list) = by_emitter.get_mut(emitter) {
                    list.push(endpoint.idx);
                }
            }
        }
        Self {by_endpoint,by_emitter}
    }
    /// Every emitter, on or off, whose radius reaches `endpoint`.
    pub fn emitters_covering(&self,endpoint:NodeIdx) -> &[NodeIdx] {
        self.by_endpoint.get(&endpoint).map(|v| v.as_slice()).unwrap_or(&[])
    }
    pub fn endpoints_covered_by(&self,emitter:NodeIdx) -> &[NodeIdx] {
        self.by_emitter.get(&emitter).map(|v| v.as_slice()).unwrap_or(&[])
    }
    pub fn coverage_count(&self,emitter:NodeIdx) -> usize {
        self.endpoints_covered_by(emitter).len()
    }
    pub fn uncovered_endpoints(&self) -> Vec<NodeIdx> {
        let mut uncovered:Vec<NodeIdx> = self.by_endpoint.iter()
            .filter(|(_,emitters)| emitters.is_empty())
            .map(|(endpoint,_)| *endpoint)
            .collect();
        uncovered.sort_unstable();
        uncovered
    }
    /// Fails with [`EngineError::UncoverableEndpoint`] when some endpoint has
    /// no emitter in range at all.
    pub fn check(&self,network:&Network) -> Result<()> {
        let uncovered = self.uncovered_endpoints();
        if uncovered.is_empty() {
            return Ok(());
        }
        let endpoints:Vec<String> = uncovered.iter().map(|n| network.node_id(*n).to_owned()).collect();
        warn!("endpoints without any emitter in range: {endpoints:?}");
        Err(EngineError::UncoverableEndpoint{endpoints})
    }
}

impl CoverageRelation for GeometricCoverage {
    fn covers(&self,emitter:NodeIdx,endpoint:NodeIdx) -> bool {
        self.emitters_covering(endpoint).binary_search(&emitter).is_ok()
    }
}
