// 贪心集合覆盖, deterministic but not always optimal

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::dsa::bitset::BitSet;

use super::coverage::CoverageRelation;
use super::error::{EngineError, Result};
use super::state::{ActiveEmitterSet, CoverageAssignment};
use super::topology::{Network, NodeIdx, NodeKind};

/// Picks which emitters to switch on and which emitter serves each endpoint.
///
/// Inputs are sorted before use, so results depend only on the node order
/// of the network and never on the order callers pass things in.
pub struct CoverageOptimizer<'a,C:CoverageRelation> {
    network:&'a Network,
    coverage:&'a C,
}

fn sorted(nodes:&[NodeIdx]) -> Vec<NodeIdx> {
    let mut nodes = nodes.to_vec();
    nodes.sort_unstable();
    nodes.dedup();
    nodes
}

impl<'a,C:CoverageRelation> CoverageOptimizer<'a,C> {
    pub fn new(network:&'a Network,coverage:&'a C) -> Self {
        Self {network,coverage}
    }

    fn uncoverable(&self,endpoints:Vec<NodeIdx>) -> EngineError {
        let endpoints:Vec<String> = endpoints.iter().map(|n| self.network.node_id(*n).to_owned()).collect();
        warn!("greedy cover impossible, no emitter reaches {endpoints:?}");
        EngineError::UncoverableEndpoint{endpoints}
    }

    /// Greedy set cover: keep taking the emitter that covers the most still
    /// uncovered endpoints, lowest node first on ties.
    ///
    /// Endpoints that no candidate reaches make the cover impossible and are
    /// all listed in the returned [`EngineError::UncoverableEndpoint`].
    pub fn greedy_cover(&self,endpoints:&[NodeIdx],emitters:&[NodeIdx]) -> Result<BTreeSet<NodeIdx>> {
        let endpoints = sorted(endpoints);
        let emitters = sorted(emitters);

        let hopeless:Vec<NodeIdx> = endpoints.iter().copied()
            .filter(|endpoint| !emitters.iter().any(|emitter| self.coverage.covers(*emitter, *endpoint)))
            .collect();
        if !hopeless.is_empty() {
            return Err(self.uncoverable(hopeless));
        }

        // bit i stands for endpoints[i]
        let mut uncovered = BitSet::with_len(endpoints.len(), true);
        let mut chosen = BTreeSet::new();
        while uncovered.count_ones() > 0 {
            let mut best:Option<(NodeIdx,usize)> = None;
            for emitter in emitters.iter().copied() {
                if chosen.contains(&emitter) {
                    continue;
                }
                let gain = uncovered.iter_ones()
                    .filter(|i| self.coverage.covers(emitter, endpoints[*i]))
                    .count();
                if gain > best.map(|(_,g)| g).unwrap_or(0) {
                    best = Some((emitter,gain));
                }
            }
            let Some((emitter,gain)) = best else {
                return Err(self.uncoverable(uncovered.iter_ones().map(|i| endpoints[i]).collect()));
            };
            let newly:Vec<usize> = uncovered.iter_ones()
                .filter(|i| self.coverage.covers(emitter, endpoints[*i]))
                .collect();
            for i in newly {
                uncovered.store_at(i, false);
            }
            debug!("greedy cover took {} for {gain} endpoint(s)",self.network.node_id(emitter));
            chosen.insert(emitter);
        }
        Ok(chosen)
    }

    /// Binds every endpoint to the active emitter covering it that covers
    /// the most endpoints overall, lowest node on ties. Endpoints no active
    /// emitter reaches stay unbound.
    pub fn assign_by_density(&self,endpoints:&[NodeIdx],active:&ActiveEmitterSet) -> CoverageAssignment {
        let endpoints = sorted(endpoints);
        let density:Vec<(NodeIdx,usize)> = active.iter()
            .map(|emitter| {
                let count = endpoints.iter().filter(|e| self.coverage.covers(emitter, **e)).count();
                (emitter,count)
            })
            .collect();
        let mut assignment = CoverageAssignment::new();
        for endpoint in endpoints.iter().copied() {
            let mut best:Option<(NodeIdx,usize)> = None;
            for (emitter,count) in density.iter().copied() {
                if !self.coverage.covers(emitter, endpoint) {
                    continue;
                }
                if best.is_none_or(|(_,c)| count > c) {
                    best = Some((emitter,count));
                }
            }
            if let Some((emitter,_)) = best {
                assignment.bind(endpoint, emitter);
            }
        }
        assignment
    }

    /// An emitter may go dark only once nobody is bound to it.
    pub fn can_deactivate(&self,emitter:NodeIdx,assignment:&CoverageAssignment) -> bool {
        assignment.endpoints_of(emitter).is_empty()
    }

    /// Energy drawn by a set of emitters.
    pub fn emitter_energy(&self,emitters:impl IntoIterator<Item = NodeIdx>) -> f64 {
        emitters.into_iter()
            .map(|e| match self.network.node(e).kind {
                NodeKind::Emitter{energy_cost,..} => energy_cost,
                _ => 0.0
            })
            .sum()
    }
}
