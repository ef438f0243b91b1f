use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::dsa::bitset::BitSet;

use super::config::RoutingWeight;
use super::ledger::UsageLedger;
use super::topology::{Link, LinkIdx, Network, NodeIdx};

/// A route over physical links, `links[i]` joins `nodes[i]` and `nodes[i+1]`.
#[derive(Clone,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub struct Path {
    pub nodes:Vec<NodeIdx>,
    pub links:Vec<LinkIdx>,
    pub cost:u64,
}

impl Path {
    pub fn hops(&self) -> usize {
        self.links.len()
    }
}

// length weights are kept integral so ties compare exactly
const LENGTH_SCALE:f64 = 1000.0;

/// Shortest routes over links that still have room.
///
/// Saturated links are walls: they are skipped during the search, never
/// priced. Nodes passed to [`PathFinder::avoiding`] are never entered.
pub struct PathFinder<'a> {
    network:&'a Network,
    ledger:&'a UsageLedger,
    weight:RoutingWeight,
    avoid:BitSet,
}

impl<'a> PathFinder<'a> {
    pub fn new(network:&'a Network,ledger:&'a UsageLedger) -> Self {
        Self {network,ledger,weight:RoutingWeight::Hops,avoid:BitSet::new()}
    }
    pub fn with_weight(mut self,weight:RoutingWeight) -> Self {
        self.weight = weight;
        self
    }
    pub fn avoiding(mut self,nodes:&[NodeIdx]) -> Self {
        let mut avoid = BitSet::with_len(self.network.nodes().len(), false);
        for node in nodes {
            avoid.store_at(*node, true);
        }
        self.avoid = avoid;
        self
    }

    fn traversable(&self,link:&Link) -> bool {
        !self.ledger.is_saturated(link)
    }
    fn link_cost(&self,link:&Link) -> u64 {
        match self.weight {
            RoutingWeight::Hops => 1,
            RoutingWeight::Length => {
                let a = &self.network.node(link.a).position;
                let b = &self.network.node(link.b).position;
                ((a.distance(b)*LENGTH_SCALE).round() as u64).max(1)
            }
        }
    }

    /// Dijkstra from `from` to `to`. `None` is an ordinary answer: every
    /// route is cut by saturated links or avoided nodes.
    ///
    /// Equal cost candidates are settled in ascending node order, which
    /// makes the chosen route stable across runs.
    pub fn shortest_path(&self,from:NodeIdx,to:NodeIdx) -> Option<Path> {
        let graph = self.network.graph();
        if !graph.contains_node(from) || !graph.contains_node(to) || self.avoid.contains(to) {
            return None;
        }
        if from == to {
            return Some(Path {nodes:vec![from],links:vec![],cost:0});
        }
        let len = self.network.nodes().len();
        let mut dist = vec![u64::MAX;len];
        let mut prev:Vec<Option<(NodeIdx,LinkIdx)>> = vec![None;len];
        let mut heap = BinaryHeap::new();
        dist[from] = 0;
        heap.push(Reverse((0u64,from)));

        while let Some(Reverse((cost,node))) = heap.pop() {
            if cost != dist[node] {
                continue;
            }
            if node == to {
                break;
            }
            for &(next,label) in graph.neighbours(node) {
                if self.avoid.contains(next) {
                    continue;
                }
                let link = self.network.link(label);
                if !self.traversable(link) {
                    continue;
                }
                let next_cost = cost.saturating_add(self.link_cost(link));
                if next_cost < dist[next] {
                    dist[next] = next_cost;
                    prev[next] = Some((node,label));
                    heap.push(Reverse((next_cost,next)));
                }
            }
        }

        if dist[to] == u64::MAX {
            return None;
        }
        let mut nodes = vec![to];
        let mut links = vec![];
        let mut current = to;
        while let Some((before,link)) = prev[current] {
            nodes.push(before);
            links.push(link);
            current = before;
        }
        nodes.reverse();
        links.reverse();
        debug_assert_eq!(nodes.first(),Some(&from));
        Some(Path {nodes,links,cost:dist[to]})
    }

    /// Neighbours of `current` one usable link away, ascending.
    pub fn next_hop_frontier(&self,current:NodeIdx) -> Vec<NodeIdx> {
        self.network.graph().neighbours(current).iter()
            .filter(|(next,label)| !self.avoid.contains(*next) && self.traversable(self.network.link(*label)))
            .map(|(next,_)| *next)
            .collect()
    }

    /// Hop distance from every node to the nearest of `goals` over usable links.
    pub(crate) fn remaining_hops(&self,goals:&[NodeIdx]) -> Vec<usize> {
        let mut best = vec![usize::MAX;self.network.nodes().len()];
        for goal in goals {
            let hops = self.network.graph().bfs_hops(*goal, |label| self.traversable(self.network.link(label)));
            for (node,h) in hops {
                best[node] = best[node].min(h);
            }
        }
        best
    }

    /// The frontier ordered for suggestion: goals themselves first, then by
    /// fewest remaining hops to a goal, then by node order.
    pub fn ranked_next_hops(&self,current:NodeIdx,goals:&[NodeIdx]) -> Vec<NodeIdx> {
        let remaining = self.remaining_hops(goals);
        let mut frontier = self.next_hop_frontier(current);
        frontier.sort_by_key(|n| (!goals.contains(n),remaining[*n],*n));
        frontier
    }
}
