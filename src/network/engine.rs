use std::collections::BTreeSet;

use log::{debug, info};
use serde::Serialize;

use super::color::{Color, ConnectionId};
use super::config::EngineConfig;
use super::connection::{AutoConnectReport, Connection, ConnectionManager, Extension};
use super::coverage::{CoverageRelation, GeometricCoverage};
use super::description::GraphDescription;
use super::error::{EngineError, Result, TopologyError};
use super::optimizer::CoverageOptimizer;
use super::snapshot::{SavedSolution, Snapshot};
use super::state::EngineState;
use super::topology::{DemandKind, Network, NodeIdx, NodeKind};

/// Energy drawn by the current solution.
#[derive(Clone,Copy,Debug,PartialEq,Default,Serialize)]
pub struct EnergyReport {
    pub links:f64,
    pub emitters:f64,
    pub compute:f64,
    pub total:f64,
}

/// A level in play: the fixed network plus everything the player changed.
///
/// Intents name nodes and links by id, the way the editor and the level
/// files do.
pub struct Engine {
    config:EngineConfig,
    network:Network,
    coverage:GeometricCoverage,
    state:EngineState,
}

impl Engine {
    pub fn new(description:&GraphDescription,config:EngineConfig) -> std::result::Result<Self,TopologyError> {
        let network = Network::from_description(description, &config)?;
        let coverage = GeometricCoverage::new(&network, &config);
        let state = EngineState::new(&network);
        Ok(Self {config,network,coverage,state})
    }
    pub fn from_json(json:&str,config:EngineConfig) -> std::result::Result<Self,TopologyError> {
        Self::new(&GraphDescription::from_json(json)?, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    pub fn network(&self) -> &Network {
        &self.network
    }
    pub fn coverage(&self) -> &GeometricCoverage {
        &self.coverage
    }
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn manager(&mut self) -> ConnectionManager<'_> {
        ConnectionManager::new(&self.network, &self.coverage, &self.config, &mut self.state)
    }
    fn optimizer(&self) -> CoverageOptimizer<'_,GeometricCoverage> {
        CoverageOptimizer::new(&self.network, &self.coverage)
    }
    fn node(&self,id:&str) -> Result<NodeIdx> {
        self.network.node_idx(id)
    }
    fn ids(&self,nodes:impl IntoIterator<Item = NodeIdx>) -> Vec<String> {
        nodes.into_iter().map(|n| self.network.node_id(n).to_owned()).collect()
    }

    pub fn begin_connection(&mut self,source:&str) -> Result<ConnectionId> {
        let source = self.node(source)?;
        self.manager().begin_connection(source)
    }
    pub fn available_hops(&mut self,id:ConnectionId) -> Result<Vec<String>> {
        let hops = self.manager().available_hops(id)?;
        Ok(self.ids(hops))
    }
    pub fn extend_to_next_hop(&mut self,id:ConnectionId,node:&str) -> Result<Extension> {
        let node = self.node(node)?;
        self.manager().extend_to_next_hop(id, node)
    }
    pub fn complete_connection(&mut self,id:ConnectionId,destination:&str) -> Result<()> {
        let destination = self.node(destination)?;
        self.manager().complete_connection(id, destination)
    }
    pub fn auto_connect(&mut self,source:&str,destination:&str) -> Result<ConnectionId> {
        let (source,destination) = (self.node(source)?,self.node(destination)?);
        Ok(self.manager().auto_connect(source, destination)?.id)
    }
    pub fn release_connection(&mut self,id:ConnectionId) -> Result<()> {
        self.manager().release_connection(id).map(|_| ())
    }
    pub fn reroute(&mut self,id:ConnectionId) -> Result<ConnectionId> {
        Ok(self.manager().reroute(id)?.id)
    }
    pub fn rebind_endpoint(&mut self,endpoint:&str,emitter:&str) -> Result<()> {
        let (endpoint,emitter) = (self.node(endpoint)?,self.node(emitter)?);
        self.manager().rebind_endpoint(endpoint, emitter)
    }
    pub fn auto_connect_all(&mut self) -> AutoConnectReport {
        self.manager().auto_connect_all()
    }

    /// Switches an emitter on or off and returns whether it is now on. An
    /// emitter still serving endpoints can't be switched off.
    pub fn toggle_emitter(&mut self,emitter:&str) -> Result<bool> {
        let idx = self.node(emitter)?;
        if !self.network.node(idx).kind.is_emitter() {
            return Err(EngineError::NotAnEmitter(emitter.to_owned()));
        }
        if !self.state.active_emitters.contains(idx) {
            self.state.active_emitters.activate(idx);
            debug!("emitter {emitter} on");
            return Ok(true);
        }
        if !self.optimizer().can_deactivate(idx, &self.state.assignment) {
            let endpoints = self.ids(self.state.assignment.endpoints_of(idx));
            return Err(EngineError::EmitterInUse{emitter:emitter.to_owned(),endpoints});
        }
        self.state.active_emitters.deactivate(idx);
        debug!("emitter {emitter} off");
        Ok(false)
    }

    /// Changes a link's capacity, never below what it carries right now.
    pub fn set_link_capacity(&mut self,link:&str,capacity:u32) -> Result<()> {
        let idx = self.network.link_idx(link)?;
        let occupied = self.state.ledger.occupant_count(idx);
        if capacity == 0 || (capacity as usize) < occupied {
            return Err(EngineError::CapacityBelowOccupancy{link:link.to_owned(),occupied,requested:capacity});
        }
        self.network.set_link_capacity(idx, capacity);
        Ok(())
    }

    /// Greedy emitter cover of every endpoint, in node order.
    pub fn greedy_cover(&self) -> Result<Vec<String>> {
        let endpoints:Vec<NodeIdx> = self.network.endpoints().map(|n| n.idx).collect();
        let emitters:Vec<NodeIdx> = self.network.emitters().map(|n| n.idx).collect();
        let cover:BTreeSet<NodeIdx> = self.optimizer().greedy_cover(&endpoints, &emitters)?;
        Ok(self.ids(cover))
    }

    /// Replaces the player's solution with the computed one: only the greedy
    /// cover switched on, endpoints bound by density, every demand routed
    /// again. Nothing changes when no cover exists.
    pub fn apply_greedy_cover(&mut self) -> Result<AutoConnectReport> {
        let endpoints:Vec<NodeIdx> = self.network.endpoints().map(|n| n.idx).collect();
        let emitters:Vec<NodeIdx> = self.network.emitters().map(|n| n.idx).collect();
        let cover = self.optimizer().greedy_cover(&endpoints, &emitters)?;

        self.manager().release_all();
        self.state.active_emitters = cover.into_iter().collect();
        self.state.assignment = self.optimizer().assign_by_density(&endpoints, &self.state.active_emitters);
        let report = self.manager().auto_connect_all();
        info!("greedy solution applied with {} emitter(s)",self.state.active_emitters.len());
        Ok(report)
    }

    pub fn capture(&self) -> Snapshot {
        Snapshot::capture(&self.state)
    }
    pub fn restore(&mut self,snapshot:&Snapshot) -> Result<()> {
        snapshot.restore(&self.network, &mut self.state)
    }
    pub fn capture_for_save(&self) -> SavedSolution {
        SavedSolution::capture(&self.network, &self.state)
    }
    pub fn apply_external_solution(&mut self,solution:&SavedSolution) -> Result<()> {
        solution.apply(&self.network, &self.coverage, &mut self.state)
    }

    pub fn connections(&self) -> &[Connection] {
        self.state.connections()
    }
    /// Occupied links with their colors, in link order.
    pub fn link_occupancy(&self) -> Vec<(&str,&[Color])> {
        self.state.ledger.occupied_links().into_iter()
            .map(|l| (self.network.link(l).id.as_str(),self.state.ledger.occupants(l)))
            .collect()
    }
    pub fn active_emitters(&self) -> Vec<&str> {
        self.state.active_emitters.iter().map(|n| self.network.node_id(n)).collect()
    }

    pub fn energy(&self) -> EnergyReport {
        let links = self.state.ledger.link_energy(&self.network);
        let emitters = self.optimizer().emitter_energy(self.state.active_emitters.iter());
        // a compute node draws power once, however many paths cross it
        let mut busy = BTreeSet::new();
        for connection in self.state.connections.iter() {
            busy.extend(connection.nodes.iter().copied());
        }
        let compute:f64 = busy.into_iter()
            .map(|n| match self.network.node(n).kind {
                NodeKind::Compute{energy_cost} => energy_cost,
                _ => 0.0
            })
            .sum();
        EnergyReport {links,emitters,compute,total:links + emitters + compute}
    }

    /// Demands not met yet, by color. Routed demands need a complete
    /// connection, coverage only ones an active emitter in range.
    pub fn unsatisfied_demands(&self) -> Vec<Color> {
        self.network.demands().iter()
            .filter(|demand| match demand.kind {
                DemandKind::Pair{..} | DemandKind::ToSink{..} => {
                    !self.state.connection_of_color(demand.color).is_some_and(|c| c.complete)
                }
                DemandKind::CoverageOnly{endpoint} => {
                    !self.state.active_emitters.iter().any(|e| self.coverage.covers(e, endpoint))
                }
            })
            .map(|demand| demand.color)
            .collect()
    }

    /// Every demand met, with energy no worse than `min_energy`.
    pub fn is_solved(&self,min_energy:f64) -> bool {
        self.unsatisfied_demands().is_empty() && self.energy().total <= min_energy + self.config.energy_epsilon
    }
}
