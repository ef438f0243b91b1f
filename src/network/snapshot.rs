// backups of the play state, and solutions stored outside the engine

use std::collections::BTreeSet;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::color::Color;
use super::connection::{Connection, claim_route};
use super::coverage::GeometricCoverage;
use super::error::{EngineError, Result};
use super::ledger::UsageLedger;
use super::optimizer::CoverageOptimizer;
use super::state::{ActiveEmitterSet, CoverageAssignment, EngineState};
use super::topology::{Network, NodeIdx};

/// Independent copy of everything a player can change.
///
/// Owning its collections, a snapshot is unaffected by whatever happens to
/// the live state after the capture and can be restored any number of times.
#[derive(Clone,Debug,PartialEq)]
pub struct Snapshot {
    ledger:UsageLedger,
    connections:Vec<Connection>,
    active_emitters:ActiveEmitterSet,
    assignment:CoverageAssignment,
}

impl Snapshot {
    pub fn capture(state:&EngineState) -> Self {
        Self {
            ledger:state.ledger.clone(),
            connections:state.connections.clone(),
            active_emitters:state.active_emitters.clone(),
            assignment:state.assignment.clone(),
        }
    }

    /// Puts the captured collections back in place of the live ones.
    ///
    /// Link capacities may have been lowered since the capture, a snapshot
    /// that no longer fits is refused and the live state left alone.
    /// Connection ids handed out in between stay retired.
    pub fn restore(&self,network:&Network,state:&mut EngineState) -> Result<()> {
        if let Some(link) = self.ledger.overloaded_link(network) {
            let link = network.link(link);
            warn!("snapshot overloads link {}",link.id);
            return Err(EngineError::InvalidSnapshotApplication {
                reason:format!(
                    "link {} would carry {} connection(s) with capacity {}",
                    link.id,self.ledger.occupant_count(link.idx),link.capacity
                )
            });
        }
        state.ledger = self.ledger.clone();
        state.connections = self.connections.clone();
        state.active_emitters = self.active_emitters.clone();
        state.assignment = self.assignment.clone();
        // colors of restored infrastructure routes must not be handed out again
        if let Some(top) = self.connections.iter().map(|c| c.color.0).max() {
            state.next_free_color = state.next_free_color.max(top + 1);
        }
        info!("restored snapshot with {} connection(s)",self.connections.len());
        Ok(())
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }
    pub fn active_emitters(&self) -> &ActiveEmitterSet {
        &self.active_emitters
    }
    pub fn assignment(&self) -> &CoverageAssignment {
        &self.assignment
    }
}

/// One stored route: its color and the node ids it visits in order.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
pub struct StoredPath {
    pub color:Color,
    pub path:Vec<String>,
}

/// A solution kept outside the engine, usually the known best one of a
/// level, in terms of node ids only.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
pub struct SavedSolution {
    pub paths:Vec<StoredPath>,
    #[serde(default)]
    pub active_emitters:Vec<String>,
}

fn invalid(reason:String) -> EngineError {
    warn!("stored solution rejected: {reason}");
    EngineError::InvalidSnapshotApplication{reason}
}

// an endpoint path must run between the two ends of its color's demand,
// colors without a demand belong to routes started on infrastructure
fn check_ends(network:&Network,color:Color,nodes:&[NodeIdx]) -> Result<()> {
    let (first,last) = (nodes[0],nodes[nodes.len() - 1]);
    let source = network.node(first);
    match network.demand(color) {
        Some(_) if source.color() == Some(color) && network.goals_of(first).contains(&last) => Ok(()),
        Some(_) => Err(EngineError::InvalidHop {
            from:network.node_id(first).to_owned(),
            to:network.node_id(last).to_owned()
        }),
        None if source.kind.is_endpoint() => Err(EngineError::UnknownColor(color)),
        None => Ok(())
    }
}

impl SavedSolution {
    /// Complete connections and active emitters of `state`.
    pub fn capture(network:&Network,state:&EngineState) -> Self {
        let paths = state.completed()
            .map(|c| StoredPath {
                color:c.color,
                path:c.nodes.iter().map(|n| network.node_id(*n).to_owned()).collect()
            })
            .collect();
        let active_emitters = state.active_emitters.iter()
            .map(|n| network.node_id(n).to_owned())
            .collect();
        Self {paths,active_emitters}
    }

    pub fn from_json(json:&str) -> std::result::Result<Self,serde_json::Error> {
        serde_json::from_str(json)
    }
    pub fn to_json(&self) -> std::result::Result<String,serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Replaces the live state with this solution, claiming every link of
    /// every path in order.
    ///
    /// Everything is rebuilt on the side first, so a solution that names
    /// unknown nodes or doesn't fit the current capacities fails with
    /// [`EngineError::InvalidSnapshotApplication`] and changes nothing.
    pub fn apply(&self,network:&Network,coverage:&GeometricCoverage,state:&mut EngineState) -> Result<()> {
        let mut active = ActiveEmitterSet::new();
        for id in self.active_emitters.iter() {
            let emitter = network.node_idx(id).map_err(|e| invalid(e.to_string()))?;
            if !network.node(emitter).kind.is_emitter() {
                return Err(invalid(format!("{id} is not an emitter")));
            }
            active.activate(emitter);
        }

        let mut ledger = UsageLedger::new();
        let mut assignment = CoverageAssignment::new();
        let mut routes:Vec<(Color,Vec<NodeIdx>,Vec<usize>)> = Vec::with_capacity(self.paths.len());
        for stored in self.paths.iter() {
            if routes.iter().any(|(color,_,_)| *color == stored.color) {
                return Err(invalid(format!("{} is stored twice",stored.color)));
            }
            if stored.path.len() < 2 {
                return Err(invalid(format!("path of {} has fewer than two nodes",stored.color)));
            }
            let nodes = stored.path.iter()
                .map(|id| network.node_idx(id))
                .collect::<Result<Vec<NodeIdx>>>()
                .map_err(|e| invalid(e.to_string()))?;
            check_ends(network, stored.color, &nodes).map_err(|e| invalid(format!("{}: {e}",stored.color)))?;
            if routes.iter().any(|(_,other,_)| other[0] == nodes[0]) {
                return Err(invalid(format!("{} starts a second path",stored.path[0])));
            }
            let route = claim_route(network, coverage, &mut ledger, &active, stored.color, &nodes)
                .map_err(|e| invalid(format!("{}: {e}",stored.color)))?;
            for (endpoint,emitter) in route.bindings {
                assignment.bind(endpoint, emitter);
            }
            routes.push((stored.color,nodes,route.links));
        }

        if self.differs_from_greedy(network, coverage) {
            warn!("stored emitters {:?} differ from today's greedy cover, the solution may use another tie-break",self.active_emitters);
        }
        let mut connections = Vec::with_capacity(routes.len());
        for (color,nodes,links) in routes {
            connections.push(Connection {
                id:state.allocate_connection_id(),
                color,
                nodes,
                links,
                complete:true
            });
            state.next_free_color = state.next_free_color.max(color.0 + 1);
        }
        state.ledger = ledger;
        state.connections = connections;
        state.active_emitters = active;
        state.assignment = assignment;
        info!("applied stored solution: {} path(s), {} emitter(s)",self.paths.len(),self.active_emitters.len());
        Ok(())
    }

    /// Whether the stored emitters are not what the greedy cover picks on
    /// this network, typically a solution made under another tie-break.
    pub fn differs_from_greedy(&self,network:&Network,coverage:&GeometricCoverage) -> bool {
        let endpoints:Vec<NodeIdx> = network.endpoints().map(|n| n.idx).collect();
        let emitters:Vec<NodeIdx> = network.emitters().map(|n| n.idx).collect();
        let Ok(cover) = CoverageOptimizer::new(network, coverage).greedy_cover(&endpoints, &emitters) else {
            return false;
        };
        let stored:BTreeSet<NodeIdx> = self.active_emitters.iter()
            .filter_map(|id| network.node_idx(id).ok())
            .collect();
        stored != cover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::config::EngineConfig;
    use crate::network::connection::ConnectionManager;
    use crate::network::fixtures::{bridge, chain_cover};

    fn ids(path:&[&str]) -> Vec<String> {
        path.iter().map(|id| id.to_string()).collect()
    }

    fn routed(network:&Network,coverage:&GeometricCoverage) -> EngineState {
        let config = EngineConfig::default();
        let mut state = EngineState::new(network);
        let report = ConnectionManager::new(network, coverage, &config, &mut state).auto_connect_all();
        assert_eq!(report.connected,vec![Color(0),Color(1)]);
        state
    }

    #[test]
    fn test_restore_survives_later_changes() {
        let network = bridge(2);
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let mut state = routed(&network, &coverage);
        let snapshot = Snapshot::capture(&state);

        let config = EngineConfig::default();
        ConnectionManager::new(&network, &coverage, &config, &mut state).release_all();
        assert!(state.ledger().is_empty());
        assert_eq!(snapshot.connections().len(),2);

        snapshot.restore(&network, &mut state).unwrap();
        assert_eq!(Snapshot::capture(&state),snapshot);
        ConnectionManager::new(&network, &coverage, &config, &mut state).release_all();
        snapshot.restore(&network, &mut state).unwrap();
        assert_eq!(state.connections(),snapshot.connections());
        assert_eq!(state.ledger().occupant_count(network.link_idx("l_bridge").unwrap()),2);
    }

    #[test]
    fn test_restore_refuses_overloaded_links() {
        let mut network = bridge(2);
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let mut state = routed(&network, &coverage);
        let snapshot = Snapshot::capture(&state);
        let config = EngineConfig::default();
        ConnectionManager::new(&network, &coverage, &config, &mut state).release_all();
        let before = state.clone();

        network.set_link_capacity(network.link_idx("l_bridge").unwrap(), 1);
        let err = snapshot.restore(&network, &mut state).unwrap_err();
        assert!(matches!(err,EngineError::InvalidSnapshotApplication{..}));
        assert_eq!(state,before);
    }

    #[test]
    fn test_saved_solution_round_trip() {
        let network = bridge(2);
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let state = routed(&network, &coverage);
        let saved = SavedSolution::capture(&network, &state);
        assert_eq!(saved.paths[0].path,vec!["u1a","ant_l","hub_l","hub_r","ant_r","u1b"]);
        assert_eq!(saved.active_emitters,vec!["ant_l","ant_r"]);

        let json = saved.to_json().unwrap();
        assert!(json.contains("\"color\": 0"));
        let loaded = SavedSolution::from_json(&json).unwrap();

        let mut fresh = EngineState::new(&network);
        loaded.apply(&network, &coverage, &mut fresh).unwrap();
        assert_eq!(fresh.ledger(),state.ledger());
        assert_eq!(fresh.assignment(),state.assignment());
        assert_eq!(fresh.active_emitters(),state.active_emitters());
        let paths:Vec<&[NodeIdx]> = fresh.connections().iter().map(|c| c.nodes.as_slice()).collect();
        let expected:Vec<&[NodeIdx]> = state.connections().iter().map(|c| c.nodes.as_slice()).collect();
        assert_eq!(paths,expected);
    }

    #[test]
    fn test_stale_solution_leaves_state_alone() {
        let mut network = bridge(2);
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let saved = SavedSolution::capture(&network, &routed(&network, &coverage));

        network.set_link_capacity(network.link_idx("l_bridge").unwrap(), 1);
        let config = EngineConfig::default();
        let mut state = EngineState::new(&network);
        let (u3a,u3b) = (network.node_idx("u3a").unwrap(),network.node_idx("u3b").unwrap());
        ConnectionManager::new(&network, &coverage, &config, &mut state).auto_connect(u3a, u3b).unwrap();
        let before = state.clone();

        let err = saved.apply(&network, &coverage, &mut state).unwrap_err();
        let EngineError::InvalidSnapshotApplication{reason} = err else {panic!("unexpected {err}")};
        assert!(reason.contains("l_bridge"));
        assert_eq!(state,before);
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        let network = bridge(2);
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let mut state = EngineState::new(&network);
        let saved = SavedSolution {
            paths:vec![StoredPath{color:Color(0),path:vec!["u1a".into(),"nowhere".into()]}],
            active_emitters:vec!["ant_l".into()],
        };
        assert!(matches!(saved.apply(&network, &coverage, &mut state),Err(EngineError::InvalidSnapshotApplication{..})));
        let saved = SavedSolution {paths:vec![],active_emitters:vec!["hub_l".into()]};
        assert!(matches!(saved.apply(&network, &coverage, &mut state),Err(EngineError::InvalidSnapshotApplication{..})));
        assert_eq!(state,EngineState::new(&network));
    }

    #[test]
    fn test_paths_must_join_their_own_demand() {
        let network = bridge(2);
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let mut state = EngineState::new(&network);
        let antennas = ids(&["ant_l","ant_r"]);
        let stored = |color:u32,path:&[&str]| SavedSolution {
            paths:vec![StoredPath{color:Color(color),path:ids(path)}],
            active_emitters:antennas.clone(),
        };

        // color 0 is the u1 pair, not the u2 one
        let err = stored(0, &["u2a","ant_l","hub_l","hub_r","ant_r","u2b"]).apply(&network, &coverage, &mut state).unwrap_err();
        let EngineError::InvalidSnapshotApplication{reason} = err else {panic!("unexpected {err}")};
        assert!(reason.contains("u2a"));
        // stops at the first emitter
        let err = stored(0, &["u1a","ant_l"]).apply(&network, &coverage, &mut state).unwrap_err();
        assert!(matches!(err,EngineError::InvalidSnapshotApplication{..}));
        let err = stored(7, &["u1a","ant_l","hub_l","hub_r","ant_r","u1b"]).apply(&network, &coverage, &mut state).unwrap_err();
        let EngineError::InvalidSnapshotApplication{reason} = err else {panic!("unexpected {err}")};
        assert!(reason.contains("has no demand"));
        let twice = SavedSolution {
            paths:vec![
                StoredPath{color:Color(3),path:ids(&["hub_l","hub_r"])},
                StoredPath{color:Color(4),path:ids(&["hub_l","ant_l"])},
            ],
            active_emitters:antennas.clone(),
        };
        assert!(matches!(twice.apply(&network, &coverage, &mut state),Err(EngineError::InvalidSnapshotApplication{..})));
        assert_eq!(state,EngineState::new(&network));

        // either end may come first, infrastructure routes keep their own colors
        let mixed = SavedSolution {
            paths:vec![
                StoredPath{color:Color(0),path:ids(&["u1b","ant_r","hub_r","hub_l","ant_l","u1a"])},
                StoredPath{color:Color(3),path:ids(&["hub_l","hub_r"])},
            ],
            active_emitters:antennas,
        };
        mixed.apply(&network, &coverage, &mut state).unwrap();
        assert_eq!(state.connections().len(),2);
        assert_eq!(state.allocate_color(),Color(4));
    }

    #[test]
    fn test_other_tie_breaks_are_flagged_but_applied() {
        let network = chain_cover();
        let coverage = GeometricCoverage::new(&network, &EngineConfig::default());
        let greedy = SavedSolution {paths:vec![],active_emitters:ids(&["c","a"])};
        assert!(!greedy.differs_from_greedy(&network, &coverage));
        let other = SavedSolution {paths:vec![],active_emitters:ids(&["a","b","c"])};
        assert!(other.differs_from_greedy(&network, &coverage));

        let mut state = EngineState::new(&network);
        other.apply(&network, &coverage, &mut state).unwrap();
        assert_eq!(state.active_emitters().len(),3);
    }
}
