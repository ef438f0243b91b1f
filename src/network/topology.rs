// static layout of a level: nodes, physical links and the demands between endpoints
// 载入后不再变化，只有链路容量可以在编辑时调整

use std::collections::{BTreeMap, HashMap};

use log::info;
use serde::{Deserialize, Serialize};

use crate::dsa::graph::UnDirectedGraph;

use super::color::Color;
use super::config::EngineConfig;
use super::description::{GraphDescription, NodeKindDescription};
use super::error::{EngineError, TopologyError};

pub type NodeIdx = usize;
pub type LinkIdx = usize;

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct Position {
    pub x:f64,
    pub y:f64,
}

impl Position {
    pub fn new(x:f64,y:f64) -> Self {
        Self {x,y}
    }
    pub fn distance(&self,other:&Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone,Debug,PartialEq)]
pub enum NodeKind {
    Relay,
    Emitter {radius:f64,energy_cost:f64},
    // color is the demand this endpoint belongs to
    Endpoint {pairing:Option<String>,color:Color},
    Sink,
    Compute {energy_cost:f64},
}

impl NodeKind {
    pub fn is_emitter(&self) -> bool {
        matches!(self,NodeKind::Emitter{..})
    }
    pub fn is_endpoint(&self) -> bool {
        matches!(self,NodeKind::Endpoint{..})
    }
    pub fn is_sink(&self) -> bool {
        matches!(self,NodeKind::Sink)
    }
    /// Everything but endpoints can carry physical links.
    pub fn is_infrastructure(&self) -> bool {
        !self.is_endpoint()
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct Node {
    pub idx:NodeIdx,
    pub id:String,
    pub position:Position,
    pub kind:NodeKind,
}

impl Node {
    pub fn color(&self) -> Option<Color> {
        match &self.kind {
            NodeKind::Endpoint{color,..} => Some(*color),
            _ => None
        }
    }
}

/// A routable, capacity limited link between two infrastructure nodes.
#[derive(Clone,Debug,PartialEq)]
pub struct Link {
    pub idx:LinkIdx,
    pub id:String,
    pub a:NodeIdx,
    pub b:NodeIdx,
    pub capacity:u32,
    pub energy_cost:f64,
}

impl Link {
    pub fn other_end(&self,node:NodeIdx) -> Option<NodeIdx> {
        if node == self.a {
            Some(self.b)
        }else if node == self.b {
            Some(self.a)
        }else{
            None
        }
    }
}

/// Drawn by the editor only, kept apart so routing never sees it.
#[derive(Clone,Debug,PartialEq)]
pub struct PresentationLink {
    pub id:String,
    pub a:NodeIdx,
    pub b:NodeIdx,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum DemandKind {
    Pair {a:NodeIdx,b:NodeIdx},
    ToSink {endpoint:NodeIdx},
    // no peer and no sink, the endpoint only needs an active emitter
    CoverageOnly {endpoint:NodeIdx},
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Demand {
    pub color:Color,
    pub kind:DemandKind,
}

impl Demand {
    pub fn source(&self) -> NodeIdx {
        match self.kind {
            DemandKind::Pair{a,..} => a,
            DemandKind::ToSink{endpoint} => endpoint,
            DemandKind::CoverageOnly{endpoint} => endpoint,
        }
    }
    pub fn needs_route(&self) -> bool {
        !matches!(self.kind,DemandKind::CoverageOnly{..})
    }
}

/// Immutable graph of a level.
///
/// Nodes and links are stored in ascending identifier order, so index order
/// and identifier order agree everywhere in the engine.
#[derive(Clone,Debug)]
pub struct Network {
    nodes:Vec<Node>,
    links:Vec<Link>,
    presentation_links:Vec<PresentationLink>,
    node_index:HashMap<String,NodeIdx>,
    link_index:HashMap<String,LinkIdx>,
    graph:UnDirectedGraph,
    demands:Vec<Demand>,
    initially_active:Vec<NodeIdx>,
}

impl Network {
    pub fn from_description(description:&GraphDescription,config:&EngineConfig) -> Result<Self,TopologyError> {
        let mut sorted_nodes:Vec<_> = description.nodes.iter().collect();
        sorted_nodes.sort_by(|a,b| a.id.cmp(&b.id));

        let mut node_index = HashMap::with_capacity(sorted_nodes.len());
        for (idx,node) in sorted_nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), idx).is_some() {
                return Err(TopologyError::DuplicateNode(node.id.clone()));
            }
        }

        // endpoints grouped by pairing, unpaired ones keep their own slot
        let mut pairings:BTreeMap<&str,Vec<NodeIdx>> = BTreeMap::new();
        for (idx,node) in sorted_nodes.iter().enumerate() {
            if let NodeKindDescription::Endpoint{pairing:Some(key)} = &node.kind {
                pairings.entry(key.as_str()).or_default().push(idx);
            }
        }
        for (key,members) in pairings.iter() {
            if members.len() != 2 {
                return Err(TopologyError::InvalidPairing{pairing:key.to_string(),members:members.len()});
            }
        }
        let has_sink = sorted_nodes.iter().any(|n| matches!(n.kind,NodeKindDescription::Sink));

        // colors follow the order of each demand's first endpoint
        let mut demand_kinds = Vec::new();
        for (idx,node) in sorted_nodes.iter().enumerate() {
            match &node.kind {
                NodeKindDescription::Endpoint{pairing:Some(key)} => {
                    let members = &pairings[key.as_str()];
                    if members[0] == idx {
                        demand_kinds.push(DemandKind::Pair{a:members[0],b:members[1]});
                    }
                }
                NodeKindDescription::Endpoint{pairing:None} if has_sink => {
                    demand_kinds.push(DemandKind::ToSink{endpoint:idx});
                }
                NodeKindDescription::Endpoint{pairing:None} => {
                    demand_kinds.push(DemandKind::CoverageOnly{endpoint:idx});
                }
                _ => {}
            }
        }
        let demands:Vec<Demand> = demand_kinds.into_iter().enumerate()
            .map(|(i,kind)| Demand {color:Color(i as u32),kind})
            .collect();
        let mut endpoint_colors:HashMap<NodeIdx,Color> = HashMap::new();
        for demand in demands.iter() {
            match demand.kind {
                DemandKind::Pair{a,b} => {
                    endpoint_colors.insert(a, demand.color);
                    endpoint_colors.insert(b, demand.color);
                }
                DemandKind::ToSink{endpoint} | DemandKind::CoverageOnly{endpoint} => {
                    endpoint_colors.insert(endpoint, demand.color);
                }
            }
        }

        let mut nodes = Vec::with_capacity(sorted_nodes.len());
        let mut initially_active = Vec::new();
        for (idx,node) in sorted_nodes.iter().enumerate() {
            let kind = match &node.kind {
                NodeKindDescription::Relay => NodeKind::Relay,
                NodeKindDescription::Emitter{radius,energy_cost,active} => {
                    if !radius.is_finite() || *radius < 0.0 {
                        return Err(TopologyError::InvalidRadius(node.id.clone()));
                    }
                    if *active {
                        initially_active.push(idx);
                    }
                    NodeKind::Emitter {
                        radius:*radius,
                        energy_cost:energy_cost.unwrap_or(config.default_emitter_energy)
                    }
                }
                NodeKindDescription::Endpoint{pairing} => NodeKind::Endpoint {
                    pairing:pairing.clone(),
                    // every endpoint belongs to exactly one demand
                    color:endpoint_colors[&idx]
                },
                NodeKindDescription::Sink => NodeKind::Sink,
                NodeKindDescription::Compute{energy_cost} => NodeKind::Compute {
                    energy_cost:energy_cost.unwrap_or(config.default_emitter_energy)
                },
            };
            nodes.push(Node {
                idx,
                id:node.id.clone(),
                position:Position::new(node.x, node.y),
                kind
            });
        }

        let mut routable:Vec<_> = description.links.iter().filter(|l| !l.presentation_only).collect();
        routable.sort_by(|a,b| a.id.cmp(&b.id));
        let mut graph = UnDirectedGraph::with_capacity(nodes.len());
        for node in nodes.iter().filter(|n| n.kind.is_infrastructure()) {
            graph.push_node(node.idx);
        }
        let mut links = Vec::with_capacity(routable.len());
        let mut link_index = HashMap::with_capacity(routable.len());
        let mut presentation_links = Vec::new();

        let resolve = |link:&str,id:&str| -> Result<NodeIdx,TopologyError> {
            node_index.get(id).copied()
                .ok_or_else(|| TopologyError::DanglingLink{link:link.to_owned(),node:id.to_owned()})
        };

        for link in description.links.iter().filter(|l| l.presentation_only) {
            let a = resolve(&link.id,&link.a)?;
            let b = resolve(&link.id,&link.b)?;
            presentation_links.push(PresentationLink {id:link.id.clone(),a,b});
        }

        for (idx,link) in routable.iter().enumerate() {
            if link_index.insert(link.id.clone(), idx).is_some() {
                return Err(TopologyError::DuplicateLink(link.id.clone()));
            }
            let a = resolve(&link.id,&link.a)?;
            let b = resolve(&link.id,&link.b)?;
            if a == b {
                return Err(TopologyError::SelfLoop(link.id.clone()));
            }
            for end in [a,b] {
                if nodes[end].kind.is_endpoint() {
                    return Err(TopologyError::EndpointLink{link:link.id.clone(),endpoint:nodes[end].id.clone()});
                }
            }
            let capacity = link.capacity.unwrap_or(config.default_link_capacity);
            if capacity == 0 {
                return Err(TopologyError::ZeroCapacity(link.id.clone()));
            }
            if !graph.push_edge(a, b, idx) {
                return Err(TopologyError::ParallelLink {
                    link:link.id.clone(),
                    a:link.a.clone(),
                    b:link.b.clone()
                });
            }
            links.push(Link {
                idx,
                id:link.id.clone(),
                a,
                b,
                capacity,
                energy_cost:link.energy_cost.unwrap_or(config.default_link_energy)
            });
        }
        graph.shrink_to_fit();

        info!(
            "loaded network: {} nodes, {} links ({} presentation only), {} demands",
            nodes.len(),links.len(),presentation_links.len(),demands.len()
        );

        Ok(Self {
            nodes,
            links,
            presentation_links,
            node_index,
            link_index,
            graph,
            demands,
            initially_active
        })
    }

    pub fn from_json(json:&str,config:&EngineConfig) -> Result<Self,TopologyError> {
        Self::from_description(&GraphDescription::from_json(json)?, config)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn links(&self) -> &[Link] {
        &self.links
    }
    pub fn presentation_links(&self) -> &[PresentationLink] {
        &self.presentation_links
    }
    pub fn graph(&self) -> &UnDirectedGraph {
        &self.graph
    }
    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }
    pub fn demand(&self,color:Color) -> Option<&Demand> {
        self.demands.get(color.0 as usize)
    }
    pub fn initially_active(&self) -> &[NodeIdx] {
        &self.initially_active
    }

    // indices handed out by this network are always in range
    pub fn node(&self,idx:NodeIdx) -> &Node {
        &self.nodes[idx]
    }
    pub fn link(&self,idx:LinkIdx) -> &Link {
        &self.links[idx]
    }
    pub fn node_idx(&self,id:&str) -> Result<NodeIdx,EngineError> {
        self.node_index.get(id).copied().ok_or_else(|| EngineError::UnknownNode(id.to_owned()))
    }
    pub fn link_idx(&self,id:&str) -> Result<LinkIdx,EngineError> {
        self.link_index.get(id).copied().ok_or_else(|| EngineError::UnknownLink(id.to_owned()))
    }
    /// Indices from outside the engine are checked before use.
    pub fn check_node(&self,idx:NodeIdx) -> Result<(),EngineError> {
        if idx < self.nodes.len() {
            return Ok(());
        }
        Err(EngineError::UnknownNode(format!("#{idx}")))
    }
    pub fn node_id(&self,idx:NodeIdx) -> &str {
        &self.nodes[idx].id
    }
    pub fn link_between(&self,a:NodeIdx,b:NodeIdx) -> Option<&Link> {
        self.graph.edge_between(a, b).map(|idx| &self.links[idx])
    }

    pub fn emitters(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| n.kind.is_emitter())
    }
    pub fn endpoints(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| n.kind.is_endpoint())
    }
    pub fn sinks(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| n.kind.is_sink())
    }

    /// Where a route starting at `node` should end: the paired endpoint, or
    /// any sink for unpaired endpoints. Empty for coverage only demands and
    /// non endpoints.
    pub fn goals_of(&self,node:NodeIdx) -> Vec<NodeIdx> {
        let Some(color) = self.nodes[node].color() else {return vec![]};
        let Some(demand) = self.demand(color) else {return vec![]};
        match demand.kind {
            DemandKind::Pair{a,b} if a == node => vec![b],
            DemandKind::Pair{a,..} => vec![a],
            DemandKind::ToSink{..} => self.sinks().map(|n| n.idx).collect(),
            DemandKind::CoverageOnly{..} => vec![],
        }
    }

    pub(crate) fn set_link_capacity(&mut self,link:LinkIdx,capacity:u32) {
        self.links[link].capacity = capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::description::NodeKindDescription as K;
    use crate::network::fixtures::{emitter,endpoint};

    fn sample() -> GraphDescription {
        let mut d = GraphDescription::default();
        d.push_node("b_ant", 10.0, 0.0, emitter(3.0))
            .push_node("a_ant", 0.0, 0.0, emitter(3.0))
            .push_node("r", 5.0, 0.0, K::Relay)
            .push_node("u2", 11.0, 1.0, endpoint("p"))
            .push_node("u1", 1.0, 1.0, endpoint("p"))
            .push_node("lone", 0.0, 2.0, K::Endpoint{pairing:None})
            .push_node("gw", 5.0, 5.0, K::Sink)
            .push_link("l2", "r", "b_ant", Some(2))
            .push_link("l1", "a_ant", "r", None)
            .push_link("l3", "r", "gw", None);
        d
    }

    #[test]
    fn test_indices_follow_identifier_order() {
        let network = Network::from_description(&sample(), &EngineConfig::default()).unwrap();
        let ids:Vec<&str> = network.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids,vec!["a_ant","b_ant","gw","lone","r","u1","u2"]);
        assert_eq!(network.link(0).id,"l1");
        assert_eq!(network.link(network.link_idx("l2").unwrap()).capacity,2);
        assert_eq!(network.link(0).capacity,1);
        assert_eq!(network.link_between(4, 0).map(|l| l.id.as_str()),Some("l1"));
    }
    #[test]
    fn test_demands_and_colors() {
        let network = Network::from_description(&sample(), &EngineConfig::default()).unwrap();
        let lone = network.node_idx("lone").unwrap();
        let u1 = network.node_idx("u1").unwrap();
        let u2 = network.node_idx("u2").unwrap();
        // lone sorts before u1, so it gets the first color
        assert_eq!(network.demands()[0].kind,DemandKind::ToSink{endpoint:lone});
        assert_eq!(network.demands()[1].kind,DemandKind::Pair{a:u1,b:u2});
        assert_eq!(network.node(u1).color(),network.node(u2).color());
        assert_eq!(network.goals_of(u2),vec![u1]);
        assert_eq!(network.goals_of(lone),vec![network.node_idx("gw").unwrap()]);
        assert_eq!(network.initially_active().len(),2);
    }
    #[test]
    fn test_presentation_links_are_not_routable() {
        let mut d = sample();
        d.links.push(crate::network::description::LinkDescription {
            id:"v".into(),a:"u1".into(),b:"a_ant".into(),
            capacity:None,energy_cost:None,presentation_only:true
        });
        let network = Network::from_description(&d, &EngineConfig::default()).unwrap();
        assert_eq!(network.presentation_links().len(),1);
        assert!(network.link_between(network.node_idx("u1").unwrap(), 0).is_none());
        assert!(network.link_idx("v").is_err());
    }
    #[test]
    fn test_rejects_bad_layouts() {
        let config = EngineConfig::default();
        let mut d = sample();
        d.push_link("l1", "a_ant", "gw", None);
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::DuplicateLink(_))));

        let mut d = sample();
        d.push_link("dup", "b_ant", "r", None);
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::ParallelLink{..})));

        let mut d = sample();
        d.push_link("x", "r", "nowhere", None);
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::DanglingLink{..})));

        let mut d = sample();
        d.push_link("wired", "u1", "r", None);
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::EndpointLink{..})));

        let mut d = sample();
        d.push_link("zero", "a_ant", "gw", Some(0));
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::ZeroCapacity(_))));

        let mut d = sample();
        d.push_node("u3", 3.0, 3.0, endpoint("solo"));
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::InvalidPairing{..})));

        let mut d = sample();
        d.push_node("r", 3.0, 3.0, K::Relay);
        assert!(matches!(Network::from_description(&d,&config),Err(TopologyError::DuplicateNode(_))));
    }
}
