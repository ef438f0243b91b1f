use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::color::{Color, ConnectionId};
use super::config::EngineConfig;
use super::coverage::{CoverageRelation, GeometricCoverage};
use super::error::{EngineError, Result};
use super::ledger::UsageLedger;
use super::path_finder::PathFinder;
use super::state::{ActiveEmitterSet, EngineState};
use super::topology::{DemandKind, LinkIdx, Network, NodeIdx, NodeKind};

/// A colored path, complete or still being drawn.
///
/// `nodes` is never empty. Physical hops appear in `links` in path order,
/// radio hops between an endpoint and its emitter have no link.
#[derive(Clone,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub struct Connection {
    pub id:ConnectionId,
    pub color:Color,
    pub nodes:Vec<NodeIdx>,
    pub links:Vec<LinkIdx>,
    pub complete:bool,
}

impl Connection {
    pub fn source(&self) -> NodeIdx {
        self.nodes[0]
    }
    pub fn frontier(&self) -> NodeIdx {
        self.nodes[self.nodes.len() - 1]
    }
    /// (endpoint, emitter) pairs joined by radio at either end of the path.
    pub fn radio_hops(&self,network:&Network) -> Vec<(NodeIdx,NodeIdx)> {
        let mut hops = vec![];
        if self.nodes.len() < 2 {
            return hops;
        }
        let (first,second) = (self.nodes[0],self.nodes[1]);
        if network.node(first).kind.is_endpoint() {
            hops.push((first,second));
        }
        let (before_last,last) = (self.nodes[self.nodes.len() - 2],self.frontier());
        if network.node(last).kind.is_endpoint() && last != first {
            hops.push((last,before_last));
        }
        hops
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Extension {
    Extended,
    // the hop landed on the connection's goal
    Completed,
}

/// What [`ConnectionManager::auto_connect_all`] managed to route.
#[derive(Clone,Debug,PartialEq,Default)]
pub struct AutoConnectReport {
    pub connected:Vec<Color>,
    pub failed:Vec<(Color,EngineError)>,
}

impl AutoConnectReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug,Default)]
pub(crate) struct ClaimedRoute {
    pub(crate) links:Vec<LinkIdx>,
    pub(crate) bindings:Vec<(NodeIdx,NodeIdx)>,
}

/// Claims every hop of `nodes` for `color`, all or nothing.
///
/// Consecutive infrastructure nodes must share a physical link with room
/// left, endpoints may only sit at either end and must be covered by the
/// active emitter next to them. On any failure the links claimed so far
/// are given back before the error is returned.
pub(crate) fn claim_route(
    network:&Network,
    coverage:&GeometricCoverage,
    ledger:&mut UsageLedger,
    active:&ActiveEmitterSet,
    color:Color,
    nodes:&[NodeIdx]
) -> Result<ClaimedRoute> {
    let mut route = ClaimedRoute::default();
    let result = claim_hops(network, coverage, ledger, active, color, nodes, &mut route);
    if let Err(err) = result {
        for link in route.links.iter() {
            ledger.release(*link, color);
        }
        debug!("route for {color} rolled back: {err}");
        return Err(err);
    }
    Ok(route)
}

fn claim_hops(
    network:&Network,
    coverage:&GeometricCoverage,
    ledger:&mut UsageLedger,
    active:&ActiveEmitterSet,
    color:Color,
    nodes:&[NodeIdx],
    route:&mut ClaimedRoute
) -> Result<()> {
    let invalid = |from:NodeIdx,to:NodeIdx| EngineError::InvalidHop {
        from:network.node_id(from).to_owned(),
        to:network.node_id(to).to_owned()
    };
    for (i,node) in nodes.iter().enumerate() {
        let inner = i != 0 && i + 1 != nodes.len();
        if inner && network.node(*node).kind.is_endpoint() {
            return Err(invalid(nodes[i - 1],*node));
        }
        // a path never visits a node twice
        if nodes[..i].contains(node) {
            return Err(invalid(nodes[i - 1],*node));
        }
    }
    for pair in nodes.windows(2) {
        let (from,to) = (pair[0],pair[1]);
        let from_kind = &network.node(from).kind;
        let to_kind = &network.node(to).kind;
        match (from_kind.is_endpoint(),to_kind.is_endpoint()) {
            (false,false) => {
                let link = network.link_between(from, to).ok_or_else(|| invalid(from,to))?;
                ledger.claim(link, color)?;
                route.links.push(link.idx);
            }
            (true,true) => return Err(invalid(from,to)),
            (from_is_endpoint,_) => {
                let (endpoint,emitter) = if from_is_endpoint {(from,to)} else {(to,from)};
                if !network.node(emitter).kind.is_emitter() {
                    return Err(invalid(from,to));
                }
                if !active.contains(emitter) || !coverage.covers(emitter, endpoint) {
                    return Err(EngineError::DestinationUnreachable {
                        endpoint:network.node_id(endpoint).to_owned()
                    });
                }
                route.bindings.push((endpoint,emitter));
            }
        }
    }
    Ok(())
}

/// Creates and tears down connections. Every change of link occupancy goes
/// through the ledger, every change of bindings through the assignment.
pub struct ConnectionManager<'a> {
    network:&'a Network,
    coverage:&'a GeometricCoverage,
    config:&'a EngineConfig,
    state:&'a mut EngineState,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(
        network:&'a Network,
        coverage:&'a GeometricCoverage,
        config:&'a EngineConfig,
        state:&'a mut EngineState
    ) -> Self {
        Self {network,coverage,config,state}
    }

    fn check_nodes(&self,nodes:&[NodeIdx]) -> Result<()> {
        nodes.iter().try_for_each(|n| self.network.check_node(*n))
    }
    fn id_of(&self,node:NodeIdx) -> String {
        self.network.node_id(node).to_owned()
    }
    fn index_of(&self,id:ConnectionId) -> Result<usize> {
        self.state.connections.iter().position(|c| c.id == id)
            .ok_or(EngineError::UnknownConnection(id))
    }
    fn path_finder(&self,avoid:&[NodeIdx]) -> PathFinder<'_> {
        PathFinder::new(self.network, &self.state.ledger)
            .with_weight(self.config.routing_weight)
            .avoiding(avoid)
    }

    fn check_not_routing(&self,source:NodeIdx,color:Option<Color>) -> Result<()> {
        let busy = self.state.connections.iter()
            .find(|c| c.source() == source || Some(c.color) == color);
        match busy {
            Some(connection) => Err(EngineError::AlreadyRouting {
                node:self.id_of(source),
                connection:connection.id
            }),
            None => Ok(())
        }
    }

    /// Emitters an endpoint may attach to: its bound emitter if it has one,
    /// otherwise every active emitter covering it.
    pub fn attachments(&self,endpoint:NodeIdx) -> Vec<NodeIdx> {
        if let Some(bound) = self.state.assignment.emitter_of(endpoint) {
            if self.state.active_emitters.contains(bound) {
                return vec![bound];
            }
        }
        self.coverage.emitters_covering(endpoint).iter()
            .copied()
            .filter(|e| self.state.active_emitters.contains(*e))
            .collect()
    }

    // infrastructure nodes standing in for `node` during a search
    fn anchors(&self,node:NodeIdx) -> Result<Vec<NodeIdx>> {
        if !self.network.node(node).kind.is_endpoint() {
            return Ok(vec![node]);
        }
        let anchors = self.attachments(node);
        if anchors.is_empty() {
            return Err(EngineError::DestinationUnreachable{endpoint:self.id_of(node)});
        }
        Ok(anchors)
    }

    /// Cheapest full path from `from` to any of `goals`, endpoints included,
    /// without entering `avoid`.
    ///
    /// Candidates compare by route cost, then goal, source anchor and target
    /// anchor in node order. Two endpoints sharing an emitter cost nothing
    /// and always win.
    pub fn plan_route(&self,from:NodeIdx,goals:&[NodeIdx],avoid:&[NodeIdx]) -> Result<Vec<NodeIdx>> {
        self.check_nodes(&[from])?;
        self.check_nodes(goals)?;
        self.check_nodes(avoid)?;
        let from_anchors = self.anchors(from)?;
        let finder = self.path_finder(avoid);
        let mut best:Option<((u64,NodeIdx,NodeIdx,NodeIdx),Vec<NodeIdx>)> = None;
        let mut first_error = None;
        for goal in goals.iter().copied() {
            let goal_anchors = match self.anchors(goal) {
                Ok(anchors) => anchors,
                Err(err) => {
                    first_error.get_or_insert(err);
                    continue;
                }
            };
            for s in from_anchors.iter().copied() {
                for t in goal_anchors.iter().copied() {
                    let Some(path) = finder.shortest_path(s, t) else {continue};
                    let key = (path.cost,goal,s,t);
                    if best.as_ref().is_some_and(|(k,_)| *k <= key) {
                        continue;
                    }
                    let mut nodes = Vec::with_capacity(path.nodes.len() + 2);
                    if s != from {
                        nodes.push(from);
                    }
                    nodes.extend(path.nodes.iter().copied());
                    if t != goal {
                        nodes.push(goal);
                    }
                    best = Some((key,nodes));
                }
            }
        }
        match best {
            Some((_,nodes)) => Ok(nodes),
            None => {
                // all goals unreachable by radio is a coverage problem, not a routing one
                if let (Some(err),true) = (first_error,goals.iter().all(|g| self.anchors(*g).is_err())) {
                    return Err(err);
                }
                Err(EngineError::NoPathAvailable {
                    from:self.id_of(from),
                    to:goals.first().map(|g| self.id_of(*g)).unwrap_or_default()
                })
            }
        }
    }

    fn claim(&mut self,color:Color,nodes:&[NodeIdx]) -> Result<ClaimedRoute> {
        let route = claim_route(
            self.network,
            self.coverage,
            &mut self.state.ledger,
            &self.state.active_emitters,
            color,
            nodes
        )?;
        for (endpoint,emitter) in route.bindings.iter() {
            self.state.assignment.bind(*endpoint, *emitter);
        }
        Ok(route)
    }

    fn goals(&self,source:NodeIdx) -> Vec<NodeIdx> {
        self.network.goals_of(source)
    }

    /// Starts a connection at `source`. Endpoints route under their demand's
    /// color, anything else gets a fresh color.
    pub fn begin_connection(&mut self,source:NodeIdx) -> Result<ConnectionId> {
        self.check_nodes(&[source])?;
        let color = self.network.node(source).color();
        self.check_not_routing(source, color)?;
        let color = match color {
            Some(color) => color,
            None => self.state.allocate_color()
        };
        let id = self.state.allocate_connection_id();
        self.state.connections.push(Connection {
            id,
            color,
            nodes:vec![source],
            links:vec![],
            complete:false
        });
        debug!("{color} started at {}",self.id_of(source));
        Ok(id)
    }

    /// Nodes the connection may step onto next, best suggestion first.
    pub fn available_hops(&self,id:ConnectionId) -> Result<Vec<NodeIdx>> {
        let connection = &self.state.connections[self.index_of(id)?];
        if connection.complete {
            return Ok(vec![]);
        }
        let frontier = connection.frontier();
        let goals = self.goals(connection.source());
        // search targets are the emitters in front of endpoint goals
        let mut anchor_goals:Vec<NodeIdx> = goals.iter()
            .flat_map(|g| self.anchors(*g).unwrap_or_default())
            .collect();
        anchor_goals.sort_unstable();
        anchor_goals.dedup();

        let finder = self.path_finder(&connection.nodes);
        if self.network.node(frontier).kind.is_endpoint() {
            if connection.nodes.len() > 1 {
                return Ok(vec![]);
            }
            let remaining = finder.remaining_hops(&anchor_goals);
            let mut candidates = self.attachments(frontier);
            candidates.sort_by_key(|n| (!anchor_goals.contains(n),remaining[*n],*n));
            return Ok(candidates);
        }

        let mut hops = vec![];
        if self.state.active_emitters.contains(frontier) {
            for goal in goals.iter().copied() {
                if !self.network.node(goal).kind.is_endpoint() || connection.nodes.contains(&goal) {
                    continue;
                }
                let bound = self.state.assignment.emitter_of(goal);
                if self.coverage.covers(frontier, goal) && bound.is_none_or(|b| b == frontier) {
                    hops.push(goal);
                }
            }
        }
        hops.extend(finder.ranked_next_hops(frontier, &anchor_goals));
        Ok(hops)
    }

    /// Steps onto `node`, claiming the link in between. Stepping onto the
    /// connection's goal completes it.
    pub fn extend_to_next_hop(&mut self,id:ConnectionId,node:NodeIdx) -> Result<Extension> {
        self.check_nodes(&[node])?;
        let index = self.index_of(id)?;
        if self.state.connections[index].complete {
            return Err(EngineError::ConnectionComplete(id));
        }
        let frontier = self.state.connections[index].frontier();
        if !self.available_hops(id)?.contains(&node) {
            return Err(EngineError::InvalidHop{from:self.id_of(frontier),to:self.id_of(node)});
        }
        let color = self.state.connections[index].color;
        let route = self.claim(color, &[frontier,node])?;
        let reached_goal = self.goals(self.state.connections[index].source()).contains(&node);
        let connection = &mut self.state.connections[index];
        connection.nodes.push(node);
        connection.links.extend(route.links);
        if reached_goal {
            connection.complete = true;
            info!("{color} completed interactively");
            return Ok(Extension::Completed);
        }
        Ok(Extension::Extended)
    }

    /// Finishes the connection at `destination`, directly when it is an
    /// available hop, otherwise along the cheapest route from the frontier
    /// that doesn't revisit the path.
    pub fn complete_connection(&mut self,id:ConnectionId,destination:NodeIdx) -> Result<()> {
        self.check_nodes(&[destination])?;
        let index = self.index_of(id)?;
        let connection = &self.state.connections[index];
        if connection.complete {
            return Err(EngineError::ConnectionComplete(id));
        }
        let frontier = connection.frontier();
        let color = connection.color;
        let goals = self.goals(connection.source());
        let invalid = EngineError::InvalidHop{from:self.id_of(frontier),to:self.id_of(destination)};
        if !goals.is_empty() && !goals.contains(&destination) {
            return Err(invalid);
        }
        if destination == frontier {
            if connection.nodes.len() < 2 {
                return Err(invalid);
            }
            self.state.connections[index].complete = true;
            return Ok(());
        }

        let route = if self.available_hops(id)?.contains(&destination) {
            vec![frontier,destination]
        }else{
            let avoid:Vec<NodeIdx> = connection.nodes.iter().copied().filter(|n| *n != frontier).collect();
            self.plan_route(frontier, &[destination], &avoid)?
        };
        let claimed = self.claim(color, &route)?;
        let connection = &mut self.state.connections[index];
        connection.nodes.extend(route.iter().skip(1).copied());
        connection.links.extend(claimed.links);
        connection.complete = true;
        info!("{color} completed to {}",self.network.node_id(destination));
        Ok(())
    }

    /// Routes `source` to `destination` in one go and records the result as
    /// a complete connection.
    pub fn auto_connect(&mut self,source:NodeIdx,destination:NodeIdx) -> Result<Connection> {
        self.check_nodes(&[source,destination])?;
        let goals = self.goals(source);
        if !goals.is_empty() && !goals.contains(&destination) {
            return Err(EngineError::InvalidHop{from:self.id_of(source),to:self.id_of(destination)});
        }
        self.auto_connect_any(source, &[destination])
    }

    fn auto_connect_any(&mut self,source:NodeIdx,goals:&[NodeIdx]) -> Result<Connection> {
        let color = self.network.node(source).color();
        self.check_not_routing(source, color)?;
        let route = self.plan_route(source, goals, &[])?;
        let color = match color {
            Some(color) => color,
            None => self.state.allocate_color()
        };
        let claimed = self.claim(color, &route)?;
        let connection = Connection {
            id:self.state.allocate_connection_id(),
            color,
            nodes:route,
            links:claimed.links,
            complete:true
        };
        debug!("{color} auto routed over {} link(s)",connection.links.len());
        self.state.connections.push(connection.clone());
        Ok(connection)
    }

    /// Gives back every link the connection holds and drops its bindings.
    pub fn release_connection(&mut self,id:ConnectionId) -> Result<Connection> {
        let index = self.index_of(id)?;
        let connection = self.state.connections.remove(index);
        for link in connection.links.iter() {
            self.state.ledger.release(*link, connection.color);
        }
        for (endpoint,emitter) in connection.radio_hops(self.network) {
            if self.state.assignment.emitter_of(endpoint) == Some(emitter) {
                self.state.assignment.unbind(endpoint);
            }
        }
        debug!("{} released",connection.color);
        Ok(connection)
    }

    pub fn release_all(&mut self) {
        let ids:Vec<ConnectionId> = self.state.connections.iter().map(|c| c.id).collect();
        for id in ids {
            // ids were just read from the list
            let _ = self.release_connection(id);
        }
    }

    // runs `change`, putting ledger, connections and bindings back if it fails
    fn transactional<T,F>(&mut self,change:F) -> Result<T>
        where F:FnOnce(&mut Self) -> Result<T>
    {
        let ledger = self.state.ledger.clone();
        let connections = self.state.connections.clone();
        let assignment = self.state.assignment.clone();
        let result = change(self);
        if result.is_err() {
            self.state.ledger = ledger;
            self.state.connections = connections;
            self.state.assignment = assignment;
        }
        result
    }

    /// Releases a complete connection and routes its demand again from
    /// scratch. The old route is kept when no new one exists.
    pub fn reroute(&mut self,id:ConnectionId) -> Result<Connection> {
        let connection = self.state.connections[self.index_of(id)?].clone();
        if !connection.complete {
            return Err(EngineError::InvalidHop {
                from:self.id_of(connection.frontier()),
                to:self.id_of(connection.frontier())
            });
        }
        self.transactional(|manager| {
            manager.release_connection(id)?;
            manager.auto_connect_any(connection.source(), &[connection.frontier()])
        })
    }

    /// Moves `endpoint` onto `emitter`. A complete connection through the
    /// endpoint is rerouted over the new emitter, an unfinished one is
    /// dropped. Nothing changes when the reroute fails.
    pub fn rebind_endpoint(&mut self,endpoint:NodeIdx,emitter:NodeIdx) -> Result<()> {
        self.check_nodes(&[endpoint,emitter])?;
        let NodeKind::Endpoint{color,..} = self.network.node(endpoint).kind else {
            return Err(EngineError::InvalidHop{from:self.id_of(endpoint),to:self.id_of(emitter)});
        };
        if !self.network.node(emitter).kind.is_emitter() {
            return Err(EngineError::NotAnEmitter(self.id_of(emitter)));
        }
        if !self.state.active_emitters.contains(emitter) || !self.coverage.covers(emitter, endpoint) {
            return Err(EngineError::DestinationUnreachable{endpoint:self.id_of(endpoint)});
        }
        let existing = self.state.connection_of_color(color).cloned();
        self.transactional(|manager| {
            if let Some(connection) = existing.as_ref() {
                manager.release_connection(connection.id)?;
            }
            manager.state.assignment.bind(endpoint, emitter);
            match existing {
                Some(connection) if connection.complete => {
                    manager.auto_connect_any(connection.source(), &[connection.frontier()])?;
                }
                _ => {}
            }
            Ok(())
        })
    }

    /// Routes every demand that has no connection yet, in color order.
    /// Coverage only endpoints get bound to their best attachment.
    pub fn auto_connect_all(&mut self) -> AutoConnectReport {
        let mut report = AutoConnectReport::default();
        for demand in self.network.demands().iter() {
            if self.state.connection_of_color(demand.color).is_some() {
                continue;
            }
            let result = match demand.kind {
                DemandKind::Pair{a,b} => self.auto_connect_any(a, &[b]).map(|_| ()),
                DemandKind::ToSink{endpoint} => {
                    let sinks:Vec<NodeIdx> = self.network.sinks().map(|n| n.idx).collect();
                    self.auto_connect_any(endpoint, &sinks).map(|_| ())
                }
                DemandKind::CoverageOnly{endpoint} => {
                    match self.attachments(endpoint).first() {
                        Some(emitter) => {
                            self.state.assignment.bind(endpoint, *emitter);
                            Ok(())
                        }
                        None => Err(EngineError::DestinationUnreachable{endpoint:self.id_of(endpoint)})
                    }
                }
            };
            match result {
                Ok(()) => report.connected.push(demand.color),
                Err(err) => report.failed.push((demand.color,err)),
            }
        }
        info!("auto connect: {} routed, {} failed",report.connected.len(),report.failed.len());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::fixtures::bridge;

    struct Setup {
        network:Network,
        coverage:GeometricCoverage,
        config:EngineConfig,
        state:EngineState,
    }

    impl Setup {
        fn new(network:Network) -> Self {
            let config = EngineConfig::default();
            let coverage = GeometricCoverage::new(&network, &config);
            let state = EngineState::new(&network);
            Self {network,coverage,config,state}
        }
        fn manager(&mut self) -> ConnectionManager<'_> {
            ConnectionManager::new(&self.network, &self.coverage, &self.config, &mut self.state)
        }
        fn n(&self,id:&str) -> NodeIdx {
            self.network.node_idx(id).unwrap()
        }
        fn ids(&self,nodes:&[NodeIdx]) -> Vec<String> {
            nodes.iter().map(|n| self.network.node_id(*n).to_owned()).collect()
        }
        fn assert_capacity_invariant(&self) {
            for link in self.network.links() {
                assert!(self.state.ledger.occupant_count(link.idx) <= link.capacity as usize);
            }
        }
    }

    #[test]
    fn test_two_pairs_share_a_double_link_third_is_refused() {
        let mut setup = Setup::new(bridge(2));
        let (u1a,u1b,u2a,u2b,u3a,u3b) = (setup.n("u1a"),setup.n("u1b"),setup.n("u2a"),setup.n("u2b"),setup.n("u3a"),setup.n("u3b"));
        let first = setup.manager().auto_connect(u1a, u1b).unwrap();
        assert_eq!(setup.ids(&first.nodes),vec!["u1a","ant_l","hub_l","hub_r","ant_r","u1b"]);
        assert_eq!(first.links.len(),3);
        setup.manager().auto_connect(u2a, u2b).unwrap();
        let err = setup.manager().auto_connect(u3a, u3b).unwrap_err();
        assert_eq!(err,EngineError::NoPathAvailable{from:"u3a".into(),to:"u3b".into()});
        let bridge_link = setup.network.link_idx("l_bridge").unwrap();
        assert_eq!(setup.state.ledger.occupants(bridge_link),&[Color(0),Color(1)]);
        assert_eq!(setup.state.connections.len(),2);
        setup.assert_capacity_invariant();
    }

    #[test]
    fn test_non_adjacent_hop_leaves_ledger_alone() {
        let mut setup = Setup::new(bridge(1));
        let (u1a,hub_r) = (setup.n("u1a"),setup.n("hub_r"));
        let id = setup.manager().begin_connection(u1a).unwrap();
        let err = setup.manager().extend_to_next_hop(id, hub_r).unwrap_err();
        assert_eq!(err,EngineError::InvalidHop{from:"u1a".into(),to:"hub_r".into()});
        assert!(setup.state.ledger.is_empty());
        assert!(setup.state.assignment.is_empty());
        assert_eq!(setup.state.connections[0].nodes,vec![u1a]);
    }

    #[test]
    fn test_interactive_path_claims_hop_by_hop() {
        let mut setup = Setup::new(bridge(1));
        let names = ["ant_l","hub_l","hub_r","ant_r"];
        let u1a = setup.n("u1a");
        let u1b = setup.n("u1b");
        let ant_l = setup.n("ant_l");
        let id = setup.manager().begin_connection(u1a).unwrap();
        assert_eq!(setup.manager().available_hops(id).unwrap(),vec![ant_l]);
        for name in names {
            let node = setup.n(name);
            assert_eq!(setup.manager().extend_to_next_hop(id, node).unwrap(),Extension::Extended);
        }
        assert_eq!(setup.manager().available_hops(id).unwrap(),vec![u1b]);
        assert_eq!(setup.manager().extend_to_next_hop(id, u1b).unwrap(),Extension::Completed);
        let connection = setup.state.connection(id).unwrap().clone();
        assert!(connection.complete);
        assert_eq!(connection.links.len(),3);
        assert_eq!(setup.state.assignment.emitter_of(u1a),Some(setup.n("ant_l")));
        assert_eq!(setup.state.assignment.emitter_of(u1b),Some(setup.n("ant_r")));
        assert_eq!(setup.manager().extend_to_next_hop(id, u1b).unwrap_err(),EngineError::ConnectionComplete(id));
    }

    #[test]
    fn test_busy_source_and_color() {
        let mut setup = Setup::new(bridge(1));
        let (u1a,u1b) = (setup.n("u1a"),setup.n("u1b"));
        let id = setup.manager().begin_connection(u1a).unwrap();
        assert_eq!(
            setup.manager().begin_connection(u1a).unwrap_err(),
            EngineError::AlreadyRouting{node:"u1a".into(),connection:id}
        );
        // the partner shares the color
        assert!(matches!(setup.manager().begin_connection(u1b),Err(EngineError::AlreadyRouting{..})));
        assert!(matches!(setup.manager().auto_connect(u1b, u1a),Err(EngineError::AlreadyRouting{..})));
    }

    #[test]
    fn test_complete_connection_routes_the_rest() {
        let mut setup = Setup::new(bridge(1));
        let (u1a,u1b,u2b,ant_l) = (setup.n("u1a"),setup.n("u1b"),setup.n("u2b"),setup.n("ant_l"));
        let id = setup.manager().begin_connection(u1a).unwrap();
        setup.manager().extend_to_next_hop(id, ant_l).unwrap();
        // only the partner is an acceptable destination
        assert!(matches!(setup.manager().complete_connection(id, u2b),Err(EngineError::InvalidHop{..})));
        setup.manager().complete_connection(id, u1b).unwrap();
        let connection = setup.state.connection(id).unwrap();
        assert_eq!(setup.ids(&connection.nodes),vec!["u1a","ant_l","hub_l","hub_r","ant_r","u1b"]);
        assert!(connection.complete);
        setup.assert_capacity_invariant();
    }

    #[test]
    fn test_release_gives_back_exactly_once() {
        let mut setup = Setup::new(bridge(2));
        let (u1a,u1b,u2a,u2b) = (setup.n("u1a"),setup.n("u1b"),setup.n("u2a"),setup.n("u2b"));
        let first = setup.manager().auto_connect(u1a, u1b).unwrap();
        setup.manager().auto_connect(u2a, u2b).unwrap();
        let before:Vec<usize> = first.links.iter().map(|l| setup.state.ledger.occupant_count(*l)).collect();
        for link in first.links.iter() {
            assert_eq!(setup.state.ledger.occupants(*link).iter().filter(|c| **c == first.color).count(),1);
        }
        setup.manager().release_connection(first.id).unwrap();
        for (link,count) in first.links.iter().zip(before) {
            assert_eq!(setup.state.ledger.occupant_count(*link),count - 1);
            assert!(!setup.state.ledger.is_used_by(*link, first.color));
        }
        assert_eq!(setup.state.assignment.emitter_of(u1a),None);
        assert_eq!(setup.state.assignment.emitter_of(u2a),Some(setup.n("ant_l")));
        assert_eq!(setup.manager().release_connection(first.id).unwrap_err(),EngineError::UnknownConnection(first.id));
    }

    #[test]
    fn test_inactive_emitters_make_endpoints_unreachable() {
        let mut setup = Setup::new(bridge(1));
        let ant_r = setup.n("ant_r");
        setup.state.active_emitters.deactivate(ant_r);
        let (u1a,u1b) = (setup.n("u1a"),setup.n("u1b"));
        assert_eq!(
            setup.manager().auto_connect(u1a, u1b).unwrap_err(),
            EngineError::DestinationUnreachable{endpoint:"u1b".into()}
        );
        assert!(setup.state.ledger.is_empty());
    }

    fn with_second_right_antenna() -> Setup {
        let mut d = crate::network::fixtures::bridge_description(1);
        d.push_node("ant_r2", 30.0, 2.0, crate::network::fixtures::emitter(5.0))
            .push_link("l_right2", "hub_r", "ant_r2", Some(1));
        Setup::new(Network::from_description(&d, &EngineConfig::default()).unwrap())
    }

    #[test]
    fn test_rebind_moves_the_route() {
        let mut setup = with_second_right_antenna();
        let (u1a,u1b,ant_r2) = (setup.n("u1a"),setup.n("u1b"),setup.n("ant_r2"));
        let first = setup.manager().auto_connect(u1a, u1b).unwrap();
        // ant_r and ant_r2 tie on hops, ant_r sorts first
        assert_eq!(setup.ids(&first.nodes)[4],"ant_r");
        setup.manager().rebind_endpoint(u1b, ant_r2).unwrap();
        let moved = setup.state.connection_of_color(first.color).unwrap().clone();
        assert_eq!(setup.ids(&moved.nodes)[4],"ant_r2");
        assert_eq!(setup.state.assignment.emitter_of(u1b),Some(ant_r2));
        assert!(setup.state.ledger.occupants(setup.network.link_idx("l_right").unwrap()).is_empty());
        setup.assert_capacity_invariant();
    }

    #[test]
    fn test_failed_rebind_keeps_the_old_route() {
        let mut setup = with_second_right_antenna();
        let (u1a,u1b,ant_r2,ant_l) = (setup.n("u1a"),setup.n("u1b"),setup.n("ant_r2"),setup.n("ant_l"));
        let first = setup.manager().auto_connect(u1a, u1b).unwrap();
        let l_right2 = setup.network.link(setup.network.link_idx("l_right2").unwrap()).clone();
        setup.state.ledger.claim(&l_right2, Color(99)).unwrap();
        let before = setup.state.clone();

        let err = setup.manager().rebind_endpoint(u1b, ant_r2).unwrap_err();
        assert!(matches!(err,EngineError::NoPathAvailable{..}));
        assert_eq!(setup.state,before);
        assert_eq!(setup.state.connection(first.id).unwrap().nodes,first.nodes);

        // ant_l is out of range of u1b
        assert_eq!(
            setup.manager().rebind_endpoint(u1b, ant_l).unwrap_err(),
            EngineError::DestinationUnreachable{endpoint:"u1b".into()}
        );
        assert_eq!(setup.state,before);
    }

    #[test]
    fn test_auto_connect_all_reports_each_demand() {
        let mut setup = Setup::new(bridge(2));
        let report = setup.manager().auto_connect_all();
        assert_eq!(report.connected,vec![Color(0),Color(1)]);
        assert_eq!(report.failed.len(),1);
        assert_eq!(report.failed[0].0,Color(2));
        assert!(matches!(report.failed[0].1,EngineError::NoPathAvailable{..}));
        setup.assert_capacity_invariant();
    }

    #[test]
    fn test_reroute_keeps_route_when_nothing_better() {
        let mut setup = Setup::new(bridge(1));
        let (u1a,u1b) = (setup.n("u1a"),setup.n("u1b"));
        let first = setup.manager().auto_connect(u1a, u1b).unwrap();
        let rerouted = setup.manager().reroute(first.id).unwrap();
        assert_eq!(rerouted.nodes,first.nodes);
        assert_ne!(rerouted.id,first.id);
        assert_eq!(setup.state.connections.len(),1);
    }

    #[test]
    fn test_out_of_range_nodes_are_unknown() {
        let mut setup = Setup::new(bridge(1));
        let u1a = setup.n("u1a");
        let far = setup.network.nodes().len() + 5;
        let unknown = EngineError::UnknownNode(format!("#{far}"));
        assert_eq!(setup.manager().begin_connection(far).unwrap_err(),unknown);
        assert_eq!(setup.manager().auto_connect(u1a, far).unwrap_err(),unknown);
        assert_eq!(setup.manager().plan_route(u1a, &[far], &[]).unwrap_err(),unknown);
        let id = setup.manager().begin_connection(u1a).unwrap();
        assert_eq!(setup.manager().extend_to_next_hop(id, far).unwrap_err(),unknown);
        assert_eq!(setup.manager().complete_connection(id, far).unwrap_err(),unknown);
        assert_eq!(setup.manager().rebind_endpoint(far, u1a).unwrap_err(),unknown);
        assert!(setup.state.ledger.is_empty());
        assert_eq!(setup.state.connections.len(),1);
    }
}
