use std::collections::{BTreeMap, BTreeSet};

use super::color::{Color, ConnectionId};
use super::connection::Connection;
use super::ledger::UsageLedger;
use super::topology::{Network, NodeIdx};

/// Emitters currently switched on.
#[derive(Clone,Debug,PartialEq,Eq,Default)]
pub struct ActiveEmitterSet(BTreeSet<NodeIdx>);

impl ActiveEmitterSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn contains(&self,emitter:NodeIdx) -> bool {
        self.0.contains(&emitter)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        self.0.iter().copied()
    }
    pub(crate) fn activate(&mut self,emitter:NodeIdx) -> bool {
        self.0.insert(emitter)
    }
    pub(crate) fn deactivate(&mut self,emitter:NodeIdx) -> bool {
        self.0.remove(&emitter)
    }
}

impl FromIterator<NodeIdx> for ActiveEmitterSet {
    fn from_iter<T: IntoIterator<Item = NodeIdx>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Endpoint -> emitter it is attached to. An endpoint is only ever bound to
/// an active emitter that covers it.
#[derive(Clone,Debug,PartialEq,Eq,Default)]
pub struct CoverageAssignment(BTreeMap<NodeIdx,NodeIdx>);

impl CoverageAssignment {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn emitter_of(&self,endpoint:NodeIdx) -> Option<NodeIdx> {
        self.0.get(&endpoint).copied()
    }
    /// Endpoints bound to `emitter`, ascending.
    pub fn endpoints_of(&self,emitter:NodeIdx) -> Vec<NodeIdx> {
        self.0.iter().filter(|(_,e)| **e == emitter).map(|(endpoint,_)| *endpoint).collect()
    }
    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx,NodeIdx)> + '_ {
        self.0.iter().map(|(a,b)| (*a,*b))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub(crate) fn bind(&mut self,endpoint:NodeIdx,emitter:NodeIdx) -> Option<NodeIdx> {
        self.0.insert(endpoint,emitter)
    }
    pub(crate) fn unbind(&mut self,endpoint:NodeIdx) -> Option<NodeIdx> {
        self.0.remove(&endpoint)
    }
}

impl FromIterator<(NodeIdx,NodeIdx)> for CoverageAssignment {
    fn from_iter<T: IntoIterator<Item = (NodeIdx,NodeIdx)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything that changes while a level is played.
#[derive(Clone,Debug,PartialEq,Default)]
pub struct EngineState {
    pub(crate) ledger:UsageLedger,
    // in creation order, in progress and complete alike
    pub(crate) connections:Vec<Connection>,
    pub(crate) active_emitters:ActiveEmitterSet,
    pub(crate) assignment:CoverageAssignment,
    // never rewound by restores, ids stay unique for the engine's lifetime
    pub(crate) next_connection:u64,
    pub(crate) next_free_color:u32,
}

impl EngineState {
    pub fn new(network:&Network) -> Self {
        Self {
            active_emitters:network.initially_active().iter().copied().collect(),
            next_free_color:network.demands().len() as u32,
            ..Self::default()
        }
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
    pub fn connection(&self,id:ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }
    pub fn connection_of_color(&self,color:Color) -> Option<&Connection> {
        self.connections.iter().find(|c| c.color == color)
    }
    pub fn completed(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.iter().filter(|c| c.complete)
    }
    pub fn in_progress(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.iter().filter(|c| !c.complete)
    }
    pub(crate) fn allocate_connection_id(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        id
    }
    pub(crate) fn allocate_color(&mut self) -> Color {
        let color = Color(self.next_free_color);
        self.next_free_color += 1;
        color
    }
}
