use thiserror::Error;

use super::color::{Color,ConnectionId};

/// Every failure a routing or coverage operation can report.
///
/// All of them are ordinary outcomes of play (a player clicking a saturated
/// link, asking for a route that does not exist) and are returned as values.
/// [`EngineError::UncoverableEndpoint`] is the one exception: it means the
/// level itself can't be solved.
#[derive(Error,Debug,Clone,PartialEq)]
pub enum EngineError {
    #[error("Link {link} is already carrying {capacity} connection(s), its full capacity")]
    LinkSaturated{link:String,capacity:u32},
    #[error("No route with free capacity exists from {from} to {to}")]
    NoPathAvailable{from:String,to:String},
    #[error("{to} is not an available next hop from {from}")]
    InvalidHop{from:String,to:String},
    #[error("{node} is already routing connection {connection:?}")]
    AlreadyRouting{node:String,connection:ConnectionId},
    #[error("No active emitter covers endpoint {endpoint}")]
    DestinationUnreachable{endpoint:String},
    #[error("Endpoints {endpoints:?} are not covered by any emitter, the level can't be solved")]
    UncoverableEndpoint{endpoints:Vec<String>},
    #[error("Stored solution does not fit the current network: {reason}")]
    InvalidSnapshotApplication{reason:String},
    #[error("Node {0} does not exist")]
    UnknownNode(String),
    #[error("Link {0} does not exist")]
    UnknownLink(String),
    #[error("Connection {0:?} does not exist")]
    UnknownConnection(ConnectionId),
    #[error("Connection {0:?} is already complete")]
    ConnectionComplete(ConnectionId),
    #[error("Node {0} is not an emitter")]
    NotAnEmitter(String),
    #[error("Emitter {emitter} still serves endpoints {endpoints:?}")]
    EmitterInUse{emitter:String,endpoints:Vec<String>},
    #[error("Link {link} carries {occupied} connection(s), capacity {requested} is too small")]
    CapacityBelowOccupancy{link:String,occupied:usize,requested:u32},
    #[error("Color {0:?} has no demand in this level")]
    UnknownColor(Color),
}

impl EngineError {
    /// Only a level nobody can solve is fatal, the rest is player feedback.
    pub fn is_fatal(&self) -> bool {
        matches!(self,EngineError::UncoverableEndpoint{..})
    }
}

pub type Result<T> = std::result::Result<T,EngineError>;

/// Problems found while turning a graph description into a [`super::Network`].
#[derive(Error,Debug)]
pub enum TopologyError {
    #[error("Node id {0} is used more than once")]
    DuplicateNode(String),
    #[error("Link id {0} is used more than once")]
    DuplicateLink(String),
    #[error("Link {link} refers to missing node {node}")]
    DanglingLink{link:String,node:String},
    #[error("Link {0} connects a node to itself")]
    SelfLoop(String),
    #[error("Link {link} duplicates the physical link between {a} and {b}")]
    ParallelLink{link:String,a:String,b:String},
    #[error("Link {0} has zero capacity")]
    ZeroCapacity(String),
    #[error("Emitter {0} has a negative or non finite radius")]
    InvalidRadius(String),
    #[error("Link {link} wires endpoint {endpoint}, endpoints only attach by radio")]
    EndpointLink{link:String,endpoint:String},
    #[error("Pairing {pairing} has {members} endpoint(s), it needs exactly two")]
    InvalidPairing{pairing:String,members:usize},
    #[error("Malformed graph description: {0}")]
    Json(#[from] serde_json::Error),
}
