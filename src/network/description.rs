use serde::{Deserialize, Serialize};

use super::error::TopologyError;

/// Static level layout as delivered by the editor or a level file.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
pub struct GraphDescription {
    pub nodes:Vec<NodeDescription>,
    #[serde(default)]
    pub links:Vec<LinkDescription>,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
pub struct NodeDescription {
    pub id:String,
    pub x:f64,
    pub y:f64,
    #[serde(flatten)]
    pub kind:NodeKindDescription,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindDescription {
    Relay,
    Emitter {
        radius:f64,
        #[serde(default)]
        energy_cost:Option<f64>,
        #[serde(default)]
        active:bool,
    },
    Endpoint {
        #[serde(default)]
        pairing:Option<String>,
    },
    Sink,
    Compute {
        #[serde(default)]
        energy_cost:Option<f64>,
    },
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
pub struct LinkDescription {
    pub id:String,
    pub a:String,
    pub b:String,
    #[serde(default)]
    pub capacity:Option<u32>,
    #[serde(default)]
    pub energy_cost:Option<f64>,
    // drawn by the editor but never routed over
    #[serde(default)]
    pub presentation_only:bool,
}

impl GraphDescription {
    pub fn from_json(json:&str) -> Result<Self,TopologyError> {
        Ok(serde_json::from_str(json)?)
    }
    pub fn to_json(&self) -> Result<String,TopologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
    pub fn push_node(&mut self,id:&str,x:f64,y:f64,kind:NodeKindDescription) -> &mut Self {
        self.nodes.push(NodeDescription { id: id.to_owned(), x, y, kind });
        self
    }
    pub fn push_link(&mut self,id:&str,a:&str,b:&str,capacity:Option<u32>) -> &mut Self {
        self.links.push(LinkDescription {
            id: id.to_owned(),
            a: a.to_owned(),
            b: b.to_owned(),
            capacity,
            energy_cost: None,
            presentation_only: false,
        });
        self
    }
}
