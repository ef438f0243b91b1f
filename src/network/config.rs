use serde::{Deserialize, Serialize};

/// Cost of crossing one link during a route search.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize,Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingWeight {
    // every usable link costs 1, fewest hops wins
    #[default]
    Hops,
    // euclidean length of the link
    Length,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub routing_weight:RoutingWeight,
    pub default_link_capacity:u32,
    pub default_link_energy:f64,
    pub default_emitter_energy:f64,
    // slack on the distance <= radius test
    pub coverage_epsilon:f64,
    // slack when comparing energy with a stored minimum
    pub energy_epsilon:f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            routing_weight:RoutingWeight::Hops,
            default_link_capacity:1,
            default_link_energy:1.0,
            default_emitter_energy:1.0,
            coverage_epsilon:1e-9,
            energy_epsilon:1e-6,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json:&str) -> Result<Self,serde_json::Error> {
        serde_json::from_str(json)
    }
}
