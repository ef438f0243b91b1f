// small hand built levels shared by the unit tests

use super::config::EngineConfig;
use super::description::{GraphDescription, NodeKindDescription as K};
use super::topology::Network;

pub(crate) fn emitter(radius:f64) -> K {
    K::Emitter {radius,energy_cost:None,active:true}
}

pub(crate) fn endpoint(pairing:&str) -> K {
    K::Endpoint {pairing:Some(pairing.to_owned())}
}

/// Two antennas joined over `hub_l - hub_r`, the only link between the two
/// sides, with three endpoint pairs straddling it.
///
/// ```text
/// u1a u2a u3a                       u1b u2b u3b
///    ant_l -- hub_l == hub_r -- ant_r
/// ```
pub(crate) fn bridge_description(bridge_capacity:u32) -> GraphDescription {
    let mut d = GraphDescription::default();
    d.push_node("ant_l", 0.0, 0.0, emitter(5.0))
        .push_node("hub_l", 10.0, 0.0, K::Relay)
        .push_node("hub_r", 20.0, 0.0, K::Relay)
        .push_node("ant_r", 30.0, 0.0, emitter(5.0))
        .push_node("u1a", 0.0, 1.0, endpoint("p1"))
        .push_node("u1b", 30.0, 1.0, endpoint("p1"))
        .push_node("u2a", 1.0, 0.0, endpoint("p2"))
        .push_node("u2b", 31.0, 0.0, endpoint("p2"))
        .push_node("u3a", -1.0, 0.0, endpoint("p3"))
        .push_node("u3b", 29.0, 0.0, endpoint("p3"))
        .push_link("l_left", "ant_l", "hub_l", Some(3))
        .push_link("l_bridge", "hub_l", "hub_r", Some(bridge_capacity))
        .push_link("l_right", "hub_r", "ant_r", Some(3));
    d
}

pub(crate) fn bridge(bridge_capacity:u32) -> Network {
    Network::from_description(&bridge_description(bridge_capacity), &EngineConfig::default())
        .expect("bridge fixture is valid")
}

/// Emitters `a`, `b`, `c` covering endpoints {1,2}, {2,3} and {3,4}, all
/// switched off. Endpoints need coverage only.
pub(crate) fn chain_cover_description() -> GraphDescription {
    let mut d = GraphDescription::default();
    d.push_node("a", 1.5, 0.0, K::Emitter{radius:0.6,energy_cost:Some(2.0),active:false})
        .push_node("b", 2.5, 0.0, K::Emitter{radius:0.6,energy_cost:Some(2.0),active:false})
        .push_node("c", 3.5, 0.0, K::Emitter{radius:0.6,energy_cost:Some(2.0),active:false})
        .push_node("e1", 1.0, 0.0, K::Endpoint{pairing:None})
        .push_node("e2", 2.0, 0.0, K::Endpoint{pairing:None})
        .push_node("e3", 3.0, 0.0, K::Endpoint{pairing:None})
        .push_node("e4", 4.0, 0.0, K::Endpoint{pairing:None});
    d
}

pub(crate) fn chain_cover() -> Network {
    Network::from_description(&chain_cover_description(), &EngineConfig::default())
        .expect("chain fixture is valid")
}
