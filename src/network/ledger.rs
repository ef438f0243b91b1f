// which colors occupy which physical link
// 所有占用变化都经过 claim/release

use log::debug;

use crate::dsa::graph::HashMap;

use super::color::Color;
use super::error::{EngineError, Result};
use super::topology::{Link, LinkIdx, Network};

/// Authoritative occupancy record of the physical links.
///
/// Several colors may share a link up to its capacity, so each entry is the
/// ordered list of occupying colors. Links nobody uses have no entry.
#[derive(Clone,Debug,PartialEq,Default)]
pub struct UsageLedger {
    occupants:HashMap<LinkIdx,Vec<Color>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn occupants(&self,link:LinkIdx) -> &[Color] {
        self.occupants.get(&link).map(|v| v.as_slice()).unwrap_or(&[])
    }
    pub fn occupant_count(&self,link:LinkIdx) -> usize {
        self.occupants(link).len()
    }
    pub fn remaining_capacity(&self,link:&Link) -> u32 {
        let used = self.occupant_count(link.idx).min(u32::MAX as usize) as u32;
        link.capacity.saturating_sub(used)
    }
    pub fn is_saturated(&self,link:&Link) -> bool {
        self.remaining_capacity(link) == 0
    }
    pub fn is_used_by(&self,link:LinkIdx,color:Color) -> bool {
        self.occupants(link).contains(&color)
    }
    /// Takes one unit of `link` for `color`.
    pub fn claim(&mut self,link:&Link,color:Color) -> Result<()> {
        if self.is_saturated(link) {
            return Err(EngineError::LinkSaturated{link:link.id.clone(),capacity:link.capacity});
        }
        self.occupants.entry(link.idx).or_default().push(color);
        debug!("{color} claimed link {} ({}/{})",link.id,self.occupant_count(link.idx),link.capacity);
        Ok(())
    }
    /// Gives back one unit held by `color`. Releasing a color that is not on
    /// the link does nothing and returns `false`.
    pub fn release(&mut self,link:LinkIdx,color:Color) -> bool {
        let Some(colors) = self.occupants.get_mut(&link) else {return false};
        let Some(pos) = colors.iter().position(|c| *c == color) else {return false};
        colors.remove(pos);
        if colors.is_empty() {
            self.occupants.remove(&link);
        }
        debug!("{color} released link #{link}");
        true
    }
    /// Occupied links in ascending order.
    pub fn occupied_links(&self) -> Vec<LinkIdx> {
        let mut links:Vec<LinkIdx> = self.occupants.keys().copied().collect();
        links.sort_unstable();
        links
    }
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }
    pub fn clear(&mut self) {
        self.occupants.clear();
    }
    /// Sum of energy costs of every link carrying at least one color.
    pub fn link_energy(&self,network:&Network) -> f64 {
        self.occupied_links().into_iter().map(|l| network.link(l).energy_cost).sum()
    }
    /// First link whose occupancy exceeds its current capacity, if any.
    pub fn overloaded_link(&self,network:&Network) -> Option<LinkIdx> {
        self.occupied_links().into_iter()
            .find(|l| self.occupant_count(*l) > network.link(*l).capacity as usize)
    }
}
