// random playable levels, for practice mode and for the property tests

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::description::{GraphDescription, NodeKindDescription};
use super::topology::Position;

// tries before an endpoint is dropped straight next to an emitter
const PLACEMENT_ATTEMPTS:usize = 64;

/// Emitters on a `rows` x `cols` grid, each linked to its right and lower
/// neighbour, with endpoints scattered inside the coverage of the grid.
///
/// `pairs` endpoint pairs are generated first, then `loners` unpaired
/// endpoints which head for the sink when `with_sink` is set and only need
/// coverage otherwise.
#[derive(Clone,Debug,PartialEq)]
pub struct LevelGenerator {
    pub rows:usize,
    pub cols:usize,
    pub spacing:f64,
    pub radius:f64,
    pub max_capacity:u32,
    pub pairs:usize,
    pub loners:usize,
    pub with_sink:bool,
    pub emitters_active:bool,
}

impl Default for LevelGenerator {
    fn default() -> Self {
        Self {
            rows:3,
            cols:3,
            spacing:10.0,
            radius:7.0,
            max_capacity:2,
            pairs:3,
            loners:0,
            with_sink:false,
            emitters_active:true,
        }
    }
}

fn emitter_id(row:usize,col:usize) -> String {
    format!("ant_{row:02}_{col:02}")
}

impl LevelGenerator {
    /// Same seed, same level.
    pub fn generate(&self,seed:u64) -> GraphDescription {
        let mut rng = StdRng::seed_from_u64(seed);
        self.generate_with(&mut rng)
    }

    pub fn generate_with<R:Rng>(&self,rng:&mut R) -> GraphDescription {
        let mut d = GraphDescription::default();
        let mut emitters = Vec::with_capacity(self.rows*self.cols);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let position = Position::new(col as f64*self.spacing, row as f64*self.spacing);
                d.push_node(&emitter_id(row, col), position.x, position.y, NodeKindDescription::Emitter {
                    radius:self.radius,
                    energy_cost:Some(rng.random_range(1..=3) as f64),
                    active:self.emitters_active
                });
                emitters.push(position);
            }
        }
        let max_capacity = self.max_capacity.max(1);
        for row in 0..self.rows {
            for col in 0..self.cols {
                if col + 1 < self.cols {
                    d.push_link(&format!("l_{row:02}_{col:02}_h"), &emitter_id(row, col), &emitter_id(row, col + 1),
                        Some(rng.random_range(1..=max_capacity)));
                }
                if row + 1 < self.rows {
                    d.push_link(&format!("l_{row:02}_{col:02}_v"), &emitter_id(row, col), &emitter_id(row + 1, col),
                        Some(rng.random_range(1..=max_capacity)));
                }
            }
        }

        for i in 0..self.pairs {
            let key = format!("p{i:03}");
            for side in ["a","b"] {
                let position = self.covered_position(rng, &emitters);
                d.push_node(&format!("u{i:03}{side}"), position.x, position.y,
                    NodeKindDescription::Endpoint{pairing:Some(key.clone())});
            }
        }
        for i in 0..self.loners {
            let position = self.covered_position(rng, &emitters);
            d.push_node(&format!("s{i:03}"), position.x, position.y, NodeKindDescription::Endpoint{pairing:None});
        }

        if self.with_sink && !emitters.is_empty() {
            d.push_node("sink", -self.spacing/2.0, -self.spacing/2.0, NodeKindDescription::Sink)
                .push_link("l_sink", "sink", &emitter_id(0, 0), Some(max_capacity));
        }
        debug!("generated level: {} nodes, {} links",d.nodes.len(),d.links.len());
        d
    }

    // uniform over the grid's bounding box, resampled until an emitter reaches it
    fn covered_position<R:Rng>(&self,rng:&mut R,emitters:&[Position]) -> Position {
        // stay clear of the boundary so coverage doesn't hinge on rounding
        let reach = self.radius*0.99;
        let width = (self.cols.max(1) - 1) as f64*self.spacing;
        let height = (self.rows.max(1) - 1) as f64*self.spacing;
        let margin = self.radius/2.0;
        for _ in 0..PLACEMENT_ATTEMPTS {
            let position = Position::new(
                rng.random_range(-margin..=width + margin),
                rng.random_range(-margin..=height + margin)
            );
            if emitters.iter().any(|e| e.distance(&position) <= reach) {
                return position;
            }
        }
        match emitters.len() {
            0 => Position::new(0.0, 0.0),
            len => {
                let anchor = emitters[rng.random_range(0..len)];
                Position::new(anchor.x + reach/2.0, anchor.y)
            }
        }
    }
}
