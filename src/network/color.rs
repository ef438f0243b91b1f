use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Logical identity of a connection. Two endpoints that must be joined share
/// one color, and the ledger records occupancy per color.
///
/// How a color is painted is a separate question, answered by [`Color::rgb`].
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

/// Handle for one connection instance. A color that is released and routed
/// again gets a fresh id.
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

const PALETTE_LEN:usize = 24;

lazy_static! {
    // evenly spread hues, alternating two brightness levels so neighbours differ
    static ref PALETTE:Vec<(u8,u8,u8)> = {
        let mut colors = Vec::with_capacity(PALETTE_LEN);
        for i in 0..PALETTE_LEN {
            // stride 7 over 24 slots visits every hue once
            let hue = ((i*7) % PALETTE_LEN) as f64 * 360.0 / PALETTE_LEN as f64;
            let value = if i % 2 == 0 {0.95} else {0.75};
            colors.push(hsv_to_rgb(hue, 0.8, value));
        }
        colors
    };
}

fn hsv_to_rgb(hue:f64,saturation:f64,value:f64) -> (u8,u8,u8) {
    let chroma = value*saturation;
    let sector = hue/60.0;
    let x = chroma*(1.0 - (sector % 2.0 - 1.0).abs());
    let (r,g,b) = match sector as u32 {
        0 => (chroma,x,0.0),
        1 => (x,chroma,0.0),
        2 => (0.0,chroma,x),
        3 => (0.0,x,chroma),
        4 => (x,0.0,chroma),
        _ => (chroma,0.0,x),
    };
    let m = value - chroma;
    let to_byte = |c:f64| ((c + m)*255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r),to_byte(g),to_byte(b))
}

impl Color {
    /// Display color for renderers, cycling through a fixed palette.
    pub fn rgb(self) -> (u8,u8,u8) {
        PALETTE[self.0 as usize % PALETTE.len()]
    }
    pub fn hex(self) -> String {
        let (r,g,b) = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"color {}",self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Color,PALETTE_LEN};

    #[test]
    fn test_palette_is_distinct_and_cycles() {
        let colors:std::collections::HashSet<_> = (0..PALETTE_LEN as u32).map(|i| Color(i).rgb()).collect();
        assert_eq!(colors.len(),PALETTE_LEN);
        assert_eq!(Color(3).rgb(),Color(3 + PALETTE_LEN as u32).rgb());
    }
    #[test]
    fn test_hex_format() {
        let hex = Color(0).hex();
        assert_eq!(hex.len(),7);
        assert!(hex.starts_with('#'));
        // hue 0 at full value is a red
        let (r,g,b) = Color(0).rgb();
        assert!(r > g && r > b);
    }
    #[test]
    fn test_identity_is_not_display() {
        assert_ne!(Color(1),Color(1 + PALETTE_LEN as u32));
    }
}
