// src/geometry.rs

//! Eagle to native coordinate, rotation and layer mapping.

use crate::eagle_models::ERot;
use crate::kicad_models::{Orientation, Point, Rotation, SchLayer};
use glam::IVec2;
use log::warn;

/// Native units (mils) per Eagle millimetre.
pub const MILS_PER_MM: f64 = 1000.0 / 25.4;

/// Eagle layer numbers with a native counterpart.
pub mod eagle_layer {
    pub const NETS: i32 = 91;
    pub const BUSSES: i32 = 92;
    pub const PINS: i32 = 93;
    pub const SYMBOLS: i32 = 94;
    pub const NAMES: i32 = 95;
    pub const VALUES: i32 = 96;
    pub const INFO: i32 = 97;
    pub const GUIDE: i32 = 98;
}

pub fn to_sch_units(mm: f64) -> i32 {
    (mm * MILS_PER_MM).round() as i32
}

/// Schematic point: scaled with the Y axis inverted.
pub fn map_point(x: f64, y: f64) -> Point {
    IVec2::new(to_sch_units(x), -to_sch_units(y))
}

/// Library point: scaled, Y stays up. Placement flips it later.
pub fn map_lib_point(x: f64, y: f64) -> Point {
    IVec2::new(to_sch_units(x), to_sch_units(y))
}

/// Total map from Eagle layers; anything unknown goes to notes.
pub fn map_layer(eagle_layer: i32) -> SchLayer {
    match eagle_layer {
        eagle_layer::NETS => SchLayer::Wire,
        eagle_layer::BUSSES => SchLayer::Bus,
        eagle_layer::PINS => SchLayer::Pin,
        eagle_layer::SYMBOLS => SchLayer::Device,
        eagle_layer::NAMES => SchLayer::ReferencePart,
        eagle_layer::VALUES => SchLayer::ValuePart,
        eagle_layer::INFO | eagle_layer::GUIDE => SchLayer::Notes,
        _ => SchLayer::Notes,
    }
}

/// Snaps an Eagle rotation to the nearest quarter turn.
pub fn map_rotation(rot: &ERot) -> Orientation {
    let turns = (rot.degrees / 90.0).round();
    if (rot.degrees - turns * 90.0).abs() > f64::EPSILON {
        warn!(
            "Rotation of {} degrees snapped to {} degrees",
            rot.degrees,
            turns * 90.0
        );
    }
    Orientation {
        rotation: Rotation::from_quarter_turns(turns as i64),
        mirror: rot.mirror,
    }
}

/// Native placement of one Eagle primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub position: Point,
    pub layer: SchLayer,
    pub orientation: Orientation,
}

pub fn map_placement(x: f64, y: f64, layer: i32, rot: &ERot) -> Placement {
    Placement {
        position: map_point(x, y),
        layer: map_layer(layer),
        orientation: map_rotation(rot),
    }
}

// --- native segment helpers ---

pub fn distance_squared(a: Point, b: Point) -> i64 {
    let dx = i64::from(a.x) - i64::from(b.x);
    let dy = i64::from(a.y) - i64::from(b.y);
    dx * dx + dy * dy
}

/// True when `p` lies exactly on segment `a`-`b`, excluding both ends.
pub fn is_strictly_inside(p: Point, a: Point, b: Point) -> bool {
    let (ax, ay) = (i64::from(a.x), i64::from(a.y));
    let (bx, by) = (i64::from(b.x) - ax, i64::from(b.y) - ay);
    let (px, py) = (i64::from(p.x) - ax, i64::from(p.y) - ay);
    if bx * py - by * px != 0 {
        return false;
    }
    let dot = px * bx + py * by;
    dot > 0 && dot < bx * bx + by * by
}

/// Closest point to `p` on segment `a`-`b`, rounded to the grid.
pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let ab = (b - a).as_dvec2();
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return a;
    }
    let t = ((p - a).as_dvec2().dot(ab) / len2).clamp(0.0, 1.0);
    let q = a.as_dvec2() + ab * t;
    IVec2::new(q.x.round() as i32, q.y.round() as i32)
}
