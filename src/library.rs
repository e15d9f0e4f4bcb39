// src/library.rs

//! Builds native part definitions from Eagle libraries.

use crate::eagle_models::*;
use crate::error::Diagnostic;
use crate::geometry::{map_lib_point, map_rotation, to_sch_units};
use crate::kicad_models::*;
use glam::IVec2;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

/// One Eagle library after conversion.
#[derive(Debug, Clone, Default)]
pub struct EagleLibrary {
    pub name: String,
    /// Native parts by part name (`<deviceset><device>`).
    pub parts: BTreeMap<String, LibPart>,
    /// Raw symbol records by symbol name.
    pub symbol_nodes: HashMap<String, ESymbol>,
    /// Unit number by `<deviceset>/<gate>`.
    pub gate_units: HashMap<String, u32>,
}

impl EagleLibrary {
    pub fn gate_unit(&self, deviceset: &str, gate: &str) -> Option<u32> {
        self.gate_units
            .get(&format!("{}/{}", deviceset, gate))
            .copied()
    }
}

/// A converted symbol body, before it is assigned to a unit.
#[derive(Debug, Clone, Default)]
pub struct CachedSymbol {
    pub shapes: Vec<LibShape>,
    /// Pins still carry their Eagle name as number; devices renumber them.
    pub pins: Vec<LibPin>,
    pub reference_field: Option<LibField>,
    pub value_field: Option<LibField>,
}

/// Symbol bodies keyed by (library, symbol).
#[derive(Debug, Default)]
pub struct SymbolCache {
    entries: HashMap<(String, String), CachedSymbol>,
}

impl SymbolCache {
    /// Returns the cached body for `(library, symbol.name)`, converting the
    /// symbol only the first time it is asked for.
    pub fn get_or_build(
        &mut self,
        library: &str,
        symbol: &ESymbol,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> &CachedSymbol {
        let key = (library.to_string(), symbol.name.clone());
        if !self.entries.contains_key(&key) {
            let body = load_symbol_body(library, symbol, diagnostics);
            self.entries.insert(key.clone(), body);
        }
        &self.entries[&key]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replaces characters KiCad names cannot hold.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == ':' { '_' } else { c })
        .collect()
}

pub fn part_name(deviceset: &str, device: &str) -> String {
    sanitize_name(&format!("{}{}", deviceset, device))
}

/// Converts every deviceset/device of `library` into native parts.
pub fn load_library(
    library: &ELibrary,
    cache: &mut SymbolCache,
    diagnostics: &mut Vec<Diagnostic>,
) -> EagleLibrary {
    let mut lib = EagleLibrary {
        name: library.name.clone(),
        ..Default::default()
    };

    for symbol in &library.symbols {
        lib.symbol_nodes.insert(symbol.name.clone(), symbol.clone());
    }

    for deviceset in &library.devicesets {
        for (index, gate) in deviceset.gates.iter().enumerate() {
            lib.gate_units.insert(
                format!("{}/{}", deviceset.name, gate.name),
                index as u32 + 1,
            );
        }

        for device in &deviceset.devices {
            let part = load_device(&lib, deviceset, device, cache, diagnostics);
            debug!(
                "Built part '{}' with {} unit(s) in library '{}'",
                part.name, part.unit_count, lib.name
            );
            lib.parts.insert(part.name.clone(), part);
        }
    }

    lib
}

fn load_device(
    lib: &EagleLibrary,
    deviceset: &EDeviceSet,
    device: &EDevice,
    cache: &mut SymbolCache,
    diagnostics: &mut Vec<Diagnostic>,
) -> LibPart {
    let name = part_name(&deviceset.name, &device.name);
    let mut part = LibPart::new(&name, &deviceset.prefix);
    part.footprint = device
        .package
        .as_ref()
        .map(|p| format!("{}:{}", lib.name, p));
    part.unit_count = deviceset.gates.len() as u32;

    for (index, gate) in deviceset.gates.iter().enumerate() {
        let unit = index as u32 + 1;
        let Some(symbol) = lib.symbol_nodes.get(&gate.symbol) else {
            warn!(
                "Gate '{}' of '{}' uses unknown symbol '{}'",
                gate.name, deviceset.name, gate.symbol
            );
            continue;
        };
        let body = cache.get_or_build(&lib.name, symbol, diagnostics);

        for shape in &body.shapes {
            part.items.push(LibItem {
                unit,
                shape: shape.clone(),
            });
        }
        for pin in &body.pins {
            for numbered in number_pin(pin, &gate.name, device) {
                part.items.push(LibItem {
                    unit,
                    shape: LibShape::Pin(numbered),
                });
            }
        }
        if part.reference_field.is_none() {
            part.reference_field = body.reference_field.clone();
        }
        if part.value_field.is_none() {
            part.value_field = body.value_field.clone();
        }
    }

    let pin_types: Vec<PinElectricalType> = part
        .items
        .iter()
        .filter_map(|item| match &item.shape {
            LibShape::Pin(pin) => Some(pin.electrical_type),
            _ => None,
        })
        .collect();
    part.is_power = !pin_types.is_empty()
        && pin_types
            .iter()
            .all(|t| *t == PinElectricalType::PowerOut);
    if part.reference.is_empty() {
        part.reference = if part.is_power { "#PWR" } else { "U" }.to_string();
    }

    part
}

/// Gives a symbol pin its pad numbers from the device. Extra pads become
/// hidden pins stacked on the first one.
fn number_pin(pin: &LibPin, gate: &str, device: &EDevice) -> Vec<LibPin> {
    let eagle_name = &pin.number;
    let pads: Vec<&String> = device
        .connects
        .iter()
        .filter(|c| c.gate == gate && &c.pin == eagle_name)
        .flat_map(|c| c.pads.iter())
        .collect();

    if pads.is_empty() {
        return vec![LibPin {
            number: pin.name.clone(),
            ..pin.clone()
        }];
    }

    pads.iter()
        .enumerate()
        .map(|(i, pad)| LibPin {
            number: pad.to_string(),
            hidden: pin.hidden || i > 0,
            ..pin.clone()
        })
        .collect()
}

/// Converts one symbol's shapes; unknown tags are skipped and reported.
pub fn load_symbol_body(
    library: &str,
    symbol: &ESymbol,
    diagnostics: &mut Vec<Diagnostic>,
) -> CachedSymbol {
    let mut body = CachedSymbol::default();

    for shape in &symbol.shapes {
        match shape {
            EShape::Circle(circle) => body.shapes.push(load_symbol_circle(circle)),
            EShape::Rectangle(rect) => body.shapes.push(load_symbol_rectangle(rect)),
            EShape::Polygon(polygon) => body.shapes.push(load_symbol_polyline(polygon)),
            EShape::Wire(wire) => body.shapes.push(load_symbol_wire(wire)),
            EShape::Pin(pin) => body.pins.push(load_pin(pin)),
            EShape::Text(text) => load_symbol_text(text, &mut body),
            EShape::Unknown(tag) => {
                let diagnostic = Diagnostic::UnknownShapeTag {
                    library: library.to_string(),
                    symbol: symbol.name.clone(),
                    tag: tag.clone(),
                };
                warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
    }

    body
}

fn load_symbol_circle(circle: &ECircle) -> LibShape {
    LibShape::Circle {
        center: map_lib_point(circle.x, circle.y),
        radius: to_sch_units(circle.radius),
        width: to_sch_units(circle.width),
    }
}

fn load_symbol_rectangle(rect: &ERect) -> LibShape {
    let center = map_lib_point((rect.x1 + rect.x2) / 2.0, (rect.y1 + rect.y2) / 2.0);
    let mut half = IVec2::new(
        to_sch_units((rect.x2 - rect.x1).abs() / 2.0),
        to_sch_units((rect.y2 - rect.y1).abs() / 2.0),
    );
    // Rectangles rotate about their centre.
    let orientation = map_rotation(&rect.rot);
    if matches!(orientation.rotation, Rotation::Deg90 | Rotation::Deg270) {
        half = IVec2::new(half.y, half.x);
    }
    LibShape::Rectangle {
        start: center - half,
        end: center + half,
        width: 0,
    }
}

fn load_symbol_polyline(polygon: &EPolygon) -> LibShape {
    let mut points: Vec<Point> = polygon
        .vertices
        .iter()
        .map(|(x, y)| map_lib_point(*x, *y))
        .collect();
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    LibShape::Polyline {
        points,
        width: to_sch_units(polygon.width),
        filled: true,
    }
}

fn load_symbol_wire(wire: &EWire) -> LibShape {
    if wire.curve.is_some() {
        debug!("Curved symbol wire drawn as a straight segment");
    }
    LibShape::Polyline {
        points: vec![map_lib_point(wire.x1, wire.y1), map_lib_point(wire.x2, wire.y2)],
        width: to_sch_units(wire.width),
        filled: false,
    }
}

fn load_symbol_text(text: &EText, body: &mut CachedSymbol) {
    let field = LibField {
        position: map_lib_point(text.x, text.y),
        size: to_sch_units(text.size),
        visible: true,
    };
    match text.text.trim().to_ascii_uppercase().as_str() {
        ">NAME" => body.reference_field = Some(field),
        ">VALUE" => body.value_field = Some(field),
        _ => body.shapes.push(LibShape::Text {
            text: text.text.clone(),
            position: field.position,
            size: field.size,
            angle: map_rotation(&text.rot).rotation.degrees(),
        }),
    }
}

pub fn map_pin_type(direction: Option<EPinDirection>) -> PinElectricalType {
    match direction {
        Some(EPinDirection::Nc) => PinElectricalType::NotConnected,
        Some(EPinDirection::In) => PinElectricalType::Input,
        Some(EPinDirection::Out) => PinElectricalType::Output,
        Some(EPinDirection::Io) => PinElectricalType::Bidirectional,
        Some(EPinDirection::Oc) => PinElectricalType::OpenCollector,
        Some(EPinDirection::Pwr) => PinElectricalType::PowerIn,
        Some(EPinDirection::Sup) => PinElectricalType::PowerOut,
        Some(EPinDirection::Hiz) => PinElectricalType::TriState,
        Some(EPinDirection::Pas) | None => PinElectricalType::Passive,
    }
}

fn pin_length_mm(length: EPinLength) -> f64 {
    match length {
        EPinLength::Point => 0.0,
        EPinLength::Short => 2.54,
        EPinLength::Middle => 5.08,
        EPinLength::Long => 7.62,
    }
}

fn load_pin(pin: &EPin) -> LibPin {
    let (name_visible, number_visible) = match pin.visible {
        Some(EPinVisible::Off) => (false, false),
        Some(EPinVisible::Pad) => (false, true),
        Some(EPinVisible::Pin) => (true, false),
        Some(EPinVisible::Both) | None => (true, true),
    };

    let orientation = map_rotation(&pin.rot);
    let mut pin_orientation = match orientation.rotation {
        Rotation::Deg0 => PinOrientation::Right,
        Rotation::Deg90 => PinOrientation::Up,
        Rotation::Deg180 => PinOrientation::Left,
        Rotation::Deg270 => PinOrientation::Down,
    };
    if orientation.mirror {
        pin_orientation = match pin_orientation {
            PinOrientation::Right => PinOrientation::Left,
            PinOrientation::Left => PinOrientation::Right,
            other => other,
        };
    }

    // `GND@2` style names disambiguate pins sharing a label.
    let display_name = pin.name.split('@').next().unwrap_or(&pin.name).to_string();

    LibPin {
        name: display_name,
        number: pin.name.clone(),
        position: map_lib_point(pin.x, pin.y),
        length: to_sch_units(pin_length_mm(pin.length)),
        orientation: pin_orientation,
        electrical_type: map_pin_type(pin.direction),
        name_visible,
        number_visible,
        hidden: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_defaults_are_passive_and_visible() {
        let pin = EPin {
            name: "GND@2".to_string(),
            x: 0.0,
            y: 0.0,
            length: EPinLength::Short,
            direction: None,
            visible: None,
            rot: ERot::default(),
        };
        let lib_pin = load_pin(&pin);
        assert_eq!(lib_pin.electrical_type, PinElectricalType::Passive);
        assert!(lib_pin.name_visible && lib_pin.number_visible);
        assert_eq!(lib_pin.name, "GND");
        assert_eq!(lib_pin.number, "GND@2");
        assert_eq!(lib_pin.length, 100);
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(part_name("R-US_", "0204/5"), "R-US_0204_5");
        assert_eq!(sanitize_name("A B:C"), "A_B_C");
    }
}
