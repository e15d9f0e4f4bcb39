// src/kicad_models.rs

use glam::IVec2;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// A position in native schematic units (mils). Connectivity compares
/// these exactly.
pub type Point = IVec2;

// --- Layers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SchLayer {
    Wire,
    Bus,
    Junction,
    LocalLabel,
    GlobalLabel,
    HierarchicalLabel,
    Pin,
    Device,
    ReferencePart,
    ValuePart,
    Notes,
    NoConnect,
    Sheet,
    SheetLabel,
}

impl SchLayer {
    /// The complete native layer set.
    pub const ALL: [SchLayer; 14] = [
        SchLayer::Wire,
        SchLayer::Bus,
        SchLayer::Junction,
        SchLayer::LocalLabel,
        SchLayer::GlobalLabel,
        SchLayer::HierarchicalLabel,
        SchLayer::Pin,
        SchLayer::Device,
        SchLayer::ReferencePart,
        SchLayer::ValuePart,
        SchLayer::Notes,
        SchLayer::NoConnect,
        SchLayer::Sheet,
        SchLayer::SheetLabel,
    ];
}

// --- Orientation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_quarter_turns(turns: i64) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// Counter-clockwise rotation plus an optional mirror about the Y axis,
/// applied mirror first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Orientation {
    pub rotation: Rotation,
    pub mirror: bool,
}

impl Orientation {
    /// Maps a Y-up library point to a Y-down schematic offset.
    pub fn apply(&self, lib_point: Point) -> Point {
        let mut v = lib_point;
        if self.mirror {
            v.x = -v.x;
        }
        let v = match self.rotation {
            Rotation::Deg0 => v,
            Rotation::Deg90 => IVec2::new(-v.y, v.x),
            Rotation::Deg180 => -v,
            Rotation::Deg270 => IVec2::new(v.y, -v.x),
        };
        IVec2::new(v.x, -v.y)
    }
}

// --- Library parts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinElectricalType {
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
    Unspecified,
    PowerIn,
    PowerOut,
    OpenCollector,
    NotConnected,
}

impl PinElectricalType {
    pub fn as_kicad_str(self) -> &'static str {
        match self {
            PinElectricalType::Input => "input",
            PinElectricalType::Output => "output",
            PinElectricalType::Bidirectional => "bidirectional",
            PinElectricalType::TriState => "tri_state",
            PinElectricalType::Passive => "passive",
            PinElectricalType::Unspecified => "unspecified",
            PinElectricalType::PowerIn => "power_in",
            PinElectricalType::PowerOut => "power_out",
            PinElectricalType::OpenCollector => "open_collector",
            PinElectricalType::NotConnected => "no_connect",
        }
    }
}

/// Direction the pin line extends from its connection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinOrientation {
    Right,
    Up,
    Left,
    Down,
}

impl PinOrientation {
    pub fn degrees(self) -> i32 {
        match self {
            PinOrientation::Right => 0,
            PinOrientation::Up => 90,
            PinOrientation::Left => 180,
            PinOrientation::Down => 270,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibPin {
    pub name: String,
    pub number: String,
    /// Connection point, library coordinates.
    pub position: Point,
    pub length: i32,
    pub orientation: PinOrientation,
    pub electrical_type: PinElectricalType,
    pub name_visible: bool,
    pub number_visible: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LibShape {
    Circle {
        center: Point,
        radius: i32,
        width: i32,
    },
    Rectangle {
        start: Point,
        end: Point,
        width: i32,
    },
    Polyline {
        points: Vec<Point>,
        width: i32,
        filled: bool,
    },
    Text {
        text: String,
        position: Point,
        size: i32,
        angle: i32,
    },
    Pin(LibPin),
}

/// A drawing item of a part; `unit` 0 is shared by all units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibItem {
    pub unit: u32,
    pub shape: LibShape,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibField {
    pub position: Point,
    pub size: i32,
    pub visible: bool,
}

/// A native multi-unit part definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibPart {
    pub name: String,
    pub reference: String,
    pub footprint: Option<String>,
    pub unit_count: u32,
    pub is_power: bool,
    pub reference_field: Option<LibField>,
    pub value_field: Option<LibField>,
    pub items: Vec<LibItem>,
}

impl LibPart {
    pub fn new(name: &str, reference: &str) -> Self {
        LibPart {
            name: name.to_string(),
            reference: reference.to_string(),
            footprint: None,
            unit_count: 0,
            is_power: false,
            reference_field: None,
            value_field: None,
            items: Vec::new(),
        }
    }

    /// Pins visible in `unit` (including pins common to all units).
    pub fn pins(&self, unit: u32) -> impl Iterator<Item = &LibPin> {
        self.items.iter().filter_map(move |item| match &item.shape {
            LibShape::Pin(pin) if item.unit == 0 || item.unit == unit => Some(pin),
            _ => None,
        })
    }

    pub fn to_kicad_lib_entry(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            &mut out,
            "  (symbol \"{}\"{} (in_bom yes) (on_board yes)",
            escape_str(&self.name),
            if self.is_power { " (power)" } else { "" }
        );

        // --- Properties ---
        let _ = writeln!(
            &mut out,
            "    (property \"Reference\" \"{}\" (id 0) (at 0 2.54 0) (effects (font (size 1.27 1.27))))",
            escape_str(&self.reference)
        );
        let _ = writeln!(
            &mut out,
            "    (property \"Value\" \"{}\" (id 1) (at 0 -2.54 0) (effects (font (size 1.27 1.27))))",
            escape_str(&self.name)
        );
        let _ = writeln!(
            &mut out,
            "    (property \"Footprint\" \"{}\" (id 2) (at 0 0 0) (effects (font (size 1.27 1.27)) hide))",
            escape_str(self.footprint.as_deref().unwrap_or(""))
        );

        // --- Units ---
        for unit in 0..=self.unit_count {
            let items: Vec<&LibItem> = self.items.iter().filter(|i| i.unit == unit).collect();
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(
                &mut out,
                "    (symbol \"{}_{}_1\"",
                escape_str(&self.name),
                unit
            );
            for item in items {
                write_lib_shape(&mut out, &item.shape);
            }
            let _ = writeln!(&mut out, "    )");
        }

        let _ = writeln!(&mut out, "  )");
        out
    }
}

/// Escapes a value for a quoted S-expression string.
pub fn escape_str(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Rewrites Eagle's `!` overbar toggles as KiCad `~{...}` groups. An
/// unclosed overbar runs to the end of the name.
pub fn overbar_markup(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 3);
    let mut open = false;
    for c in name.chars() {
        if c == '!' {
            out.push_str(if open { "}" } else { "~{" });
            open = !open;
        } else {
            out.push(c);
        }
    }
    if open {
        out.push('}');
    }
    out
}

fn mm(v: i32) -> f64 {
    f64::from(v) * 0.0254
}

fn write_lib_shape(out: &mut String, shape: &LibShape) {
    match shape {
        LibShape::Circle {
            center,
            radius,
            width,
        } => {
            let _ = writeln!(
                out,
                "      (circle (center {} {}) (radius {}) (stroke (width {})) (fill (type none)))",
                mm(center.x),
                mm(center.y),
                mm(*radius),
                mm(*width)
            );
        }
        LibShape::Rectangle { start, end, width } => {
            let _ = writeln!(
                out,
                "      (rectangle (start {} {}) (end {} {}) (stroke (width {})) (fill (type background)))",
                mm(start.x),
                mm(start.y),
                mm(end.x),
                mm(end.y),
                mm(*width)
            );
        }
        LibShape::Polyline {
            points,
            width,
            filled,
        } => {
            let pts = points
                .iter()
                .map(|p| format!("(xy {} {})", mm(p.x), mm(p.y)))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                out,
                "      (polyline (pts {}) (stroke (width {})) (fill (type {})))",
                pts,
                mm(*width),
                if *filled { "outline" } else { "none" }
            );
        }
        LibShape::Text {
            text,
            position,
            size,
            angle,
        } => {
            let _ = writeln!(
                out,
                "      (text \"{}\" (at {} {} {}) (effects (font (size {} {}))))",
                escape_str(text),
                mm(position.x),
                mm(position.y),
                angle * 10,
                mm(*size),
                mm(*size)
            );
        }
        LibShape::Pin(pin) => {
            let _ = writeln!(
                out,
                r#"      (pin {} line (at {} {} {}) (length {}){}
        (name "{}" (effects (font (size 1.27 1.27)){}))
        (number "{}" (effects (font (size 1.27 1.27)){}))
      )"#,
                pin.electrical_type.as_kicad_str(),
                mm(pin.position.x),
                mm(pin.position.y),
                pin.orientation.degrees(),
                mm(pin.length),
                if pin.hidden { " hide" } else { "" },
                escape_str(&overbar_markup(&pin.name)),
                if pin.name_visible { "" } else { " hide" },
                escape_str(&pin.number),
                if pin.number_visible { "" } else { " hide" },
            );
        }
    }
}

/// Library + part name identifying a native part definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LibId {
    pub library: String,
    pub name: String,
}

impl LibId {
    pub fn new(library: &str, name: &str) -> Self {
        LibId {
            library: library.to_string(),
            name: name.to_string(),
        }
    }
}

/// Lookup/insert service for native part definitions.
#[derive(Debug, Clone, Default)]
pub struct PartLibrarySet {
    parts: BTreeMap<LibId, LibPart>,
}

impl Serialize for PartLibrarySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.parts
                .iter()
                .map(|(id, part)| (format!("{}:{}", id.library, id.name), part)),
        )
    }
}

impl PartLibrarySet {
    /// Inserts `part`, returning the definition it replaced.
    pub fn insert(&mut self, library: &str, part: LibPart) -> Option<LibPart> {
        self.parts.insert(LibId::new(library, &part.name), part)
    }

    pub fn get(&self, id: &LibId) -> Option<&LibPart> {
        self.parts.get(id)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LibId, &LibPart)> {
        self.parts.iter()
    }
}

// --- Schematic items ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SheetId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndpointState {
    Connected,
    Dangling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineKind {
    Wire,
    Bus,
    Notes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchLine {
    pub kind: LineKind,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BusEntryKind {
    WireToBus,
    BusToBus,
}

/// `bus_end` sits on the bus, `other_end` on the wire (or second bus).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchBusEntry {
    pub kind: BusEntryKind,
    pub bus_end: Point,
    pub other_end: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelKind {
    Local,
    Global,
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchLabel {
    pub kind: LabelKind,
    pub text: String,
    pub position: Point,
    pub orientation: Orientation,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchText {
    pub text: String,
    pub position: Point,
    pub orientation: Orientation,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchField {
    pub name: String,
    pub text: String,
    pub position: Point,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentPin {
    pub number: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchComponent {
    pub lib_id: LibId,
    pub reference: String,
    pub value: String,
    pub unit: u32,
    pub position: Point,
    pub orientation: Orientation,
    pub fields: Vec<SchField>,
    /// Absolute connection points, cached from the part definition.
    pub pins: Vec<ComponentPin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SheetPinShape {
    Input,
    Output,
    Bidirectional,
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetPin {
    pub name: String,
    pub shape: SheetPinShape,
    pub position: Point,
}

/// The symbol of a child sheet drawn on its parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchSheetSymbol {
    pub child: SheetId,
    pub name: String,
    pub file_name: String,
    pub position: Point,
    pub size: IVec2,
    pub pins: Vec<SheetPin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SchItemKind {
    Line(SchLine),
    Junction(Point),
    NoConnect(Point),
    BusEntry(SchBusEntry),
    Label(SchLabel),
    Text(SchText),
    Component(SchComponent),
    SheetSymbol(SchSheetSymbol),
}

impl SchItemKind {
    /// Number of connection points this item exposes.
    pub fn connection_count(&self) -> usize {
        match self {
            SchItemKind::Line(line) if line.kind == LineKind::Notes => 0,
            SchItemKind::Line(_) => 2,
            SchItemKind::Junction(_) | SchItemKind::NoConnect(_) | SchItemKind::Label(_) => 1,
            SchItemKind::BusEntry(_) => 2,
            SchItemKind::Text(_) => 0,
            SchItemKind::Component(c) => c.pins.len(),
            SchItemKind::SheetSymbol(s) => s.pins.len(),
        }
    }

    pub fn layer(&self) -> SchLayer {
        match self {
            SchItemKind::Line(line) => match line.kind {
                LineKind::Wire => SchLayer::Wire,
                LineKind::Bus => SchLayer::Bus,
                LineKind::Notes => SchLayer::Notes,
            },
            SchItemKind::Junction(_) => SchLayer::Junction,
            SchItemKind::NoConnect(_) => SchLayer::NoConnect,
            SchItemKind::BusEntry(entry) => match entry.kind {
                BusEntryKind::WireToBus => SchLayer::Wire,
                BusEntryKind::BusToBus => SchLayer::Bus,
            },
            SchItemKind::Label(label) => match label.kind {
                LabelKind::Local => SchLayer::LocalLabel,
                LabelKind::Global => SchLayer::GlobalLabel,
                LabelKind::Hierarchical => SchLayer::HierarchicalLabel,
            },
            SchItemKind::Text(_) => SchLayer::Notes,
            SchItemKind::Component(_) => SchLayer::Device,
            SchItemKind::SheetSymbol(_) => SchLayer::Sheet,
        }
    }

    /// Points that bound the item, for sheet auto-sizing.
    pub fn extent_points(&self) -> Vec<Point> {
        match self {
            SchItemKind::Line(line) => vec![line.start, line.end],
            SchItemKind::Junction(p) | SchItemKind::NoConnect(p) => vec![*p],
            SchItemKind::BusEntry(entry) => vec![entry.bus_end, entry.other_end],
            SchItemKind::Label(label) => vec![label.position],
            SchItemKind::Text(text) => vec![text.position],
            SchItemKind::Component(c) => std::iter::once(c.position)
                .chain(c.pins.iter().map(|p| p.position))
                .collect(),
            SchItemKind::SheetSymbol(s) => vec![s.position, s.position + s.size],
        }
    }

    /// Moves the item by `delta`.
    pub fn translate(&mut self, delta: IVec2) {
        match self {
            SchItemKind::Line(line) => {
                line.start += delta;
                line.end += delta;
            }
            SchItemKind::Junction(p) | SchItemKind::NoConnect(p) => *p += delta,
            SchItemKind::BusEntry(entry) => {
                entry.bus_end += delta;
                entry.other_end += delta;
            }
            SchItemKind::Label(label) => label.position += delta,
            SchItemKind::Text(text) => text.position += delta,
            SchItemKind::Component(c) => {
                c.position += delta;
                for field in &mut c.fields {
                    field.position += delta;
                }
                for pin in &mut c.pins {
                    pin.position += delta;
                }
            }
            SchItemKind::SheetSymbol(s) => {
                s.position += delta;
                for pin in &mut s.pins {
                    pin.position += delta;
                }
            }
        }
    }
}

/// An item owned by exactly one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchItem {
    pub id: ItemId,
    pub kind: SchItemKind,
    pub(crate) end_states: Vec<EndpointState>,
}

impl SchItem {
    pub(crate) fn new(id: ItemId, kind: SchItemKind) -> Self {
        let end_states = vec![EndpointState::Dangling; kind.connection_count()];
        SchItem {
            id,
            kind,
            end_states,
        }
    }

    /// Per connection point state as of the last connectivity pass.
    pub fn end_states(&self) -> &[EndpointState] {
        &self.end_states
    }

    pub fn is_dangling(&self) -> bool {
        self.end_states.contains(&EndpointState::Dangling)
    }
}
