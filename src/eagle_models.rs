// src/eagle_models.rs

//! Typed records read from an Eagle XML drawing.
//!
//! Coordinates are kept in Eagle millimetres; nothing here is validated
//! against anything else in the document. Cross references (part to
//! library, instance to part, module instance to module) are resolved by
//! the consuming stages.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub struct EagleDrawing {
    pub version: EagleVersion,
    pub content: EagleContent,
}

#[derive(Debug, Clone)]
pub enum EagleContent {
    Schematic(ESchematic),
    Library(ELibrary),
}

#[derive(Debug, Clone, Default)]
pub struct ESchematic {
    pub libraries: Vec<ELibrary>,
    pub parts: Vec<EPart>,
    pub sheets: Vec<ESheet>,
    pub modules: Vec<EModule>,
}

#[derive(Debug, Clone, Default)]
pub struct ELibrary {
    pub name: String,
    pub symbols: Vec<ESymbol>,
    pub devicesets: Vec<EDeviceSet>,
}

#[derive(Debug, Clone)]
pub struct ESymbol {
    pub name: String,
    pub shapes: Vec<EShape>,
}

/// One drawing primitive of a symbol or of a sheet's `<plain>` section.
#[derive(Debug, Clone)]
pub enum EShape {
    Wire(EWire),
    Circle(ECircle),
    Rectangle(ERect),
    Polygon(EPolygon),
    Pin(EPin),
    Text(EText),
    /// Anything the loaders have no counterpart for, by tag name.
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct EDeviceSet {
    pub name: String,
    pub prefix: String,
    pub gates: Vec<EGate>,
    pub devices: Vec<EDevice>,
}

#[derive(Debug, Clone)]
pub struct EGate {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub struct EDevice {
    pub name: String,
    pub package: Option<String>,
    pub connects: Vec<EConnect>,
}

#[derive(Debug, Clone)]
pub struct EConnect {
    pub gate: String,
    pub pin: String,
    /// Space separated pad list, Eagle 7+ allows several pads per pin.
    pub pads: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EPart {
    pub name: String,
    pub library: String,
    pub deviceset: String,
    pub device: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ESheet {
    pub plain: Vec<EShape>,
    pub instances: Vec<EInstance>,
    pub busses: Vec<ENet>,
    pub nets: Vec<ENet>,
    pub moduleinsts: Vec<EModuleInst>,
}

#[derive(Debug, Clone)]
pub struct EInstance {
    pub part: String,
    pub gate: String,
    pub x: f64,
    pub y: f64,
    pub rot: ERot,
    pub attributes: Vec<EAttribute>,
}

/// A positioned `<attribute>` child of an instance (NAME, VALUE, ...).
#[derive(Debug, Clone)]
pub struct EAttribute {
    pub name: String,
    pub value: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub size: Option<f64>,
    pub layer: Option<i32>,
    pub rot: ERot,
    pub display_off: bool,
}

/// A `<net>` or a `<bus>`; both are lists of segments.
#[derive(Debug, Clone, Default)]
pub struct ENet {
    pub name: Option<String>,
    pub class: Option<i32>,
    pub segments: Vec<ESegment>,
}

#[derive(Debug, Clone, Default)]
pub struct ESegment {
    pub wires: Vec<EWire>,
    pub labels: Vec<ELabel>,
    pub junctions: Vec<EJunction>,
    pub pinrefs: Vec<EPinRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EWire {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub layer: i32,
    pub curve: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ELabel {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub layer: i32,
    pub rot: ERot,
    pub xref: bool,
}

#[derive(Debug, Clone)]
pub struct EJunction {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct EPinRef {
    pub part: String,
    pub gate: String,
    pub pin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EPinLength {
    Point,
    Short,
    Middle,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EPinDirection {
    Nc,
    In,
    Out,
    Io,
    Oc,
    Pwr,
    Pas,
    Hiz,
    Sup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EPinVisible {
    Off,
    Pad,
    Pin,
    Both,
}

#[derive(Debug, Clone)]
pub struct EPin {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub length: EPinLength,
    pub direction: Option<EPinDirection>,
    pub visible: Option<EPinVisible>,
    pub rot: ERot,
}

#[derive(Debug, Clone)]
pub struct EText {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub layer: i32,
    pub rot: ERot,
}

#[derive(Debug, Clone)]
pub struct ECircle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub width: f64,
    pub layer: i32,
}

#[derive(Debug, Clone)]
pub struct ERect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub layer: i32,
    pub rot: ERot,
}

#[derive(Debug, Clone)]
pub struct EPolygon {
    pub width: f64,
    pub layer: i32,
    pub vertices: Vec<(f64, f64)>,
}

/// Eagle rotation string `[S][M]R<degrees>`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ERot {
    pub degrees: f64,
    pub mirror: bool,
    pub spin: bool,
}

#[derive(Debug, Clone)]
pub struct EModule {
    pub name: String,
    pub dx: f64,
    pub dy: f64,
    pub ports: Vec<EPort>,
    pub sheets: Vec<ESheet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EPortSide {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone)]
pub struct EPort {
    pub name: String,
    pub side: EPortSide,
    pub coord: f64,
    pub direction: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EModuleInst {
    pub name: String,
    pub module: String,
    pub x: f64,
    pub y: f64,
}
