// src/importer.rs

use crate::eagle_models::*;
use crate::error::{Error, Result};
use log::debug;
use roxmltree::{Document, Node, ParsingOptions};

/// Oldest Eagle major version with the XML file format.
pub const MIN_SUPPORTED_MAJOR: u32 = 6;
/// Newest Eagle major version the importer knows about.
pub const MAX_SUPPORTED_MAJOR: u32 = 9;

/// Parses Eagle XML text into memory. Eagle files carry a DOCTYPE, so DTDs
/// must be allowed.
pub fn parse_xml(text: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(text, options)?)
}

/// Checks the `<eagle version="...">` header without reading anything else.
pub fn check_header(doc: &Document) -> Result<EagleVersion> {
    let root = doc.root_element();
    if root.tag_name().name() != "eagle" {
        return Err(Error::MalformedDocument(format!(
            "expected root element <eagle>, found <{}>",
            root.tag_name().name()
        )));
    }
    let raw = root
        .attribute("version")
        .ok_or_else(|| Error::MalformedDocument("<eagle> has no 'version' attribute".into()))?;
    parse_version(raw)
}

/// Parses `major[.minor[.patch]]` and checks it against the supported range.
pub fn parse_version(raw: &str) -> Result<EagleVersion> {
    let unsupported = |reason: String| Error::UnsupportedVersion {
        found: raw.to_string(),
        reason,
    };

    let mut numbers = Vec::new();
    for part in raw.trim().split('.') {
        let n = part
            .parse::<u32>()
            .map_err(|_| unsupported("version is not numeric".to_string()))?;
        numbers.push(n);
    }
    if numbers.len() > 3 {
        return Err(unsupported("too many version components".to_string()));
    }

    let major = numbers[0];
    if !(MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&major) {
        return Err(unsupported(format!(
            "only Eagle {}.x to {}.x XML files are supported",
            MIN_SUPPORTED_MAJOR, MAX_SUPPORTED_MAJOR
        )));
    }

    Ok(EagleVersion {
        major,
        minor: numbers.get(1).copied().unwrap_or(0),
        patch: numbers.get(2).copied().unwrap_or(0),
        raw: raw.to_string(),
    })
}

/// Reads a whole Eagle drawing (schematic or library file).
pub fn parse_drawing(text: &str) -> Result<EagleDrawing> {
    let doc = parse_xml(text)?;
    let version = check_header(&doc)?;
    debug!("Eagle file version {}", version.raw);

    let drawing = required_child(doc.root_element(), "drawing")?;

    let content = if let Some(schematic) = child(drawing, "schematic") {
        EagleContent::Schematic(parse_schematic(schematic)?)
    } else if let Some(library) = child(drawing, "library") {
        EagleContent::Library(parse_library(library)?)
    } else {
        return Err(Error::MalformedDocument(
            "<drawing> contains neither <schematic> nor <library>".into(),
        ));
    };

    Ok(EagleDrawing { version, content })
}

fn parse_schematic(node: Node) -> Result<ESchematic> {
    let mut schematic = ESchematic::default();

    if let Some(libraries) = child(node, "libraries") {
        for library in elements(libraries, "library") {
            schematic.libraries.push(parse_library(library)?);
        }
    }
    if let Some(parts) = child(node, "parts") {
        for part in elements(parts, "part") {
            schematic.parts.push(parse_part(part)?);
        }
    }

    let sheets = required_child(node, "sheets")?;
    for sheet in elements(sheets, "sheet") {
        schematic.sheets.push(parse_sheet(sheet)?);
    }
    if schematic.sheets.is_empty() {
        return Err(Error::MalformedDocument(
            "<sheets> contains no <sheet>".into(),
        ));
    }

    if let Some(modules) = child(node, "modules") {
        for module in elements(modules, "module") {
            schematic.modules.push(parse_module(module)?);
        }
    }

    Ok(schematic)
}

pub(crate) fn parse_library(node: Node) -> Result<ELibrary> {
    // Libraries embedded in a schematic are named; a standalone .lbr is not.
    let name = optional_attr(node, "name").unwrap_or("").to_string();
    let mut library = ELibrary {
        name,
        ..Default::default()
    };

    if let Some(symbols) = child(node, "symbols") {
        for symbol in elements(symbols, "symbol") {
            library.symbols.push(parse_symbol(symbol)?);
        }
    }
    if let Some(devicesets) = child(node, "devicesets") {
        for deviceset in elements(devicesets, "deviceset") {
            library.devicesets.push(parse_deviceset(deviceset)?);
        }
    }
    Ok(library)
}

fn parse_symbol(node: Node) -> Result<ESymbol> {
    let name = required_attr(node, "name")?.to_string();
    let mut shapes = Vec::new();
    for shape in node.children().filter(|n| n.is_element()) {
        match shape.tag_name().name() {
            "description" => {}
            _ => shapes.push(parse_shape(shape)?),
        }
    }
    Ok(ESymbol { name, shapes })
}

fn parse_shape(node: Node) -> Result<EShape> {
    Ok(match node.tag_name().name() {
        "wire" => EShape::Wire(parse_wire(node)?),
        "circle" => EShape::Circle(ECircle {
            x: parse_attr(node, "x")?,
            y: parse_attr(node, "y")?,
            radius: parse_attr(node, "radius")?,
            width: parse_attr(node, "width")?,
            layer: parse_attr(node, "layer")?,
        }),
        "rectangle" => EShape::Rectangle(ERect {
            x1: parse_attr(node, "x1")?,
            y1: parse_attr(node, "y1")?,
            x2: parse_attr(node, "x2")?,
            y2: parse_attr(node, "y2")?,
            layer: parse_attr(node, "layer")?,
            rot: parse_rot_attr(node)?,
        }),
        "polygon" => EShape::Polygon(EPolygon {
            width: parse_attr(node, "width")?,
            layer: parse_attr(node, "layer")?,
            vertices: elements(node, "vertex")
                .map(|v| Ok((parse_attr(v, "x")?, parse_attr(v, "y")?)))
                .collect::<Result<Vec<_>>>()?,
        }),
        "pin" => EShape::Pin(parse_pin(node)?),
        "text" => EShape::Text(parse_text(node)?),
        other => EShape::Unknown(other.to_string()),
    })
}

fn parse_wire(node: Node) -> Result<EWire> {
    Ok(EWire {
        x1: parse_attr(node, "x1")?,
        y1: parse_attr(node, "y1")?,
        x2: parse_attr(node, "x2")?,
        y2: parse_attr(node, "y2")?,
        width: parse_attr_or(node, "width", 0.0)?,
        layer: parse_attr(node, "layer")?,
        curve: parse_optional_attr(node, "curve")?,
    })
}

fn parse_text(node: Node) -> Result<EText> {
    Ok(EText {
        text: node.text().unwrap_or("").to_string(),
        x: parse_attr(node, "x")?,
        y: parse_attr(node, "y")?,
        size: parse_attr(node, "size")?,
        layer: parse_attr(node, "layer")?,
        rot: parse_rot_attr(node)?,
    })
}

fn parse_pin(node: Node) -> Result<EPin> {
    let length = match optional_attr(node, "length") {
        None | Some("long") => EPinLength::Long,
        Some("point") => EPinLength::Point,
        Some("short") => EPinLength::Short,
        Some("middle") => EPinLength::Middle,
        Some(other) => return Err(invalid_value(node, "length", other)),
    };
    let direction = match optional_attr(node, "direction") {
        None => None,
        Some(value) => Some(match value {
            "nc" => EPinDirection::Nc,
            "in" => EPinDirection::In,
            "out" => EPinDirection::Out,
            "io" => EPinDirection::Io,
            "oc" => EPinDirection::Oc,
            "pwr" => EPinDirection::Pwr,
            "pas" => EPinDirection::Pas,
            "hiz" => EPinDirection::Hiz,
            "sup" => EPinDirection::Sup,
            other => return Err(invalid_value(node, "direction", other)),
        }),
    };
    let visible = match optional_attr(node, "visible") {
        None => None,
        Some(value) => Some(match value {
            "off" => EPinVisible::Off,
            "pad" => EPinVisible::Pad,
            "pin" => EPinVisible::Pin,
            "both" => EPinVisible::Both,
            other => return Err(invalid_value(node, "visible", other)),
        }),
    };

    Ok(EPin {
        name: required_attr(node, "name")?.to_string(),
        x: parse_attr(node, "x")?,
        y: parse_attr(node, "y")?,
        length,
        direction,
        visible,
        rot: parse_rot_attr(node)?,
    })
}

fn parse_deviceset(node: Node) -> Result<EDeviceSet> {
    let gates = match child(node, "gates") {
        Some(gates) => elements(gates, "gate")
            .map(|g| {
                Ok(EGate {
                    name: required_attr(g, "name")?.to_string(),
                    symbol: required_attr(g, "symbol")?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let mut devices = Vec::new();
    if let Some(list) = child(node, "devices") {
        for device in elements(list, "device") {
            let connects = match child(device, "connects") {
                Some(connects) => elements(connects, "connect")
                    .map(|c| {
                        Ok(EConnect {
                            gate: required_attr(c, "gate")?.to_string(),
                            pin: required_attr(c, "pin")?.to_string(),
                            pads: required_attr(c, "pad")?
                                .split_whitespace()
                                .map(String::from)
                                .collect(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            devices.push(EDevice {
                name: optional_attr(device, "name").unwrap_or("").to_string(),
                package: optional_attr(device, "package").map(String::from),
                connects,
            });
        }
    }

    Ok(EDeviceSet {
        name: required_attr(node, "name")?.to_string(),
        prefix: optional_attr(node, "prefix").unwrap_or("").to_string(),
        gates,
        devices,
    })
}

fn parse_part(node: Node) -> Result<EPart> {
    Ok(EPart {
        name: required_attr(node, "name")?.to_string(),
        library: required_attr(node, "library")?.to_string(),
        deviceset: required_attr(node, "deviceset")?.to_string(),
        device: optional_attr(node, "device").unwrap_or("").to_string(),
        value: optional_attr(node, "value").map(String::from),
    })
}

fn parse_sheet(node: Node) -> Result<ESheet> {
    let mut sheet = ESheet::default();

    if let Some(plain) = child(node, "plain") {
        for shape in plain.children().filter(|n| n.is_element()) {
            sheet.plain.push(parse_shape(shape)?);
        }
    }
    if let Some(instances) = child(node, "instances") {
        for instance in elements(instances, "instance") {
            sheet.instances.push(parse_instance(instance)?);
        }
    }
    if let Some(busses) = child(node, "busses") {
        for bus in elements(busses, "bus") {
            sheet.busses.push(parse_net(bus)?);
        }
    }
    if let Some(nets) = child(node, "nets") {
        for net in elements(nets, "net") {
            sheet.nets.push(parse_net(net)?);
        }
    }
    if let Some(moduleinsts) = child(node, "moduleinsts") {
        for inst in elements(moduleinsts, "moduleinst") {
            sheet.moduleinsts.push(EModuleInst {
                name: required_attr(inst, "name")?.to_string(),
                module: required_attr(inst, "module")?.to_string(),
                x: parse_attr(inst, "x")?,
                y: parse_attr(inst, "y")?,
            });
        }
    }

    Ok(sheet)
}

fn parse_instance(node: Node) -> Result<EInstance> {
    let attributes = elements(node, "attribute")
        .map(|a| {
            Ok(EAttribute {
                name: required_attr(a, "name")?.to_string(),
                value: optional_attr(a, "value").map(String::from),
                x: parse_optional_attr(a, "x")?,
                y: parse_optional_attr(a, "y")?,
                size: parse_optional_attr(a, "size")?,
                layer: parse_optional_attr(a, "layer")?,
                rot: parse_rot_attr(a)?,
                display_off: optional_attr(a, "display") == Some("off"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EInstance {
        part: required_attr(node, "part")?.to_string(),
        gate: required_attr(node, "gate")?.to_string(),
        x: parse_attr(node, "x")?,
        y: parse_attr(node, "y")?,
        rot: parse_rot_attr(node)?,
        attributes,
    })
}

fn parse_net(node: Node) -> Result<ENet> {
    let mut net = ENet {
        name: optional_attr(node, "name")
            .filter(|n| !n.trim().is_empty())
            .map(String::from),
        class: parse_optional_attr(node, "class")?,
        segments: Vec::new(),
    };

    for segment in elements(node, "segment") {
        let mut seg = ESegment::default();
        for item in segment.children().filter(|n| n.is_element()) {
            match item.tag_name().name() {
                "wire" => seg.wires.push(parse_wire(item)?),
                "label" => seg.labels.push(ELabel {
                    x: parse_attr(item, "x")?,
                    y: parse_attr(item, "y")?,
                    size: parse_attr_or(item, "size", 1.778)?,
                    layer: parse_attr(item, "layer")?,
                    rot: parse_rot_attr(item)?,
                    xref: optional_attr(item, "xref") == Some("yes"),
                }),
                "junction" => seg.junctions.push(EJunction {
                    x: parse_attr(item, "x")?,
                    y: parse_attr(item, "y")?,
                }),
                "pinref" => seg.pinrefs.push(EPinRef {
                    part: required_attr(item, "part")?.to_string(),
                    gate: required_attr(item, "gate")?.to_string(),
                    pin: required_attr(item, "pin")?.to_string(),
                }),
                other => debug!("Ignoring <{}> inside net segment", other),
            }
        }
        net.segments.push(seg);
    }

    Ok(net)
}

fn parse_module(node: Node) -> Result<EModule> {
    let ports = match child(node, "ports") {
        Some(ports) => elements(ports, "port")
            .map(|p| {
                let side = match required_attr(p, "side")? {
                    "left" => EPortSide::Left,
                    "right" => EPortSide::Right,
                    "top" => EPortSide::Top,
                    "bottom" => EPortSide::Bottom,
                    other => return Err(invalid_value(p, "side", other)),
                };
                Ok(EPort {
                    name: required_attr(p, "name")?.to_string(),
                    side,
                    coord: parse_attr(p, "coord")?,
                    direction: optional_attr(p, "direction").map(String::from),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let mut sheets = Vec::new();
    if let Some(list) = child(node, "sheets") {
        for sheet in elements(list, "sheet") {
            sheets.push(parse_sheet(sheet)?);
        }
    }

    Ok(EModule {
        name: required_attr(node, "name")?.to_string(),
        dx: parse_attr(node, "dx")?,
        dy: parse_attr(node, "dy")?,
        ports,
        sheets,
    })
}

/// Parses an Eagle rotation string such as `R90`, `MR180` or `SR45`.
pub fn parse_rot(value: &str) -> Option<ERot> {
    let mut rest = value;
    let mut rot = ERot::default();
    if let Some(stripped) = rest.strip_prefix('S') {
        rot.spin = true;
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_prefix('M') {
        rot.mirror = true;
        rest = stripped;
    }
    rot.degrees = rest.strip_prefix('R')?.parse().ok()?;
    Some(rot)
}

fn parse_rot_attr(node: Node) -> Result<ERot> {
    match optional_attr(node, "rot") {
        None => Ok(ERot::default()),
        Some(value) => parse_rot(value).ok_or_else(|| invalid_value(node, "rot", value)),
    }
}

// --- attribute helpers ---

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn required_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>> {
    child(node, name).ok_or_else(|| {
        Error::MalformedDocument(format!(
            "<{}> is missing mandatory <{}>",
            node.tag_name().name(),
            name
        ))
    })
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn optional_attr<'a>(node: Node<'a, '_>, attr: &str) -> Option<&'a str> {
    node.attribute(attr)
}

fn required_attr<'a>(node: Node<'a, '_>, attr: &str) -> Result<&'a str> {
    node.attribute(attr).ok_or_else(|| {
        Error::MalformedDocument(format!(
            "<{}> at {} is missing attribute '{}'",
            node.tag_name().name(),
            node.document().text_pos_at(node.range().start),
            attr
        ))
    })
}

fn parse_attr<T: std::str::FromStr>(node: Node, attr: &str) -> Result<T> {
    let value = required_attr(node, attr)?;
    value
        .trim()
        .parse()
        .map_err(|_| invalid_value(node, attr, value))
}

fn parse_attr_or<T: std::str::FromStr>(node: Node, attr: &str, default: T) -> Result<T> {
    Ok(parse_optional_attr(node, attr)?.unwrap_or(default))
}

fn parse_optional_attr<T: std::str::FromStr>(node: Node, attr: &str) -> Result<Option<T>> {
    match node.attribute(attr) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid_value(node, attr, value)),
    }
}

fn invalid_value(node: Node, attr: &str, value: &str) -> Error {
    Error::MalformedDocument(format!(
        "<{}> at {} has invalid {}=\"{}\"",
        node.tag_name().name(),
        node.document().text_pos_at(node.range().start),
        attr,
        value
    ))
}
