// src/instances.rs

use crate::eagle_models::*;
use crate::error::Diagnostic;
use crate::geometry::{eagle_layer, map_placement, map_point, map_rotation, to_sch_units};
use crate::kicad_models::*;
use crate::library::{EagleLibrary, part_name};
use crate::schematic::Sheet;
use log::debug;
use std::collections::HashMap;

/// Places the component for one Eagle instance on `sheet`, plus a
/// no-connect marker on each of its `nc` pins.
///
/// An instance whose part, library, device or gate cannot be found is not
/// placed; the returned diagnostic says why.
pub fn place_instance(
    sheet: &mut Sheet,
    instance: &EInstance,
    parts: &HashMap<String, EPart>,
    libraries: &HashMap<String, EagleLibrary>,
) -> Result<ItemId, Diagnostic> {
    let unresolved = |detail: String| Diagnostic::UnresolvedPartReference {
        part: instance.part.clone(),
        detail,
    };

    let part = parts
        .get(&instance.part)
        .ok_or_else(|| unresolved("no matching <part> entry".to_string()))?;
    let library = libraries
        .get(&part.library)
        .ok_or_else(|| unresolved(format!("library '{}' is not loaded", part.library)))?;
    let name = part_name(&part.deviceset, &part.device);
    let lib_part = library.parts.get(&name).ok_or_else(|| {
        unresolved(format!(
            "device '{}' not found in library '{}'",
            name, library.name
        ))
    })?;
    let unit = library
        .gate_unit(&part.deviceset, &instance.gate)
        .ok_or_else(|| {
            unresolved(format!(
                "gate '{}' not found in deviceset '{}'",
                instance.gate, part.deviceset
            ))
        })?;

    let placement = map_placement(instance.x, instance.y, eagle_layer::SYMBOLS, &instance.rot);
    let position = placement.position;
    let orientation = placement.orientation;

    let pins: Vec<ComponentPin> = lib_part
        .pins(unit)
        .map(|pin| ComponentPin {
            number: pin.number.clone(),
            position: position + orientation.apply(pin.position),
        })
        .collect();
    let no_connects: Vec<Point> = lib_part
        .pins(unit)
        .filter(|pin| pin.electrical_type == PinElectricalType::NotConnected)
        .map(|pin| position + orientation.apply(pin.position))
        .collect();

    let value = part
        .value
        .clone()
        .unwrap_or_else(|| format!("{}{}", part.deviceset, part.device));

    let mut fields = vec![
        field(
            "Reference",
            &part.name,
            instance,
            "NAME",
            lib_part.reference_field.as_ref(),
            position,
            orientation,
        ),
        field(
            "Value",
            &value,
            instance,
            "VALUE",
            lib_part.value_field.as_ref(),
            position,
            orientation,
        ),
    ];
    for attribute in &instance.attributes {
        if matches!(attribute.name.as_str(), "NAME" | "VALUE") {
            continue;
        }
        if let Some(text) = &attribute.value {
            fields.push(SchField {
                name: attribute.name.clone(),
                text: text.clone(),
                position: attribute_position(attribute).unwrap_or(position),
                visible: !attribute.display_off,
            });
        }
    }

    let id = sheet.add_item(SchItemKind::Component(SchComponent {
        lib_id: LibId::new(&library.name, &lib_part.name),
        reference: part.name.clone(),
        value,
        unit,
        position,
        orientation,
        fields,
        pins,
    }));

    for point in no_connects {
        sheet.add_item(SchItemKind::NoConnect(point));
    }

    debug!(
        "Placed {} ({}) unit {} at {}",
        part.name, lib_part.name, unit, position
    );
    Ok(id)
}

fn attribute_position(attribute: &EAttribute) -> Option<Point> {
    Some(map_point(attribute.x?, attribute.y?))
}

/// A field placed by the instance's attribute if it has one, else by the
/// symbol's `>NAME`/`>VALUE` text, else on the component origin.
fn field(
    name: &str,
    text: &str,
    instance: &EInstance,
    attribute_name: &str,
    lib_field: Option<&LibField>,
    position: Point,
    orientation: Orientation,
) -> SchField {
    let attribute = instance
        .attributes
        .iter()
        .find(|a| a.name == attribute_name);

    let field_position = attribute
        .and_then(attribute_position)
        .or_else(|| lib_field.map(|f| position + orientation.apply(f.position)))
        .unwrap_or(position);

    SchField {
        name: name.to_string(),
        text: text.to_string(),
        position: field_position,
        visible: !attribute.is_some_and(|a| a.display_off),
    }
}

/// Loads a sheet's `<plain>` texts and lines as notes.
pub fn place_plain(sheet: &mut Sheet, plain: &[EShape]) {
    for shape in plain {
        match shape {
            EShape::Text(text) => {
                sheet.add_item(SchItemKind::Text(SchText {
                    text: text.text.clone(),
                    position: map_point(text.x, text.y),
                    orientation: map_rotation(&text.rot),
                    size: to_sch_units(text.size),
                }));
            }
            EShape::Wire(wire) => {
                sheet.add_item(SchItemKind::Line(SchLine {
                    kind: LineKind::Notes,
                    start: map_point(wire.x1, wire.y1),
                    end: map_point(wire.x2, wire.y2),
                }));
            }
            other => debug!("Skipping plain shape {:?}", other),
        }
    }
}
