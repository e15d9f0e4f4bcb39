// src/hierarchy.rs

use crate::eagle_models::{EModule, EModuleInst, EPortSide};
use crate::geometry::{map_point, to_sch_units};
use crate::kicad_models::*;
use crate::nets::fix_net_name;
use crate::schematic::Schematic;
use glam::IVec2;

/// Stack of sheets being filled, innermost last. The root is never popped.
#[derive(Debug, Clone)]
pub struct SheetCursor {
    stack: Vec<SheetId>,
}

impl SheetCursor {
    pub fn new(root: SheetId) -> Self {
        SheetCursor { stack: vec![root] }
    }

    pub fn current(&self) -> SheetId {
        self.stack[self.stack.len() - 1]
    }

    pub fn push(&mut self, sheet: SheetId) {
        self.stack.push(sheet);
    }

    pub fn pop(&mut self) -> Option<SheetId> {
        if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        }
    }
}

/// Creates a child sheet under `parent` and draws its symbol there.
pub fn attach_sheet(
    schematic: &mut Schematic,
    parent: SheetId,
    name: &str,
    file_name: &str,
    position: Point,
    size: IVec2,
    pins: Vec<SheetPin>,
) -> Option<SheetId> {
    let child = schematic.add_child(parent, name, file_name)?;
    schematic
        .sheet_mut(parent)?
        .add_item(SchItemKind::SheetSymbol(SchSheetSymbol {
            child,
            name: name.to_string(),
            file_name: file_name.to_string(),
            position,
            size,
            pins,
        }));
    Some(child)
}

const SLOT_SIZE: IVec2 = IVec2::new(2000, 1000);
const SLOT_GAP: i32 = 500;
const SLOT_ORIGIN: IVec2 = IVec2::new(1000, 1000);

/// Where the symbol of the `index`th flat sheet goes on the root.
pub fn sheet_slot(index: usize) -> (Point, IVec2) {
    let step = SLOT_SIZE.x + SLOT_GAP;
    (
        SLOT_ORIGIN + IVec2::new(step * index as i32, 0),
        SLOT_SIZE,
    )
}

/// Sheet symbol geometry for a module instance: centred on the instance,
/// sized like the module, one pin per port.
pub fn module_symbol(instance: &EModuleInst, module: &EModule) -> (Point, IVec2, Vec<SheetPin>) {
    let center = map_point(instance.x, instance.y);
    let size = IVec2::new(
        to_sch_units(module.dx).abs(),
        to_sch_units(module.dy).abs(),
    );
    let position = center - size / 2;

    let pins = module
        .ports
        .iter()
        .map(|port| {
            let offset = to_sch_units(port.coord);
            let pin_position = match port.side {
                EPortSide::Left => IVec2::new(position.x, center.y - offset),
                EPortSide::Right => IVec2::new(position.x + size.x, center.y - offset),
                EPortSide::Top => IVec2::new(center.x + offset, position.y),
                EPortSide::Bottom => IVec2::new(center.x + offset, position.y + size.y),
            };
            let shape = match port.direction.as_deref() {
                Some("in") => SheetPinShape::Input,
                Some("out") => SheetPinShape::Output,
                Some("io") => SheetPinShape::Bidirectional,
                _ => SheetPinShape::Unspecified,
            };
            SheetPin {
                name: fix_net_name(&port.name),
                shape,
                position: pin_position,
            }
        })
        .collect();

    (position, size, pins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eagle_models::EPort;

    #[test]
    fn cursor_never_pops_root() {
        let mut cursor = SheetCursor::new(SheetId(0));
        cursor.push(SheetId(3));
        assert_eq!(cursor.current(), SheetId(3));
        assert_eq!(cursor.pop(), Some(SheetId(3)));
        assert_eq!(cursor.pop(), None);
        assert_eq!(cursor.current(), SheetId(0));
    }

    #[test]
    fn module_ports_sit_on_symbol_edges() {
        let module = EModule {
            name: "FILTER".to_string(),
            dx: 25.4,
            dy: 12.7,
            ports: vec![
                EPort {
                    name: "IN".to_string(),
                    side: EPortSide::Left,
                    coord: 2.54,
                    direction: Some("in".to_string()),
                },
                EPort {
                    name: "OUT".to_string(),
                    side: EPortSide::Right,
                    coord: 0.0,
                    direction: Some("out".to_string()),
                },
            ],
            sheets: Vec::new(),
        };
        let instance = EModuleInst {
            name: "F1".to_string(),
            module: "FILTER".to_string(),
            x: 25.4,
            y: 0.0,
        };
        let (position, size, pins) = module_symbol(&instance, &module);
        assert_eq!(size, IVec2::new(1000, 500));
        assert_eq!(position, IVec2::new(500, -250));
        assert_eq!(pins[0].position, IVec2::new(500, -100));
        assert_eq!(pins[0].shape, SheetPinShape::Input);
        assert_eq!(pins[1].position, IVec2::new(1500, 0));
    }
}
