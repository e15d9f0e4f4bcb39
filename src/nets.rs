// src/nets.rs

//! Turns Eagle nets and busses into wires, junctions, labels and bus
//! entries on a sheet.

use crate::eagle_models::*;
use crate::error::Diagnostic;
use crate::geometry::{
    closest_point_on_segment, distance_squared, is_strictly_inside, map_layer, map_point,
    map_rotation, to_sch_units,
};
use crate::kicad_models::*;
use crate::library::sanitize_name;
use crate::schematic::Sheet;
use glam::IVec2;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub u32);

/// Eagle marks inverted signals with `!`, KiCad with `~`.
pub fn fix_net_name(name: &str) -> String {
    sanitize_name(&name.replace('!', "~"))
}

/// Net names assigned during an import.
///
/// Explicit names are reserved up front by [`NetNameTable::count_nets`]
/// so generated names can never take one of them.
#[derive(Debug, Default)]
pub struct NetNameTable {
    names: BTreeMap<NetId, String>,
    occurrences: HashMap<String, usize>,
    sheet_spread: HashMap<String, usize>,
    next_id: u32,
    unnamed: u32,
    sheet_nets: usize,
}

impl NetNameTable {
    /// Counts, for every explicit net and bus name, how many sheets it is
    /// drawn on (module sheets included).
    pub fn count_nets(schematic: &ESchematic) -> Self {
        let mut table = NetNameTable::default();
        let module_sheets = schematic.modules.iter().flat_map(|m| m.sheets.iter());
        for sheet in schematic.sheets.iter().chain(module_sheets) {
            let names: HashSet<String> = sheet
                .nets
                .iter()
                .chain(sheet.busses.iter())
                .filter_map(|net| net.name.as_deref())
                .map(fix_net_name)
                .collect();
            for name in names {
                *table.sheet_spread.entry(name.clone()).or_insert(0) += 1;
                table.occurrences.entry(name).or_insert(0);
            }
        }
        table
    }

    /// Names the next net. Explicit names are used as they are after
    /// sanitizing; missing ones become `N$<n>`, made unique.
    pub fn assign(&mut self, raw: Option<&str>) -> (NetId, String) {
        let id = NetId(self.next_id);
        self.next_id += 1;

        let name = match raw {
            Some(raw) => fix_net_name(raw),
            None => {
                self.unnamed += 1;
                self.unique(format!("N${}", self.unnamed))
            }
        };
        *self.occurrences.entry(name.clone()).or_insert(0) += 1;
        self.names.insert(id, name.clone());
        self.sheet_nets += 1;
        (id, name)
    }

    fn unique(&self, base: String) -> String {
        if !self.occurrences.contains_key(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !self.occurrences.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn name(&self, id: NetId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Number of sheets `name` was counted on.
    pub fn sheet_count(&self, name: &str) -> usize {
        self.sheet_spread.get(name).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Closes the current sheet, returning how many nets it named.
    pub fn finish_sheet(&mut self, sheet_name: &str) -> usize {
        let count = std::mem::take(&mut self.sheet_nets);
        info!("Sheet '{}': {} net(s) named", sheet_name, count);
        count
    }
}

/// Decides which label kind a net's labels get.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelPolicy {
    /// The net is a port of the module this sheet instantiates.
    pub hierarchical: bool,
    /// The net is drawn on more than one sheet.
    pub spans_sheets: bool,
}

impl LabelPolicy {
    pub fn kind(&self, xref: bool) -> LabelKind {
        if self.hierarchical {
            LabelKind::Hierarchical
        } else if xref || self.spans_sheets {
            LabelKind::Global
        } else {
            LabelKind::Local
        }
    }
}

/// Adds the wires, junctions and labels of one net (or bus) to `sheet`.
///
/// Labels are snapped onto the segment before anything else looks at
/// connectivity.
pub fn assemble_net(
    sheet: &mut Sheet,
    net: &ENet,
    name: &str,
    default_kind: LineKind,
    policy: LabelPolicy,
    snap_radius: i32,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for segment in &net.segments {
        let mut segment_lines = Vec::new();
        for wire in &segment.wires {
            if let Some(id) = load_wire(sheet, wire, default_kind) {
                segment_lines.push(id);
            }
        }
        for junction in &segment.junctions {
            sheet.add_item(SchItemKind::Junction(map_point(junction.x, junction.y)));
        }
        for label in &segment.labels {
            load_label(
                sheet,
                label,
                name,
                policy,
                &mut segment_lines,
                snap_radius,
                diagnostics,
            );
        }
    }
}

fn load_wire(sheet: &mut Sheet, wire: &EWire, default_kind: LineKind) -> Option<ItemId> {
    let start = map_point(wire.x1, wire.y1);
    let end = map_point(wire.x2, wire.y2);
    if start == end {
        debug!("Dropping zero length wire at {}", start);
        return None;
    }
    let kind = match map_layer(wire.layer) {
        SchLayer::Bus => LineKind::Bus,
        SchLayer::Wire => LineKind::Wire,
        _ => default_kind,
    };
    Some(sheet.add_item(SchItemKind::Line(SchLine { kind, start, end })))
}

fn load_label(
    sheet: &mut Sheet,
    label: &ELabel,
    net_name: &str,
    policy: LabelPolicy,
    segment_lines: &mut Vec<ItemId>,
    snap_radius: i32,
    diagnostics: &mut Vec<Diagnostic>,
) -> ItemId {
    let raw = map_point(label.x, label.y);
    let position = match snap_label(sheet, raw, segment_lines, snap_radius) {
        Some(position) => position,
        None => {
            let diagnostic = Diagnostic::DetachedLabel {
                net: net_name.to_string(),
                position: raw,
            };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            raw
        }
    };

    sheet.add_item(SchItemKind::Label(SchLabel {
        kind: policy.kind(label.xref),
        text: net_name.to_string(),
        position,
        orientation: map_rotation(&label.rot),
        size: to_sch_units(label.size),
    }))
}

/// Finds where a label at `raw` attaches to its segment: the nearest line
/// end within `radius`, otherwise the nearest point on a line, which is
/// split there so the label still lands on an end. `None` when the
/// segment has no lines.
pub fn snap_label(
    sheet: &mut Sheet,
    raw: Point,
    segment_lines: &mut Vec<ItemId>,
    radius: i32,
) -> Option<Point> {
    let lines: Vec<(ItemId, Point, Point)> = segment_lines
        .iter()
        .filter_map(|id| match &sheet.item(*id)?.kind {
            SchItemKind::Line(line) => Some((*id, line.start, line.end)),
            _ => None,
        })
        .collect();

    let nearest_end = lines
        .iter()
        .flat_map(|(_, start, end)| [*start, *end])
        .min_by_key(|p| distance_squared(raw, *p));
    if let Some(end) = nearest_end {
        let radius = i64::from(radius);
        if distance_squared(raw, end) <= radius * radius {
            return Some(end);
        }
    }

    let (line, on_line) = lines
        .iter()
        .map(|(id, start, end)| (*id, closest_point_on_segment(raw, *start, *end)))
        .min_by_key(|(_, p)| distance_squared(raw, *p))?;
    if let Some(second) = sheet.split_line(line, on_line) {
        segment_lines.push(second);
    }
    Some(on_line)
}

/// Splits wires and busses that pass through a junction.
pub fn break_lines_at_junctions(sheet: &mut Sheet) {
    let junctions: Vec<Point> = sheet
        .items()
        .iter()
        .filter_map(|item| match item.kind {
            SchItemKind::Junction(p) => Some(p),
            _ => None,
        })
        .collect();

    for junction in junctions {
        let crossing: Vec<ItemId> = sheet
            .items()
            .iter()
            .filter_map(|item| match &item.kind {
                SchItemKind::Line(line)
                    if line.kind != LineKind::Notes
                        && is_strictly_inside(junction, line.start, line.end) =>
                {
                    Some(item.id)
                }
                _ => None,
            })
            .collect();
        for id in crossing {
            sheet.split_line(id, junction);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct EntryPlan {
    line: ItemId,
    at_start: bool,
    touch: Point,
    bus_point: Point,
    line_point: Point,
    kind: BusEntryKind,
}

/// Places a bus entry wherever a wire (or another bus) ends in the middle
/// of a bus run. The line is pulled back by `size` along its own axis, the
/// entry runs diagonally from there to a point on the bus, and the bus is
/// split at that point. Returns how many entries were added.
pub fn add_bus_entries(sheet: &mut Sheet, size: i32) -> usize {
    let plans = plan_bus_entries(sheet, size);
    let mut added = 0;

    for plan in plans {
        let still_there = match sheet.item(plan.line).map(|item| &item.kind) {
            Some(SchItemKind::Line(line)) => {
                (if plan.at_start { line.start } else { line.end }) == plan.touch
            }
            _ => false,
        };
        if !still_there {
            continue;
        }

        let bus_to_split = sheet
            .lines(LineKind::Bus)
            .find(|(id, bus)| {
                *id != plan.line && is_strictly_inside(plan.bus_point, bus.start, bus.end)
            })
            .map(|(id, _)| id);
        if let Some(bus) = bus_to_split {
            sheet.split_line(bus, plan.bus_point);
        }

        move_labels(sheet, plan.touch, plan.line_point);
        sheet.set_line_end(plan.line, plan.at_start, plan.line_point);
        sheet.add_item(SchItemKind::BusEntry(SchBusEntry {
            kind: plan.kind,
            bus_end: plan.bus_point,
            other_end: plan.line_point,
        }));
        added += 1;
    }

    if added > 0 {
        debug!("Added {} bus entries on sheet '{}'", added, sheet.name);
    }
    added
}

/// Moves the labels sitting at `from` to `to`, following a line end.
fn move_labels(sheet: &mut Sheet, from: Point, to: Point) {
    let labels: Vec<ItemId> = sheet
        .items()
        .iter()
        .filter(|item| matches!(&item.kind, SchItemKind::Label(label) if label.position == from))
        .map(|item| item.id)
        .collect();
    for id in labels {
        sheet.move_item(id, to - from);
    }
}

fn plan_bus_entries(sheet: &Sheet, size: i32) -> Vec<EntryPlan> {
    let busses: Vec<(ItemId, SchLine)> = sheet
        .lines(LineKind::Bus)
        .map(|(id, line)| (id, line.clone()))
        .collect();
    let candidates: Vec<(ItemId, SchLine)> = sheet
        .lines(LineKind::Wire)
        .chain(sheet.lines(LineKind::Bus))
        .map(|(id, line)| (id, line.clone()))
        .collect();

    let mut plans = Vec::new();
    for (line_id, line) in &candidates {
        for (at_start, touch, other) in [(true, line.start, line.end), (false, line.end, line.start)] {
            for (bus_id, bus) in &busses {
                if bus_id == line_id || !is_strictly_inside(touch, bus.start, bus.end) {
                    continue;
                }
                let kind = match line.kind {
                    LineKind::Bus => BusEntryKind::BusToBus,
                    _ => BusEntryKind::WireToBus,
                };
                match entry_geometry(touch, other, bus, size) {
                    Some((bus_point, line_point)) => plans.push(EntryPlan {
                        line: *line_id,
                        at_start,
                        touch,
                        bus_point,
                        line_point,
                        kind,
                    }),
                    None => warn!(
                        "No room for a bus entry where the line ending at {} meets a bus",
                        touch
                    ),
                }
            }
        }
    }
    plans
}

/// Entry ends for a line touching `bus` at `touch` and running towards
/// `other`. Needs both to be axis aligned and perpendicular, the line to be
/// longer than the entry and the bus to have room on one side.
fn entry_geometry(touch: Point, other: Point, bus: &SchLine, size: i32) -> Option<(Point, Point)> {
    let along_bus = (bus.end - bus.start).signum();
    let away = (other - touch).signum();
    let axis_aligned = |v: IVec2| v.x == 0 || v.y == 0;
    if !axis_aligned(along_bus) || !axis_aligned(away) || along_bus.dot(away) != 0 {
        return None;
    }
    let line_length = (other - touch).abs();
    if line_length.x + line_length.y <= size {
        return None;
    }
    let line_point = touch + away * size;
    [along_bus, -along_bus]
        .into_iter()
        .map(|dir| touch + dir * size)
        .find(|p| is_strictly_inside(*p, bus.start, bus.end) || *p == bus.start || *p == bus.end)
        .map(|bus_point| (bus_point, line_point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overbar_and_separators_are_fixed() {
        assert_eq!(fix_net_name("!RESET"), "~RESET");
        assert_eq!(fix_net_name("A/B C"), "A_B_C");
        assert_eq!(fix_net_name("D[0..7]"), "D[0..7]");
    }

    #[test]
    fn generated_names_skip_reserved_ones() {
        let mut schematic = ESchematic::default();
        schematic.sheets.push(ESheet {
            nets: vec![ENet {
                name: Some("N$1".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        });
        let mut table = NetNameTable::count_nets(&schematic);
        let (_, first) = table.assign(None);
        let (_, second) = table.assign(None);
        assert_eq!(first, "N$1_1");
        assert_eq!(second, "N$2");
        let (id, explicit) = table.assign(Some("N$1"));
        assert_eq!(explicit, "N$1");
        assert_eq!(table.name(id), Some("N$1"));
        assert_eq!(table.finish_sheet("test"), 3);
    }

    #[test]
    fn label_policy_order() {
        let local = LabelPolicy::default();
        assert_eq!(local.kind(false), LabelKind::Local);
        assert_eq!(local.kind(true), LabelKind::Global);
        let spread = LabelPolicy {
            spans_sheets: true,
            ..Default::default()
        };
        assert_eq!(spread.kind(false), LabelKind::Global);
        let port = LabelPolicy {
            hierarchical: true,
            spans_sheets: true,
        };
        assert_eq!(port.kind(true), LabelKind::Hierarchical);
    }
}
