// src/connectivity.rs

//! Dangling end detection.
//!
//! Every connectable item exposes its connection points as
//! [`DanglingEnd`] descriptors. Two ends join when they sit on exactly the
//! same point, belong to different items and their classes agree (wires
//! do not join busses except through a bus entry). Descriptors are rebuilt
//! on every pass and refer back to their item through an [`ItemRef`], so
//! they cannot outlive a structural edit of the sheet.

use crate::error::Diagnostic;
use crate::kicad_models::*;
use crate::schematic::{ItemRef, Sheet};
use log::{debug, warn};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DanglingEndKind {
    WireStart,
    WireEnd,
    BusStart,
    BusEnd,
    Junction,
    Pin,
    Label,
    Entry,
    SheetLabel,
    NoConnect,
}

/// Which kind of line an end may join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionClass {
    Wire,
    Bus,
    Any,
}

impl ConnectionClass {
    pub fn joins(self, other: ConnectionClass) -> bool {
        self == ConnectionClass::Any || other == ConnectionClass::Any || self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DanglingEnd {
    pub kind: DanglingEndKind,
    pub position: Point,
    pub class: ConnectionClass,
    pub item: ItemRef,
    /// Index of this end among the item's connection points.
    pub slot: usize,
}

/// Connection points of one item, in slot order.
pub fn connection_points(kind: &SchItemKind) -> Vec<(DanglingEndKind, Point, ConnectionClass)> {
    match kind {
        SchItemKind::Line(line) => match line.kind {
            LineKind::Wire => vec![
                (DanglingEndKind::WireStart, line.start, ConnectionClass::Wire),
                (DanglingEndKind::WireEnd, line.end, ConnectionClass::Wire),
            ],
            LineKind::Bus => vec![
                (DanglingEndKind::BusStart, line.start, ConnectionClass::Bus),
                (DanglingEndKind::BusEnd, line.end, ConnectionClass::Bus),
            ],
            LineKind::Notes => Vec::new(),
        },
        SchItemKind::Junction(p) => vec![(DanglingEndKind::Junction, *p, ConnectionClass::Any)],
        SchItemKind::NoConnect(p) => vec![(DanglingEndKind::NoConnect, *p, ConnectionClass::Any)],
        SchItemKind::BusEntry(entry) => {
            let other_class = match entry.kind {
                BusEntryKind::WireToBus => ConnectionClass::Wire,
                BusEntryKind::BusToBus => ConnectionClass::Bus,
            };
            vec![
                (DanglingEndKind::Entry, entry.bus_end, ConnectionClass::Bus),
                (DanglingEndKind::Entry, entry.other_end, other_class),
            ]
        }
        SchItemKind::Label(label) => {
            vec![(DanglingEndKind::Label, label.position, ConnectionClass::Any)]
        }
        SchItemKind::Text(_) => Vec::new(),
        SchItemKind::Component(component) => component
            .pins
            .iter()
            .map(|pin| (DanglingEndKind::Pin, pin.position, ConnectionClass::Wire))
            .collect(),
        SchItemKind::SheetSymbol(symbol) => symbol
            .pins
            .iter()
            .map(|pin| (DanglingEndKind::SheetLabel, pin.position, ConnectionClass::Any))
            .collect(),
    }
}

/// Collects a fresh descriptor for every connection point on `sheet`.
pub fn collect_end_points(sheet: &Sheet) -> Vec<DanglingEnd> {
    sheet
        .items()
        .iter()
        .enumerate()
        .flat_map(|(index, item)| {
            let item_ref = sheet.item_ref(index);
            connection_points(&item.kind)
                .into_iter()
                .enumerate()
                .map(move |(slot, (kind, position, class))| DanglingEnd {
                    kind,
                    position,
                    class,
                    item: item_ref,
                    slot,
                })
        })
        .collect()
}

/// Result of one connectivity pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectivityReport {
    /// Items whose end states differ from the previous pass.
    pub changed: Vec<ItemId>,
    /// No-connect markers that sit where nothing is left dangling.
    pub inconsistent_no_connects: Vec<(ItemId, Point)>,
    pub dangling_ends: usize,
}

impl ConnectivityReport {
    pub fn diagnostics(&self, sheet_name: &str) -> Vec<Diagnostic> {
        self.inconsistent_no_connects
            .iter()
            .map(|(_, position)| Diagnostic::InconsistentNoConnect {
                sheet: sheet_name.to_string(),
                position: *position,
            })
            .collect()
    }
}

/// Recomputes every end state on `sheet` and reports what changed. Only
/// connectivity state is written; geometry is left alone.
pub fn test_dangling_ends(sheet: &mut Sheet) -> ConnectivityReport {
    let ends = collect_end_points(sheet);

    let mut by_position: HashMap<Point, Vec<usize>> = HashMap::new();
    for (i, end) in ends.iter().enumerate() {
        by_position.entry(end.position).or_default().push(i);
    }

    let joins_other = |i: usize, skip_no_connects: bool| -> bool {
        let end = &ends[i];
        by_position[&end.position].iter().any(|&j| {
            let other = &ends[j];
            other.item != end.item
                && !(skip_no_connects && other.kind == DanglingEndKind::NoConnect)
                && end.class.joins(other.class)
        })
    };

    let mut states: HashMap<ItemRef, Vec<EndpointState>> = HashMap::new();
    let mut report = ConnectivityReport::default();

    for (i, end) in ends.iter().enumerate() {
        let connected = if end.kind == DanglingEndKind::NoConnect {
            let consistent = by_position[&end.position].iter().any(|&j| {
                let other = &ends[j];
                other.kind != DanglingEndKind::NoConnect && !joins_other(j, true)
            });
            if !consistent {
                if let Some(item) = sheet.resolve(end.item) {
                    warn!(
                        "No-connect at {} on sheet '{}' marks nothing dangling",
                        end.position, sheet.name
                    );
                    report
                        .inconsistent_no_connects
                        .push((item.id, end.position));
                }
            }
            by_position[&end.position]
                .iter()
                .any(|&j| ends[j].kind != DanglingEndKind::NoConnect)
        } else {
            joins_other(i, false)
        };

        let slots = states.entry(end.item).or_default();
        if slots.len() <= end.slot {
            slots.resize(end.slot + 1, EndpointState::Dangling);
        }
        slots[end.slot] = if connected {
            EndpointState::Connected
        } else {
            report.dangling_ends += 1;
            EndpointState::Dangling
        };
    }

    for (item_ref, new_states) in states {
        let Some(item) = sheet.resolve_mut(item_ref) else {
            continue;
        };
        if item.end_states != new_states {
            item.end_states = new_states;
            report.changed.push(item.id);
        }
    }
    report.changed.sort();

    debug!(
        "Sheet '{}': {} end(s), {} dangling, {} item(s) changed",
        sheet.name,
        ends.len(),
        report.dangling_ends,
        report.changed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_and_bus_classes_do_not_join() {
        assert!(!ConnectionClass::Wire.joins(ConnectionClass::Bus));
        assert!(ConnectionClass::Wire.joins(ConnectionClass::Any));
        assert!(ConnectionClass::Bus.joins(ConnectionClass::Bus));
    }
}
