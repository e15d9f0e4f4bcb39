use eagle2kicad_rs::connectivity::{collect_end_points, test_dangling_ends};
use eagle2kicad_rs::error::Diagnostic;
use eagle2kicad_rs::kicad_models::*;
use eagle2kicad_rs::nets::add_bus_entries;
use eagle2kicad_rs::schematic::{Schematic, Sheet};
use glam::IVec2;

fn line(kind: LineKind, start: (i32, i32), end: (i32, i32)) -> SchItemKind {
    SchItemKind::Line(SchLine {
        kind,
        start: IVec2::new(start.0, start.1),
        end: IVec2::new(end.0, end.1),
    })
}

fn wire(start: (i32, i32), end: (i32, i32)) -> SchItemKind {
    line(LineKind::Wire, start, end)
}

fn states(sheet: &Sheet, id: ItemId) -> Vec<EndpointState> {
    sheet.item(id).unwrap().end_states().to_vec()
}

use EndpointState::{Connected, Dangling};

#[test]
fn test_shared_endpoint_is_connected() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let first = sheet.add_item(wire((0, 0), (100, 0)));
    let second = sheet.add_item(wire((100, 0), (100, 100)));

    let report = test_dangling_ends(sheet);

    assert_eq!(states(sheet, first), vec![Dangling, Connected]);
    assert_eq!(states(sheet, second), vec![Connected, Dangling]);
    assert_eq!(report.dangling_ends, 2);
    assert_eq!(report.changed, vec![first, second]);
}

#[test]
fn test_isolated_endpoint_is_dangling() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let id = sheet.add_item(wire((0, 0), (100, 0)));
    sheet.add_item(wire((0, 1), (100, 1)));

    let report = test_dangling_ends(sheet);

    assert_eq!(states(sheet, id), vec![Dangling, Dangling]);
    assert_eq!(report.dangling_ends, 4);
    // Nothing moved from the initial state.
    assert!(report.changed.is_empty());
}

#[test]
fn test_second_pass_reports_no_changes() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    sheet.add_item(wire((0, 0), (100, 0)));
    sheet.add_item(wire((100, 0), (200, 0)));
    sheet.add_item(SchItemKind::Junction(IVec2::new(100, 0)));

    let first = test_dangling_ends(sheet);
    assert!(!first.changed.is_empty());
    let generation = sheet.generation();

    let second = test_dangling_ends(sheet);
    assert!(second.changed.is_empty());
    assert_eq!(sheet.generation(), generation);
}

#[test]
fn test_wire_does_not_join_bus_directly() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let w = sheet.add_item(wire((0, 0), (100, 0)));
    let b = sheet.add_item(line(LineKind::Bus, (100, 0), (200, 0)));

    test_dangling_ends(sheet);

    assert_eq!(states(sheet, w), vec![Dangling, Dangling]);
    assert_eq!(states(sheet, b), vec![Dangling, Dangling]);
}

#[test]
fn test_label_joins_wire_and_bus() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let b = sheet.add_item(line(LineKind::Bus, (0, 0), (100, 0)));
    let label = sheet.add_item(SchItemKind::Label(SchLabel {
        kind: LabelKind::Local,
        text: "D[0..7]".to_string(),
        position: IVec2::new(100, 0),
        orientation: Orientation::default(),
        size: 70,
    }));

    test_dangling_ends(sheet);

    assert_eq!(states(sheet, b), vec![Dangling, Connected]);
    assert_eq!(states(sheet, label), vec![Connected]);
}

#[test]
fn test_no_connect_on_dangling_end_is_consistent() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let w = sheet.add_item(wire((0, 0), (100, 0)));
    let nc = sheet.add_item(SchItemKind::NoConnect(IVec2::new(100, 0)));

    let report = test_dangling_ends(sheet);

    assert!(report.inconsistent_no_connects.is_empty());
    assert_eq!(states(sheet, nc), vec![Connected]);
    assert_eq!(states(sheet, w), vec![Dangling, Connected]);
}

#[test]
fn test_no_connect_on_joined_ends_is_inconsistent() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    sheet.add_item(wire((0, 0), (100, 0)));
    sheet.add_item(wire((100, 0), (200, 0)));
    let nc = sheet.add_item(SchItemKind::NoConnect(IVec2::new(100, 0)));
    let lonely = sheet.add_item(SchItemKind::NoConnect(IVec2::new(500, 500)));

    let report = test_dangling_ends(sheet);

    assert_eq!(
        report.inconsistent_no_connects,
        vec![(nc, IVec2::new(100, 0)), (lonely, IVec2::new(500, 500))]
    );
    assert_eq!(states(sheet, lonely), vec![Dangling]);
    assert_eq!(
        report.diagnostics("root")[0],
        Diagnostic::InconsistentNoConnect {
            sheet: "root".to_string(),
            position: IVec2::new(100, 0),
        }
    );
}

#[test]
fn test_component_pins_join_wires() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let component = sheet.add_item(SchItemKind::Component(SchComponent {
        lib_id: LibId::new("demo", "R0603"),
        reference: "R1".to_string(),
        value: "10k".to_string(),
        unit: 1,
        position: IVec2::ZERO,
        orientation: Orientation::default(),
        fields: Vec::new(),
        pins: vec![
            ComponentPin {
                number: "1".to_string(),
                position: IVec2::new(-200, 0),
            },
            ComponentPin {
                number: "2".to_string(),
                position: IVec2::new(200, 0),
            },
        ],
    }));
    sheet.add_item(wire((-400, 0), (-200, 0)));

    test_dangling_ends(sheet);

    assert_eq!(states(sheet, component), vec![Connected, Dangling]);
    assert_eq!(collect_end_points(sheet).len(), 4);
}

#[test]
fn test_bus_entry_connects_wire_to_bus_run() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    sheet.add_item(line(LineKind::Bus, (0, 0), (0, 1000)));
    let w = sheet.add_item(wire((0, 500), (500, 500)));

    assert_eq!(add_bus_entries(sheet, 100), 1);

    let SchItemKind::Line(pulled) = &sheet.item(w).unwrap().kind else {
        panic!("not a line");
    };
    assert_eq!(pulled.start, IVec2::new(100, 500));
    let busses: Vec<&SchLine> = sheet.lines(LineKind::Bus).map(|(_, l)| l).collect();
    assert_eq!(busses.len(), 2);
    let entry = sheet
        .items()
        .iter()
        .find(|item| matches!(item.kind, SchItemKind::BusEntry(_)))
        .unwrap();
    let SchItemKind::BusEntry(geometry) = &entry.kind else {
        unreachable!()
    };
    assert_eq!(geometry.kind, BusEntryKind::WireToBus);
    assert_eq!(geometry.bus_end, IVec2::new(0, 600));
    assert_eq!(geometry.other_end, IVec2::new(100, 500));
    let entry_id = entry.id;

    test_dangling_ends(sheet);
    assert_eq!(states(sheet, entry_id), vec![Connected, Connected]);
    assert_eq!(states(sheet, w), vec![Connected, Dangling]);
}

#[test]
fn test_bus_entry_needs_room() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    sheet.add_item(line(LineKind::Bus, (0, 0), (0, 1000)));
    sheet.add_item(wire((0, 500), (50, 500)));

    assert_eq!(add_bus_entries(sheet, 100), 0);
}

#[test]
fn test_moving_an_item_is_picked_up_on_next_pass() {
    let mut schematic = Schematic::new("root");
    let sheet = schematic.sheet_mut(schematic.root()).unwrap();
    let fixed = sheet.add_item(wire((0, 0), (100, 0)));
    let moving = sheet.add_item(wire((100, 0), (200, 0)));
    test_dangling_ends(sheet);
    assert_eq!(states(sheet, fixed), vec![Dangling, Connected]);

    assert!(sheet.move_item(moving, IVec2::new(0, 100)));
    let report = test_dangling_ends(sheet);

    assert_eq!(report.changed, vec![fixed, moving]);
    assert_eq!(states(sheet, fixed), vec![Dangling, Dangling]);
}
