mod common;

use common::*;
use eagle2kicad_rs::eagle_models::*;
use eagle2kicad_rs::error::{Diagnostic, Error};
use eagle2kicad_rs::file_writer::KicadLibrary;
use eagle2kicad_rs::kicad_models::*;
use eagle2kicad_rs::library::{SymbolCache, load_library};
use eagle2kicad_rs::{enumerate_symbols, load_symbol};
use std::fs;
use tempfile::TempDir;

fn write_library(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("demo.lbr");
    fs::write(&path, eagle_library_file()).unwrap();
    path
}

#[test]
fn test_enumerate_symbols_lists_parts() {
    let dir = TempDir::new().unwrap();
    let names = enumerate_symbols(&write_library(&dir)).unwrap();
    assert_eq!(names, vec!["7400N".to_string(), "R0603".to_string()]);
}

#[test]
fn test_enumerate_symbols_reads_schematic_libraries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("board.sch");
    fs::write(&path, demo_schematic("", "<sheet/>")).unwrap();
    let names = enumerate_symbols(&path).unwrap();
    assert_eq!(names.len(), 2);
}

#[test]
fn test_load_symbol_numbers_pins_from_pads() {
    let dir = TempDir::new().unwrap();
    let part = load_symbol(&write_library(&dir), "R0603").unwrap();

    assert_eq!(part.reference, "R");
    assert_eq!(part.unit_count, 1);
    assert!(!part.is_power);
    assert_eq!(part.footprint.as_deref(), Some("demo:R0603"));
    let pins: Vec<&LibPin> = part.pins(1).collect();
    assert_eq!(pins.len(), 2);
    assert_eq!(pins[0].number, "1");
    assert_eq!(pins[1].orientation, PinOrientation::Left);
    assert!(!pins[0].name_visible && !pins[0].number_visible);
    assert!(part.reference_field.is_some());
    assert!(part.value_field.is_some());
}

#[test]
fn test_load_symbol_with_two_gates() {
    let dir = TempDir::new().unwrap();
    let part = load_symbol(&write_library(&dir), "7400N").unwrap();
    assert_eq!(part.unit_count, 2);
    assert_eq!(part.pins(1).count(), 3);
    let unit_two: Vec<&str> = part.pins(2).map(|p| p.number.as_str()).collect();
    assert_eq!(unit_two, ["4", "5", "6"]);
    assert_eq!(
        part.pins(1).map(|p| p.electrical_type).collect::<Vec<_>>(),
        [
            PinElectricalType::Input,
            PinElectricalType::Input,
            PinElectricalType::Output
        ]
    );

    let entry = part.to_kicad_lib_entry();
    assert!(entry.contains(r#"(symbol "7400N_1_1""#));
    assert!(entry.contains(r#"(symbol "7400N_2_1""#));
}

#[test]
fn test_load_missing_symbol_fails() {
    let dir = TempDir::new().unwrap();
    let result = load_symbol(&write_library(&dir), "NOPE");
    assert!(matches!(
        result,
        Err(Error::SymbolNotFound { ref name, .. }) if name == "NOPE"
    ));
}

fn symbol_library(shapes: Vec<EShape>) -> ELibrary {
    ELibrary {
        name: "misc".to_string(),
        symbols: vec![ESymbol {
            name: "BODY".to_string(),
            shapes,
        }],
        devicesets: vec![EDeviceSet {
            name: "PART".to_string(),
            prefix: String::new(),
            gates: vec![EGate {
                name: "G$1".to_string(),
                symbol: "BODY".to_string(),
            }],
            devices: vec![EDevice {
                name: String::new(),
                package: None,
                connects: Vec::new(),
            }],
        }],
    }
}

fn pin(name: &str, direction: EPinDirection) -> EShape {
    EShape::Pin(EPin {
        name: name.to_string(),
        x: 0.0,
        y: 0.0,
        length: EPinLength::Short,
        direction: Some(direction),
        visible: None,
        rot: ERot::default(),
    })
}

#[test]
fn test_unknown_shape_is_skipped_and_reported() {
    let library = symbol_library(vec![
        EShape::Unknown("frame".to_string()),
        pin("P", EPinDirection::Pas),
    ]);
    let mut cache = SymbolCache::default();
    let mut diagnostics = Vec::new();
    let lib = load_library(&library, &mut cache, &mut diagnostics);

    assert_eq!(
        diagnostics,
        vec![Diagnostic::UnknownShapeTag {
            library: "misc".to_string(),
            symbol: "BODY".to_string(),
            tag: "frame".to_string(),
        }]
    );
    let part = &lib.parts["PART"];
    assert_eq!(part.reference, "U");
    assert_eq!(part.pins(1).count(), 1);
    assert_eq!(part.pins(1).next().unwrap().number, "P");
}

#[test]
fn test_supply_only_part_is_power() {
    let library = symbol_library(vec![pin("GND", EPinDirection::Sup)]);
    let mut cache = SymbolCache::default();
    let lib = load_library(&library, &mut cache, &mut Vec::new());
    let part = &lib.parts["PART"];
    assert!(part.is_power);
    assert_eq!(part.reference, "#PWR");
}

#[test]
fn test_symbols_are_converted_once() {
    let library = symbol_library(vec![EShape::Unknown("frame".to_string())]);
    let mut cache = SymbolCache::default();
    let mut diagnostics = Vec::new();
    load_library(&library, &mut cache, &mut diagnostics);
    load_library(&library, &mut cache, &mut diagnostics);
    assert_eq!(cache.len(), 1);
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn test_library_writer_skips_duplicates() {
    let dir = TempDir::new().unwrap();
    let writer = KicadLibrary {
        path: dir.path().join("out"),
    };
    let mut parts = PartLibrarySet::default();
    parts.insert("demo", LibPart::new("R0603", "R"));
    parts.insert("demo", LibPart::new("C0603", "C"));

    assert_eq!(writer.write_library("board-cache", &parts).unwrap(), 2);
    assert_eq!(writer.write_library("board-cache", &parts).unwrap(), 0);

    let content = fs::read_to_string(writer.library_path("board-cache")).unwrap();
    assert!(content.starts_with("(kicad_symbol_lib"));
    assert!(content.trim_end().ends_with(')'));
    assert_eq!(content.matches(r#"(symbol "R0603""#).count(), 1);
    assert_eq!(content.matches(r#"(symbol "C0603""#).count(), 1);
}

#[test]
fn test_library_writer_keeps_first_of_clashing_names() {
    let dir = TempDir::new().unwrap();
    let writer = KicadLibrary {
        path: dir.path().join("out"),
    };
    let mut parts = PartLibrarySet::default();
    parts.insert("alpha", LibPart::new("R0603", "R"));
    parts.insert("beta", LibPart::new("R0603", "RN"));

    assert_eq!(writer.write_library("board-cache", &parts).unwrap(), 1);

    let content = fs::read_to_string(writer.library_path("board-cache")).unwrap();
    assert_eq!(content.matches(r#"(symbol "R0603""#).count(), 1);
    assert!(content.contains(r#"(property "Reference" "R""#));
}
