// src/lib.rs

pub mod config;
pub mod connectivity;
pub mod converter;
pub mod eagle_models;
pub mod error;
pub mod file_writer;
pub mod geometry;
pub mod hierarchy;
pub mod importer;
pub mod instances;
pub mod kicad_models;
pub mod library;
pub mod nets;
pub mod schematic;

pub use crate::config::ImportOptions;
pub use crate::converter::ImportedSchematic;

use crate::eagle_models::{EagleContent, ELibrary};
use crate::error::{Error, Result};
use crate::kicad_models::LibPart;
use crate::library::{SymbolCache, load_library};
use log::{info, warn};
use std::path::Path;

/// Imports the Eagle schematic at `path`. The root sheet is named after
/// the file stem.
pub fn load_schematic(path: &Path, options: &ImportOptions) -> Result<ImportedSchematic> {
    info!("Importing Eagle schematic {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "schematic".to_string());
    load_schematic_str(&text, &name, options)
}

/// Imports Eagle schematic XML held in memory.
pub fn load_schematic_str(
    text: &str,
    name: &str,
    options: &ImportOptions,
) -> Result<ImportedSchematic> {
    let drawing = importer::parse_drawing(text)?;
    let EagleContent::Schematic(eagle) = &drawing.content else {
        return Err(Error::MalformedDocument(
            "expected a <schematic> drawing, found a <library>".into(),
        ));
    };

    let imported = converter::convert_schematic(name, eagle, options)?;

    if let Some(dir) = &options.cache_library_dir {
        let kicad_lib = file_writer::KicadLibrary {
            path: dir.to_path_buf(),
        };
        kicad_lib.write_library(&format!("{}-cache", name), &imported.libraries)?;
    }

    for diagnostic in &imported.diagnostics {
        warn!("{}", diagnostic);
    }
    Ok(imported)
}

/// Libraries of an `.lbr` file, or the ones embedded in a schematic. A
/// standalone library is named after its file.
fn read_libraries(path: &Path) -> Result<Vec<ELibrary>> {
    let text = std::fs::read_to_string(path)?;
    let drawing = importer::parse_drawing(&text)?;
    Ok(match drawing.content {
        EagleContent::Library(mut library) => {
            if library.name.is_empty() {
                if let Some(stem) = path.file_stem() {
                    library.name = stem.to_string_lossy().into_owned();
                }
            }
            vec![library]
        }
        EagleContent::Schematic(schematic) => schematic.libraries,
    })
}

/// Names of every part the library file at `path` defines.
pub fn enumerate_symbols(path: &Path) -> Result<Vec<String>> {
    let mut cache = SymbolCache::default();
    let mut diagnostics = Vec::new();
    let mut names = Vec::new();
    for library in read_libraries(path)? {
        let lib = load_library(&library, &mut cache, &mut diagnostics);
        names.extend(lib.parts.into_keys());
    }
    Ok(names)
}

/// Loads the part `name` from the library file at `path`.
pub fn load_symbol(path: &Path, name: &str) -> Result<LibPart> {
    let mut cache = SymbolCache::default();
    let mut diagnostics = Vec::new();
    for library in read_libraries(path)? {
        let mut lib = load_library(&library, &mut cache, &mut diagnostics);
        if let Some(part) = lib.parts.remove(name) {
            for diagnostic in &diagnostics {
                warn!("{}", diagnostic);
            }
            return Ok(part);
        }
    }
    Err(Error::SymbolNotFound {
        library: path.display().to_string(),
        name: name.to_string(),
    })
}
