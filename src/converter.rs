// src/converter.rs

use crate::config::ImportOptions;
use crate::connectivity::test_dangling_ends;
use crate::eagle_models::*;
use crate::error::{Diagnostic, Error, Result};
use crate::geometry::to_sch_units;
use crate::hierarchy::{SheetCursor, attach_sheet, module_symbol, sheet_slot};
use crate::instances::{place_instance, place_plain};
use crate::kicad_models::*;
use crate::library::{EagleLibrary, SymbolCache, load_library};
use crate::nets::{
    LabelPolicy, NetNameTable, add_bus_entries, assemble_net, break_lines_at_junctions,
    fix_net_name,
};
use crate::schematic::Schematic;
use log::{info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A finished import: the document, its parts and what went wrong along
/// the way without stopping it.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedSchematic {
    pub schematic: Schematic,
    pub libraries: PartLibrarySet,
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportedSchematic {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Converts a parsed Eagle schematic into a native document named `name`.
///
/// Nothing is returned unless the whole conversion succeeds.
pub fn convert_schematic(
    name: &str,
    eagle: &ESchematic,
    options: &ImportOptions,
) -> Result<ImportedSchematic> {
    let mut diagnostics = Vec::new();

    let mut cache = SymbolCache::default();
    let libraries: HashMap<String, EagleLibrary> = eagle
        .libraries
        .iter()
        .map(|library| {
            (
                library.name.clone(),
                load_library(library, &mut cache, &mut diagnostics),
            )
        })
        .collect();
    info!(
        "Loaded {} librar(ies), {} distinct symbol(s)",
        libraries.len(),
        cache.len()
    );

    let parts: HashMap<String, EPart> = eagle
        .parts
        .iter()
        .map(|part| (part.name.clone(), part.clone()))
        .collect();
    let modules: HashMap<&str, &EModule> = eagle
        .modules
        .iter()
        .map(|module| (module.name.as_str(), module))
        .collect();

    let mut net_names = NetNameTable::count_nets(eagle);
    let mut schematic = Schematic::new(name);
    let mut cursor = SheetCursor::new(schematic.root());

    let mut loader = SheetLoader {
        parts: &parts,
        libraries: &libraries,
        modules: &modules,
        snap_radius: to_sch_units(options.label_snap_radius_mm),
        net_names: &mut net_names,
        diagnostics: &mut diagnostics,
    };
    loader.load_sheets(
        &mut schematic,
        &mut cursor,
        &eagle.sheets,
        name,
        &HashSet::new(),
        &mut Vec::new(),
    )?;

    for sheet in schematic.sheets_mut() {
        break_lines_at_junctions(sheet);
        add_bus_entries(sheet, options.bus_entry_size);
        if options.fit_to_page {
            sheet.fit_to_page(options.page_margin);
        }
        let report = test_dangling_ends(sheet);
        diagnostics.extend(report.diagnostics(&sheet.name));
    }

    let mut part_set = PartLibrarySet::default();
    for (library_name, library) in libraries {
        for (_, part) in library.parts {
            part_set.insert(&library_name, part);
        }
    }

    info!(
        "Imported '{}': {} sheet(s), {} part(s), {} diagnostic(s)",
        name,
        schematic.sheets().count(),
        part_set.len(),
        diagnostics.len()
    );

    Ok(ImportedSchematic {
        schematic,
        libraries: part_set,
        diagnostics,
    })
}

/// Shared lookups for one import. The sheet being filled is not stored
/// here; it travels through the calls as a [`SheetCursor`].
struct SheetLoader<'a> {
    parts: &'a HashMap<String, EPart>,
    libraries: &'a HashMap<String, EagleLibrary>,
    modules: &'a HashMap<&'a str, &'a EModule>,
    snap_radius: i32,
    net_names: &'a mut NetNameTable,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl SheetLoader<'_> {
    /// One Eagle sheet loads into the current sheet; several become child
    /// sheets of it.
    fn load_sheets(
        &mut self,
        schematic: &mut Schematic,
        cursor: &mut SheetCursor,
        sheets: &[ESheet],
        base_name: &str,
        ports: &HashSet<String>,
        module_stack: &mut Vec<String>,
    ) -> Result<()> {
        if let [only] = sheets {
            return self.load_sheet(schematic, cursor, only, ports, module_stack);
        }

        for (index, sheet) in sheets.iter().enumerate() {
            let name = format!("{}_{}", base_name, index + 1);
            let (position, size) = sheet_slot(index);
            let child = attach_sheet(
                schematic,
                cursor.current(),
                &name,
                &format!("{}.sch", name),
                position,
                size,
                Vec::new(),
            )
            .ok_or_else(|| Error::MalformedDocument(format!("cannot attach sheet '{}'", name)))?;

            cursor.push(child);
            self.load_sheet(schematic, cursor, sheet, ports, module_stack)?;
            cursor.pop();
        }
        Ok(())
    }

    fn load_sheet(
        &mut self,
        schematic: &mut Schematic,
        cursor: &mut SheetCursor,
        esheet: &ESheet,
        ports: &HashSet<String>,
        module_stack: &mut Vec<String>,
    ) -> Result<()> {
        let sheet_id = cursor.current();
        let sheet = schematic
            .sheet_mut(sheet_id)
            .ok_or_else(|| Error::MalformedDocument(format!("no sheet {:?}", sheet_id)))?;

        place_plain(sheet, &esheet.plain);

        for instance in &esheet.instances {
            if let Err(diagnostic) = place_instance(sheet, instance, self.parts, self.libraries) {
                warn!("{}", diagnostic);
                self.diagnostics.push(diagnostic);
            }
        }

        for (nets, default_kind) in [(&esheet.busses, LineKind::Bus), (&esheet.nets, LineKind::Wire)] {
            for net in nets {
                let (_, name) = self.net_names.assign(net.name.as_deref());
                let policy = LabelPolicy {
                    hierarchical: ports.contains(&name),
                    spans_sheets: self.net_names.sheet_count(&name) > 1,
                };
                assemble_net(
                    sheet,
                    net,
                    &name,
                    default_kind,
                    policy,
                    self.snap_radius,
                    self.diagnostics,
                );
            }
        }
        self.net_names.finish_sheet(&sheet.name);

        for instance in &esheet.moduleinsts {
            self.load_module_instance(schematic, cursor, instance, module_stack)?;
        }
        Ok(())
    }

    fn load_module_instance(
        &mut self,
        schematic: &mut Schematic,
        cursor: &mut SheetCursor,
        instance: &EModuleInst,
        module_stack: &mut Vec<String>,
    ) -> Result<()> {
        let Some(module) = self.modules.get(instance.module.as_str()).copied() else {
            let diagnostic = Diagnostic::UnresolvedModuleReference {
                instance: instance.name.clone(),
                module: instance.module.clone(),
            };
            warn!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
            return Ok(());
        };
        if module_stack.contains(&module.name) {
            return Err(Error::MalformedDocument(format!(
                "module '{}' instantiates itself",
                module.name
            )));
        }

        let (position, size, pins) = module_symbol(instance, module);
        let child = attach_sheet(
            schematic,
            cursor.current(),
            &instance.name,
            &format!("{}.sch", module.name),
            position,
            size,
            pins,
        )
        .ok_or_else(|| {
            Error::MalformedDocument(format!("cannot attach module instance '{}'", instance.name))
        })?;

        let ports: HashSet<String> = module.ports.iter().map(|p| fix_net_name(&p.name)).collect();

        cursor.push(child);
        module_stack.push(module.name.clone());
        self.load_sheets(
            schematic,
            cursor,
            &module.sheets,
            &instance.name,
            &ports,
            module_stack,
        )?;
        module_stack.pop();
        cursor.pop();
        Ok(())
    }
}
