use crate::error::Result;
use crate::kicad_models::*;
use log::{info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

const KICAD_SYM_HEADER: &str = r#"(kicad_symbol_lib (version 20211014) (generator eagle2kicad_rs)
"#;

const KICAD_SYM_FOOTER: &str = r#")
"#;

/// Manages an output symbol library on disk.
pub struct KicadLibrary {
    pub path: PathBuf,
}

impl KicadLibrary {
    pub fn setup_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    pub fn library_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.kicad_sym", name))
    }

    /// Appends `part` to the `name` library, creating the file if needed.
    /// Returns false if a symbol of that name is already in it.
    pub fn add_part(&self, name: &str, part: &LibPart) -> Result<bool> {
        let lib_path = self.library_path(name);
        let part_content = part.to_kicad_lib_entry();

        if lib_path.exists() {
            let mut file_content = String::new();
            File::open(&lib_path)?.read_to_string(&mut file_content)?;

            let pattern = format!(
                r#"\(\s*symbol\s*"{}"\s"#,
                regex::escape(&escape_str(&part.name))
            );
            let re = Regex::new(&pattern)?;

            if re.is_match(&file_content) {
                info!(
                    "Symbol '{}' already exists in '{}'. Skipping.",
                    part.name,
                    lib_path.display()
                );
                return Ok(false);
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lib_path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(KICAD_SYM_HEADER.as_bytes())?;
            file.write_all(part_content.as_bytes())?;
            file.write_all(KICAD_SYM_FOOTER.as_bytes())?;
        } else {
            // Insert before the closing parenthesis.
            file.seek(SeekFrom::End(-(KICAD_SYM_FOOTER.len() as i64)))?;
            file.write_all(part_content.as_bytes())?;
            file.write_all(KICAD_SYM_FOOTER.as_bytes())?;
        }
        Ok(true)
    }

    /// Writes every part of `libraries` into the `name` library and
    /// returns how many were added. Symbols are keyed by part name alone,
    /// so a second library defining the same name loses its part.
    pub fn write_library(&self, name: &str, libraries: &PartLibrarySet) -> Result<usize> {
        self.setup_directories()?;
        let mut added = 0;
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for (id, part) in libraries.iter() {
            if let Some(owner) = owners.get(part.name.as_str()) {
                warn!(
                    "Symbol '{}' from library '{}' clashes with the one from '{}' and is not written",
                    part.name, id.library, owner
                );
                continue;
            }
            owners.insert(&part.name, &id.library);
            if self.add_part(name, part)? {
                added += 1;
            }
        }
        info!(
            "Wrote {} symbol(s) to '{}'",
            added,
            self.library_path(name).display()
        );
        Ok(added)
    }
}
