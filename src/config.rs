// src/config.rs

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Half of Eagle's default 0.1 in grid.
pub const DEFAULT_LABEL_SNAP_RADIUS_MM: f64 = 1.27;
/// Native size of a bus entry along each axis.
pub const DEFAULT_BUS_ENTRY_SIZE: i32 = 100;
pub const DEFAULT_PAGE_MARGIN: i32 = 1000;

/// Knobs for one import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Labels closer than this to a segment end snap onto it; farther ones
    /// are attached to the nearest wire instead.
    pub label_snap_radius_mm: f64,
    pub bus_entry_size: i32,
    pub fit_to_page: bool,
    pub page_margin: i32,
    /// Write the imported parts as `<name>-cache.kicad_sym` here.
    pub cache_library_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            label_snap_radius_mm: DEFAULT_LABEL_SNAP_RADIUS_MM,
            bus_entry_size: DEFAULT_BUS_ENTRY_SIZE,
            fit_to_page: true,
            page_margin: DEFAULT_PAGE_MARGIN,
            cache_library_dir: None,
        }
    }
}

impl ImportOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = ImportOptions::from_json_str(r#"{ "label_snap_radius_mm": 0.5 }"#).unwrap();
        assert_eq!(options.label_snap_radius_mm, 0.5);
        assert_eq!(options.bus_entry_size, DEFAULT_BUS_ENTRY_SIZE);
        assert!(options.fit_to_page);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(ImportOptions::from_json_str("{ nope").is_err());
    }
}
