use glam::IVec2;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON (de)serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unsupported Eagle version '{found}': {reason}")]
    UnsupportedVersion { found: String, reason: String },

    #[error("Symbol '{name}' not found in library '{library}'")]
    SymbolNotFound { library: String, name: String },
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::MalformedDocument(format!("XML parse error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable problems found during an import.
///
/// These never abort the import; they are collected next to the imported
/// document so the caller can show them.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    #[error("Part '{part}' could not be resolved: {detail}")]
    UnresolvedPartReference { part: String, detail: String },

    #[error("Unknown shape <{tag}> in symbol '{symbol}' of library '{library}' skipped")]
    UnknownShapeTag {
        library: String,
        symbol: String,
        tag: String,
    },

    #[error("No-connect marker at {position} on sheet '{sheet}' has nothing to mark")]
    InconsistentNoConnect { sheet: String, position: IVec2 },

    #[error("Label for net '{net}' at {position} has no wire to attach to")]
    DetachedLabel { net: String, position: IVec2 },

    #[error("Module instance '{instance}' references unknown module '{module}'")]
    UnresolvedModuleReference { instance: String, module: String },
}
