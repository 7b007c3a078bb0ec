use std::fs;
use std::path::{Path, PathBuf};

use dimlabel_core::document::Document;
use thiserror::Error;

pub mod journal;
pub mod tabular;

pub use journal::{FileJournal, Journal, MemoryJournal};
pub use tabular::{DelimitedTableLoader, TabularRow, TabularSource};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid table {path:?}: {message}")]
    InvalidTable { path: PathBuf, message: String },
    #[error("invalid drawing snapshot {path:?}: {source}")]
    InvalidSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 以 JSON 快照形式读写图纸文档，供 CLI 在宿主程序之外驱动标注命令。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSnapshot;

impl JsonSnapshot {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for JsonSnapshot {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| IoError::InvalidSnapshot {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl DocumentSaver for JsonSnapshot {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let data =
            serde_json::to_string_pretty(document).map_err(|source| IoError::InvalidSnapshot {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}
