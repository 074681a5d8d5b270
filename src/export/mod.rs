//! Flat-file outputs: note CSVs and the derived takes index.

pub mod index;
pub mod notes;

pub use index::{TakesIndex, build_takes_index, take_accuracy, write_takes_index};
pub use notes::{append_notes_csv, write_take_csv};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Takes directory not found: {}", .0.display())]
    MissingDir(PathBuf),
}

pub type Result<T> = std::result::Result<T, ExportError>;
