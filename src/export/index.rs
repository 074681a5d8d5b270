use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{ExportError, Result};

/// Per-take note accuracy, recomputable from the take CSVs at any time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TakesIndex {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
    pub threshold_cents: f64,
}

#[derive(Debug, Deserialize)]
struct CentsRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    cents_error: Option<f64>,
}

/// Percentage of notes in a take CSV with `|cents_error| ≤ threshold`,
/// `None` when the file has no parseable notes.
pub fn take_accuracy(csv_path: &Path, threshold_cents: f64) -> Result<Option<f64>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut total = 0usize;
    let mut within = 0usize;
    for row in reader.deserialize::<CentsRow>() {
        let Some(cents) = row?.cents_error.filter(|c| c.is_finite()) else {
            continue;
        };
        total += 1;
        if cents.abs() <= threshold_cents {
            within += 1;
        }
    }
    if total == 0 {
        return Ok(None);
    }
    Ok(Some(within as f64 / total as f64 * 100.0))
}

/// Score every `*.csv` directly inside `takes_dir`, sorted by file name.
pub fn build_takes_index(takes_dir: &Path, threshold_cents: f64) -> Result<TakesIndex> {
    if !takes_dir.is_dir() {
        return Err(ExportError::MissingDir(takes_dir.to_path_buf()));
    }

    let files: Vec<_> = WalkDir::new(takes_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| x.eq_ignore_ascii_case("csv"))
        })
        .map(|e| e.into_path())
        .collect();

    let mut index = TakesIndex {
        threshold_cents,
        ..Default::default()
    };
    for path in files {
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match take_accuracy(&path, threshold_cents)? {
            Some(score) => {
                index.labels.push(label);
                index.scores.push((score * 100.0).round() / 100.0);
            }
            None => log::warn!("No notes in {}, leaving it out of the index", path.display()),
        }
    }
    log::info!("Indexed {} takes from {}", index.labels.len(), takes_dir.display());
    Ok(index)
}

pub fn write_takes_index(path: &Path, index: &TakesIndex) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(index)?)?;
    Ok(())
}
