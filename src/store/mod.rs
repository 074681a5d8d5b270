pub mod models;

pub use models::{RunFile, RunMetadata, RunRecord, VolumeSection};

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed run file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Keyed repository of analyzed runs.
///
/// `upsert` replaces the record with the same `take` in place and leaves
/// every other record untouched; a new take is appended.
pub trait RunStore {
    fn get(&self, take: &str) -> Result<Option<RunRecord>>;
    fn upsert(&mut self, record: RunRecord) -> Result<()>;
    fn runs(&self) -> Result<Vec<RunRecord>>;
}

fn upsert_into(runs: &mut Vec<RunRecord>, record: RunRecord) {
    match runs.iter_mut().find(|r| r.take == record.take) {
        Some(existing) => *existing = record,
        None => runs.push(record),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: Vec<RunRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryStore {
    fn get(&self, take: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.iter().find(|r| r.take == take).cloned())
    }

    fn upsert(&mut self, record: RunRecord) -> Result<()> {
        upsert_into(&mut self.runs, record);
        Ok(())
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.runs.clone())
    }
}

/// Run store backed by a single JSON file (`{"runs": [...]}`).
///
/// Every call re-reads the file so separate invocations never work from a
/// stale copy. Writes go through a sibling temp file and a rename.
pub struct JsonRunStore {
    path: PathBuf,
}

impl JsonRunStore {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = serde_json::from_str(&text)?;
        parse_runs(value, &self.path)
    }

    fn save(&self, runs: Vec<RunRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&RunFile { runs })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Accept both the multi-run shape and a legacy single-run object.
fn parse_runs(value: serde_json::Value, path: &Path) -> Result<Vec<RunRecord>> {
    let serde_json::Value::Object(map) = value else {
        return Err(StoreError::Malformed {
            path: path.to_path_buf(),
            reason: "top level is not a JSON object".to_string(),
        });
    };

    if map.contains_key("runs") {
        let file: RunFile = serde_json::from_value(serde_json::Value::Object(map))?;
        return Ok(file.runs);
    }

    let mut record: RunRecord = serde_json::from_value(serde_json::Value::Object(map))?;
    if record.take.is_empty() {
        record.take = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    log::info!("Wrapping legacy single-run file {} as take '{}'", path.display(), record.take);
    Ok(vec![record])
}

impl RunStore for JsonRunStore {
    fn get(&self, take: &str) -> Result<Option<RunRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.take == take))
    }

    fn upsert(&mut self, record: RunRecord) -> Result<()> {
        let mut runs = self.load()?;
        log::debug!("Upserting run '{}' into {}", record.take, self.path.display());
        upsert_into(&mut runs, record);
        self.save(runs)
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        self.load()
    }
}
