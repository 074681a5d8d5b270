use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::cleaning::{CleaningParams, GateParams, OutlierParams};
use crate::scoring::{AlignParams, SummaryOptions};
use crate::segment::SegmentStrategy;
use crate::tone::{ToneParams, VolumeParams};

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub pitch: PitchConfig,
    pub gate: GateParams,
    pub outliers: OutlierParams,
    pub segment: SegmentConfig,
    pub score: ScoreConfig,
    pub tone: ToneParams,
    pub volume: VolumeParams,
    pub paths: PathsConfig,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
}

/// Framing of the estimator output and the usable vocal range.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub frame_length: usize,
    pub hop_length: usize,
    pub fmin: f64,
    pub fmax: f64,
    /// Median filter over raw f0 before gating (0 = off).
    pub median_win: usize,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 256,
            fmin: 80.0,
            fmax: 1000.0,
            median_win: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    VoicingGap,
    QuantizedRun,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub strategy: StrategyName,
    pub min_note_len_frames: usize,
    pub max_gap_sec: f64,
    pub max_jump_cents: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyName::VoicingGap,
            min_note_len_frames: 3,
            max_gap_sec: 0.08,
            max_jump_cents: 80.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Frames beyond this |cents| are outliers (0 = no cap).
    pub max_abs_cents: f64,
    /// Outlier runs shorter than this stay in the score (0 = exclude all).
    pub ignore_short_outliers_ms: f64,
    /// Largest playback latency searched by the aligner (0 = no search).
    pub max_delay_ms: f64,
    pub penalize_late: bool,
    /// Note accuracy threshold for the takes index.
    pub takes_threshold_cents: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            max_abs_cents: 300.0,
            ignore_short_outliers_ms: 120.0,
            max_delay_ms: 0.0,
            penalize_late: false,
            takes_threshold_cents: 25.0,
        }
    }
}

/// Output locations. Relative or missing entries resolve under `data_dir`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: Option<PathBuf>,
    pub runs_file: Option<PathBuf>,
    pub takes_dir: Option<PathBuf>,
    pub notes_csv: Option<PathBuf>,
    pub takes_index: Option<PathBuf>,
    /// Fallback directory searched by file name when a reference is missing.
    pub reference_dir: Option<PathBuf>,
}

impl PathsConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    fn resolve(&self, configured: &Option<PathBuf>, default_name: &str) -> PathBuf {
        match configured {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.data_dir().join(p),
            None => self.data_dir().join(default_name),
        }
    }

    pub fn runs_file(&self) -> PathBuf {
        self.resolve(&self.runs_file, "runs.json")
    }

    pub fn takes_dir(&self) -> PathBuf {
        self.resolve(&self.takes_dir, "takes")
    }

    pub fn notes_csv(&self) -> PathBuf {
        self.resolve(&self.notes_csv, "notes.csv")
    }

    pub fn takes_index(&self) -> PathBuf {
        self.resolve(&self.takes_index, "takes_index.json")
    }
}

impl AppConfig {
    /// Load config from `~/.config/crescendo/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path, falling back to defaults on error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    pub fn cleaning(&self) -> CleaningParams {
        CleaningParams {
            median_win: self.pitch.median_win,
            gate: self.gate,
            outliers: Some(self.outliers),
        }
    }

    pub fn strategy(&self) -> SegmentStrategy {
        match self.segment.strategy {
            StrategyName::VoicingGap => SegmentStrategy::VoicingGap {
                max_gap_sec: self.segment.max_gap_sec,
                max_jump_cents: self.segment.max_jump_cents,
            },
            StrategyName::QuantizedRun => SegmentStrategy::QuantizedRun {
                min_note_len_frames: self.segment.min_note_len_frames,
                max_flip_len: self.outliers.max_flip_len,
                max_gap_frames: self.outliers.max_gap_frames,
                max_blip_diff: self.outliers.max_blip_diff,
            },
        }
    }

    pub fn summary_options(&self) -> SummaryOptions {
        let positive = |v: f64| (v > 0.0).then_some(v);
        SummaryOptions {
            max_abs_cents: positive(self.score.max_abs_cents),
            ignore_short_outliers_ms: positive(self.score.ignore_short_outliers_ms),
        }
    }

    pub fn align_params(&self) -> AlignParams {
        AlignParams {
            max_delay_ms: self.score.max_delay_ms,
            penalize_late: self.score.penalize_late,
            summary: self.summary_options(),
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// XDG data directory, or the current directory when none is available.
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", crate::APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pitch.frame_length, 2048);
        assert_eq!(config.pitch.hop_length, 256);
        assert_eq!(config.outliers.max_semitone_jump, 6.0);
        assert_eq!(config.score.max_abs_cents, 300.0);
        assert_eq!(config.segment.strategy, StrategyName::VoicingGap);
        assert_eq!(config.volume.tolerance_db, 3.0);
        assert_eq!(config.tone.smoothing_win, 5);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            workers = 3

            [segment]
            strategy = "quantized_run"
            min_note_len_frames = 2

            [score]
            max_delay_ms = 150.0
            penalize_late = true

            [gate]
            rms_gate_ratio = 0.05

            [outliers]
            max_blip_diff = 1
            smooth_run_len = 2

            [paths]
            data_dir = "/tmp/crescendo"
            takes_dir = "mytakes"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.pitch.fmax, 1000.0);
        assert_eq!(config.gate.rms_gate_ratio, 0.05);
        assert_eq!(config.gate.jump_gate_cents, 0.0);
        assert_eq!(
            config.strategy(),
            SegmentStrategy::QuantizedRun {
                min_note_len_frames: 2,
                max_flip_len: 3,
                max_gap_frames: 2,
                max_blip_diff: 1,
            }
        );
        assert_eq!(config.cleaning().outliers.map(|o| o.smooth_run_len), Some(2));
        let align = config.align_params();
        assert_eq!(align.max_delay_ms, 150.0);
        assert!(align.penalize_late);
        assert_eq!(config.paths.takes_dir(), PathBuf::from("/tmp/crescendo/mytakes"));
        assert_eq!(config.paths.runs_file(), PathBuf::from("/tmp/crescendo/runs.json"));
    }

    #[test]
    fn test_zero_disables_summary_caps() {
        let mut config = AppConfig::default();
        config.score.ignore_short_outliers_ms = 0.0;
        let opts = config.summary_options();
        assert_eq!(opts.max_abs_cents, Some(300.0));
        assert_eq!(opts.ignore_short_outliers_ms, None);
    }

    #[test]
    fn test_unparsable_file_falls_back() {
        let path = std::env::temp_dir().join(format!("crescendo-config-{}.toml", std::process::id()));
        std::fs::write(&path, "workers = \"many\"").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.workers, 0);
        std::fs::remove_file(&path).unwrap();
    }
}
