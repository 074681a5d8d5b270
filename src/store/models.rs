use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{AccuracySummary, FrameDetail};
use crate::tone::{ToneReport, VolumeFrame, VolumeSummary};

/// How a run was produced: input shape, thresholds and the chosen alignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetadata {
    pub vocal: Option<String>,
    pub reference: Option<String>,
    pub sample_rate: u32,
    pub frame_length: usize,
    pub hop_length: usize,
    pub rms_gate_ratio: f64,
    pub jump_gate_cents: f64,
    pub max_abs_cents: Option<f64>,
    pub ignore_short_outliers_ms: Option<f64>,
    pub max_delay_ms: f64,
    pub penalize_late: bool,
    pub offset_frames: i64,
    pub offset_ms: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSection {
    pub summary: VolumeSummary,
    pub frames: Vec<VolumeFrame>,
}

/// One analyzed take. Replaced wholesale on re-analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub take: String,
    #[serde(default)]
    pub metadata: RunMetadata,
    #[serde(default)]
    pub summary: AccuracySummary,
    #[serde(default)]
    pub pitch_accuracy_score: Option<f64>,
    #[serde(default)]
    pub frames: Vec<FrameDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<ToneReport>,
}

/// On-disk shape of the run file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFile {
    pub runs: Vec<RunRecord>,
}
