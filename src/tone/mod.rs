//! Secondary voice-quality metrics computed alongside pitch accuracy.
//!
//! [`analyze_tone`] runs any subset of the pitch-smoothness, spectral and
//! jitter/shimmer analyzers and merges their per-frame output by index onto
//! the contour's time axis. Volume consistency lives in [`volume`] and is run
//! separately since it only needs frame energy.

pub mod jitter;
pub mod smoothness;
pub mod spectral;
pub mod volume;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contour::Contour;
use jitter::Spread;
use smoothness::SmoothnessSummary;
use spectral::SpectralSummary;

pub use volume::{VolumeFrame, VolumeParams, VolumeSummary, analyze_volume};

#[derive(Error, Debug)]
pub enum ToneError {
    #[error("Unknown tone metric '{0}' (expected smoothness, spectral or jitter)")]
    UnknownMetric(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneMetric {
    Smoothness,
    Spectral,
    Jitter,
}

impl FromStr for ToneMetric {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smoothness" => Ok(Self::Smoothness),
            "spectral" => Ok(Self::Spectral),
            "jitter" | "shimmer" => Ok(Self::Jitter),
            other => Err(ToneError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for ToneMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Smoothness => "smoothness",
            Self::Spectral => "spectral",
            Self::Jitter => "jitter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneParams {
    /// Centred averaging width for the smoothness track.
    pub smoothing_win: usize,
    pub tolerance_cents_per_step: f64,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            smoothing_win: 5,
            tolerance_cents_per_step: 20.0,
        }
    }
}

/// What the tone analyzers read from a take.
pub struct ToneInput<'a> {
    pub contour: &'a Contour,
    /// Raw mono samples; without them the spectral metrics are skipped.
    pub samples: Option<&'a [f32]>,
    pub sample_rate: u32,
    pub frame_length: usize,
    pub hop_length: usize,
}

/// Merged per-frame values; only requested metrics are serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneFrame {
    pub time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothed_midi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_cents: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hnr_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h1_h2_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shimmer: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothness: Option<SmoothnessSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectral: Option<SpectralSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<Spread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shimmer: Option<Spread>,
    pub frames: Vec<ToneFrame>,
}

/// Run the requested tone metrics over one take.
pub fn analyze_tone(input: &ToneInput<'_>, metrics: &[ToneMetric], params: &ToneParams) -> ToneReport {
    let contour = input.contour;
    let f0 = contour.f0();
    let mut report = ToneReport {
        frames: contour
            .times()
            .into_iter()
            .map(|time| ToneFrame {
                time,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    if metrics.contains(&ToneMetric::Smoothness) {
        let (summary, frames) =
            smoothness::analyze_smoothness(&f0, params.smoothing_win, params.tolerance_cents_per_step);
        for (out, sm) in report.frames.iter_mut().zip(frames) {
            out.smoothed_midi = sm.smoothed_midi;
            out.delta_cents = sm.delta_cents;
        }
        report.smoothness = Some(summary);
    }

    if metrics.contains(&ToneMetric::Spectral) {
        match input.samples {
            Some(samples) => {
                let (summary, frames) = spectral::analyze_spectral(
                    samples,
                    input.sample_rate,
                    input.frame_length,
                    input.hop_length,
                    &f0,
                );
                if frames.len() != report.frames.len() {
                    log::debug!(
                        "Spectral frames ({}) differ from contour frames ({}); merging by index",
                        frames.len(),
                        report.frames.len()
                    );
                }
                for (out, sf) in report.frames.iter_mut().zip(frames) {
                    out.centroid_hz = sf.centroid_hz;
                    out.flatness = sf.flatness;
                    out.tilt_db = sf.tilt_db;
                    out.hnr_db = sf.hnr_db;
                    out.h1_h2_db = sf.h1_h2_db;
                }
                report.spectral = Some(summary);
            }
            None => log::warn!("No samples in take input, skipping spectral tone metrics"),
        }
    }

    if metrics.contains(&ToneMetric::Jitter) {
        let (summary, frames) = jitter::analyze_jitter(&f0, &contour.energy());
        for (out, jf) in report.frames.iter_mut().zip(frames) {
            out.jitter = jf.jitter;
            out.shimmer = jf.shimmer;
        }
        report.jitter = Some(summary.jitter);
        report.shimmer = Some(summary.shimmer);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contour(len: usize) -> Contour {
        let f0: Vec<Option<f64>> = (0..len).map(|i| Some(220.0 + (i % 3) as f64)).collect();
        let energy = vec![0.3; len];
        Contour::from_estimator(&f0, None, &energy, None, 256.0 / 16000.0)
    }

    #[test]
    fn test_parse_metrics() {
        assert_eq!("Smoothness".parse::<ToneMetric>().unwrap(), ToneMetric::Smoothness);
        assert_eq!(" spectral ".parse::<ToneMetric>().unwrap(), ToneMetric::Spectral);
        assert_eq!("shimmer".parse::<ToneMetric>().unwrap(), ToneMetric::Jitter);
        assert!("vibrato".parse::<ToneMetric>().is_err());
    }

    #[test]
    fn test_only_requested_metrics_run() {
        let c = contour(20);
        let input = ToneInput {
            contour: &c,
            samples: None,
            sample_rate: 16000,
            frame_length: 1024,
            hop_length: 256,
        };
        let report = analyze_tone(&input, &[ToneMetric::Jitter], &ToneParams::default());
        assert!(report.smoothness.is_none());
        assert!(report.spectral.is_none());
        assert_eq!(report.shimmer.unwrap().mean, Some(0.0));
        assert_eq!(report.frames.len(), 20);
        assert!(report.frames[1].jitter.is_some());
        assert!(report.frames[1].delta_cents.is_none());

        let json = serde_json::to_value(report.frames[1]).unwrap();
        assert!(json.get("jitter").is_some());
        assert!(json.get("centroid_hz").is_none());
    }

    #[test]
    fn test_spectral_skipped_without_samples() {
        let c = contour(10);
        let input = ToneInput {
            contour: &c,
            samples: None,
            sample_rate: 16000,
            frame_length: 1024,
            hop_length: 256,
        };
        let all = [ToneMetric::Smoothness, ToneMetric::Spectral, ToneMetric::Jitter];
        let report = analyze_tone(&input, &all, &ToneParams::default());
        assert!(report.spectral.is_none());
        assert!(report.smoothness.is_some());
    }

    #[test]
    fn test_spectral_merged_by_index() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 16000.0).sin() * 0.4)
            .collect();
        let frames = crate::signal::frame_count(samples.len(), 256);
        let c = contour(frames);
        let input = ToneInput {
            contour: &c,
            samples: Some(&samples),
            sample_rate: 16000,
            frame_length: 1024,
            hop_length: 256,
        };
        let report = analyze_tone(&input, &[ToneMetric::Spectral], &ToneParams::default());
        let spectral = report.spectral.unwrap();
        assert!(spectral.centroid_hz.mean.is_some());
        assert!(report.frames.iter().all(|f| f.centroid_hz.is_some()));
    }
}
