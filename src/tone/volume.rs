//! Loudness consistency relative to the take's own peak.
//!
//! Input gain varies per recording, so levels are never compared in absolute
//! terms: frame energy is expressed in dB below the loudest frame.

use serde::{Deserialize, Serialize};

use crate::pitch;

const AMIN: f64 = 1e-5;
const TOP_DB: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeParams {
    /// Centred moving-average width (< 2 disables, even widths widen by one).
    pub smoothing_win: usize,
    /// Band around the mean level counted as consistent.
    pub tolerance_db: f64,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            smoothing_win: 5,
            tolerance_db: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub mean_db: Option<f64>,
    pub std_db: Option<f64>,
    pub pct_within_tolerance: Option<f64>,
    pub tolerance_db: f64,
    pub frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeFrame {
    pub time: f64,
    pub rms_db: f64,
    pub rms_db_smooth: f64,
}

/// Energy in dB relative to the series peak, floored at −80 dB.
pub fn energy_to_db(energy: &[f64]) -> Vec<f64> {
    let peak = energy.iter().copied().filter(|e| e.is_finite()).fold(0.0, f64::max);
    let ref_db = 20.0 * peak.max(AMIN).log10();
    energy
        .iter()
        .map(|&e| {
            let e = if e.is_finite() { e } else { 0.0 };
            (20.0 * e.max(AMIN).log10() - ref_db).max(-TOP_DB)
        })
        .collect()
}

/// Centred moving average with edge padding.
pub fn moving_average(values: &[f64], win: usize) -> Vec<f64> {
    if win < 2 || values.is_empty() {
        return values.to_vec();
    }
    let win = if win % 2 == 0 { win + 1 } else { win };
    let half = win / 2;
    let last = values.len() - 1;
    (0..values.len())
        .map(|i| {
            let sum: f64 = (0..win)
                .map(|k| {
                    let j = (i + k).saturating_sub(half).min(last);
                    values[j]
                })
                .sum();
            sum / win as f64
        })
        .collect()
}

pub fn analyze_volume(times: &[f64], energy: &[f64], params: &VolumeParams) -> (VolumeSummary, Vec<VolumeFrame>) {
    let rms_db = energy_to_db(energy);
    let smooth = moving_average(&rms_db, params.smoothing_win);

    let mean_db = pitch::mean(&smooth);
    let pct_within_tolerance = mean_db.and_then(|m| {
        pitch::percent_where(&smooth, |v| (v - m).abs() <= params.tolerance_db)
    });
    let summary = VolumeSummary {
        mean_db,
        std_db: pitch::std_dev(&smooth),
        pct_within_tolerance,
        tolerance_db: params.tolerance_db,
        frames: smooth.len(),
    };

    let frames = rms_db
        .iter()
        .zip(smooth.iter())
        .enumerate()
        .map(|(i, (&raw, &sm))| VolumeFrame {
            time: times.get(i).copied().unwrap_or(0.0),
            rms_db: raw,
            rms_db_smooth: sm,
        })
        .collect();
    (summary, frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_energy_is_perfectly_consistent() {
        let energy = vec![0.2; 50];
        let times: Vec<f64> = (0..50).map(|i| i as f64 * 0.01).collect();
        let (summary, frames) = analyze_volume(&times, &energy, &VolumeParams::default());
        assert!(summary.std_db.unwrap().abs() < 1e-9);
        assert!(summary.mean_db.unwrap().abs() < 1e-9);
        assert_eq!(summary.pct_within_tolerance, Some(100.0));
        assert_eq!(summary.frames, 50);
        assert_eq!(frames.len(), 50);
    }

    #[test]
    fn test_db_relative_to_peak_and_floored() {
        let db = energy_to_db(&[1.0, 0.1, 0.0]);
        assert!(db[0].abs() < 1e-12);
        assert!((db[1] + 20.0).abs() < 1e-9);
        assert_eq!(db[2], -80.0);
    }

    #[test]
    fn test_moving_average_pads_edges() {
        let out = moving_average(&[0.0, 0.0, 3.0, 0.0, 0.0], 3);
        assert_eq!(out, vec![0.0, 1.0, 1.0, 1.0, 0.0]);
        // Even width widened to 3
        assert_eq!(moving_average(&[0.0, 0.0, 3.0, 0.0, 0.0], 2), out);
        let edge = moving_average(&[3.0, 0.0, 0.0], 3);
        assert!((edge[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_energy() {
        let (summary, frames) = analyze_volume(&[], &[], &VolumeParams::default());
        assert_eq!(summary.mean_db, None);
        assert_eq!(summary.std_db, None);
        assert_eq!(summary.pct_within_tolerance, None);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_level_drop_outside_tolerance() {
        let mut energy = vec![1.0; 10];
        energy.extend(vec![0.01; 10]);
        let params = VolumeParams {
            smoothing_win: 0,
            tolerance_db: 3.0,
        };
        let (summary, _) = analyze_volume(&[], &energy, &params);
        assert!((summary.mean_db.unwrap() + 20.0).abs() < 1e-9);
        assert!((summary.std_db.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(summary.pct_within_tolerance, Some(0.0));
    }
}
