use serde::{Deserialize, Serialize};

use crate::pitch;

/// Aggregate accuracy over a cents-error series.
///
/// Every field except `valid_frames` is `None` when nothing could be scored,
/// so "no signal" never reads as a score of zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub mean_abs_cents: Option<f64>,
    pub pct_within_25: Option<f64>,
    pub pct_within_50: Option<f64>,
    pub pct_within_100: Option<f64>,
    pub valid_frames: usize,
}

impl AccuracySummary {
    /// Objective minimized by the aligner; no valid frames ranks last.
    pub fn score(&self) -> f64 {
        self.mean_abs_cents.unwrap_or(f64::INFINITY)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Frames with `|cents|` above this are outliers (`None` or ≤ 0 disables).
    pub max_abs_cents: Option<f64>,
    /// Outlier runs shorter than this stay in the score as noise.
    pub ignore_short_outliers_ms: Option<f64>,
}

/// Which frames of `cents` count toward the summary.
pub fn validity_mask(cents: &[Option<f64>], frame_duration: f64, opts: &SummaryOptions) -> Vec<bool> {
    let mut valid: Vec<bool> = cents.iter().map(|c| c.is_some_and(f64::is_finite)).collect();
    let Some(max_abs) = opts.max_abs_cents.filter(|m| *m > 0.0) else {
        return valid;
    };

    let outlier: Vec<bool> = cents
        .iter()
        .map(|c| c.is_some_and(|v| v.abs() > max_abs))
        .collect();

    let rescue_below = opts
        .ignore_short_outliers_ms
        .filter(|ms| *ms > 0.0 && frame_duration > 0.0)
        .map(|ms| ((ms / 1000.0 / frame_duration + 1e-9) as usize).max(1));

    let mut i = 0;
    while i < outlier.len() {
        if !outlier[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < outlier.len() && outlier[i] {
            i += 1;
        }
        // Runs at either edge are judged by length alone, like interior runs
        let rescued = rescue_below.is_some_and(|threshold| i - start < threshold);
        if !rescued {
            valid[start..i].fill(false);
        }
    }
    valid
}

/// Summarize a cents-error series. Never returns NaN.
pub fn summarize(cents: &[Option<f64>], frame_duration: f64, opts: &SummaryOptions) -> AccuracySummary {
    let valid = validity_mask(cents, frame_duration, opts);
    let abs: Vec<f64> = cents
        .iter()
        .zip(valid.iter())
        .filter_map(|(c, &ok)| if ok { c.map(f64::abs) } else { None })
        .collect();

    if abs.is_empty() {
        return AccuracySummary::default();
    }

    AccuracySummary {
        mean_abs_cents: pitch::mean(&abs),
        pct_within_25: pitch::percent_where(&abs, |c| c <= 25.0),
        pct_within_50: pitch::percent_where(&abs, |c| c <= 50.0),
        pct_within_100: pitch::percent_where(&abs, |c| c <= 100.0),
        valid_frames: abs.len(),
    }
}

/// 0–100 headline score: the within-50-cents share when available,
/// otherwise `100 − mean_abs_cents` clamped to the range.
pub fn pitch_accuracy_score(summary: &AccuracySummary) -> Option<f64> {
    if let Some(pct) = summary.pct_within_50 {
        return Some((pct * 100.0).round() / 100.0);
    }
    summary
        .mean_abs_cents
        .map(|mac| ((100.0 - mac).clamp(0.0, 100.0) * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|&v| Some(v)).collect()
    }

    #[test]
    fn test_all_null_summary() {
        let s = summarize(&[None, None, Some(f64::NAN)], 0.01, &SummaryOptions::default());
        assert_eq!(s, AccuracySummary::default());
        assert_eq!(s.valid_frames, 0);
        assert_eq!(s.score(), f64::INFINITY);
        assert_eq!(pitch_accuracy_score(&s), None);
    }

    #[test]
    fn test_empty_summary() {
        let s = summarize(&[], 0.01, &SummaryOptions::default());
        assert_eq!(s.valid_frames, 0);
        assert_eq!(s.mean_abs_cents, None);
    }

    #[test]
    fn test_thresholds_monotonic() {
        let cents = some(&[-3.0, 24.9, 25.0, -40.0, 51.0, 99.0, -100.0, 250.0, 12.0]);
        let s = summarize(&cents, 0.01, &SummaryOptions::default());
        let (p25, p50, p100) = (
            s.pct_within_25.unwrap(),
            s.pct_within_50.unwrap(),
            s.pct_within_100.unwrap(),
        );
        assert!(p25 <= p50 && p50 <= p100);
        assert!((p25 - 400.0 / 9.0).abs() < 1e-9);
        assert!((p100 - 800.0 / 9.0).abs() < 1e-9);
        assert_eq!(s.valid_frames, 9);
    }

    #[test]
    fn test_short_outlier_rescued() {
        let cents = some(&[10.0, 15.0, -5.0, 400.0, 12.0]);
        let opts = SummaryOptions {
            max_abs_cents: Some(100.0),
            ignore_short_outliers_ms: Some(1000.0),
        };
        let s = summarize(&cents, 0.01, &opts);
        assert_eq!(s.valid_frames, 5);
        assert!((s.mean_abs_cents.unwrap() - 442.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_excluded_without_rescue_window() {
        let cents = some(&[10.0, 15.0, -5.0, 400.0, 12.0]);
        let opts = SummaryOptions {
            max_abs_cents: Some(100.0),
            ignore_short_outliers_ms: Some(0.0),
        };
        let s = summarize(&cents, 0.01, &opts);
        assert_eq!(s.valid_frames, 4);
        assert!((s.mean_abs_cents.unwrap() - 42.0 / 4.0).abs() < 1e-9);
        assert_eq!(s.pct_within_100, Some(100.0));
    }

    #[test]
    fn test_long_outlier_run_stays_excluded() {
        // 30 ms at 10 ms frames → runs of 1–2 frames rescued, 3+ excluded
        let cents = some(&[5.0, 300.0, 300.0, 5.0, 300.0, 300.0, 300.0, 5.0]);
        let opts = SummaryOptions {
            max_abs_cents: Some(100.0),
            ignore_short_outliers_ms: Some(30.0),
        };
        let mask = validity_mask(&cents, 0.01, &opts);
        assert_eq!(mask, vec![true, true, true, true, false, false, false, true]);
    }

    #[test]
    fn test_edge_outlier_runs_rescued() {
        let cents = some(&[300.0, 5.0, 5.0, 300.0]);
        let opts = SummaryOptions {
            max_abs_cents: Some(100.0),
            ignore_short_outliers_ms: Some(50.0),
        };
        assert_eq!(validity_mask(&cents, 0.01, &opts), vec![true; 4]);
    }

    #[test]
    fn test_accuracy_score_fallback() {
        let s = AccuracySummary {
            mean_abs_cents: Some(130.0),
            ..Default::default()
        };
        assert_eq!(pitch_accuracy_score(&s), Some(0.0));
        let s = AccuracySummary {
            mean_abs_cents: Some(20.0),
            pct_within_50: Some(87.456),
            ..Default::default()
        };
        assert_eq!(pitch_accuracy_score(&s), Some(87.46));
    }
}
