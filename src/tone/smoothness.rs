use serde::{Deserialize, Serialize};

use crate::pitch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SmoothnessSummary {
    pub mean_abs_delta_cents: Option<f64>,
    pub median_abs_delta_cents: Option<f64>,
    pub pct_within_tolerance: Option<f64>,
    pub tolerance_cents_per_step: f64,
    pub valid_steps: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothnessFrame {
    pub smoothed_midi: Option<f64>,
    pub delta_cents: Option<f64>,
}

/// Centred mean over the defined values within `±half_win`.
fn local_mean(values: &[Option<f64>], center: usize, half_win: usize) -> Option<f64> {
    let lo = center.saturating_sub(half_win);
    let hi = (center + half_win + 1).min(values.len());
    let window: Vec<f64> = values[lo..hi].iter().flatten().copied().collect();
    pitch::mean(&window)
}

/// Frame-to-frame pitch movement in cents of a locally averaged MIDI track.
/// Lower deltas mean a steadier tone.
pub fn analyze_smoothness(
    f0: &[Option<f64>],
    smoothing_win: usize,
    tolerance_cents_per_step: f64,
) -> (SmoothnessSummary, Vec<SmoothnessFrame>) {
    let midi: Vec<Option<f64>> = f0.iter().map(|hz| hz.and_then(pitch::hz_to_midi)).collect();
    let half_win = smoothing_win / 2;
    let smoothed: Vec<Option<f64>> = (0..midi.len())
        .map(|i| local_mean(&midi, i, half_win))
        .collect();

    let frames: Vec<SmoothnessFrame> = smoothed
        .iter()
        .enumerate()
        .map(|(i, &sm)| {
            let delta_cents = match (i.checked_sub(1).and_then(|p| smoothed[p]), sm) {
                (Some(prev), Some(cur)) => Some((cur - prev) * 100.0),
                _ => None,
            };
            SmoothnessFrame {
                smoothed_midi: sm,
                delta_cents,
            }
        })
        .collect();

    let abs: Vec<f64> = frames.iter().filter_map(|f| f.delta_cents.map(f64::abs)).collect();
    let summary = SmoothnessSummary {
        mean_abs_delta_cents: pitch::mean(&abs),
        median_abs_delta_cents: pitch::median(&abs),
        pct_within_tolerance: pitch::percent_where(&abs, |d| d <= tolerance_cents_per_step),
        tolerance_cents_per_step,
        valid_steps: abs.len(),
    };
    (summary, frames)
}
