use serde::{Deserialize, Serialize};

use crate::pitch;

/// Mean and median of a relative-change series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

impl Spread {
    fn of(values: &[Option<f64>]) -> Self {
        let valid: Vec<f64> = values.iter().flatten().copied().collect();
        Self {
            mean: pitch::mean(&valid),
            median: pitch::median(&valid),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JitterSummary {
    pub jitter: Spread,
    pub shimmer: Spread,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JitterFrame {
    pub jitter: Option<f64>,
    pub shimmer: Option<f64>,
}

fn relative_change(prev: f64, cur: f64) -> f64 {
    (cur - prev).abs() / prev
}

/// Jitter is the relative f0 change between consecutive voiced frames,
/// shimmer the relative energy change between consecutive non-silent frames.
pub fn analyze_jitter(f0: &[Option<f64>], energy: &[f64]) -> (JitterSummary, Vec<JitterFrame>) {
    let loud = |i: usize| energy.get(i).copied().filter(|e| e.is_finite() && *e > 0.0);
    let frames: Vec<JitterFrame> = (0..f0.len())
        .map(|i| {
            if i == 0 {
                return JitterFrame::default();
            }
            let jitter = match (f0[i - 1], f0[i]) {
                (Some(p), Some(c)) if p > 0.0 && c > 0.0 => Some(relative_change(p, c)),
                _ => None,
            };
            let shimmer = match (loud(i - 1), loud(i)) {
                (Some(p), Some(c)) => Some(relative_change(p, c)),
                _ => None,
            };
            JitterFrame { jitter, shimmer }
        })
        .collect();

    let jitter: Vec<Option<f64>> = frames.iter().map(|f| f.jitter).collect();
    let shimmer: Vec<Option<f64>> = frames.iter().map(|f| f.shimmer).collect();
    let summary = JitterSummary {
        jitter: Spread::of(&jitter),
        shimmer: Spread::of(&shimmer),
    };
    (summary, frames)
}
