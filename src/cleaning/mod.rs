pub mod gate;
pub mod outliers;

pub use gate::{GateParams, gate};
pub use outliers::OutlierParams;

use crate::contour::Contour;
use crate::pitch;

/// Everything applied to a raw contour before segmentation or scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CleaningParams {
    /// Odd median-filter width applied to the raw estimate (< 2 disables).
    pub median_win: usize,
    pub gate: GateParams,
    /// `None` skips outlier suppression.
    pub outliers: Option<OutlierParams>,
}

/// Edge-clamped median filter over the voiced frames. Unvoiced frames stay
/// unvoiced; an even width is widened to the next odd one.
pub fn median_smooth(f0: &[Option<f64>], win: usize) -> Vec<Option<f64>> {
    if win < 2 {
        return f0.to_vec();
    }
    let win = if win % 2 == 0 { win + 1 } else { win };
    let half = win / 2;
    let n = f0.len();
    (0..n)
        .map(|i| {
            f0[i]?;
            let window: Vec<f64> = (i.saturating_sub(half)..(i + half + 1).min(n))
                .filter_map(|j| f0[j])
                .collect();
            pitch::median(&window)
        })
        .collect()
}

/// Median smoothing → frame gate → outlier suppression, then optional
/// short-run smoothing of the surviving pitch track.
pub fn clean_contour(contour: &Contour, params: &CleaningParams) -> Contour {
    let smoothed = contour.with_f0(&median_smooth(&contour.f0(), params.median_win));
    let gated = smoothed.gated(&params.gate);
    let cleaned = match &params.outliers {
        Some(outlier_params) if outlier_params.smooth_run_len > 0 => gated
            .without_outliers(outlier_params)
            .with_short_runs_smoothed(outlier_params.smooth_run_len),
        Some(outlier_params) => gated.without_outliers(outlier_params),
        None => gated,
    };
    log::debug!(
        "Cleaned contour: {} frames, {} voiced in, {} voiced out",
        contour.len(),
        contour.voiced_count(),
        cleaned.voiced_count()
    );
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_smooth_removes_single_spike() {
        let f0 = vec![Some(220.0), Some(220.0), Some(440.0), Some(220.0), Some(220.0)];
        let out = median_smooth(&f0, 3);
        assert_eq!(out, vec![Some(220.0); 5]);
    }

    #[test]
    fn test_median_smooth_keeps_unvoiced() {
        let f0 = vec![Some(220.0), None, Some(230.0)];
        let out = median_smooth(&f0, 2);
        assert_eq!(out[1], None);
        assert_eq!(out[0], Some(220.0));
        assert_eq!(out[2], Some(230.0));
    }

    #[test]
    fn test_clean_contour_preserves_length() {
        let f0: Vec<Option<f64>> = [220.0, 221.0, 0.0, 880.0, 220.0, 219.0, 220.0, 221.0]
            .iter()
            .map(|&v| Some(v))
            .collect();
        let energy = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.001];
        let contour = Contour::from_estimator(&f0, None, &energy, None, 0.01);
        let params = CleaningParams {
            median_win: 0,
            gate: GateParams {
                rms_gate_ratio: 0.1,
                jump_gate_cents: 0.0,
            },
            outliers: Some(OutlierParams::default()),
        };
        let cleaned = clean_contour(&contour, &params);
        assert_eq!(cleaned.len(), contour.len());
        let f = cleaned.f0();
        assert_eq!(f[2], None);
        assert_eq!(f[3], None);
        assert_eq!(f[7], None);
        assert_eq!(cleaned.voiced_count(), 5);
    }

    #[test]
    fn test_clean_contour_smooths_short_runs() {
        let midi = [60.0, 60.0, 60.0, 61.0, 60.2, 60.2, 60.2];
        let f0: Vec<Option<f64>> = midi.iter().map(|&m| Some(pitch::midi_to_hz(m))).collect();
        let contour = Contour::from_estimator(&f0, None, &[], None, 0.01);
        let mut params = CleaningParams {
            outliers: Some(OutlierParams::default()),
            ..Default::default()
        };

        let untouched = clean_contour(&contour, &params);
        assert_eq!(untouched.f0()[3], f0[3]);

        if let Some(outliers) = params.outliers.as_mut() {
            outliers.smooth_run_len = 1;
        }
        let cleaned = clean_contour(&contour, &params);
        let semis = cleaned.semitones();
        assert!((semis[3].unwrap() - 60.1).abs() < 1e-9);
        assert!((semis[4].unwrap() - 60.2).abs() < 1e-9);
        assert_eq!(cleaned.voiced_count(), 7);
    }
}
