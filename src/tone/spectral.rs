//! Per-frame spectral descriptors of the voice and their 1–10 categories.
//!
//! All descriptors come from the Hann-windowed STFT of the raw samples on the
//! same hop as the pitch contour. Harmonic measures additionally need the
//! frame's f0 and are `None` on unvoiced frames.

use serde::{Deserialize, Serialize};

use crate::pitch::Stats;
use crate::signal;

const EPSILON: f64 = 1e-10;
const TILT_SPLIT_HZ: f64 = 1000.0;
const TILT_TOP_HZ: f64 = 5000.0;

// Linear ranges mapped onto the 1–10 categorical scores
const BRIGHTNESS_RANGE: (f64, f64) = (1000.0, 5000.0);
const NOISINESS_RANGE: (f64, f64) = (0.0, 0.3);
const WARMTH_RANGE: (f64, f64) = (0.0, 30.0);
const CLARITY_RANGE: (f64, f64) = (0.0, 25.0);
const BREATHINESS_RANGE: (f64, f64) = (-5.0, 15.0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralFrame {
    pub centroid_hz: Option<f64>,
    pub flatness: Option<f64>,
    pub tilt_db: Option<f64>,
    pub hnr_db: Option<f64>,
    pub h1_h2_db: Option<f64>,
}

/// Categorical 1–10 scores derived from the per-metric medians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneScores {
    pub brightness: Option<f64>,
    pub noisiness: Option<f64>,
    pub warmth: Option<f64>,
    pub clarity: Option<f64>,
    pub breathiness: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralSummary {
    pub centroid_hz: Stats,
    pub flatness: Stats,
    pub tilt_db: Stats,
    pub hnr_db: Stats,
    pub h1_h2_db: Stats,
    pub scores: ToneScores,
}

/// Map `value` linearly from `[lo, hi]` onto `[1, 10]`, clamped.
pub fn scale_score(value: Option<f64>, (lo, hi): (f64, f64)) -> Option<f64> {
    let v = value.filter(|v| v.is_finite())?;
    let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    Some(1.0 + 9.0 * t)
}

/// Descriptors of one magnitude spectrum (`frame_length / 2 + 1` bins).
pub fn describe_frame(mags: &[f64], f0: Option<f64>, sample_rate: u32, frame_length: usize) -> SpectralFrame {
    let freq = |bin: usize| signal::bin_frequency(bin, frame_length, sample_rate);
    let mag_sum: f64 = mags.iter().sum();
    if mags.is_empty() || mag_sum <= 0.0 {
        return SpectralFrame::default();
    }

    let centroid_hz = mags
        .iter()
        .enumerate()
        .map(|(bin, &m)| freq(bin) * m)
        .sum::<f64>()
        / mag_sum;

    // Geometric over arithmetic mean of the power spectrum
    let n = mags.len() as f64;
    let power: Vec<f64> = mags.iter().map(|m| m * m).collect();
    let log_mean = power.iter().map(|p| (p + EPSILON).ln()).sum::<f64>() / n;
    let arith_mean = power.iter().sum::<f64>() / n + EPSILON;
    let flatness = (log_mean.exp() / arith_mean).clamp(0.0, 1.0);

    let band_energy = |lo: f64, hi: f64| -> f64 {
        power
            .iter()
            .enumerate()
            .filter(|(bin, _)| {
                let f = freq(*bin);
                f >= lo && f < hi
            })
            .map(|(_, p)| p)
            .sum()
    };
    let low = band_energy(0.0, TILT_SPLIT_HZ);
    let high = band_energy(TILT_SPLIT_HZ, TILT_TOP_HZ);
    let tilt_db = (low > 0.0 && high > 0.0).then(|| 10.0 * (low / high).log10());

    let (hnr_db, h1_h2_db) = match f0.filter(|f| *f > 0.0) {
        Some(f0) => harmonic_measures(mags, &power, f0, sample_rate, frame_length),
        None => (None, None),
    };

    SpectralFrame {
        centroid_hz: Some(centroid_hz),
        flatness: Some(flatness),
        tilt_db,
        hnr_db,
        h1_h2_db,
    }
}

fn harmonic_measures(
    mags: &[f64],
    power: &[f64],
    f0: f64,
    sample_rate: u32,
    frame_length: usize,
) -> (Option<f64>, Option<f64>) {
    let bin_width = sample_rate as f64 / frame_length as f64;
    let nyquist = sample_rate as f64 / 2.0;
    let mut harmonic = vec![false; power.len()];
    let mut h = 1.0;
    while h * f0 < nyquist {
        let target = h * f0;
        let lo = ((target - bin_width / 2.0) / bin_width).ceil().max(0.0) as usize;
        let hi = ((target + bin_width / 2.0) / bin_width).floor() as usize;
        for flag in harmonic.iter_mut().take(hi + 1).skip(lo) {
            *flag = true;
        }
        h += 1.0;
    }
    let (mut harm, mut noise) = (0.0, 0.0);
    for (p, is_harmonic) in power.iter().zip(harmonic.iter()) {
        if *is_harmonic {
            harm += p;
        } else {
            noise += p;
        }
    }
    let hnr_db = (harm > 0.0 && noise > 0.0).then(|| 10.0 * (harm / noise).log10());

    // Peak magnitude within one bin of the harmonic's nearest bin
    let peak_near = |hz: f64| -> Option<f64> {
        if hz >= nyquist {
            return None;
        }
        let center = (hz / bin_width).round() as usize;
        let lo = center.saturating_sub(1);
        let hi = (center + 1).min(mags.len() - 1);
        mags.get(lo..=hi)?.iter().copied().reduce(f64::max).filter(|m| *m > 0.0)
    };
    let h1_h2_db = match (peak_near(f0), peak_near(2.0 * f0)) {
        (Some(h1), Some(h2)) => Some(20.0 * (h1 / h2).log10()),
        _ => None,
    };
    (hnr_db, h1_h2_db)
}

fn stats_of(frames: &[SpectralFrame], get: impl Fn(&SpectralFrame) -> Option<f64>) -> Stats {
    let column: Vec<Option<f64>> = frames.iter().map(get).collect();
    Stats::of(&column)
}

/// Describe every STFT frame of `samples`; `f0[i]` supplies the pitch of frame `i`.
pub fn analyze_spectral(
    samples: &[f32],
    sample_rate: u32,
    frame_length: usize,
    hop_length: usize,
    f0: &[Option<f64>],
) -> (SpectralSummary, Vec<SpectralFrame>) {
    let spectrogram = signal::stft_magnitudes(samples, frame_length, hop_length);
    let frames: Vec<SpectralFrame> = spectrogram
        .iter()
        .enumerate()
        .map(|(i, mags)| describe_frame(mags, f0.get(i).copied().flatten(), sample_rate, frame_length))
        .collect();

    let centroid_hz = stats_of(&frames, |f| f.centroid_hz);
    let flatness = stats_of(&frames, |f| f.flatness);
    let tilt_db = stats_of(&frames, |f| f.tilt_db);
    let hnr_db = stats_of(&frames, |f| f.hnr_db);
    let h1_h2_db = stats_of(&frames, |f| f.h1_h2_db);

    let scores = ToneScores {
        brightness: scale_score(centroid_hz.median, BRIGHTNESS_RANGE),
        noisiness: scale_score(flatness.median, NOISINESS_RANGE),
        warmth: scale_score(tilt_db.median, WARMTH_RANGE),
        clarity: scale_score(hnr_db.median, CLARITY_RANGE),
        breathiness: scale_score(h1_h2_db.median, BREATHINESS_RANGE),
    };

    let summary = SpectralSummary {
        centroid_hz,
        flatness,
        tilt_db,
        hnr_db,
        h1_h2_db,
        scores,
    };
    (summary, frames)
}
