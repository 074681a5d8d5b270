//! Pitch and statistics helpers shared by every analysis stage.
//!
//! Everything here is total: degenerate inputs (empty slices, non-positive
//! frequencies, NaN) produce `None` instead of panicking or leaking NaN.

/// Reference tuning: A4 = MIDI 69 = 440 Hz.
pub const A4_HZ: f64 = 440.0;
pub const A4_MIDI: f64 = 69.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// True if `hz` is a usable pitch value (finite and positive).
pub fn is_voiced_hz(hz: f64) -> bool {
    hz.is_finite() && hz > 0.0
}

/// Map estimator sentinels (NaN, non-positive, infinite) to `None`.
pub fn voiced(hz: f64) -> Option<f64> {
    is_voiced_hz(hz).then_some(hz)
}

/// Drop non-finite values so they never reach a report.
pub fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// Fractional MIDI note number for a frequency, `None` for unvoiced input.
pub fn hz_to_midi(hz: f64) -> Option<f64> {
    voiced(hz).map(|f| A4_MIDI + 12.0 * (f / A4_HZ).log2())
}

pub fn midi_to_hz(midi: f64) -> f64 {
    A4_HZ * 2.0_f64.powf((midi - A4_MIDI) / 12.0)
}

/// Nearest equal-tempered MIDI note.
pub fn nearest_midi(hz: f64) -> Option<i32> {
    hz_to_midi(hz).map(|m| m.round() as i32)
}

/// Frequency of the equal-tempered note nearest to `hz`.
pub fn nearest_target_hz(hz: f64) -> Option<f64> {
    nearest_midi(hz).map(|m| midi_to_hz(m as f64))
}

/// Signed distance from `reference` to `hz` in cents: `1200·log2(hz/reference)`.
pub fn cents_between(hz: f64, reference: f64) -> Option<f64> {
    if is_voiced_hz(hz) && is_voiced_hz(reference) {
        Some(1200.0 * (hz / reference).log2())
    } else {
        None
    }
}

/// Scientific pitch notation with sharps, e.g. 69 → "A4", 61 → "C#4".
pub fn note_name(midi: i32) -> String {
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    finite(var.sqrt())
}

/// Median, averaging the two middle values for even lengths. NaNs are ignored.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Percentage (0–100) of values satisfying `pred`, `None` for an empty slice.
pub fn percent_where(values: &[f64], pred: impl Fn(f64) -> bool) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let hits = values.iter().filter(|&&v| pred(v)).count();
    Some(hits as f64 / values.len() as f64 * 100.0)
}

/// Mean / median / std of a set of samples, all `None` when the set is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
}

impl Stats {
    /// Summarize the finite values of `samples`.
    pub fn of(samples: &[Option<f64>]) -> Self {
        let valid: Vec<f64> = samples
            .iter()
            .filter_map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Self {
            mean: mean(&valid),
            median: median(&valid),
            std: std_dev(&valid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_midi_roundtrip() {
        assert!((hz_to_midi(440.0).unwrap() - 69.0).abs() < 1e-10);
        assert!((midi_to_hz(60.0) - 261.6256).abs() < 1e-3);
        assert_eq!(nearest_midi(233.0), Some(58));
        assert_eq!(nearest_midi(220.0), Some(57));
    }

    #[test]
    fn test_unvoiced_inputs() {
        assert_eq!(hz_to_midi(0.0), None);
        assert_eq!(hz_to_midi(-5.0), None);
        assert_eq!(hz_to_midi(f64::NAN), None);
        assert_eq!(cents_between(440.0, 0.0), None);
    }

    #[test]
    fn test_cents_between() {
        assert!((cents_between(880.0, 440.0).unwrap() - 1200.0).abs() < 1e-9);
        assert!((cents_between(440.0, 880.0).unwrap() + 1200.0).abs() < 1e-9);
        let semitone_up = midi_to_hz(70.0);
        assert!((cents_between(semitone_up, 440.0).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(57), "A3");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_stats_empty_is_none() {
        let s = Stats::of(&[None, Some(f64::NAN)]);
        assert_eq!(s, Stats::default());
    }

    #[test]
    fn test_std_dev_constant() {
        assert_eq!(std_dev(&[2.0, 2.0, 2.0]), Some(0.0));
    }
}
