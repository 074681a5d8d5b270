//! Frame-level data model for an f0 contour.
//!
//! A [`Contour`] never shrinks during cleaning: gating and outlier passes only
//! replace `f0_hz` with `None`, so every stage can zip contours by index.

use serde::{Deserialize, Serialize};

use crate::pitch;

/// One analysis hop of a take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Seconds from the start of the take.
    pub time: f64,
    /// Fundamental frequency in Hz, `None` when unvoiced.
    pub f0_hz: Option<f64>,
    /// Frame energy (RMS), 0 when unknown.
    pub energy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    frames: Vec<Frame>,
    frame_duration: f64,
}

impl Contour {
    pub fn new(frames: Vec<Frame>, frame_duration: f64) -> Self {
        Self {
            frames,
            frame_duration,
        }
    }

    /// Build a contour from raw estimator output.
    ///
    /// `f0` uses the estimator's sentinels (NaN / non-positive / `None`) for
    /// unvoiced frames; `voiced`, when given, additionally marks frames the
    /// estimator flagged as unvoiced. `energy` may be shorter than `f0` (or
    /// empty); missing values read as 0. Times are `i * frame_duration` unless
    /// explicit `times` are supplied.
    pub fn from_estimator(
        f0: &[Option<f64>],
        voiced: Option<&[bool]>,
        energy: &[f64],
        times: Option<&[f64]>,
        frame_duration: f64,
    ) -> Self {
        let frames = f0
            .iter()
            .enumerate()
            .map(|(i, hz)| {
                let flagged = voiced.and_then(|v| v.get(i).copied()).unwrap_or(true);
                Frame {
                    time: times
                        .and_then(|t| t.get(i).copied())
                        .unwrap_or(i as f64 * frame_duration),
                    f0_hz: hz.and_then(pitch::voiced).filter(|_| flagged),
                    energy: energy.get(i).copied().filter(|e| e.is_finite()).unwrap_or(0.0),
                }
            })
            .collect();
        Self::new(frames, frame_duration)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn f0(&self) -> Vec<Option<f64>> {
        self.frames.iter().map(|f| f.f0_hz).collect()
    }

    pub fn times(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }

    pub fn energy(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.energy).collect()
    }

    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| f.f0_hz.is_some()).count()
    }

    /// Fractional MIDI per frame.
    pub fn semitones(&self) -> Vec<Option<f64>> {
        self.frames
            .iter()
            .map(|f| f.f0_hz.and_then(pitch::hz_to_midi))
            .collect()
    }

    /// Null every frame whose `keep` entry is false (or missing).
    pub fn with_mask(&self, keep: &[bool]) -> Self {
        let frames = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| Frame {
                f0_hz: f.f0_hz.filter(|_| keep.get(i).copied().unwrap_or(false)),
                ..*f
            })
            .collect();
        Self::new(frames, self.frame_duration)
    }

    /// Replace the pitch track, keeping times and energy.
    pub fn with_f0(&self, f0: &[Option<f64>]) -> Self {
        let frames = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| Frame {
                f0_hz: f0.get(i).copied().flatten().and_then(pitch::voiced),
                ..*f
            })
            .collect();
        Self::new(frames, self.frame_duration)
    }

    /// Null frames whose pitch falls outside `[fmin, fmax]`.
    pub fn within_range(&self, fmin: f64, fmax: f64) -> Self {
        let keep: Vec<bool> = self
            .frames
            .iter()
            .map(|f| f.f0_hz.is_some_and(|hz| hz >= fmin && hz <= fmax))
            .collect();
        self.with_mask(&keep)
    }

    /// Drop `skip` leading frames (used for alignment offsets).
    pub fn skip(&self, skip: usize) -> Self {
        let frames = self.frames.iter().skip(skip).copied().collect();
        Self::new(frames, self.frame_duration)
    }

    /// Keep at most `len` leading frames.
    pub fn truncate(&self, len: usize) -> Self {
        let frames = self.frames.iter().take(len).copied().collect();
        Self::new(frames, self.frame_duration)
    }

    /// Remove frames before `trim_start` seconds and within `trim_end` seconds
    /// of the last frame. Non-positive values leave that end untouched.
    pub fn trimmed(&self, trim_start: f64, trim_end: f64) -> Self {
        if self.frames.is_empty() || self.frame_duration <= 0.0 {
            return self.clone();
        }
        // Epsilon keeps exact multiples like 0.3 / 0.1 from flooring one frame short
        let start = (trim_start.max(0.0) / self.frame_duration + 1e-9) as usize;
        let cut = (trim_end.max(0.0) / self.frame_duration + 1e-9) as usize;
        let end = self.frames.len().saturating_sub(cut).max(start);
        let frames = self
            .frames
            .get(start.min(self.frames.len())..end.min(self.frames.len()))
            .unwrap_or(&[])
            .to_vec();
        Self::new(frames, self.frame_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contour(f0: &[f64]) -> Contour {
        let raw: Vec<Option<f64>> = f0.iter().map(|&v| Some(v)).collect();
        Contour::from_estimator(&raw, None, &[], None, 0.1)
    }

    #[test]
    fn test_sentinels_become_unvoiced() {
        let c = contour(&[220.0, 0.0, -1.0, f64::NAN, 440.0]);
        assert_eq!(c.f0(), vec![Some(220.0), None, None, None, Some(440.0)]);
        assert_eq!(c.voiced_count(), 2);
    }

    #[test]
    fn test_voiced_flags_respected() {
        let raw = vec![Some(220.0), Some(230.0), Some(240.0)];
        let c = Contour::from_estimator(&raw, Some(&[true, false, true]), &[1.0], None, 0.1);
        assert_eq!(c.f0(), vec![Some(220.0), None, Some(240.0)]);
        assert_eq!(c.energy(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mask_preserves_length_and_times() {
        let c = contour(&[220.0, 230.0, 240.0]);
        let masked = c.with_mask(&[true, false, true]);
        assert_eq!(masked.len(), 3);
        assert_eq!(masked.times(), c.times());
        assert_eq!(masked.f0(), vec![Some(220.0), None, Some(240.0)]);
    }

    #[test]
    fn test_trimmed() {
        let c = contour(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = c.trimmed(0.2, 0.1);
        assert_eq!(t.f0(), vec![Some(3.0), Some(4.0), Some(5.0)]);
        assert_eq!(c.trimmed(0.0, 0.0).len(), 6);
        assert!(c.trimmed(1.0, 1.0).is_empty());
    }

    #[test]
    fn test_trimmed_exact_multiples() {
        let c = contour(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(c.trimmed(0.3, 0.0).f0(), vec![Some(4.0), Some(5.0), Some(6.0), Some(7.0)]);
        assert_eq!(c.trimmed(0.0, 0.3).f0(), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_within_range() {
        let c = contour(&[50.0, 220.0, 1500.0]);
        assert_eq!(c.within_range(80.0, 1000.0).f0(), vec![None, Some(220.0), None]);
    }
}
