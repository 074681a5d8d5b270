use std::path::Path;

use serde::Deserialize;

use super::AnalyzeError;
use crate::config::PitchConfig;
use crate::contour::Contour;
use crate::signal;

/// Pitch-estimator output for one take, as written by the external tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct TakeInput {
    pub sample_rate: u32,
    #[serde(default)]
    pub frame_length: Option<usize>,
    #[serde(default)]
    pub hop_length: Option<usize>,
    /// Per-frame f0 in Hz; `null`, zero or negative mean unvoiced.
    pub f0_hz: Vec<Option<f64>>,
    #[serde(default)]
    pub voiced: Option<Vec<bool>>,
    #[serde(default)]
    pub times: Option<Vec<f64>>,
    /// Per-frame RMS on the same hop.
    #[serde(default)]
    pub rms: Option<Vec<f64>>,
    /// Raw mono samples, needed for energy (without `rms`) and spectral tone.
    #[serde(default)]
    pub samples: Option<Vec<f32>>,
}

impl TakeInput {
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, AnalyzeError> {
        let input: TakeInput = serde_json::from_str(text)?;
        input.validate(origin)?;
        Ok(input)
    }

    pub fn load(path: &Path) -> Result<Self, AnalyzeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text, path)
    }

    fn validate(&self, origin: &Path) -> Result<(), AnalyzeError> {
        let malformed = |reason: String| AnalyzeError::MalformedInput {
            path: origin.display().to_string(),
            reason,
        };
        if self.sample_rate == 0 {
            return Err(malformed("sample_rate must be positive".to_string()));
        }
        if self.hop_length == Some(0) {
            return Err(malformed("hop_length must be positive".to_string()));
        }
        if let Some(voiced) = &self.voiced {
            if voiced.len() != self.f0_hz.len() {
                return Err(malformed(format!(
                    "voiced has {} entries, f0_hz has {}",
                    voiced.len(),
                    self.f0_hz.len()
                )));
            }
        }
        if let Some(times) = &self.times {
            if times.windows(2).any(|w| w[1] <= w[0]) {
                return Err(malformed("times must be strictly increasing".to_string()));
            }
        }
        Ok(())
    }

    pub fn frame_length_or(&self, default: usize) -> usize {
        self.frame_length.unwrap_or(default)
    }

    pub fn hop_length_or(&self, default: usize) -> usize {
        self.hop_length.unwrap_or(default)
    }

    /// Seconds per frame for the given hop.
    pub fn frame_duration(&self, hop_length: usize) -> f64 {
        hop_length as f64 / self.sample_rate as f64
    }

    pub fn has_energy(&self) -> bool {
        self.rms.is_some() || self.samples.is_some()
    }

    /// Frame energy from `rms`, else computed from `samples`, else empty.
    pub fn energy(&self, frame_length: usize, hop_length: usize) -> Vec<f64> {
        match (&self.rms, &self.samples) {
            (Some(rms), _) => rms.clone(),
            (None, Some(samples)) => signal::frame_rms(samples, frame_length, hop_length),
            (None, None) => Vec::new(),
        }
    }

    /// Contour with out-of-range pitch treated as unvoiced. Framing the file
    /// leaves out falls back to `pitch`.
    pub fn to_contour(&self, pitch: &PitchConfig) -> Contour {
        let hop_length = self.hop_length_or(pitch.hop_length);
        let energy = self.energy(self.frame_length_or(pitch.frame_length), hop_length);
        Contour::from_estimator(
            &self.f0_hz,
            self.voiced.as_deref(),
            &energy,
            self.times.as_deref(),
            self.frame_duration(hop_length),
        )
        .within_range(pitch.fmin, pitch.fmax)
    }
}
