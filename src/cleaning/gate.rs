use serde::{Deserialize, Serialize};

use crate::contour::Contour;
use crate::pitch;

/// Thresholds for the frame gate. Zero disables the corresponding check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
    /// Drop frames with energy below `rms_gate_ratio × max(energy)`.
    pub rms_gate_ratio: f64,
    /// Drop frames further than this many cents from the last kept frame.
    pub jump_gate_cents: f64,
}

/// Decide which frames of a raw contour are usable.
///
/// The energy threshold is relative to the peak of the whole series. The
/// jump gate compares against the last frame that passed every check, so a
/// rejected octave error never becomes the reference for its successors.
pub fn gate(f0: &[Option<f64>], energy: &[f64], params: &GateParams) -> Vec<bool> {
    let energy_floor = if params.rms_gate_ratio > 0.0 {
        let max_energy = energy
            .iter()
            .copied()
            .filter(|e| e.is_finite())
            .fold(0.0_f64, f64::max);
        (max_energy > 0.0).then(|| params.rms_gate_ratio * max_energy)
    } else {
        None
    };

    let mut last_kept: Option<f64> = None;
    f0.iter()
        .enumerate()
        .map(|(i, hz)| {
            let Some(hz) = hz.and_then(pitch::voiced) else {
                return false;
            };
            if let (Some(floor), Some(&e)) = (energy_floor, energy.get(i)) {
                if e.is_nan() || e < floor {
                    return false;
                }
            }
            if params.jump_gate_cents > 0.0 {
                if let Some(prev) = last_kept {
                    let jump = pitch::cents_between(hz, prev).unwrap_or(f64::INFINITY);
                    if jump.abs() > params.jump_gate_cents {
                        return false;
                    }
                }
            }
            last_kept = Some(hz);
            true
        })
        .collect()
}

impl Contour {
    /// Apply [`gate`] using the contour's own energy track.
    pub fn gated(&self, params: &GateParams) -> Contour {
        let keep = gate(&self.f0(), &self.energy(), params);
        self.with_mask(&keep)
    }
}
