//! Latency compensation between a performance and its reference.
//!
//! When the reference is played back while the vocal is recorded, the vocal
//! lands a few frames late. Scoring at a single fixed alignment would punish
//! an otherwise accurate take, so every integer shift within the configured
//! bound is scored and the best one kept.
//!
//! Both contours arrive already cleaned. The vocal's frame gate is decided
//! once over the whole take, so every candidate offset scores the same set
//! of usable frames and only the shift differs.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::summary::{AccuracySummary, SummaryOptions, summarize};
use crate::contour::Contour;
use crate::pitch;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlignParams {
    /// Largest latency to search for, in milliseconds (0 = no search).
    pub max_delay_ms: f64,
    /// Only compensate for a late singer, never credit an early one.
    pub penalize_late: bool,
    pub summary: SummaryOptions,
}

/// Per-frame comparison at the chosen offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameDetail {
    pub time: f64,
    pub vocal_hz: Option<f64>,
    pub vocal_midi: Option<f64>,
    /// Reference quantized to its nearest equal-tempered note.
    pub ref_hz: Option<f64>,
    pub ref_midi: Option<i32>,
    pub cents_error: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Positive: the vocal is delayed relative to the reference.
    pub offset_frames: i64,
    pub offset_ms: f64,
    pub summary: AccuracySummary,
    pub frames: Vec<FrameDetail>,
    pub candidates_evaluated: usize,
}

/// Search bound in frames, clamped so at least one frame always overlaps.
pub fn max_offset_frames(max_delay_ms: f64, frame_duration: f64, vocal_len: usize, ref_len: usize) -> usize {
    if max_delay_ms <= 0.0 || frame_duration <= 0.0 {
        return 0;
    }
    let bound = (max_delay_ms / 1000.0 / frame_duration).round() as usize;
    bound
        .min(vocal_len.saturating_sub(1))
        .min(ref_len.saturating_sub(1))
}

/// Candidate offsets in evaluation order: 0, −1, +1, −2, +2, …
///
/// With strict-improvement selection this order makes the smallest shift win
/// among exact ties.
pub fn candidate_offsets(bound: usize, penalize_late: bool) -> Vec<i64> {
    let mut offsets = vec![0];
    for k in 1..=bound as i64 {
        if !penalize_late {
            offsets.push(-k);
        }
        offsets.push(k);
    }
    offsets
}

/// Score the vocal against the reference shifted by `offset_frames`.
///
/// Frames are only shifted and truncated here; no gating happens per offset.
pub fn score_offset(
    vocal: &Contour,
    reference: &Contour,
    offset_frames: i64,
    params: &AlignParams,
) -> (AccuracySummary, Vec<FrameDetail>) {
    let (vocal, reference) = if offset_frames >= 0 {
        (vocal.skip(offset_frames as usize), reference.clone())
    } else {
        (vocal.clone(), reference.skip(offset_frames.unsigned_abs() as usize))
    };
    let n = vocal.len().min(reference.len());
    let vocal = vocal.truncate(n);
    let reference = reference.truncate(n);

    let frames: Vec<FrameDetail> = vocal
        .frames()
        .iter()
        .zip(reference.frames())
        .map(|(v, r)| {
            let ref_midi = r.f0_hz.and_then(pitch::nearest_midi);
            let ref_hz = ref_midi.map(|m| pitch::midi_to_hz(m as f64));
            let cents_error = match (v.f0_hz, ref_hz) {
                (Some(vh), Some(rh)) => pitch::cents_between(vh, rh),
                _ => None,
            };
            FrameDetail {
                time: v.time,
                vocal_hz: v.f0_hz,
                vocal_midi: v.f0_hz.and_then(pitch::hz_to_midi),
                ref_hz,
                ref_midi,
                cents_error,
            }
        })
        .collect();

    let cents: Vec<Option<f64>> = frames.iter().map(|f| f.cents_error).collect();
    let summary = summarize(&cents, vocal.frame_duration(), &params.summary);
    (summary, frames)
}

/// Find the offset with the lowest mean absolute cents error.
pub fn align(vocal: &Contour, reference: &Contour, params: &AlignParams) -> Alignment {
    let frame_duration = vocal.frame_duration();
    let bound = max_offset_frames(params.max_delay_ms, frame_duration, vocal.len(), reference.len());
    let offsets = candidate_offsets(bound, params.penalize_late);

    // Order-preserving collect keeps selection independent of scheduling
    let scored: Vec<(i64, AccuracySummary, Vec<FrameDetail>)> = offsets
        .par_iter()
        .map(|&offset| {
            let (summary, frames) = score_offset(vocal, reference, offset, params);
            (offset, summary, frames)
        })
        .collect();
    let candidates_evaluated = scored.len();

    let mut best: Option<(i64, AccuracySummary, Vec<FrameDetail>)> = None;
    let mut best_score = f64::INFINITY;
    for (offset, summary, frames) in scored {
        let score = summary.score();
        if best.is_none() || score < best_score {
            best_score = score;
            best = Some((offset, summary, frames));
        }
    }
    let (offset_frames, summary, frames) = best.unwrap_or_default();

    log::debug!(
        "Alignment: {} candidates (bound {}), chose offset {} frames, mean |cents| {:?}",
        candidates_evaluated,
        bound,
        offset_frames,
        summary.mean_abs_cents
    );

    Alignment {
        offset_frames,
        offset_ms: offset_frames as f64 * frame_duration * 1000.0,
        summary,
        frames,
        candidates_evaluated,
    }
}
