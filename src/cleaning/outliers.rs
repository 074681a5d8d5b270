//! Spike and flicker removal on pitch tracks.
//!
//! Two families of passes:
//! - [`suppress`] nulls single frames that sit far from their local median.
//! - The run passes ([`suppress_runs`], [`suppress_blips`], [`fill_short_gaps`],
//!   [`smooth_short_runs`]) heal short runs of a quantized track so one held
//!   note does not fragment when the estimator flickers by a semitone.
//!
//! Every pass is a single left-to-right sweep: a decision reads the already
//! finalized output on its left and the untouched input on its right.

use serde::{Deserialize, Serialize};

use crate::contour::Contour;
use crate::pitch;

/// Minimum number of voiced neighbours needed to call a frame an outlier.
const MIN_NEIGHBORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierParams {
    /// Distance from the local median (semitones) beyond which a frame is dropped.
    pub max_semitone_jump: f64,
    /// Neighbourhood half-width in frames.
    pub window: usize,
    /// Longest quantized run treated as a flip.
    pub max_flip_len: usize,
    /// Longest unvoiced gap filled between two equal notes.
    pub max_gap_frames: usize,
    /// Flanking notes this many semitones apart still absorb a flip (0 = off).
    pub max_blip_diff: i32,
    /// Longest continuous-pitch run pulled to its flanks' mean (0 = off).
    pub smooth_run_len: usize,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            max_semitone_jump: 6.0,
            window: 5,
            max_flip_len: 3,
            max_gap_frames: 2,
            max_blip_diff: 0,
            smooth_run_len: 0,
        }
    }
}

/// Null frames that deviate from the median of the other voiced frames
/// within `±window` by more than `max_semitone_jump`.
///
/// Frames with fewer than three voiced neighbours are left alone.
pub fn suppress(semitones: &[Option<f64>], max_semitone_jump: f64, window: usize) -> Vec<Option<f64>> {
    let mut out = semitones.to_vec();
    let n = out.len();
    for i in 0..n {
        let Some(value) = out[i] else { continue };
        let lo = i.saturating_sub(window);
        let hi = (i + window + 1).min(n);
        let neighbors: Vec<f64> = (lo..hi)
            .filter(|&j| j != i)
            .filter_map(|j| out[j])
            .collect();
        if neighbors.len() < MIN_NEIGHBORS {
            continue;
        }
        if let Some(local) = pitch::median(&neighbors) {
            if (value - local).abs() > max_semitone_jump {
                out[i] = None;
            }
        }
    }
    out
}

/// A maximal run of equal keys.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    start: usize,
    len: usize,
    key: Option<i32>,
}

impl Run {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

fn find_runs(keys: &[Option<i32>]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (i, &key) in keys.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.key == key => run.len += 1,
            _ => runs.push(Run {
                start: i,
                len: 1,
                key,
            }),
        }
    }
    runs
}

/// A short run chosen for replacement, with the spans flanking it.
struct Replacement {
    run: Run,
    key: i32,
    /// Finalized span on the left (merged with earlier replacements).
    left: (usize, usize),
    right: Run,
}

/// Walk the runs of `keys` once and pick the short voiced runs whose
/// flanks satisfy `accept(left_key, right_key)`.
fn short_run_replacements(
    keys: &[Option<i32>],
    max_run_len: usize,
    accept: impl Fn(i32, i32) -> Option<i32>,
) -> Vec<Replacement> {
    let runs = find_runs(keys);
    let mut picked = Vec::new();
    // (key, start, end) of the finalized run to the left
    let mut left: Option<(Option<i32>, usize, usize)> = None;

    for (idx, run) in runs.iter().enumerate() {
        let mut key = run.key;
        let short = max_run_len > 0 && run.len <= max_run_len;
        if let (true, Some(own), Some((Some(l), l_start, l_end)), Some(right)) =
            (short, run.key, left, runs.get(idx + 1))
        {
            if let Some(r) = right.key {
                if let Some(new_key) = accept(l, r).filter(|&k| k != own) {
                    picked.push(Replacement {
                        run: *run,
                        key: new_key,
                        left: (l_start, l_end),
                        right: *right,
                    });
                    key = Some(new_key);
                }
            }
        }
        left = match left {
            Some((lk, ls, _)) if lk == key => Some((lk, ls, run.end())),
            _ => Some((key, run.start, run.end())),
        };
    }
    picked
}

/// Heal flips: a voiced run no longer than `max_run_len` sitting between two
/// runs of the same note takes that note.
pub fn suppress_runs(values: &[Option<i32>], max_run_len: usize) -> Vec<Option<i32>> {
    let mut out = values.to_vec();
    for rep in short_run_replacements(values, max_run_len, |l, r| (l == r).then_some(l)) {
        out[rep.run.start..rep.run.end()].fill(Some(rep.key));
    }
    out
}

/// Weaker blip variant: the flanking notes only need to be within
/// `max_neighbor_diff` semitones; the run takes their rounded average.
pub fn suppress_blips(values: &[Option<i32>], max_run_len: usize, max_neighbor_diff: i32) -> Vec<Option<i32>> {
    let mut out = values.to_vec();
    let accept = |l: i32, r: i32| {
        ((l - r).abs() <= max_neighbor_diff).then(|| ((l + r) as f64 / 2.0).round() as i32)
    };
    for rep in short_run_replacements(values, max_run_len, accept) {
        out[rep.run.start..rep.run.end()].fill(Some(rep.key));
    }
    out
}

/// Fill unvoiced gaps of at most `max_gap` frames between two equal notes.
pub fn fill_short_gaps(values: &[Option<i32>], max_gap: usize) -> Vec<Option<i32>> {
    let mut out = values.to_vec();
    if max_gap == 0 {
        return out;
    }
    let runs = find_runs(values);
    for idx in 1..runs.len().saturating_sub(1) {
        let (prev, gap, next) = (runs[idx - 1], runs[idx], runs[idx + 1]);
        if gap.key.is_none() && gap.len <= max_gap && prev.key.is_some() && prev.key == next.key {
            out[gap.start..gap.end()].fill(prev.key);
        }
    }
    out
}

/// Continuous-pitch variant of [`suppress_runs`]: runs are keyed by the
/// nearest semitone and a short run is replaced by the mean of the two
/// flanking runs' means.
pub fn smooth_short_runs(semitones: &[Option<f64>], max_run_len: usize) -> Vec<Option<f64>> {
    let keys: Vec<Option<i32>> = semitones.iter().map(|v| v.map(|m| m.round() as i32)).collect();
    let mut out = semitones.to_vec();
    for rep in short_run_replacements(&keys, max_run_len, |l, r| (l == r).then_some(l)) {
        let left: Vec<f64> = out[rep.left.0..rep.left.1].iter().flatten().copied().collect();
        let right: Vec<f64> = semitones[rep.right.start..rep.right.end()].iter().flatten().copied().collect();
        if let (Some(l), Some(r)) = (pitch::mean(&left), pitch::mean(&right)) {
            out[rep.run.start..rep.run.end()].fill(Some((l + r) / 2.0));
        }
    }
    out
}

impl Contour {
    /// Null frames flagged by [`suppress`] in the semitone domain.
    pub fn without_outliers(&self, params: &OutlierParams) -> Contour {
        let cleaned = suppress(&self.semitones(), params.max_semitone_jump, params.window);
        let keep: Vec<bool> = cleaned.iter().map(Option::is_some).collect();
        self.with_mask(&keep)
    }

    /// Apply [`smooth_short_runs`] to the pitch track, converting back to Hz.
    pub fn with_short_runs_smoothed(&self, max_run_len: usize) -> Contour {
        let smoothed: Vec<Option<f64>> = smooth_short_runs(&self.semitones(), max_run_len)
            .into_iter()
            .map(|m| m.map(pitch::midi_to_hz))
            .collect();
        self.with_f0(&smoothed)
    }
}
