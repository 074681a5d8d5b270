//! Grouping cleaned frames into sung notes.
//!
//! Two strategies:
//! - [`SegmentStrategy::QuantizedRun`] snaps every frame to the nearest
//!   semitone and cuts whenever the snapped value changes. Robust against
//!   noise, but a slide or wide vibrato becomes several notes.
//! - [`SegmentStrategy::VoicingGap`] follows the raw voiced frames and only
//!   cuts on a time gap or an abrupt jump, so drifting notes stay whole.

use serde::{Deserialize, Serialize};

use crate::cleaning::outliers;
use crate::contour::Contour;
use crate::pitch;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum SegmentStrategy {
    QuantizedRun {
        /// Runs shorter than this are discarded, not merged.
        min_note_len_frames: usize,
        /// Heal flips of at most this many frames before cutting (0 = off).
        max_flip_len: usize,
        /// Bridge unvoiced gaps of at most this many frames between equal notes (0 = off).
        max_gap_frames: usize,
        /// Also heal flips whose flanking notes differ by up to this many
        /// semitones, taking their rounded average (0 = off).
        #[serde(default)]
        max_blip_diff: i32,
    },
    VoicingGap {
        max_gap_sec: f64,
        max_jump_cents: f64,
    },
}

impl Default for SegmentStrategy {
    fn default() -> Self {
        Self::VoicingGap {
            max_gap_sec: 0.08,
            max_jump_cents: 80.0,
        }
    }
}

/// One sung note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    /// `end_time - start_time`; a single-frame note has zero duration.
    pub duration: f64,
    pub midi: i32,
    pub note_name: String,
    /// Median of the member frequencies.
    pub measured_hz: f64,
    /// Equal-tempered frequency nearest to `measured_hz`.
    pub target_hz: f64,
    /// Signed deviation of `measured_hz` from `target_hz`, within (−50, +50].
    pub cents_error: f64,
    pub frame_times: Vec<f64>,
    pub frame_hz: Vec<f64>,
}

impl Note {
    /// Build a note from its member frames; `None` if no member is voiced.
    fn from_frames(index: usize, times: Vec<f64>, hz: Vec<f64>) -> Option<Self> {
        let measured_hz = pitch::median(&hz)?;
        let midi = pitch::nearest_midi(measured_hz)?;
        let target_hz = pitch::midi_to_hz(midi as f64);
        let cents_error = pitch::cents_between(measured_hz, target_hz)?;
        let start_time = *times.first()?;
        let end_time = *times.last()?;
        Some(Self {
            index,
            start_time,
            end_time,
            duration: end_time - start_time,
            midi,
            note_name: pitch::note_name(midi),
            measured_hz,
            target_hz,
            cents_error,
            frame_times: times,
            frame_hz: hz,
        })
    }
}

/// Notes plus the frames the quantized strategy threw away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub notes: Vec<Note>,
    /// Runs discarded for being shorter than the minimum note length.
    pub dropped_runs: usize,
    pub dropped_frames: usize,
}

pub fn segment(contour: &Contour, strategy: &SegmentStrategy) -> Segmentation {
    let result = match *strategy {
        SegmentStrategy::QuantizedRun {
            min_note_len_frames,
            max_flip_len,
            max_gap_frames,
            max_blip_diff,
        } => segment_quantized(
            contour,
            min_note_len_frames,
            max_flip_len,
            max_gap_frames,
            max_blip_diff,
        ),
        SegmentStrategy::VoicingGap {
            max_gap_sec,
            max_jump_cents,
        } => segment_by_voicing(contour, max_gap_sec, max_jump_cents),
    };
    log::debug!(
        "Segmented {} voiced frames into {} notes ({} short runs dropped)",
        contour.voiced_count(),
        result.notes.len(),
        result.dropped_runs
    );
    result
}

fn segment_quantized(
    contour: &Contour,
    min_note_len_frames: usize,
    max_flip_len: usize,
    max_gap_frames: usize,
    max_blip_diff: i32,
) -> Segmentation {
    let frames = contour.frames();
    let mut keys: Vec<Option<i32>> = frames
        .iter()
        .map(|f| f.f0_hz.and_then(pitch::nearest_midi))
        .collect();
    if max_flip_len > 0 {
        keys = outliers::suppress_runs(&keys, max_flip_len);
        if max_blip_diff > 0 {
            keys = outliers::suppress_blips(&keys, max_flip_len, max_blip_diff);
        }
    }
    if max_gap_frames > 0 {
        keys = outliers::fill_short_gaps(&keys, max_gap_frames);
    }

    let mut result = Segmentation::default();
    let mut current: Vec<usize> = Vec::new();
    let mut current_key: Option<i32> = None;

    let flush = |members: &mut Vec<usize>, result: &mut Segmentation| {
        if members.is_empty() {
            return;
        }
        // Bridged gaps carry a key but no measured pitch
        let voiced = members.iter().filter(|&&i| frames[i].f0_hz.is_some()).count();
        if voiced < min_note_len_frames {
            result.dropped_runs += 1;
            result.dropped_frames += voiced;
        } else {
            let (times, hz): (Vec<f64>, Vec<f64>) = members
                .iter()
                .filter_map(|&i| frames[i].f0_hz.map(|hz| (frames[i].time, hz)))
                .unzip();
            if let Some(note) = Note::from_frames(result.notes.len(), times, hz) {
                result.notes.push(note);
            }
        }
        members.clear();
    };

    for (i, key) in keys.iter().enumerate() {
        match key {
            None => {
                flush(&mut current, &mut result);
                current_key = None;
            }
            Some(k) => {
                if current_key != Some(*k) {
                    flush(&mut current, &mut result);
                    current_key = Some(*k);
                }
                current.push(i);
            }
        }
    }
    flush(&mut current, &mut result);
    result
}

fn segment_by_voicing(contour: &Contour, max_gap_sec: f64, max_jump_cents: f64) -> Segmentation {
    let voiced: Vec<(f64, f64)> = contour
        .frames()
        .iter()
        .filter_map(|f| f.f0_hz.map(|hz| (f.time, hz)))
        .collect();

    let mut result = Segmentation::default();
    if voiced.is_empty() {
        return result;
    }

    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for i in 1..voiced.len() {
        let (t_prev, hz_prev) = voiced[i - 1];
        let (t, hz) = voiced[i];
        let gap = t - t_prev > max_gap_sec;
        let jump = pitch::cents_between(hz, hz_prev).is_some_and(|c| c.abs() > max_jump_cents);
        if gap || jump {
            bounds.push((start, i));
            start = i;
        }
    }
    bounds.push((start, voiced.len()));

    for (start, end) in bounds {
        let (times, hz): (Vec<f64>, Vec<f64>) = voiced[start..end].iter().copied().unzip();
        if let Some(note) = Note::from_frames(result.notes.len(), times, hz) {
            result.notes.push(note);
        }
    }
    result
}

/// Take-level view of a note list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub note_count: usize,
    pub mean_abs_cents: Option<f64>,
    pub mean_signed_cents: Option<f64>,
    /// "flat", "sharp" or "neutral" from the sign of the mean error.
    pub tendency: Option<String>,
    pub threshold_cents: f64,
    pub pct_within_threshold: Option<f64>,
}

impl NoteSummary {
    pub fn from_notes(notes: &[Note], threshold_cents: f64) -> Self {
        let cents: Vec<f64> = notes.iter().map(|n| n.cents_error).collect();
        let abs: Vec<f64> = cents.iter().map(|c| c.abs()).collect();
        let mean_signed_cents = pitch::mean(&cents);
        let tendency = mean_signed_cents.map(|m| {
            if m < 0.0 {
                "flat"
            } else if m > 0.0 {
                "sharp"
            } else {
                "neutral"
            }
            .to_string()
        });
        Self {
            note_count: notes.len(),
            mean_abs_cents: pitch::mean(&abs),
            mean_signed_cents,
            tendency,
            threshold_cents,
            pct_within_threshold: pitch::percent_where(&abs, |c| c <= threshold_cents),
        }
    }
}
