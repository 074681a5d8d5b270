use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use super::Result;
use crate::segment::Note;

const COLUMNS: [&str; 9] = [
    "take",
    "note_index",
    "start_time",
    "end_time",
    "duration",
    "note_name",
    "measured_hz",
    "target_hz",
    "cents_error",
];
const FRAME_COLUMNS: [&str; 2] = ["frame_times", "frame_hz"];

pub fn header(include_frames: bool) -> Vec<&'static str> {
    let mut cols = COLUMNS.to_vec();
    if include_frames {
        cols.extend(FRAME_COLUMNS);
    }
    cols
}

/// One CSV row; frame arrays are embedded as JSON in a single field each.
pub fn note_record(take: &str, note: &Note, include_frames: bool) -> Result<Vec<String>> {
    let mut record = vec![
        take.to_string(),
        note.index.to_string(),
        format!("{:.4}", note.start_time),
        format!("{:.4}", note.end_time),
        format!("{:.4}", note.duration),
        note.note_name.clone(),
        format!("{:.3}", note.measured_hz),
        format!("{:.3}", note.target_hz),
        format!("{:.2}", note.cents_error),
    ];
    if include_frames {
        record.push(serde_json::to_string(&note.frame_times)?);
        record.push(serde_json::to_string(&note.frame_hz)?);
    }
    Ok(record)
}

fn write_notes<W: io::Write>(
    out: W,
    write_header: bool,
    take: &str,
    notes: &[Note],
    include_frames: bool,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    if write_header {
        writer.write_record(header(include_frames))?;
    }
    for note in notes {
        writer.write_record(note_record(take, note, include_frames)?)?;
    }
    writer.flush()?;
    Ok(())
}

/// Rewrite `path` with the notes of a single take.
pub fn write_take_csv(path: &Path, take: &str, notes: &[Note], include_frames: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_notes(file, true, take, notes, include_frames)
}

/// Append a take's notes to a combined CSV; the header is written only when
/// the file is created.
pub fn append_notes_csv(path: &Path, take: &str, notes: &[Note], include_frames: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    write_notes(file, is_new, take, notes, include_frames)
}
