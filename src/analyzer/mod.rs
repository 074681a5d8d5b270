pub mod input;

use crate::cleaning;
use crate::config::AppConfig;
use crate::contour::Contour;
use crate::export::{self, ExportError, TakesIndex};
use crate::scoring::{self, pitch_accuracy_score};
use crate::segment::{self, NoteSummary, Segmentation};
use crate::store::{RunMetadata, RunRecord, StoreError, VolumeSection};
use crate::tone::{self, ToneInput, ToneMetric};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub use input::TakeInput;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed take input {path}: {reason}")]
    MalformedInput { path: String, reason: String },
    #[error("Sample rate mismatch: vocal is {vocal} Hz, reference is {reference} Hz")]
    SampleRateMismatch { vocal: u32, reference: u32 },
    #[error("Hop length mismatch: vocal uses {vocal}, reference uses {reference}")]
    HopMismatch { vocal: usize, reference: usize },
    #[error("Reference not found: {path}")]
    ReferenceNotFound { path: String },
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Take label for an input file: its file stem.
pub fn take_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expand directories into the `*.json` take files beneath them, sorted.
/// Plain file arguments are kept as given.
pub fn collect_take_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x.eq_ignore_ascii_case("json"))
            })
            .map(|e| e.into_path())
            .collect();
        found.sort();
        log::info!("Found {} take files in {}", found.len(), input.display());
        files.extend(found);
    }
    files
}

/// Locate a reference file, retrying by file name in `fallback_dir`.
pub fn resolve_reference(path: &Path, fallback_dir: Option<&Path>) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if let (Some(dir), Some(name)) = (fallback_dir, path.file_name()) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            log::info!(
                "Reference {} not found, using {}",
                path.display(),
                candidate.display()
            );
            return Ok(candidate);
        }
    }
    Err(AnalyzeError::ReferenceNotFound {
        path: match fallback_dir {
            Some(dir) => format!("{} (also searched {})", path.display(), dir.display()),
            None => path.display().to_string(),
        },
    })
}

/// Notes sung in one take.
#[derive(Debug, Clone)]
pub struct TakeNotes {
    pub take: String,
    pub segmentation: Segmentation,
    pub summary: NoteSummary,
}

/// Clean a take's contour and split it into notes.
pub fn notes_for_take(take: &str, input: &TakeInput, config: &AppConfig) -> TakeNotes {
    let contour = input.to_contour(&config.pitch);
    let cleaned = cleaning::clean_contour(&contour, &config.cleaning());
    let segmentation = segment::segment(&cleaned, &config.strategy());
    let summary = NoteSummary::from_notes(&segmentation.notes, config.score.takes_threshold_cents);
    log::debug!(
        "{}: {} notes ({} short runs dropped), mean |cents| {:?}",
        take,
        segmentation.notes.len(),
        segmentation.dropped_runs,
        summary.mean_abs_cents
    );
    TakeNotes {
        take: take.to_string(),
        segmentation,
        summary,
    }
}

/// What a comparison computes besides pitch accuracy.
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    pub take: String,
    pub vocal_label: Option<String>,
    pub reference_label: Option<String>,
    /// Seconds removed from the start / end of the vocal before scoring.
    pub trim_start: f64,
    pub trim_end: f64,
    pub volume: bool,
    pub tone: Vec<ToneMetric>,
}

/// Score a vocal take against a reference and build the run record.
pub fn compare_take(
    vocal: &TakeInput,
    reference: &TakeInput,
    opts: &CompareOptions,
    config: &AppConfig,
) -> Result<RunRecord> {
    if vocal.sample_rate != reference.sample_rate {
        return Err(AnalyzeError::SampleRateMismatch {
            vocal: vocal.sample_rate,
            reference: reference.sample_rate,
        });
    }
    let hop_length = vocal.hop_length_or(config.pitch.hop_length);
    let reference_hop = reference.hop_length_or(config.pitch.hop_length);
    if hop_length != reference_hop {
        return Err(AnalyzeError::HopMismatch {
            vocal: hop_length,
            reference: reference_hop,
        });
    }

    // Gate decided once over the whole (trimmed) take, before any shifting
    let cleaning = config.cleaning();
    let vocal_contour = vocal.to_contour(&config.pitch);
    let trimmed = vocal_contour.trimmed(opts.trim_start, opts.trim_end);
    let vocal_clean = cleaning::clean_contour(&trimmed, &cleaning);
    let reference_clean = cleaning::clean_contour(&reference.to_contour(&config.pitch), &cleaning);

    let align_params = config.align_params();
    let alignment = scoring::align(&vocal_clean, &reference_clean, &align_params);
    log::info!(
        "{}: offset {} frames ({:.1} ms), mean |cents| {:?} over {} frames",
        opts.take,
        alignment.offset_frames,
        alignment.offset_ms,
        alignment.summary.mean_abs_cents,
        alignment.summary.valid_frames
    );

    let volume = if !opts.volume {
        None
    } else if !vocal.has_energy() {
        log::warn!("{}: no rms or samples in vocal input, skipping volume", opts.take);
        None
    } else {
        let (summary, frames) = tone::analyze_volume(&trimmed.times(), &trimmed.energy(), &config.volume);
        Some(VolumeSection { summary, frames })
    };

    let tone = if opts.tone.is_empty() {
        None
    } else {
        let samples = vocal
            .samples
            .as_deref()
            .map(|s| trimmed_samples(s, &vocal_contour, &trimmed, hop_length));
        let input = ToneInput {
            contour: &vocal_clean,
            samples,
            sample_rate: vocal.sample_rate,
            frame_length: vocal.frame_length_or(config.pitch.frame_length),
            hop_length,
        };
        Some(tone::analyze_tone(&input, &opts.tone, &config.tone))
    };

    let metadata = RunMetadata {
        vocal: opts.vocal_label.clone(),
        reference: opts.reference_label.clone(),
        sample_rate: vocal.sample_rate,
        frame_length: vocal.frame_length_or(config.pitch.frame_length),
        hop_length,
        rms_gate_ratio: config.gate.rms_gate_ratio,
        jump_gate_cents: config.gate.jump_gate_cents,
        max_abs_cents: align_params.summary.max_abs_cents,
        ignore_short_outliers_ms: align_params.summary.ignore_short_outliers_ms,
        max_delay_ms: align_params.max_delay_ms,
        penalize_late: align_params.penalize_late,
        offset_frames: alignment.offset_frames,
        offset_ms: alignment.offset_ms,
        trim_start: opts.trim_start,
        trim_end: opts.trim_end,
        analyzed_at: chrono::Utc::now(),
    };

    Ok(RunRecord {
        take: opts.take.clone(),
        metadata,
        pitch_accuracy_score: pitch_accuracy_score(&alignment.summary),
        summary: alignment.summary,
        frames: alignment.frames,
        volume,
        tone,
    })
}

/// Samples starting at the first frame kept by trimming.
fn trimmed_samples<'a>(samples: &'a [f32], full: &Contour, trimmed: &Contour, hop_length: usize) -> &'a [f32] {
    let skipped = match (full.frames().first(), trimmed.frames().first()) {
        (Some(first), Some(kept)) if full.frame_duration() > 0.0 => {
            ((kept.time - first.time) / full.frame_duration()).round() as usize
        }
        _ => 0,
    };
    samples.get(skipped * hop_length..).unwrap_or(&[])
}

pub struct NotesResult {
    pub processed: u64,
    pub failed: u64,
    pub notes: u64,
    pub index: Option<TakesIndex>,
}

/// Segment many take files in parallel, write per-take and combined CSVs,
/// then rebuild the takes index.
///
/// Analysis runs on a rayon pool; all file writes happen afterwards on the
/// calling thread in input order so the combined CSV is deterministic.
pub fn process_note_files(inputs: &[PathBuf], config: &AppConfig, jobs: usize) -> Result<NotesResult> {
    if inputs.is_empty() {
        log::info!("No take files to process");
        return Ok(NotesResult {
            processed: 0,
            failed: 0,
            notes: 0,
            index: None,
        });
    }

    log::info!("Segmenting {} takes with {} workers", inputs.len(), jobs);

    let pb = ProgressBar::new(inputs.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let results: Vec<(PathBuf, Result<TakeNotes>)> = pool.install(|| {
        use rayon::prelude::*;
        inputs
            .par_iter()
            .map(|path| {
                let take = take_name(path);
                let result = TakeInput::load(path).map(|input| notes_for_take(&take, &input, config));
                pb.inc(1);
                (path.clone(), result)
            })
            .collect()
    });

    let takes_dir = config.paths.takes_dir();
    let notes_csv = config.paths.notes_csv();
    let mut processed: u64 = 0;
    let mut failed: u64 = 0;
    let mut notes: u64 = 0;

    for (path, result) in results {
        match result {
            Ok(take_notes) => {
                let rows = &take_notes.segmentation.notes;
                let take_csv = takes_dir.join(format!("{}.csv", take_notes.take));
                export::write_take_csv(&take_csv, &take_notes.take, rows, false)?;
                export::append_notes_csv(&notes_csv, &take_notes.take, rows, true)?;
                processed += 1;
                notes += rows.len() as u64;
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", path.display(), e);
                failed += 1;
            }
        }
        pb.set_message(format!("{} written, {} failed", processed, failed));
    }

    pb.finish_with_message(format!("Done: {} takes, {} notes, {} failed", processed, notes, failed));

    let index = if processed > 0 { Some(rebuild_index(config)?) } else { None };
    Ok(NotesResult {
        processed,
        failed,
        notes,
        index,
    })
}

/// Recompute the takes index from the take CSVs and write it out.
pub fn rebuild_index(config: &AppConfig) -> Result<TakesIndex> {
    let index = export::build_takes_index(&config.paths.takes_dir(), config.score.takes_threshold_cents)?;
    export::write_takes_index(&config.paths.takes_index(), &index)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch;
    use crate::store::{JsonRunStore, RunStore};

    fn take_json(sample_rate: u32, f0: &[Option<f64>], rms: Option<&[f64]>) -> TakeInput {
        TakeInput {
            sample_rate,
            frame_length: Some(1024),
            hop_length: Some(160),
            f0_hz: f0.to_vec(),
            voiced: None,
            times: None,
            rms: rms.map(|r| r.to_vec()),
            samples: None,
        }
    }

    fn melody(len: usize) -> Vec<Option<f64>> {
        (0..len)
            .map(|i| Some(pitch::midi_to_hz(57.0 + ((i / 10) % 5) as f64)))
            .collect()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crescendo-analyzer-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_take_name_is_file_stem() {
        assert_eq!(take_name(Path::new("/x/take_03.json")), "take_03");
    }

    #[test]
    fn test_collect_take_files_expands_dirs() {
        let dir = temp_dir("collect");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("b.json"), "{}").unwrap();
        std::fs::write(dir.join("sub").join("a.JSON"), "{}").unwrap();
        std::fs::write(dir.join("notes.csv"), "").unwrap();

        let explicit = PathBuf::from("/somewhere/take.json");
        let files = collect_take_files(&[dir.clone(), explicit.clone()]);
        assert_eq!(files, vec![dir.join("b.json"), dir.join("sub").join("a.JSON"), explicit]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_reference_fallback_lookup() {
        let dir = temp_dir("reference");
        let file = dir.join("ref.json");
        std::fs::write(&file, "{}").unwrap();

        assert_eq!(resolve_reference(&file, None).unwrap(), file);
        let moved = Path::new("/elsewhere/ref.json");
        assert_eq!(resolve_reference(moved, Some(&dir)).unwrap(), file);
        let missing = resolve_reference(Path::new("/elsewhere/none.json"), Some(&dir));
        assert!(matches!(missing, Err(AnalyzeError::ReferenceNotFound { .. })));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_notes_for_take_segments_sustained_notes() {
        let mut f0 = vec![Some(220.0); 20];
        f0.extend(vec![None; 20]);
        f0.extend(vec![Some(pitch::midi_to_hz(60.0) * 1.01); 20]);
        let input = take_json(16000, &f0, None);
        let result = notes_for_take("t", &input, &AppConfig::default());
        let notes = &result.segmentation.notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].note_name, "A3");
        assert_eq!(notes[1].note_name, "C4");
        assert!(notes[1].cents_error > 15.0);
        assert_eq!(result.summary.note_count, 2);
    }

    #[test]
    fn test_compare_rejects_sample_rate_mismatch() {
        let vocal = take_json(16000, &melody(10), None);
        let reference = take_json(44100, &melody(10), None);
        let err = compare_take(&vocal, &reference, &CompareOptions::default(), &AppConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalyzeError::SampleRateMismatch {
                vocal: 16000,
                reference: 44100
            }
        ));
    }

    #[test]
    fn test_compare_recovers_latency_and_upserts() {
        let reference = melody(200);
        let mut delayed = vec![None; 4];
        delayed.extend(reference.iter().copied());
        let energy = vec![0.3; delayed.len()];

        let mut config = AppConfig::default();
        config.score.max_delay_ms = 60.0;
        let opts = CompareOptions {
            take: "take1".to_string(),
            volume: true,
            tone: vec![ToneMetric::Smoothness, ToneMetric::Jitter],
            ..Default::default()
        };
        let record = compare_take(
            &take_json(16000, &delayed, Some(&energy)),
            &take_json(16000, &reference, None),
            &opts,
            &config,
        )
        .unwrap();

        assert_eq!(record.metadata.offset_frames, 4);
        assert!((record.metadata.offset_ms - 40.0).abs() < 1e-9);
        assert!(record.summary.mean_abs_cents.unwrap() < 1e-6);
        assert_eq!(record.pitch_accuracy_score, Some(100.0));
        let volume = record.volume.as_ref().unwrap();
        assert!(volume.summary.std_db.unwrap().abs() < 1e-9);
        let tone = record.tone.as_ref().unwrap();
        assert!(tone.smoothness.is_some());
        assert!(tone.spectral.is_none());

        let dir = temp_dir("compare");
        let mut store = JsonRunStore::open(&dir.join("runs.json"));
        store.upsert(record.clone()).unwrap();
        store.upsert(record).unwrap();
        assert_eq!(store.runs().unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_compare_gates_whole_take_before_alignment() {
        // One loud frame slightly sharp, then quiet but perfectly in tune frames
        let mut f0 = vec![Some(226.0)];
        f0.extend(vec![Some(220.0); 19]);
        let mut energy = vec![1.0];
        energy.extend(vec![0.3; 19]);

        let mut config = AppConfig::default();
        config.gate.rms_gate_ratio = 0.5;
        config.score.max_delay_ms = 10.0;
        let record = compare_take(
            &take_json(16000, &f0, Some(&energy)),
            &take_json(16000, &vec![Some(220.0); 20], None),
            &CompareOptions::default(),
            &config,
        )
        .unwrap();

        assert_eq!(record.metadata.offset_frames, 0);
        assert_eq!(record.summary.valid_frames, 1);
        let expected = pitch::cents_between(226.0, 220.0).unwrap();
        assert!((record.summary.mean_abs_cents.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_compare_gates_noise_before_outlier_suppression() {
        let mut f0 = vec![Some(600.0); 11];
        f0[5] = Some(220.0);
        let mut rms = vec![0.01; 11];
        rms[5] = 1.0;

        let mut config = AppConfig::default();
        config.gate.rms_gate_ratio = 0.1;
        let record = compare_take(
            &take_json(16000, &f0, Some(&rms)),
            &take_json(16000, &vec![Some(220.0); 11], None),
            &CompareOptions::default(),
            &config,
        )
        .unwrap();

        assert_eq!(record.summary.valid_frames, 1);
        assert!(record.summary.mean_abs_cents.unwrap().abs() < 1e-9);
        assert!(record.frames[5].cents_error.is_some_and(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_compare_falls_back_to_configured_hop() {
        let mut vocal = take_json(16000, &melody(30), None);
        vocal.hop_length = None;
        let reference = take_json(16000, &melody(30), None);

        let mut config = AppConfig::default();
        config.pitch.hop_length = 160;
        let record = compare_take(&vocal, &reference, &CompareOptions::default(), &config).unwrap();
        assert_eq!(record.metadata.hop_length, 160);

        config.pitch.hop_length = 256;
        let err = compare_take(&vocal, &reference, &CompareOptions::default(), &config).unwrap_err();
        assert!(matches!(
            err,
            AnalyzeError::HopMismatch {
                vocal: 256,
                reference: 160
            }
        ));
    }

    #[test]
    fn test_volume_skipped_without_energy() {
        let opts = CompareOptions {
            take: "t".to_string(),
            volume: true,
            ..Default::default()
        };
        let record = compare_take(
            &take_json(16000, &melody(30), None),
            &take_json(16000, &melody(30), None),
            &opts,
            &AppConfig::default(),
        )
        .unwrap();
        assert!(record.volume.is_none());
        assert!(record.tone.is_none());
    }

    #[test]
    fn test_process_note_files_writes_csvs_and_index() {
        let dir = temp_dir("batch");
        let mut config = AppConfig::default();
        config.paths.data_dir = Some(dir.clone());

        let good = dir.join("good.json");
        let input = serde_json::json!({
            "sample_rate": 16000,
            "hop_length": 160,
            "f0_hz": melody(60),
        });
        std::fs::write(&good, input.to_string()).unwrap();
        let bad = dir.join("bad.json");
        std::fs::write(&bad, "not json").unwrap();

        let result = process_note_files(&[good, bad], &config, 2).unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 1);
        assert!(result.notes > 0);
        assert!(config.paths.takes_dir().join("good.csv").is_file());
        assert!(config.paths.notes_csv().is_file());
        let first_line = |path: PathBuf| {
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        };
        assert!(!first_line(config.paths.takes_dir().join("good.csv")).contains("frame_times"));
        assert!(first_line(config.paths.notes_csv()).ends_with("frame_times,frame_hz"));

        let index = result.index.unwrap();
        assert_eq!(index.labels, vec!["good"]);
        assert_eq!(index.scores, vec![100.0]);
        assert!(config.paths.takes_index().is_file());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
