use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crescendo::analyzer::{self, CompareOptions, TakeInput};
use crescendo::config::AppConfig;
use crescendo::store::{JsonRunStore, RunRecord, RunStore};
use crescendo::tone::ToneMetric;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crescendo", version, about = "Sung-pitch accuracy and tone analyzer")]
struct Cli {
    /// Path to a config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment takes into notes, write note CSVs and rebuild the takes index
    Notes {
        /// Take input files or directories of them (*.json)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Score a vocal take against a reference and store the run
    Compare {
        /// Vocal take input file
        #[arg(long)]
        vocal: PathBuf,

        /// Reference take input file
        #[arg(long)]
        reference: PathBuf,

        /// Run name (defaults to the vocal file stem)
        #[arg(long)]
        take: Option<String>,

        /// Also report volume consistency
        #[arg(long)]
        volume: bool,

        /// Tone metrics to compute: smoothness, spectral, jitter
        #[arg(long, value_delimiter = ',')]
        tone: Vec<ToneMetric>,

        /// Seconds removed from the start of the vocal
        #[arg(long, default_value = "0")]
        trim_start: f64,

        /// Seconds removed from the end of the vocal
        #[arg(long, default_value = "0")]
        trim_end: f64,

        /// Override the latency search bound from config (ms)
        #[arg(long)]
        max_delay_ms: Option<f64>,

        /// Only compensate for a late vocal
        #[arg(long)]
        penalize_late: bool,
    },

    /// Rebuild the takes index from the take CSVs
    Index,

    /// List stored runs, or show one run as JSON
    Runs {
        /// Take name to show
        take: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    log::info!("Data dir: {}", config.paths.data_dir().display());

    match cli.command {
        Commands::Notes { inputs, jobs } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let files = analyzer::collect_take_files(&inputs);
            let result = analyzer::process_note_files(&files, &config, workers)
                .context("Note extraction failed")?;
            println!(
                "Notes complete: {} takes, {} notes, {} failed",
                result.processed, result.notes, result.failed
            );
            if let Some(index) = result.index {
                println!();
                print_index(&index);
            }
        }

        Commands::Compare {
            vocal,
            reference,
            take,
            volume,
            tone,
            trim_start,
            trim_end,
            max_delay_ms,
            penalize_late,
        } => {
            if let Some(ms) = max_delay_ms {
                config.score.max_delay_ms = ms;
            }
            if penalize_late {
                config.score.penalize_late = true;
            }

            let reference_path =
                analyzer::resolve_reference(&reference, config.paths.reference_dir.as_deref())
                    .context("Reference lookup failed")?;
            let vocal_input = TakeInput::load(&vocal)
                .with_context(|| format!("Failed to load {}", vocal.display()))?;
            let reference_input = TakeInput::load(&reference_path)
                .with_context(|| format!("Failed to load {}", reference_path.display()))?;

            let opts = CompareOptions {
                take: take.unwrap_or_else(|| analyzer::take_name(&vocal)),
                vocal_label: Some(vocal.display().to_string()),
                reference_label: Some(reference_path.display().to_string()),
                trim_start,
                trim_end,
                volume,
                tone,
            };
            let record = analyzer::compare_take(&vocal_input, &reference_input, &opts, &config)
                .context("Comparison failed")?;

            let mut store = JsonRunStore::open(&config.paths.runs_file());
            store.upsert(record.clone()).context("Failed to store run")?;
            print_run(&record);
            println!();
            println!("Saved to {}", store.path().display());
        }

        Commands::Index => {
            let index = analyzer::rebuild_index(&config).context("Index rebuild failed")?;
            print_index(&index);
        }

        Commands::Runs { take } => {
            let store = JsonRunStore::open(&config.paths.runs_file());
            match take {
                Some(name) => match store.get(&name).context("Failed to read runs")? {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => println!("No run named \"{}\".", name),
                },
                None => {
                    let runs = store.runs().context("Failed to read runs")?;
                    if runs.is_empty() {
                        println!("No runs stored in {}.", store.path().display());
                        return Ok(());
                    }
                    print_runs_table(&runs);
                }
            }
        }
    }

    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn print_run(record: &RunRecord) {
    let s = &record.summary;
    println!("Take:            {}", record.take);
    println!(
        "Offset:          {} frames ({:.1} ms)",
        record.metadata.offset_frames, record.metadata.offset_ms
    );
    println!("Valid frames:    {}", s.valid_frames);
    println!("Mean |cents|:    {}", fmt_opt(s.mean_abs_cents, 1));
    println!(
        "Within 25/50/100: {}% / {}% / {}%",
        fmt_opt(s.pct_within_25, 1),
        fmt_opt(s.pct_within_50, 1),
        fmt_opt(s.pct_within_100, 1)
    );
    println!("Accuracy score:  {}", fmt_opt(record.pitch_accuracy_score, 2));

    if let Some(volume) = &record.volume {
        println!(
            "Volume:          mean {} dB, std {} dB, {}% within ±{} dB",
            fmt_opt(volume.summary.mean_db, 1),
            fmt_opt(volume.summary.std_db, 2),
            fmt_opt(volume.summary.pct_within_tolerance, 1),
            volume.summary.tolerance_db
        );
    }
    if let Some(tone) = &record.tone {
        if let Some(sm) = &tone.smoothness {
            println!(
                "Smoothness:      mean |Δ| {} cents/step, {}% within {} cents",
                fmt_opt(sm.mean_abs_delta_cents, 1),
                fmt_opt(sm.pct_within_tolerance, 1),
                sm.tolerance_cents_per_step
            );
        }
        if let Some(sp) = &tone.spectral {
            let sc = &sp.scores;
            println!(
                "Tone (1-10):     brightness {}, noisiness {}, warmth {}, clarity {}, breathiness {}",
                fmt_opt(sc.brightness, 1),
                fmt_opt(sc.noisiness, 1),
                fmt_opt(sc.warmth, 1),
                fmt_opt(sc.clarity, 1),
                fmt_opt(sc.breathiness, 1)
            );
        }
        if let (Some(j), Some(sh)) = (&tone.jitter, &tone.shimmer) {
            println!(
                "Jitter/shimmer:  {} / {} (mean relative change)",
                fmt_opt(j.mean, 4),
                fmt_opt(sh.mean, 4)
            );
        }
    }
}

fn print_runs_table(runs: &[RunRecord]) {
    println!(
        "{:<30} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7}",
        "Take", "Offset", "Frames", "|c|", "≤25", "≤50", "Score"
    );
    println!("{}", "-".repeat(80));
    for r in runs {
        let take: String = if r.take.chars().count() > 30 {
            format!("{}...", r.take.chars().take(27).collect::<String>())
        } else {
            r.take.clone()
        };
        println!(
            "{:<30} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7}",
            take,
            r.metadata.offset_frames,
            r.summary.valid_frames,
            fmt_opt(r.summary.mean_abs_cents, 1),
            fmt_opt(r.summary.pct_within_25, 1),
            fmt_opt(r.summary.pct_within_50, 1),
            fmt_opt(r.pitch_accuracy_score, 1),
        );
    }
}

fn print_index(index: &crescendo::export::TakesIndex) {
    if index.labels.is_empty() {
        println!("No takes with notes found.");
        return;
    }
    println!("Takes within {} cents:", index.threshold_cents);
    for (label, score) in index.labels.iter().zip(index.scores.iter()) {
        println!("  {:<30} {:>6.2}%", label, score);
    }
}
