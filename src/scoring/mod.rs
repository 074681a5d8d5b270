//! Frame-level accuracy against a reference performance.

pub mod align;
pub mod summary;

pub use align::{AlignParams, Alignment, FrameDetail, align};
pub use summary::{AccuracySummary, SummaryOptions, pitch_accuracy_score, summarize};
