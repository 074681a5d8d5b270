pub mod analyzer;
pub mod cleaning;
pub mod config;
pub mod contour;
pub mod export;
pub mod pitch;
pub mod scoring;
pub mod segment;
pub mod signal;
pub mod store;
pub mod tone;

/// Application name for XDG paths
pub const APP_NAME: &str = "crescendo";
