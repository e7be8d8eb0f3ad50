//! Per-source result records

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct TempoResult {
    pub source: PathBuf,
    pub tempo_bpm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeStretchResult {
    pub source: PathBuf,
    /// Estimated tempo of the source
    pub original_tempo: f64,
    /// Requested tempo, or the midpoint tempo of a rate range
    pub target_tempo: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertResult {
    pub source: PathBuf,
    pub output_path: PathBuf,
    /// Source bytes were copied without re-encoding
    pub passthrough: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeResult {
    pub source: PathBuf,
    pub output_path: PathBuf,
    /// Target loudness the output was normalized to
    pub lufs: f64,
    /// Loudness measured before normalization
    pub original_lufs: f64,
}
