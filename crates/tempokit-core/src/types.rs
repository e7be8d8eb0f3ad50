//! Common types for tempokit
//!
//! Audio format tags, the source format filter and the 2-D sample matrix
//! that flows between the decoder, the analysis stages and the encoder.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Sample rate assumed for in-memory sources until decoding says otherwise
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Container formats recognised on input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    M4a,
}

impl AudioFormat {
    /// All formats discovered by the source resolver
    pub const ALL: [AudioFormat; 5] = [
        AudioFormat::Wav,
        AudioFormat::Mp3,
        AudioFormat::Flac,
        AudioFormat::Ogg,
        AudioFormat::M4a,
    ];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::M4a => "m4a",
        }
    }

    /// Parse an extension (case-insensitive, with or without leading dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    /// Format implied by a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Formats the pipeline can write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        AudioFormat::from(*self).extension()
    }
}

impl From<OutputFormat> for AudioFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Wav => AudioFormat::Wav,
            OutputFormat::Mp3 => AudioFormat::Mp3,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            _ => Err(ConfigError::UnsupportedFormat {
                value: s.to_string(),
                expected: "wav and mp3",
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Extension filter applied to directory entries
///
/// `*` accepts every format in [`AudioFormat::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatFilter {
    #[default]
    Any,
    Only(AudioFormat),
}

impl FormatFilter {
    /// Check a path's extension against the filter (case-insensitive)
    pub fn matches(&self, path: &Path) -> bool {
        match (self, AudioFormat::from_path(path)) {
            (_, None) => false,
            (FormatFilter::Any, Some(_)) => true,
            (FormatFilter::Only(wanted), Some(found)) => *wanted == found,
        }
    }
}

impl FromStr for FormatFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(FormatFilter::Any);
        }
        AudioFormat::from_extension(s)
            .map(FormatFilter::Only)
            .ok_or_else(|| ConfigError::UnsupportedFormat {
                value: s.to_string(),
                expected: "*, wav, mp3, flac, ogg and m4a",
            })
    }
}

impl fmt::Display for FormatFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatFilter::Any => f.write_str("*"),
            FormatFilter::Only(format) => write!(f, "{}", format),
        }
    }
}

/// Row-major 2-D sample buffer
///
/// Decoded audio is `(frames, channels)`, i.e. interleaved. The stretch
/// transform works on `(channels, frames)`; [`SampleMatrix::transpose`]
/// converts between the two.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    data: Vec<Sample>,
    rows: usize,
    cols: usize,
}

impl SampleMatrix {
    /// Wrap row-major data. Returns `None` if the length doesn't match the shape.
    pub fn from_vec(data: Vec<Sample>, rows: usize, cols: usize) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { data, rows, cols })
    }

    /// Build a `(rows, cols)` matrix from row slices of equal length
    pub fn from_rows(rows: &[Vec<Sample>]) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        let data = rows.iter().flatten().copied().collect();
        Some(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.data
    }

    /// Borrow one row
    pub fn row(&self, index: usize) -> &[Sample] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    /// Swap axes, returning a new `(cols, rows)` matrix
    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                data.push(self.data[r * self.cols + c]);
            }
        }
        Self {
            data,
            rows: self.cols,
            cols: self.rows,
        }
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> Sample {
        self.data.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }

    /// Multiply every sample by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.data {
            *sample *= factor;
        }
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|s| s.is_finite())
    }
}

/// Decoded PCM audio in `(frames, channels)` layout
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: SampleMatrix,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: SampleMatrix, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build from interleaved samples. `None` if the length isn't a multiple of `channels`.
    pub fn from_interleaved(interleaved: Vec<Sample>, channels: usize, sample_rate: u32) -> Option<Self> {
        if channels == 0 || interleaved.len() % channels != 0 {
            return None;
        }
        let frames = interleaved.len() / channels;
        SampleMatrix::from_vec(interleaved, frames, channels).map(|m| Self::new(m, sample_rate))
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.rows()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.cols()
    }

    /// Interleaved view `[L, R, L, R, ...]`
    #[inline]
    pub fn interleaved(&self) -> &[Sample] {
        self.samples.as_slice()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one
    pub fn mono(&self) -> Vec<Sample> {
        let channels = self.channels().max(1);
        self.interleaved()
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<Sample>() / channels as Sample)
            .collect()
    }
}
