//! Audio sources flowing through the pipeline
//!
//! An [`AudioSource`] is the in-memory unit every stage consumes. A
//! [`FileAudioSource`] is one read from disk: it validates and reads its file
//! once on construction and never touches the filesystem again.

mod resolver;

pub use resolver::{SourceResolver, Sources};

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::{PipelineError, Result};
use crate::types::{AudioFormat, DEFAULT_SAMPLE_RATE};

/// Raw encoded audio plus the metadata needed to decode it
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    pub bytes: Option<Vec<u8>>,
    pub format: Option<AudioFormat>,
    pub sample_rate: u32,
    pub name: Option<String>,
}

impl Default for AudioSource {
    fn default() -> Self {
        Self {
            bytes: None,
            format: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            name: None,
        }
    }
}

impl AudioSource {
    /// Wrap encoded bytes of a known format
    pub fn from_bytes(bytes: Vec<u8>, format: AudioFormat, name: impl Into<String>) -> Self {
        Self {
            bytes: Some(bytes),
            format: Some(format),
            sample_rate: DEFAULT_SAMPLE_RATE,
            name: Some(name.into()),
        }
    }

    /// Borrow the bytes and format, or fail if the source isn't ready for a transform
    ///
    /// Bytes without a format tag can't be decoded, so that combination is
    /// rejected here rather than deep inside a codec.
    pub fn ensure_ready(&self) -> Result<(&[u8], AudioFormat)> {
        let label = self.name.clone().unwrap_or_else(|| "<memory>".to_string());
        match (&self.bytes, self.format) {
            (Some(bytes), Some(format)) if self.sample_rate > 0 => Ok((bytes, format)),
            (Some(_), Some(_)) => Err(PipelineError::ingestion(label, "sample rate is zero")),
            (Some(_), None) => Err(PipelineError::ingestion(label, "bytes present without a format")),
            (None, _) => Err(PipelineError::ingestion(label, "source holds no audio data")),
        }
    }
}

/// An [`AudioSource`] read eagerly from a file
#[derive(Debug, Clone, PartialEq)]
pub struct FileAudioSource {
    path: PathBuf,
    source: AudioSource,
}

impl FileAudioSource {
    /// Validate `path`, then read its bytes and derive the format from its extension
    ///
    /// # Errors
    ///
    /// `Ingestion` if the path isn't a regular file, can't be read, or has an
    /// extension outside the recognised input formats.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = fs::metadata(path).map_err(|e| PipelineError::ingestion(path, e))?;
        if !metadata.is_file() {
            return Err(PipelineError::ingestion(path, "not a regular file"));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let format = AudioFormat::from_extension(&extension).ok_or_else(|| {
            PipelineError::ingestion(path, format!("unrecognised extension `{}`", extension))
        })?;

        let bytes = fs::read(path).map_err(|e| PipelineError::ingestion(path, e))?;
        log::debug!("FileAudioSource::open: read {} bytes from {:?}", bytes.len(), path);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        // Unreadable headers keep the default; decoding reports the real error
        let sample_rate = codec::header_sample_rate(&bytes, format).unwrap_or(DEFAULT_SAMPLE_RATE);

        Ok(Self {
            path: path.to_path_buf(),
            source: AudioSource {
                bytes: Some(bytes),
                format: Some(format),
                sample_rate,
                name,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without its extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.source.format
    }

    pub fn audio(&self) -> &AudioSource {
        &self.source
    }
}
