//! Tempokit Core - tempo detection, time-stretch, conversion and loudness
//! normalization for batches of audio files

pub mod codec;
pub mod config;
pub mod error;
pub mod loudness;
pub mod pipeline;
pub mod rate;
pub mod source;
pub mod store;
pub mod template;
pub mod tempo;
pub mod timestretch;
pub mod types;

pub use error::{ConfigError, ErrorKind, PipelineError};
pub use pipeline::{Batch, BatchSummary, Collaborators, Outcome, Pipeline};
pub use types::*;
