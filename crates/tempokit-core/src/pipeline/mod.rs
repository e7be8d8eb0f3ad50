//! Pipeline orchestration
//!
//! Every operation follows the same shape: validate, resolve sources, then
//! lazily run a per-source step that decodes, calls the collaborators and
//! persists the output. Configuration problems and a missing input path are
//! returned before any source is read; everything after that is reported
//! per source through the returned [`Batch`].
//!
//! Collaborators are injected once and reused for every source, so a tempo
//! model or FFT plan is built a single time per pipeline.

mod batch;
mod results;

pub use batch::{Batch, BatchSummary, Outcome, Step};
pub use results::{ConvertResult, NormalizeResult, TempoResult, TimeStretchResult};

use std::path::PathBuf;

use crate::codec::{AudioCodec, SymphoniaCodec};
use crate::config::{ConvertConfig, DetectTempoConfig, NormalizeConfig, OutputTarget, TimeStretchConfig};
use crate::error::{PipelineError, Result};
use crate::loudness::{Ebur128Meter, LoudnessMeter};
use crate::rate::{self, RateDecision};
use crate::source::FileAudioSource;
use crate::store::{FsStore, OutputStore};
use crate::template::{self, format_number};
use crate::tempo::{BpmConfig, OnsetTempoEstimator, TempoEstimator};
use crate::timestretch::{SignalsmithStretcher, TimeStretcher};
use crate::types::{DecodedAudio, SampleMatrix};

/// Sub-directory used when a time-stretch nests output by target tempo
const TIMESTRETCH_DIR: &str = "timestretch";

/// External collaborators the pipeline calls into
pub struct Collaborators {
    pub estimator: Box<dyn TempoEstimator>,
    pub stretcher: Box<dyn TimeStretcher>,
    pub meter: Box<dyn LoudnessMeter>,
    pub codec: Box<dyn AudioCodec>,
    pub store: Box<dyn OutputStore>,
}

impl Collaborators {
    /// Pure-Rust defaults
    ///
    /// # Arguments
    /// * `bpm` - Tempo search range and padding for the onset estimator
    /// * `seed` - Seed for rate picks inside a stretch range (`None` = entropy)
    pub fn defaults(bpm: BpmConfig, seed: Option<u64>) -> Self {
        let stretcher = match seed {
            Some(seed) => SignalsmithStretcher::with_seed(seed),
            None => SignalsmithStretcher::new(),
        };
        Self {
            estimator: Box::new(OnsetTempoEstimator::new(bpm)),
            stretcher: Box::new(stretcher),
            meter: Box::new(Ebur128Meter),
            codec: Box::new(SymphoniaCodec),
            store: Box::new(FsStore),
        }
    }
}

/// Batch audio pipeline
pub struct Pipeline {
    collab: Collaborators,
    failure_limit: Option<usize>,
}

impl Pipeline {
    pub fn new(collab: Collaborators) -> Self {
        log::info!(
            "Pipeline::new: estimator={}, stretcher={}, meter={}",
            collab.estimator.name(),
            collab.stretcher.name(),
            collab.meter.name()
        );
        Self {
            collab,
            failure_limit: None,
        }
    }

    pub fn with_defaults(bpm: BpmConfig, seed: Option<u64>) -> Self {
        Self::new(Collaborators::defaults(bpm, seed))
    }

    /// Abort a batch after this many consecutive computation failures
    pub fn with_failure_limit(mut self, limit: Option<usize>) -> Self {
        self.failure_limit = limit.filter(|&l| l > 0);
        self
    }

    // ────────────────────────────────────────────────────────────────────────
    // Operations
    // ────────────────────────────────────────────────────────────────────────

    /// Estimate the tempo of every source
    pub fn detect_tempo(&self, config: &DetectTempoConfig) -> Result<Batch<'_, TempoResult>> {
        let sources = config.input().resolver().resolve(config.input().source())?;

        Ok(Batch::new("detect_tempo", sources, self.failure_limit, move |source| {
            let audio = self.decode(source)?;
            let tempo_bpm = self.estimate(source, &audio)?;
            Ok(Step::Done(TempoResult {
                source: source.path().to_path_buf(),
                tempo_bpm,
            }))
        }))
    }

    /// Stretch every source towards the configured tempo or rate range
    ///
    /// Sources whose resolved rate is exactly 1.0 are skipped and nothing is
    /// written for them.
    pub fn time_stretch(&self, config: &TimeStretchConfig) -> Result<Batch<'_, TimeStretchResult>> {
        template::validate(config)?;
        let sources = config.input().resolver().resolve(config.input().source())?;
        let config = config.clone();

        Ok(Batch::new("time_stretch", sources, self.failure_limit, move |source| {
            self.stretch_one(&config, source)
        }))
    }

    /// Re-encode every source in the configured format
    pub fn convert(&self, config: &ConvertConfig) -> Result<Batch<'_, ConvertResult>> {
        let sources = config.input().resolver().resolve(config.input().source())?;
        let config = config.clone();

        Ok(Batch::new("convert", sources, self.failure_limit, move |source| {
            self.convert_one(&config, source)
        }))
    }

    /// Normalize every source to the configured integrated loudness
    pub fn normalize(&self, config: &NormalizeConfig) -> Result<Batch<'_, NormalizeResult>> {
        let sources = config.input().resolver().resolve(config.input().source())?;
        let config = config.clone();

        Ok(Batch::new("normalize", sources, self.failure_limit, move |source| {
            self.normalize_one(&config, source)
        }))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Per-source steps
    // ────────────────────────────────────────────────────────────────────────

    fn stretch_one(&self, config: &TimeStretchConfig, source: &FileAudioSource) -> Result<Step<TimeStretchResult>> {
        let audio = self.decode(source)?;
        let tempo = self.estimate(source, &audio)?;

        let (min_rate, max_rate, target_tempo) = match rate::resolve(tempo, config)? {
            RateDecision::NoOp => {
                return Ok(Step::Unchanged(format!(
                    "estimated tempo {:.2} BPM needs no stretch",
                    tempo
                )));
            }
            RateDecision::Stretch {
                min_rate,
                max_rate,
                target_tempo,
            } => (min_rate, max_rate, target_tempo),
        };

        let (channel_major, transposed) = to_channel_major(&audio.samples);
        let stretched = self
            .collab
            .stretcher
            .stretch(&channel_major, audio.sample_rate, min_rate, max_rate)
            .map_err(|e| PipelineError::Computation(format!("time stretch failed: {:#}", e)))?;

        if stretched.rows() != channel_major.rows() {
            return Err(PipelineError::Computation(format!(
                "time stretch changed channel count from {} to {}",
                channel_major.rows(),
                stretched.rows()
            )));
        }
        let samples = if transposed { stretched.transpose() } else { stretched };

        let filename = template::render(config, &source.stem(), tempo)?;
        let dir = if config.create_target_dir() {
            config
                .target()
                .output()
                .join(TIMESTRETCH_DIR)
                .join(format_number(target_tempo))
        } else {
            config.target().output().to_path_buf()
        };

        let output_path = self.persist(
            &DecodedAudio::new(samples, audio.sample_rate),
            config.target(),
            dir,
            &filename,
        )?;

        log::info!(
            "time_stretch: {:?} {:.2} -> {:.2} BPM, wrote {:?}",
            source.path(),
            tempo,
            target_tempo,
            output_path
        );

        Ok(Step::Done(TimeStretchResult {
            source: source.path().to_path_buf(),
            original_tempo: tempo,
            target_tempo,
            min_rate,
            max_rate,
            output_path,
        }))
    }

    fn convert_one(&self, config: &ConvertConfig, source: &FileAudioSource) -> Result<Step<ConvertResult>> {
        let target = config.target();
        let dir = target.output().to_path_buf();

        // Same container: copy the bytes instead of a lossy re-encode
        if source.format() == Some(target.format().into()) {
            let (bytes, _) = source.audio().ensure_ready()?;
            let filename = format!("{}.{}", source.stem(), target.format().extension());
            let output_path = self.write(&dir, &filename, bytes)?;
            log::info!("convert: {:?} already {}, copied", source.path(), target.format());
            return Ok(Step::Done(ConvertResult {
                source: source.path().to_path_buf(),
                output_path,
                passthrough: true,
            }));
        }

        let audio = self.decode(source)?;
        let output_path = self.persist(&audio, target, dir, &source.stem())?;

        Ok(Step::Done(ConvertResult {
            source: source.path().to_path_buf(),
            output_path,
            passthrough: false,
        }))
    }

    fn normalize_one(&self, config: &NormalizeConfig, source: &FileAudioSource) -> Result<Step<NormalizeResult>> {
        let audio = self.decode(source)?;

        let current = self
            .collab
            .meter
            .measure(&audio)
            .map_err(|e| PipelineError::Computation(format!("loudness measurement failed: {:#}", e)))?;
        if !current.is_finite() {
            return Err(PipelineError::Computation(format!(
                "integrated loudness is {} (silent input?)",
                current
            )));
        }

        let normalized = self
            .collab
            .meter
            .normalize(&audio, current, config.target_lufs())
            .map_err(|e| PipelineError::Computation(format!("normalization failed: {:#}", e)))?;

        let output_path = self.persist(
            &normalized,
            config.target(),
            config.target().output().to_path_buf(),
            &source.stem(),
        )?;

        log::info!(
            "normalize: {:?} {:.2} -> {:.2} LUFS",
            source.path(),
            current,
            config.target_lufs()
        );

        Ok(Step::Done(NormalizeResult {
            source: source.path().to_path_buf(),
            output_path,
            lufs: config.target_lufs(),
            original_lufs: current,
        }))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Collaborator calls mapped into the error taxonomy
    // ────────────────────────────────────────────────────────────────────────

    fn decode(&self, source: &FileAudioSource) -> Result<DecodedAudio> {
        let (bytes, format) = source.audio().ensure_ready()?;
        let audio = self
            .collab
            .codec
            .decode(bytes, format)
            .map_err(|e| PipelineError::ingestion(source.path(), format!("{:#}", e)))?;
        if audio.sample_rate != source.audio().sample_rate {
            log::debug!(
                "decode: {:?} header says {} Hz, decoded {} Hz",
                source.path(),
                source.audio().sample_rate,
                audio.sample_rate
            );
        }
        Ok(audio)
    }

    fn estimate(&self, source: &FileAudioSource, audio: &DecodedAudio) -> Result<f64> {
        let tempo = self
            .collab
            .estimator
            .estimate(audio)
            .map_err(|e| PipelineError::Computation(format!("tempo estimation failed: {:#}", e)))?;
        log::debug!("estimate: {:?} {:.2} BPM", source.path(), tempo);
        Ok(tempo)
    }

    /// Encode and write `{dir}/{filename}.{format}`
    fn persist(&self, audio: &DecodedAudio, target: &OutputTarget, dir: PathBuf, filename: &str) -> Result<PathBuf> {
        let bytes = self
            .collab
            .codec
            .encode(audio, target.format())
            .map_err(|e| PipelineError::Computation(format!("{} encode failed: {:#}", target.format(), e)))?;
        let filename = format!("{}.{}", filename, target.format().extension());
        self.write(&dir, &filename, &bytes)
    }

    fn write(&self, dir: &std::path::Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.collab
            .store
            .write(dir, filename, bytes)
            .map_err(|e| PipelineError::persistence(dir.join(filename), e))
    }
}

/// View a buffer as `(channels, frames)`
///
/// The longer axis is taken to be time, so a `(frames, channels)` buffer is
/// transposed. Returns whether a transpose happened.
fn to_channel_major(samples: &SampleMatrix) -> (SampleMatrix, bool) {
    if samples.rows() > samples.cols() {
        (samples.transpose(), true)
    } else {
        (samples.clone(), false)
    }
}
