//! Per-operation configuration
//!
//! Each operation has a `*Params` struct as read from YAML (every field
//! optional) and a validated `*Config` built from it. The validated types
//! have private fields, so holding one means every invariant was checked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::SourceResolver;
use crate::types::{FormatFilter, OutputFormat};

/// Default integrated loudness target for normalization (LUFS)
pub const DEFAULT_TARGET_LUFS: f64 = -14.0;

// ────────────────────────────────────────────────────────────────────────────
// Shared parts
// ────────────────────────────────────────────────────────────────────────────

/// Input fields shared by every operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputParams {
    pub source: Option<PathBuf>,
    /// `*` or a single extension
    pub format_filter: Option<String>,
    pub recursive: bool,
}

/// Output fields shared by operations that write files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    pub output: Option<PathBuf>,
    #[serde(alias = "target_format")]
    pub format: Option<String>,
}

/// Validated input side of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    source: PathBuf,
    format_filter: FormatFilter,
    recursive: bool,
}

impl InputConfig {
    pub fn new(params: InputParams) -> Result<Self, ConfigError> {
        let source = params.source.ok_or(ConfigError::MissingField("source"))?;
        let format_filter = match params.format_filter {
            Some(filter) => filter.parse()?,
            None => FormatFilter::Any,
        };
        Ok(Self {
            source,
            format_filter,
            recursive: params.recursive,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn format_filter(&self) -> FormatFilter {
        self.format_filter
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Resolver configured with this input's filter and recursion
    pub fn resolver(&self) -> SourceResolver {
        SourceResolver::new(self.format_filter).recursive(self.recursive)
    }
}

/// Validated output side of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    output: PathBuf,
    format: OutputFormat,
}

impl OutputTarget {
    pub fn new(params: OutputParams) -> Result<Self, ConfigError> {
        let output = params.output.ok_or(ConfigError::MissingField("output"))?;
        let format = match params.format {
            Some(format) => format.parse()?,
            None => OutputFormat::default(),
        };
        Ok(Self { output, format })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tempo detection
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectTempoParams {
    #[serde(flatten)]
    pub input: InputParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectTempoConfig {
    input: InputConfig,
}

impl DetectTempoConfig {
    pub fn new(params: DetectTempoParams) -> Result<Self, ConfigError> {
        Ok(Self {
            input: InputConfig::new(params.input)?,
        })
    }

    pub fn input(&self) -> &InputConfig {
        &self.input
    }
}

impl TryFrom<DetectTempoParams> for DetectTempoConfig {
    type Error = ConfigError;

    fn try_from(params: DetectTempoParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Time-stretch
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStretchParams {
    #[serde(flatten)]
    pub input: InputParams,
    #[serde(flatten)]
    pub target: OutputParams,
    pub target_tempo: Option<f64>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
    #[serde(alias = "filename")]
    pub filename_template: Option<String>,
    /// Nest output under `timestretch/<target tempo>/`
    pub create_target_dir: bool,
}

impl TimeStretchParams {
    /// Params with source and output set, everything else unset
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: InputParams {
                source: Some(source.into()),
                ..Default::default()
            },
            target: OutputParams {
                output: Some(output.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// What a time-stretch aims for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StretchTarget {
    /// Fixed ratio so the output lands on this BPM
    Tempo(f64),
    /// Rate range, after defaulting a missing bound to 1.0
    Rates { min: f64, max: f64 },
}

impl StretchTarget {
    /// Exactly one of a target tempo or a rate range
    fn from_params(
        target_tempo: Option<f64>,
        min_rate: Option<f64>,
        max_rate: Option<f64>,
    ) -> Result<Self, ConfigError> {
        match (target_tempo, min_rate, max_rate) {
            (None, None, None) => Err(ConfigError::NoStretchTarget),
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(ConfigError::ConflictingStretchTarget)
            }
            (Some(tempo), None, None) => Ok(StretchTarget::Tempo(positive("target_tempo", tempo)?)),
            (None, min, max) => {
                let min = min.map(|v| positive("min_rate", v)).transpose()?.unwrap_or(1.0);
                let max = max.map(|v| positive("max_rate", v)).transpose()?.unwrap_or(1.0);
                if min > max {
                    return Err(ConfigError::RateOrder { min, max });
                }
                Ok(StretchTarget::Rates { min, max })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeStretchConfig {
    input: InputConfig,
    target: OutputTarget,
    stretch: StretchTarget,
    filename_template: Option<String>,
    create_target_dir: bool,
}

impl TimeStretchConfig {
    /// Validate time-stretch params
    ///
    /// # Errors
    /// * `MissingField` when `source` or `output` is absent
    /// * `NoStretchTarget` when neither `target_tempo` nor a rate bound is given
    /// * `ConflictingStretchTarget` when `target_tempo` comes with a rate bound
    /// * `RateOrder` when `min_rate > max_rate` after defaulting
    pub fn new(params: TimeStretchParams) -> Result<Self, ConfigError> {
        let input = InputConfig::new(params.input)?;
        let target = OutputTarget::new(params.target)?;
        let stretch = StretchTarget::from_params(params.target_tempo, params.min_rate, params.max_rate)?;

        Ok(Self {
            input,
            target,
            stretch,
            filename_template: params.filename_template,
            create_target_dir: params.create_target_dir,
        })
    }

    pub fn input(&self) -> &InputConfig {
        &self.input
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn stretch(&self) -> StretchTarget {
        self.stretch
    }

    pub fn target_tempo(&self) -> Option<f64> {
        match self.stretch {
            StretchTarget::Tempo(tempo) => Some(tempo),
            StretchTarget::Rates { .. } => None,
        }
    }

    /// Lower rate bound after defaulting, `None` for a tempo target
    pub fn min_rate(&self) -> Option<f64> {
        match self.stretch {
            StretchTarget::Rates { min, .. } => Some(min),
            StretchTarget::Tempo(_) => None,
        }
    }

    /// Upper rate bound after defaulting, `None` for a tempo target
    pub fn max_rate(&self) -> Option<f64> {
        match self.stretch {
            StretchTarget::Rates { max, .. } => Some(max),
            StretchTarget::Tempo(_) => None,
        }
    }

    pub fn filename_template(&self) -> Option<&str> {
        self.filename_template.as_deref()
    }

    pub fn create_target_dir(&self) -> bool {
        self.create_target_dir
    }
}

impl TryFrom<TimeStretchParams> for TimeStretchConfig {
    type Error = ConfigError;

    fn try_from(params: TimeStretchParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Convert
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertParams {
    #[serde(flatten)]
    pub input: InputParams,
    #[serde(flatten)]
    pub target: OutputParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    input: InputConfig,
    target: OutputTarget,
}

impl ConvertConfig {
    pub fn new(params: ConvertParams) -> Result<Self, ConfigError> {
        Ok(Self {
            input: InputConfig::new(params.input)?,
            target: OutputTarget::new(params.target)?,
        })
    }

    pub fn input(&self) -> &InputConfig {
        &self.input
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }
}

impl TryFrom<ConvertParams> for ConvertConfig {
    type Error = ConfigError;

    fn try_from(params: ConvertParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Normalize
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    #[serde(flatten)]
    pub input: InputParams,
    #[serde(flatten)]
    pub target: OutputParams,
    #[serde(alias = "lufs")]
    pub target_lufs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeConfig {
    input: InputConfig,
    target: OutputTarget,
    target_lufs: f64,
}

impl NormalizeConfig {
    pub fn new(params: NormalizeParams) -> Result<Self, ConfigError> {
        let target_lufs = params.target_lufs.unwrap_or(DEFAULT_TARGET_LUFS);
        if !target_lufs.is_finite() || target_lufs > 0.0 {
            return Err(ConfigError::InvalidTargetLufs(target_lufs));
        }
        Ok(Self {
            input: InputConfig::new(params.input)?,
            target: OutputTarget::new(params.target)?,
            target_lufs,
        })
    }

    pub fn input(&self) -> &InputConfig {
        &self.input
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn target_lufs(&self) -> f64 {
        self.target_lufs
    }
}

impl TryFrom<NormalizeParams> for NormalizeConfig {
    type Error = ConfigError;

    fn try_from(params: NormalizeParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stretch(target_tempo: Option<f64>, min_rate: Option<f64>, max_rate: Option<f64>) -> Result<TimeStretchConfig, ConfigError> {
        TimeStretchConfig::new(TimeStretchParams {
            target_tempo,
            min_rate,
            max_rate,
            ..TimeStretchParams::new("in", "out")
        })
    }

    #[test]
    fn test_stretch_target_mutual_exclusivity() {
        assert_eq!(stretch(None, None, None), Err(ConfigError::NoStretchTarget));
        assert_eq!(
            stretch(Some(150.0), Some(0.8), None),
            Err(ConfigError::ConflictingStretchTarget)
        );
        assert_eq!(
            stretch(Some(150.0), None, Some(1.2)),
            Err(ConfigError::ConflictingStretchTarget)
        );
        assert_eq!(
            stretch(Some(150.0), Some(0.8), Some(1.2)),
            Err(ConfigError::ConflictingStretchTarget)
        );
    }

    #[test]
    fn test_rate_defaulting() {
        let config = stretch(None, Some(0.8), None).unwrap();
        assert_eq!(config.min_rate(), Some(0.8));
        assert_eq!(config.max_rate(), Some(1.0));

        let config = stretch(None, None, Some(1.2)).unwrap();
        assert_eq!(config.min_rate(), Some(1.0));
        assert_eq!(config.max_rate(), Some(1.2));
    }

    #[test]
    fn test_rate_ordering() {
        assert_eq!(
            stretch(None, Some(1.2), Some(0.8)),
            Err(ConfigError::RateOrder { min: 1.2, max: 0.8 })
        );
        // Defaulting can also produce an inverted range
        assert_eq!(
            stretch(None, Some(1.5), None),
            Err(ConfigError::RateOrder { min: 1.5, max: 1.0 })
        );
    }

    #[test]
    fn test_rates_must_be_positive() {
        assert!(matches!(
            stretch(None, Some(0.0), Some(1.0)),
            Err(ConfigError::NotPositive { field: "min_rate", .. })
        ));
        assert!(matches!(
            stretch(Some(-120.0), None, None),
            Err(ConfigError::NotPositive { field: "target_tempo", .. })
        ));
    }

    #[test]
    fn test_missing_source_and_output() {
        let err = ConvertConfig::new(ConvertParams::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingField("source"));

        let err = ConvertConfig::new(ConvertParams {
            input: InputParams {
                source: Some("in".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingField("output"));
    }

    #[test]
    fn test_format_is_validated_case_insensitively() {
        let mut params = TimeStretchParams::new("in", "out");
        params.target_tempo = Some(128.0);
        params.target.format = Some("MP3".into());
        assert_eq!(TimeStretchConfig::new(params.clone()).unwrap().target().format(), OutputFormat::Mp3);

        params.target.format = Some("flac".into());
        assert!(matches!(
            TimeStretchConfig::new(params),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_deserialize_with_historical_keys() {
        let yaml = "source: music\noutput: out\nformat: mp3\nmin_rate: 0.9\nfilename: \"{stem}_x\"\n";
        let params: TimeStretchParams = serde_yaml::from_str(yaml).unwrap();
        let config = TimeStretchConfig::try_from(params).unwrap();

        assert_eq!(config.input().source(), Path::new("music"));
        assert_eq!(config.target().output(), Path::new("out"));
        assert_eq!(config.filename_template(), Some("{stem}_x"));
        assert_eq!(config.stretch(), StretchTarget::Rates { min: 0.9, max: 1.0 });

        let yaml = "source: music\noutput: out\nlufs: -9\n";
        let params: NormalizeParams = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(NormalizeConfig::new(params).unwrap().target_lufs(), -9.0);
    }

    #[test]
    fn test_normalize_target_lufs() {
        let base = NormalizeParams {
            input: InputParams {
                source: Some("in".into()),
                ..Default::default()
            },
            target: OutputParams {
                output: Some("out".into()),
                ..Default::default()
            },
            target_lufs: None,
        };
        assert_eq!(NormalizeConfig::new(base.clone()).unwrap().target_lufs(), DEFAULT_TARGET_LUFS);

        let loud = NormalizeParams {
            target_lufs: Some(3.0),
            ..base
        };
        assert_eq!(NormalizeConfig::new(loud), Err(ConfigError::InvalidTargetLufs(3.0)));
    }

    #[test]
    fn test_format_filter_parsed_from_params() {
        let config = DetectTempoConfig::new(DetectTempoParams {
            input: InputParams {
                source: Some("in".into()),
                format_filter: Some("WAV".into()),
                recursive: true,
            },
        })
        .unwrap();
        assert_eq!(
            config.input().format_filter(),
            FormatFilter::Only(crate::types::AudioFormat::Wav)
        );
        assert!(config.input().recursive());
    }
}
