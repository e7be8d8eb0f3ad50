//! Application configuration file
//!
//! One YAML document lists the operations to run, grouped by command, plus a
//! `settings` block for the analysis collaborators:
//!
//! ```yaml
//! timestretch:
//!   - source: ./loops
//!     output: ./out
//!     target_tempo: 128
//! settings:
//!   analysis:
//!     min_tempo: 60
//!     max_tempo: 180
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempokit_core::config::{ConvertParams, DetectTempoParams, NormalizeParams, TimeStretchParams};
use tempokit_core::tempo::BpmConfig;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "tempokit.yaml";

/// A section holding either a single operation or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Which tempo estimator and loudness meter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisBackend {
    /// Built-in onset estimator and EBU R128 meter
    #[default]
    Onset,
    /// Essentia RhythmExtractor2013 and LoudnessEBUR128 (feature `essentia`)
    Essentia,
}

/// Tempo analysis settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    #[serde(flatten)]
    pub bpm: BpmConfig,
    pub backend: AnalysisBackend,
}

/// Time-stretch collaborator settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchSettings {
    /// Seed for rate picks inside a rate range (random when unset)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub stretch: StretchSettings,
    /// Abort a batch after this many consecutive computation failures
    pub failure_limit: Option<usize>,
}

/// Root configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detect_tempo: Option<OneOrMany<DetectTempoParams>>,
    pub timestretch: Option<OneOrMany<TimeStretchParams>>,
    pub convert: Option<OneOrMany<ConvertParams>>,
    pub normalize: Option<OneOrMany<NormalizeParams>>,
    pub settings: Settings,
}

impl AppConfig {
    /// Clamp analysis settings to their supported ranges
    pub fn validate(&mut self) {
        self.settings.analysis.bpm.validate();
    }
}

/// Flatten an optional section into its operations
pub fn section<T>(section: Option<OneOrMany<T>>) -> Vec<T> {
    section.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Resolve the configuration file path
///
/// An explicit path wins. Otherwise `./tempokit.yaml` is used when present,
/// falling back to `<config dir>/tempokit/config.yaml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("tempokit").join("config.yaml"))
        .unwrap_or(local)
}

/// Load the application configuration
///
/// A missing or unparsable file is an error; there are no implicit defaults
/// for work to be done.
pub fn load(path: &Path) -> Result<AppConfig> {
    let mut config: AppConfig = tempokit_core::config::load_config(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    config.validate();
    Ok(config)
}

/// Commented example written by `tempokit init`
pub const EXAMPLE_CONFIG: &str = r#"# tempokit configuration
#
# Each section holds one operation or a list of operations. `source` may be a
# file or a directory; directories are scanned for wav/mp3/flac/ogg/m4a files.

detect_tempo:
  source: ./music
  # format_filter: "*"     # or a single extension, e.g. wav
  # recursive: false

timestretch:
  - source: ./music
    output: ./stretched
    format: wav            # wav or mp3
    target_tempo: 128      # either target_tempo ...
  - source: ./music
    output: ./stretched
    min_rate: 0.9          # ... or min_rate/max_rate (a missing bound is 1.0)
    max_rate: 1.1
    # filename_template: "{stem}_{tempo_min}-{tempo_max}_BPM"
    # create_target_dir: true   # nest under timestretch/<target tempo>/

convert:
  source: ./music
  output: ./converted
  format: mp3

normalize:
  source: ./music
  output: ./normalized
  format: wav
  target_lufs: -14.0

settings:
  analysis:
    min_tempo: 40
    max_tempo: 208
    zero_pad: true
    backend: onset         # onset or essentia
  stretch:
    seed: ~                # an integer makes rate picks reproducible
  # failure_limit: 5
"#;

/// Write [`EXAMPLE_CONFIG`] to `path`
pub fn write_example(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists, use --force to overwrite", path);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    log::info!("write_example: wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempokit_core::config::{TimeStretchConfig, DetectTempoConfig};

    #[test]
    fn test_example_config_parses() {
        let config: AppConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();

        assert_eq!(section(config.detect_tempo.clone()).len(), 1);
        assert_eq!(section(config.convert.clone()).len(), 1);
        assert_eq!(section(config.normalize.clone()).len(), 1);

        let stretches = section(config.timestretch.clone());
        assert_eq!(stretches.len(), 2);
        for params in stretches {
            assert!(TimeStretchConfig::new(params).is_ok());
        }
        assert_eq!(config.settings.analysis.bpm, BpmConfig::default());
        assert_eq!(config.settings.analysis.backend, AnalysisBackend::Onset);
    }

    #[test]
    fn test_single_and_list_sections() {
        let yaml = "detect_tempo:\n  source: a.wav\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        let ops = section(config.detect_tempo);
        assert_eq!(ops.len(), 1);
        assert!(DetectTempoConfig::new(ops[0].clone()).is_ok());

        let yaml = "detect_tempo:\n  - source: a.wav\n  - source: b.wav\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(section(config.detect_tempo).len(), 2);

        let config: AppConfig = serde_yaml::from_str("settings: {}\n").unwrap();
        assert!(section(config.timestretch).is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn test_load_clamps_analysis_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempokit.yaml");
        std::fs::write(&path, "settings:\n  analysis:\n    min_tempo: 10\n    max_tempo: 900\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.settings.analysis.bpm.min_tempo, 40);
        assert_eq!(config.settings.analysis.bpm.max_tempo, 250);
    }

    #[test]
    fn test_write_example_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempokit.yaml");

        write_example(&path, false).unwrap();
        assert!(write_example(&path, false).is_err());
        assert!(write_example(&path, true).is_ok());
        assert!(load(&path).is_ok());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        assert_eq!(config_path(Some(Path::new("x.yaml"))), PathBuf::from("x.yaml"));
    }
}
