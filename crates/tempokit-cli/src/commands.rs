//! Command dispatch
//!
//! Every operation of a section is validated before any audio is touched, so
//! a bad entry anywhere fails the whole run up front.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempokit_core::config::{ConvertConfig, DetectTempoConfig, NormalizeConfig, TimeStretchConfig};
use tempokit_core::{template, Batch, BatchSummary, ConfigError, ErrorKind, Pipeline};

use crate::analysis;
use crate::cli::{Cli, Commands};
use crate::config::{self, AppConfig, OneOrMany, LOCAL_CONFIG_FILE};
use crate::report::{self, ReportRow};

/// Text printed for a finished command plus its merged accounting
#[derive(Debug, Default)]
pub struct CommandReport {
    pub text: String,
    pub summary: BatchSummary,
}

impl CommandReport {
    /// Whether the process should exit with a failure status
    pub fn is_failure(&self) -> bool {
        self.summary.aborted
    }
}

/// Run the command selected on the command line
pub fn run(cli: &Cli) -> Result<CommandReport> {
    if let Commands::Init { force } = cli.command {
        let path = cli.config.clone().unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
        config::write_example(&path, force)?;
        return Ok(CommandReport {
            text: format!("wrote example configuration to {}\n", path.display()),
            summary: BatchSummary::default(),
        });
    }

    let path = config::config_path(cli.config.as_deref());
    log::info!("run: loading configuration from {:?}", path);
    let app_config = config::load(&path)?;
    execute(cli.command, &app_config)
}

/// Run every operation of the section `command` names
pub fn execute(command: Commands, app_config: &AppConfig) -> Result<CommandReport> {
    match command {
        Commands::DetectTempo => {
            let configs = validate_section("detect_tempo", app_config.detect_tempo.clone(), DetectTempoConfig::new)?;
            let pipeline = build_pipeline(app_config)?;
            run_section("detect_tempo", &configs, |c| pipeline.detect_tempo(c))
        }
        Commands::Timestretch => {
            let configs = validate_section("timestretch", app_config.timestretch.clone(), |params| {
                let config = TimeStretchConfig::new(params)?;
                template::validate(&config)?;
                Ok(config)
            })?;
            let pipeline = build_pipeline(app_config)?;
            run_section("timestretch", &configs, |c| pipeline.time_stretch(c))
        }
        Commands::Convert => {
            let configs = validate_section("convert", app_config.convert.clone(), ConvertConfig::new)?;
            let pipeline = build_pipeline(app_config)?;
            run_section("convert", &configs, |c| pipeline.convert(c))
        }
        Commands::Normalize => {
            let configs = validate_section("normalize", app_config.normalize.clone(), NormalizeConfig::new)?;
            let pipeline = build_pipeline(app_config)?;
            run_section("normalize", &configs, |c| pipeline.normalize(c))
        }
        Commands::Init { .. } => Ok(CommandReport::default()),
    }
}

fn build_pipeline(app_config: &AppConfig) -> Result<Pipeline> {
    let collab = analysis::collaborators(&app_config.settings)?;
    Ok(Pipeline::new(collab).with_failure_limit(app_config.settings.failure_limit))
}

fn validate_section<P, C>(
    name: &str,
    section: Option<OneOrMany<P>>,
    validate: impl Fn(P) -> Result<C, ConfigError>,
) -> Result<Vec<C>> {
    let params = config::section(section);
    if params.is_empty() {
        log::warn!("validate_section: no `{}` operations configured", name);
    }
    params
        .into_iter()
        .enumerate()
        .map(|(index, params)| {
            validate(params).with_context(|| format!("Invalid `{}` operation #{}", name, index + 1))
        })
        .collect()
}

/// Run one batch per operation and merge their results
///
/// A missing source fails only its own operation. Any other error returned
/// before a batch starts is a configuration problem and ends the run.
fn run_section<'p, C, R: ReportRow>(
    name: &str,
    configs: &[C],
    mut start: impl FnMut(&C) -> tempokit_core::error::Result<Batch<'p, R>>,
) -> Result<CommandReport> {
    let mut results = Vec::new();
    let mut summary = BatchSummary::default();

    for (index, config) in configs.iter().enumerate() {
        log::info!("run_section: `{}` operation #{}", name, index + 1);
        match start(config) {
            Ok(batch) => {
                let (processed, batch_summary) = batch.run();
                log::info!("run_section: `{}` operation #{}: {}", name, index + 1, batch_summary);
                results.extend(processed);
                summary.merge(batch_summary);
            }
            Err(error) if error.kind() == ErrorKind::SourceNotFound => {
                log::error!("run_section: `{}` operation #{}: {}", name, index + 1, error);
                let path = error.path().map(Path::to_path_buf).unwrap_or_default();
                summary.failures.push((path, error));
            }
            Err(error) => {
                return Err(error).with_context(|| format!("`{}` operation #{} failed", name, index + 1));
            }
        }
    }

    let mut text = report::table(&results);
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&report::summary(&summary));
    Ok(CommandReport { text, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempokit_core::config::{ConvertParams, InputParams, OutputParams, TimeStretchParams};

    fn write_sine(path: &Path) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..44100 {
            let t = i as f32 / 44100.0;
            let s = ((t * 220.0 * 2.0 * std::f32::consts::PI).sin() * 0.4 * i16::MAX as f32) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn convert_params(source: PathBuf, output: PathBuf) -> ConvertParams {
        ConvertParams {
            input: InputParams { source: Some(source), ..Default::default() },
            target: OutputParams { output: Some(output), format: Some("wav".into()) },
        }
    }

    #[test]
    fn test_convert_section_runs_every_operation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        write_sine(&input.join("a.wav"));
        write_sine(&input.join("b.wav"));

        let app_config = AppConfig {
            convert: Some(OneOrMany::Many(vec![
                convert_params(input.join("a.wav"), dir.path().join("out1")),
                convert_params(input.clone(), dir.path().join("out2")),
            ])),
            ..Default::default()
        };

        let report = execute(Commands::Convert, &app_config).unwrap();
        assert_eq!(report.summary.processed, 3);
        assert!(!report.is_failure());
        assert!(dir.path().join("out1/a.wav").is_file());
        assert!(dir.path().join("out2/b.wav").is_file());
        assert!(report.text.contains("processed 3, skipped (no-op) 0, failed 0"));
    }

    #[test]
    fn test_missing_source_fails_only_its_operation() {
        let dir = tempfile::tempdir().unwrap();
        write_sine(&dir.path().join("a.wav"));

        let app_config = AppConfig {
            convert: Some(OneOrMany::Many(vec![
                convert_params(dir.path().join("missing"), dir.path().join("out")),
                convert_params(dir.path().join("a.wav"), dir.path().join("out")),
            ])),
            ..Default::default()
        };

        let report = execute(Commands::Convert, &app_config).unwrap();
        assert_eq!(report.summary.processed, 1);
        assert_eq!(report.summary.failed(), 1);
        assert_eq!(report.summary.failures[0].1.kind(), ErrorKind::SourceNotFound);
    }

    #[test]
    fn test_invalid_operation_fails_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        write_sine(&dir.path().join("a.wav"));

        let valid = TimeStretchParams {
            target_tempo: Some(120.0),
            ..TimeStretchParams::new(dir.path().join("a.wav"), dir.path().join("out"))
        };
        let no_target = TimeStretchParams::new(dir.path().join("a.wav"), dir.path().join("out"));

        let app_config = AppConfig {
            timestretch: Some(OneOrMany::Many(vec![valid, no_target])),
            ..Default::default()
        };

        let err = execute(Commands::Timestretch, &app_config).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_unknown_template_variable_fails_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let params = TimeStretchParams {
            target_tempo: Some(120.0),
            filename_template: Some("{stem}_{bogus}".into()),
            ..TimeStretchParams::new(dir.path().join("a.wav"), dir.path().join("out"))
        };
        let app_config = AppConfig {
            timestretch: Some(OneOrMany::One(params)),
            ..Default::default()
        };

        let err = execute(Commands::Timestretch, &app_config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownTemplateVariable { .. })
        ));
    }

    #[test]
    fn test_init_writes_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.yaml");
        let cli = Cli {
            config: Some(path.clone()),
            command: Commands::Init { force: false },
        };

        run(&cli).unwrap();
        assert!(config::load(&path).is_ok());
        assert!(run(&cli).is_err());
    }
}
