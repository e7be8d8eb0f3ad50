//! Output filename templates
//!
//! Templates use `{name}` placeholders over a closed variable set, with `{{`
//! and `}}` for literal braces. An unknown placeholder is a configuration
//! error; nothing is looked up dynamically.
//!
//! ```ignore
//! "{stem}_{tempo_min}_BPM"          // default when tempo_min == tempo_max
//! "{stem}_{tempo_min}-{tempo_max}_BPM"
//! ```

use std::fmt::Write as _;
use std::path::Path;

use crate::config::TimeStretchConfig;
use crate::error::{ConfigError, Result};
use crate::rate::resolve_bounds;

/// Variables a template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Stem,
    Tempo,
    TempoMin,
    TempoMax,
    Source,
    Output,
    Format,
    TargetTempo,
    MinRate,
    MaxRate,
    FormatFilter,
    Recursive,
    CreateTargetDir,
}

impl Variable {
    pub const ALL: [Variable; 13] = [
        Variable::Stem,
        Variable::Tempo,
        Variable::TempoMin,
        Variable::TempoMax,
        Variable::Source,
        Variable::Output,
        Variable::Format,
        Variable::TargetTempo,
        Variable::MinRate,
        Variable::MaxRate,
        Variable::FormatFilter,
        Variable::Recursive,
        Variable::CreateTargetDir,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Variable::Stem => "stem",
            Variable::Tempo => "tempo",
            Variable::TempoMin => "tempo_min",
            Variable::TempoMax => "tempo_max",
            Variable::Source => "source",
            Variable::Output => "output",
            Variable::Format => "format",
            Variable::TargetTempo => "target_tempo",
            Variable::MinRate => "min_rate",
            Variable::MaxRate => "max_rate",
            Variable::FormatFilter => "format_filter",
            Variable::Recursive => "recursive",
            Variable::CreateTargetDir => "create_target_dir",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(Variable),
}

/// Parsed filename template
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameTemplate {
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template string
    ///
    /// # Errors
    /// `UnknownTemplateVariable` for a placeholder outside [`Variable::ALL`],
    /// `MalformedTemplate` for unbalanced or empty braces.
    pub fn parse(template: &str) -> std::result::Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(malformed("unmatched `}`")),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(malformed("nested `{`")),
                            Some(c) => name.push(c),
                            None => return Err(malformed("unclosed `{`")),
                        }
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(malformed("empty placeholder"));
                    }
                    let variable = Variable::from_name(name).ok_or_else(|| {
                        ConfigError::UnknownTemplateVariable {
                            name: name.to_string(),
                            template: template.to_string(),
                        }
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(variable));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// `{stem}_{tempo_min}_BPM`
    pub fn single_tempo() -> Self {
        Self {
            segments: vec![
                Segment::Variable(Variable::Stem),
                Segment::Literal("_".into()),
                Segment::Variable(Variable::TempoMin),
                Segment::Literal("_BPM".into()),
            ],
        }
    }

    /// `{stem}_{tempo_min}-{tempo_max}_BPM`
    pub fn tempo_range() -> Self {
        Self {
            segments: vec![
                Segment::Variable(Variable::Stem),
                Segment::Literal("_".into()),
                Segment::Variable(Variable::TempoMin),
                Segment::Literal("-".into()),
                Segment::Variable(Variable::TempoMax),
                Segment::Literal("_BPM".into()),
            ],
        }
    }

    /// Substitute every placeholder from `values`
    pub fn render(&self, values: &TemplateValues<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(variable) => values.write(*variable, &mut out),
            }
        }
        out
    }
}

/// Values bound to template variables for one source
#[derive(Debug, Clone, Copy)]
pub struct TemplateValues<'a> {
    pub config: &'a TimeStretchConfig,
    pub stem: &'a str,
    pub tempo: f64,
    pub tempo_min: f64,
    pub tempo_max: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl TemplateValues<'_> {
    fn write(&self, variable: Variable, out: &mut String) {
        let config = self.config;
        match variable {
            Variable::Stem => out.push_str(self.stem),
            Variable::Tempo => push_number(out, self.tempo),
            Variable::TempoMin => push_number(out, self.tempo_min),
            Variable::TempoMax => push_number(out, self.tempo_max),
            Variable::Source => push_file_name(out, config.input().source()),
            Variable::Output => push_file_name(out, config.target().output()),
            Variable::Format => out.push_str(config.target().format().extension()),
            Variable::TargetTempo => {
                if let Some(tempo) = config.target_tempo() {
                    push_number(out, tempo);
                }
            }
            Variable::MinRate => push_number(out, self.min_rate),
            Variable::MaxRate => push_number(out, self.max_rate),
            Variable::FormatFilter => {
                let _ = write!(out, "{}", config.input().format_filter());
            }
            Variable::Recursive => {
                let _ = write!(out, "{}", config.input().recursive());
            }
            Variable::CreateTargetDir => {
                let _ = write!(out, "{}", config.create_target_dir());
            }
        }
    }
}

/// Last path component only, so a rendered name never points elsewhere
fn push_file_name(out: &mut String, path: &Path) {
    if let Some(name) = path.file_name() {
        out.push_str(&name.to_string_lossy());
    }
}

/// Whole numbers keep one decimal (`150.0`), others print as is (`133.33`)
pub fn format_number(value: f64) -> String {
    let mut out = String::new();
    push_number(&mut out, value);
    out
}

fn push_number(out: &mut String, value: f64) {
    if value.fract() == 0.0 && value.is_finite() {
        let _ = write!(out, "{:.1}", value);
    } else {
        let _ = write!(out, "{}", value);
    }
}

/// Check a config's explicit template without rendering it
pub fn validate(config: &TimeStretchConfig) -> std::result::Result<(), ConfigError> {
    match config.filename_template() {
        Some(template) => FilenameTemplate::parse(template).map(|_| ()),
        None => Ok(()),
    }
}

/// Derive the output filename (without extension) for one source
///
/// Tempo bounds come from the resolved rate bounds, rounded to 2 decimals.
/// Without an explicit template the single or range default is chosen by
/// whether the two bounds are equal.
pub fn render(config: &TimeStretchConfig, stem: &str, estimated_tempo: f64) -> Result<String> {
    let (bounds, _) = resolve_bounds(estimated_tempo, config)?;
    let (tempo_min, tempo_max) = bounds.tempo_range(estimated_tempo);

    let template = match config.filename_template() {
        Some(template) => FilenameTemplate::parse(template)?,
        None if tempo_min == tempo_max => FilenameTemplate::single_tempo(),
        None => FilenameTemplate::tempo_range(),
    };

    let name = template.render(&TemplateValues {
        config,
        stem,
        tempo: estimated_tempo,
        tempo_min,
        tempo_max,
        min_rate: bounds.min,
        max_rate: bounds.max,
    });

    if name.trim().is_empty() {
        return Err(ConfigError::MalformedTemplate {
            template: config.filename_template().unwrap_or_default().to_string(),
            reason: "renders an empty file name".to_string(),
        }
        .into());
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeStretchParams;
    use crate::error::ErrorKind;

    fn config(
        target_tempo: Option<f64>,
        min_rate: Option<f64>,
        max_rate: Option<f64>,
        template: Option<&str>,
    ) -> TimeStretchConfig {
        TimeStretchConfig::new(TimeStretchParams {
            target_tempo,
            min_rate,
            max_rate,
            filename_template: template.map(str::to_string),
            ..TimeStretchParams::new("music/in", "out")
        })
        .unwrap()
    }

    #[test]
    fn test_default_single_tempo_template() {
        let config = config(Some(150.0), None, None, None);
        assert_eq!(render(&config, "loop", 120.0).unwrap(), "loop_150.0_BPM");
    }

    #[test]
    fn test_default_range_template() {
        let config = config(None, Some(0.9), Some(1.1), None);
        assert_eq!(render(&config, "loop", 120.0).unwrap(), "loop_108.0-132.0_BPM");
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = config(None, Some(0.87), Some(1.13), None);
        let first = render(&config, "break", 93.7).unwrap();
        let second = render(&config, "break", 93.7).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "break_81.52-105.88_BPM");
    }

    #[test]
    fn test_explicit_template_with_config_fields() {
        let config = config(Some(128.0), None, None, Some("{stem}-{target_tempo}-{min_rate}.{format}{{x}}"));
        assert_eq!(render(&config, "kick", 64.0).unwrap(), "kick-128.0-2.0.wav{x}");

        // No target tempo in a rate-range config renders empty
        let config = self::config(None, Some(0.5), None, Some("{stem}[{target_tempo}]"));
        assert_eq!(render(&config, "kick", 100.0).unwrap(), "kick[]");
    }

    #[test]
    fn test_path_variables_render_file_name_only() {
        let config = config(Some(128.0), None, None, Some("{source}_{output}_{stem}"));
        let name = render(&config, "kick", 120.0).unwrap();
        assert_eq!(name, "in_out_kick");
        assert!(!name.contains(std::path::MAIN_SEPARATOR));
    }

    #[test]
    fn test_empty_rendered_name_is_configuration_error() {
        let config = config(None, Some(0.9), Some(1.1), Some("{target_tempo}"));
        let err = render(&config, "kick", 120.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_variable_is_configuration_error() {
        let config = config(Some(128.0), None, None, Some("{stem}_{bogus}"));
        let err = render(&config, "kick", 120.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_malformed_templates() {
        for template in ["{stem", "stem}", "{}", "{st{em}"] {
            assert!(
                matches!(
                    FilenameTemplate::parse(template),
                    Err(ConfigError::MalformedTemplate { .. })
                ),
                "{template} should be malformed"
            );
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(150.0), "150.0");
        assert_eq!(format_number(133.33), "133.33");
        assert_eq!(format_number(1.25), "1.25");
    }
}
