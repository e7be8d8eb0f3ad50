//! YAML configuration loading
//!
//! Unlike application preferences, an operation file describes work to do:
//! a missing or broken file is an error, never a silent default.

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Load and deserialize a YAML configuration file
///
/// # Arguments
/// * `path` - Path to the YAML file
///
/// # Errors
/// `FileNotFound` if the file doesn't exist, `Parse` if it can't be read or
/// doesn't deserialize into `T`.
pub fn load_config<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    log::info!("load_config: Loading from {:?}", path);

    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    let config = parse_config(&contents)?;

    log::info!("load_config: Successfully loaded config from {:?}", path);
    Ok(config)
}

/// Deserialize a YAML document
pub fn parse_config<T>(contents: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestConfig {
        value: i32,
        name: String,
    }

    #[test]
    fn test_load_nonexistent_is_an_error() {
        let result: Result<TestConfig, _> = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "value: [unterminated").unwrap();

        let result: Result<TestConfig, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.yaml");
        std::fs::write(&path, "value: 42\nname: test\n").unwrap();

        let loaded: TestConfig = load_config(&path).unwrap();
        assert_eq!(
            loaded,
            TestConfig {
                value: 42,
                name: "test".to_string()
            }
        );
    }
}
