//! Configuration loading and discovery for `imagecraft.toml`
//!
//! Provides functions to find, load, and merge configuration, and to read
//! credentials from the environment.

use super::schema::ImagecraftConfig;
use crate::openai::{API_KEY_ENV, BASE_URL_ENV};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "imagecraft.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse imagecraft.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// Required credential absent from the environment
    #[error("{0} is not set. Export your OpenAI API key before starting the server")]
    MissingApiKey(&'static str),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override cache directory
    pub cache_dir: Option<PathBuf>,
    /// Disable the analysis cache
    pub no_cache: bool,
}

/// Find imagecraft.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for imagecraft.toml
/// 2. Check XDG_CONFIG_HOME/imagecraft/imagecraft.toml (or ~/.config/imagecraft/imagecraft.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find imagecraft.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("imagecraft").join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find imagecraft.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration.
///
/// If a path is provided, loads from that file (which must exist).
/// Otherwise uses `find_config()`, falling back to defaults when nothing is
/// found.
pub fn load_config(path: Option<&Path>) -> Result<ImagecraftConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let mut config = match config_path {
        Some(p) => {
            tracing::debug!(path = %p.display(), "loading config");
            load_config_file(&p)?
        }
        None => ImagecraftConfig::default(),
    };

    apply_env(&mut config);
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<ImagecraftConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ImagecraftConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Environment overrides that sit between the file and the CLI.
fn apply_env(config: &mut ImagecraftConfig) {
    if let Ok(base_url) = env::var(BASE_URL_ENV) {
        let base_url = base_url.trim();
        if !base_url.is_empty() {
            config.openai.base_url = base_url.to_string();
        }
    }
}

/// Merge CLI overrides into a configuration. CLI arguments take precedence.
pub fn merge_cli_overrides(config: &mut ImagecraftConfig, overrides: &CliOverrides) {
    if let Some(ref dir) = overrides.cache_dir {
        config.cache.dir = Some(dir.clone());
    }
    if overrides.no_cache {
        config.cache.enabled = false;
    }
}

/// Read the API key from `OPENAI_API_KEY`.
pub fn api_key_from_env() -> Result<String, ConfigError> {
    match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(ConfigError::MissingApiKey(API_KEY_ENV)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        File::create(&path)
            .expect("should create config file")
            .write_all(contents.as_bytes())
            .expect("should write config content");
        path
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[cache]\nttl_days = 3\n");
        let subdir = temp.path().join("assets").join("photos");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        assert_eq!(find_config_from(subdir), Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    #[serial]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            r#"
[cache]
dir = "/var/cache/imagecraft"
ttl_days = 7

[openai]
vision_model = "gpt-4o-mini"
timeout_secs = 30
"#,
        );
        env::remove_var(BASE_URL_ENV);

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.cache.dir, Some(PathBuf::from("/var/cache/imagecraft")));
        assert_eq!(config.cache.ttl_days, 7);
        assert_eq!(config.openai.vision_model, "gpt-4o-mini");
        assert_eq!(config.openai.timeout_secs, 30);
        assert_eq!(config.openai.max_tokens, 1000);
    }

    #[test]
    fn test_load_config_missing_explicit_file_errors() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "this is not valid toml {{{");
        assert!(matches!(load_config(Some(&config_path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[cache]\nttl_days = 0\n");

        let err = load_config(Some(&config_path)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("cache.ttl_days"));
    }

    #[test]
    #[serial]
    fn test_base_url_env_override() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "");
        env::set_var(BASE_URL_ENV, "http://127.0.0.1:9999");

        let config = load_config(Some(&config_path)).expect("should load");
        env::remove_var(BASE_URL_ENV);
        assert_eq!(config.openai.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = ImagecraftConfig::default();
        merge_cli_overrides(
            &mut config,
            &CliOverrides { cache_dir: Some(PathBuf::from("/tmp/other")), no_cache: true },
        );
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/other")));
        assert!(!config.cache.enabled);
    }

    #[test]
    #[serial]
    fn test_api_key_from_env() {
        let saved = env::var(API_KEY_ENV).ok();

        env::set_var(API_KEY_ENV, "  sk-test  ");
        assert_eq!(api_key_from_env().unwrap(), "sk-test");

        env::remove_var(API_KEY_ENV);
        let err = api_key_from_env().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY is not set"));

        if let Some(value) = saved {
            env::set_var(API_KEY_ENV, value);
        }
    }
}
