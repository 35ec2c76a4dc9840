//! Runtime configuration (`traitscore.toml`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::InterpretationScheme;
use crate::localization::{validate_language, DEFAULT_LANGUAGE};

/// Top-level traitscore configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitscoreConfig {
    /// Language for rendering when a session or command names none.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Max sessions scored concurrently in a batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Where score records are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Banding for instruments that do not choose their own.
    #[serde(default)]
    pub interpretation: InterpretationScheme,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./traitscore-results")
}

impl Default for TraitscoreConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
            interpretation: InterpretationScheme::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables expand to the empty string.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

/// Parse a config from a TOML string and normalize it.
pub fn parse_config_str(content: &str) -> Result<TraitscoreConfig> {
    let mut config: TraitscoreConfig = toml::from_str(content).context("failed to parse config")?;
    config.default_language = validate_language(Some(&config.default_language));
    config.output_dir = PathBuf::from(resolve_env_vars(&config.output_dir.to_string_lossy()));
    if config.parallelism == 0 {
        tracing::warn!("parallelism = 0 in config, using 1");
        config.parallelism = 1;
    }
    Ok(config)
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `traitscore.toml` in the current directory
/// 2. `~/.config/traitscore/config.toml`
pub fn load_config() -> Result<TraitscoreConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TraitscoreConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("traitscore.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("invalid config: {}", path.display()))
        }
        None => Ok(TraitscoreConfig::default()),
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("traitscore"))
}
