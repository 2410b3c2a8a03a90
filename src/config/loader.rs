//! Config file loading

use crate::domain::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional nested section, e.g. `[issue-hook]` in TOML.
const SECTION: &str = "issue-hook";

const CANDIDATES: [&str; 6] = [
    "issue-hook.toml",
    ".issue-hook.toml",
    "issue-hook.yml",
    ".issue-hook.yml",
    "issue-hook.yaml",
    ".issue-hook.yaml",
];

/// Load the config file at `config_path`, or the first one discovered in `dir`.
///
/// An explicit file that cannot be parsed is an error. A discovered one only
/// produces a warning and the defaults.
pub fn load_config(dir: &Path, config_path: Option<&Path>) -> Result<Config> {
    let explicit = config_path.is_some();
    let Some(config_file) = config_path.map(Path::to_path_buf).or_else(|| discover_config(dir)) else {
        return Ok(Config::default());
    };

    match parse_config_file(&config_file) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", config_file.display());
            Ok(config)
        }
        Err(err) if explicit => Err(err),
        Err(err) => {
            tracing::warn!("Ignoring auto-discovered config {}: {:#}", config_file.display(), err);
            Ok(Config::default())
        }
    }
}

fn parse_config_file(config_file: &Path) -> Result<Config> {
    let content = fs::read_to_string(config_file)
        .with_context(|| format!("Failed reading config file: {}", config_file.display()))?;
    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    match ext.as_str() {
        "toml" => parse_toml_config(&content, config_file),
        "yaml" | "yml" => parse_yaml_config(&content, config_file),
        other => anyhow::bail!("Unsupported config extension '.{}' for file {}", other, config_file.display()),
    }
}

fn parse_toml_config(content: &str, config_file: &Path) -> Result<Config> {
    let raw: toml::Value = toml::from_str(content)
        .with_context(|| format!("Invalid TOML syntax: {}", config_file.display()))?;
    let section = raw.get(SECTION).cloned().unwrap_or(raw);
    section.try_into().with_context(|| format!("Invalid TOML config: {}", config_file.display()))
}

fn parse_yaml_config(content: &str, config_file: &Path) -> Result<Config> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML syntax: {}", config_file.display()))?;
    let section = raw.get(SECTION).cloned().unwrap_or(raw);
    // An empty YAML document parses as null.
    if section.is_null() {
        return Ok(Config::default());
    }
    serde_yaml::from_value(section).with_context(|| format!("Invalid YAML config: {}", config_file.display()))
}

fn discover_config(dir: &Path) -> Option<PathBuf> {
    CANDIDATES.iter().map(|name| dir.join(name)).find(|path| path.is_file())
}
