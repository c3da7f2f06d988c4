use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config/squid.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    #[serde(default)]
    pub learn: LearnConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("./catalog.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    /// Upper bound on reading one candidate's metadata.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Only consider files matching these globs (all files when empty).
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompareConfig {
    /// Top matches scoring above this percentage are echoed to stdout.
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    /// Directory for JSON match reports (current directory when unset).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            high_confidence: default_high_confidence(),
            output_dir: None,
        }
    }
}

fn default_high_confidence() -> f64 {
    90.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct LearnConfig {
    /// What to do when a learned schema is already catalogued:
    /// `ask`, `merge`, `new`, or `skip`.
    #[serde(default = "default_on_match")]
    pub on_match: String,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            on_match: default_on_match(),
        }
    }
}

fn default_on_match() -> String {
    "ask".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if given, else the default config file if present, else
/// built-in defaults. An explicitly named file must exist.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                debug!("no config file at {}; using defaults", DEFAULT_CONFIG_PATH);
                Ok(Config::default())
            }
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.extract.timeout_secs == 0 {
        anyhow::bail!("extract.timeout_secs must be > 0");
    }

    if !(0.0..=100.0).contains(&config.compare.high_confidence) {
        anyhow::bail!("compare.high_confidence must be in [0, 100]");
    }

    match config.learn.on_match.as_str() {
        "ask" | "merge" | "new" | "skip" => {}
        other => anyhow::bail!(
            "Unknown learn.on_match: '{}'. Must be ask, merge, new, or skip.",
            other
        ),
    }

    Ok(())
}
