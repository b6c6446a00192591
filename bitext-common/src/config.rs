//! Configuration model and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. Every field has a
//! compiled default, so a missing file (or a missing section) never prevents
//! startup. Resolution priority for the file itself:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`BITEXT_CONFIG`)
//! 3. User config directory (`~/.config/bitext/bitext.toml` on Linux)
//! 4. System config (`/etc/bitext/bitext.toml`, Linux only)
//!
//! Individual settings are further overridden by CLI flags and `BITEXT_*`
//! environment variables in the binary.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BITEXT_CONFIG";

/// Config file name inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "bitext.toml";

/// Default embedding model identifier (opaque to the aligner, resolved by the oracle)
pub const DEFAULT_MODEL: &str = "sentence-transformers/LaBSE";

/// Default maximum similarity regression accepted for a single merge
pub const DEFAULT_TOLERANCE: f32 = -0.01;

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub embedding: EmbeddingConfig,
    pub alignment: AlignmentSettings,
    pub batch: BatchConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Which embedding oracle implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// OpenAI-compatible `/v1/embeddings` HTTP endpoint
    #[default]
    Http,
    /// Deterministic offline hashing embedder (smoke runs, tests)
    Hashing,
}

/// Embedding oracle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub kind: OracleKind,
    /// Full URL of the embeddings endpoint
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Expected vector length; inferred from the first response when unset
    pub dimensions: Option<usize>,
    /// Maximum texts per request
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub requests_per_second: u32,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::Http,
            endpoint: "http://127.0.0.1:8080/v1/embeddings".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            dimensions: None,
            batch_size: 32,
            timeout_secs: 30,
            connect_timeout_secs: 5,
            requests_per_second: 10,
            max_retries: 3,
            retry_base_delay_ms: 2000,
        }
    }
}

/// Merge search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Locally greedy single merges, never reconsidered
    #[default]
    Greedy,
    /// Optimal contiguous partition of the longer sequence
    Global,
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(MergeStrategy::Greedy),
            "global" => Ok(MergeStrategy::Global),
            other => Err(Error::Config(format!(
                "Unknown merge strategy '{}' (expected 'greedy' or 'global')",
                other
            ))),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Greedy => write!(f, "greedy"),
            MergeStrategy::Global => write!(f, "global"),
        }
    }
}

/// How the tolerance gate treats successive merges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceModeKind {
    /// Each merge is checked on its own
    #[default]
    PerMerge,
    /// Each merge is checked on its own and accumulated drift is bounded
    Cumulative,
}

/// Alignment engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    /// Maximum acceptable similarity regression for one merge (negative)
    pub tolerance: f32,
    /// Text inserted between merged paragraphs
    pub join_token: String,
    pub strategy: MergeStrategy,
    pub tolerance_mode: ToleranceModeKind,
    /// Bound on summed negative deltas when `tolerance_mode = "cumulative"`
    pub cumulative_budget: f32,
    pub max_merges: Option<usize>,
    /// Wall-clock budget for one article
    pub timeout_ms: Option<u64>,
    /// Prepend an empty paragraph to A on the odd-count/B-longer pattern
    pub insert_missing_title: bool,
    /// Blank out paragraphs that are only dashes or a lone dot (section
    /// separators excepted). Lossy, so off by default.
    pub clear_decorations: bool,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            join_token: " ".to_string(),
            strategy: MergeStrategy::Greedy,
            tolerance_mode: ToleranceModeKind::PerMerge,
            cumulative_budget: -0.05,
            max_merges: None,
            timeout_ms: None,
            insert_missing_title: true,
            clear_decorations: false,
        }
    }
}

/// Batch workflow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Articles aligned concurrently
    pub concurrency: usize,
    /// Persist degraded alignments (padded pairs) instead of dropping them
    pub accept_degraded: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            accept_degraded: true,
        }
    }
}

/// Record persistence backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "sqlite" | "db" => Ok(OutputFormat::Sqlite),
            other => Err(Error::Config(format!(
                "Unknown output format '{}' (expected 'csv' or 'sqlite')",
                other
            ))),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Output file; a timestamped file under `output/` (CSV) or
    /// `databases/aligned.db` (SQLite) when unset
    pub path: Option<PathBuf>,
    /// Column label for sequence A
    pub label_a: String,
    /// Column label for sequence B
    pub label_b: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            path: None,
            label_a: "English".to_string(),
            label_b: "Khmer".to_string(),
        }
    }
}

/// HTTP service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_concurrent_alignments: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5790,
            max_concurrent_alignments: 4,
        }
    }
}

impl TomlConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be at least 1".to_string()));
        }
        if self.embedding.requests_per_second == 0 {
            return Err(Error::Config(
                "embedding.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == Some(0) {
            return Err(Error::Config("embedding.dimensions must be positive".to_string()));
        }
        if self.batch.concurrency == 0 {
            return Err(Error::Config("batch.concurrency must be at least 1".to_string()));
        }
        if self.server.max_concurrent_alignments == 0 {
            return Err(Error::Config(
                "server.max_concurrent_alignments must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve which config file to read, if any
///
/// An explicit path (CLI or environment) is returned even when it does not
/// exist so the caller can report it. Default locations are only returned
/// when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System config (Linux)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/bitext").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bitext").join(CONFIG_FILE_NAME))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Resolve and load configuration, falling back to compiled defaults
///
/// A missing explicitly-requested file is an error; finding no file at the
/// default locations is not.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok((config, Some(path)))
        }
        None => {
            warn!("No config file found, using compiled defaults");
            Ok((TomlConfig::default(), None))
        }
    }
}

/// Write configuration as TOML, replacing the target atomically
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}
