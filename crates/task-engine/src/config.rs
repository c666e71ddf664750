//! Engine configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (e.g. `ENGINE_LLM_MODEL`)
//! 2. Values from a TOML file passed to [`EngineConfig::load`]
//! 3. Built-in defaults
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes:
//!
//! ```toml
//! [llm]
//! model = "gpt-4o-mini"
//!
//! [multi_agent]
//! review_rejection_severity = 3
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use task_coordination::{ParserLimits, MAX_REVIEW_SEVERITY};
use thiserror::Error;

const DEFAULT_LLM_BASE_URL: &str = "http://localhost:8000/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_TOKENS: u32 = 4_096;
const DEFAULT_TEMPERATURE: f32 = 0.2;

const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 30;

const DEFAULT_ITERATIVE_MAX_ITERATIONS: u32 = 3;
const DEFAULT_ITERATIVE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MULTI_AGENT_TIMEOUT_SECS: u64 = 180;
const DEFAULT_REVIEW_REJECTION_SEVERITY: u8 = 4;
const DEFAULT_MAX_PARALLEL_CODERS: usize = 4;

pub const ENV_LLM_BASE_URL: &str = "ENGINE_LLM_BASE_URL";
pub const ENV_LLM_API_KEY: &str = "ENGINE_LLM_API_KEY";
pub const ENV_LLM_MODEL: &str = "ENGINE_LLM_MODEL";
pub const ENV_CLASSIFIER_URL: &str = "ENGINE_CLASSIFIER_URL";
pub const ENV_CLASSIFIER_TIMEOUT_MS: &str = "ENGINE_CLASSIFIER_TIMEOUT_MS";
pub const ENV_REVIEW_REJECTION_SEVERITY: &str = "ENGINE_REVIEW_REJECTION_SEVERITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Sections ─────────────────────────────────────────────────────────────────

/// OpenAI-compatible code-generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Sent as a bearer token when non-empty.
    pub api_key: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// USD per 1k prompt tokens.
    pub prompt_price_per_1k: f64,
    /// USD per 1k completion tokens.
    pub completion_price_per_1k: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_LLM_MODEL.to_string(),
            request_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            prompt_price_per_1k: 0.00015,
            completion_price_per_1k: 0.0006,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Remote task classifier. Without a `base_url` only the heuristic is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    /// Consecutive failures before the classifier is skipped.
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_CLASSIFIER_TIMEOUT_MS,
            failure_threshold: DEFAULT_BREAKER_THRESHOLD,
            cooldown_secs: DEFAULT_BREAKER_COOLDOWN_SECS,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleShotConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SingleShotConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeConfig {
    pub max_iterations: u32,
    /// Wall-clock budget for the whole run.
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for IterativeConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_ITERATIVE_MAX_ITERATIONS,
            timeout_secs: DEFAULT_ITERATIVE_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl IterativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiAgentConfig {
    /// Wall-clock budget for the whole pipeline.
    pub timeout_secs: u64,
    /// Rejected reviews at or above this severity fail the run.
    pub review_rejection_severity: u8,
    /// Concurrent coder calls during the parallel phase.
    pub max_parallel_coders: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for MultiAgentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_MULTI_AGENT_TIMEOUT_SECS,
            review_rejection_severity: DEFAULT_REVIEW_REJECTION_SEVERITY,
            max_parallel_coders: DEFAULT_MAX_PARALLEL_CODERS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl MultiAgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub match_timeout_ms: u64,
    pub max_input_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        let limits = ParserLimits::default();
        Self {
            match_timeout_ms: limits.match_timeout.as_millis() as u64,
            max_input_bytes: limits.max_input_bytes,
        }
    }
}

impl ParserConfig {
    pub fn limits(&self) -> ParserLimits {
        ParserLimits {
            match_timeout: Duration::from_millis(self.match_timeout_ms),
            max_input_bytes: self.max_input_bytes,
        }
    }
}

// ── Top level ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub llm: LlmConfig,
    pub classifier: ClassifierConfig,
    pub single_shot: SingleShotConfig,
    pub iterative: IterativeConfig,
    pub multi_agent: MultiAgentConfig,
    pub parser: ParserConfig,
}

impl EngineConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Read a TOML file, then apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// Unparseable numeric overrides are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_LLM_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(key) = lookup(ENV_LLM_API_KEY) {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup(ENV_LLM_MODEL) {
            self.llm.model = model;
        }
        if let Some(url) = lookup(ENV_CLASSIFIER_URL) {
            self.classifier.base_url = (!url.trim().is_empty()).then_some(url);
        }
        if let Some(raw) = lookup(ENV_CLASSIFIER_TIMEOUT_MS) {
            match raw.parse() {
                Ok(ms) => self.classifier.timeout_ms = ms,
                Err(_) => {
                    tracing::warn!(var = ENV_CLASSIFIER_TIMEOUT_MS, value = %raw, "ignoring override")
                }
            }
        }
        if let Some(raw) = lookup(ENV_REVIEW_REJECTION_SEVERITY) {
            match raw.parse() {
                Ok(severity) => self.multi_agent.review_rejection_severity = severity,
                Err(_) => {
                    tracing::warn!(var = ENV_REVIEW_REJECTION_SEVERITY, value = %raw, "ignoring override")
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.llm.base_url.trim().is_empty() {
            return invalid("llm.base_url must not be empty".to_string());
        }
        if self.llm.model.trim().is_empty() {
            return invalid("llm.model must not be empty".to_string());
        }
        if self.llm.prompt_price_per_1k < 0.0 || self.llm.completion_price_per_1k < 0.0 {
            return invalid("llm prices must be >= 0".to_string());
        }
        if self.classifier.timeout_ms == 0 {
            return invalid("classifier.timeout_ms must be > 0".to_string());
        }
        if self.iterative.max_iterations == 0 {
            return invalid("iterative.max_iterations must be > 0".to_string());
        }
        if self.iterative.timeout_secs == 0 || self.multi_agent.timeout_secs == 0 {
            return invalid("strategy timeouts must be > 0".to_string());
        }
        if self.multi_agent.review_rejection_severity > MAX_REVIEW_SEVERITY {
            return invalid(format!(
                "multi_agent.review_rejection_severity must be <= {MAX_REVIEW_SEVERITY}, got {}",
                self.multi_agent.review_rejection_severity
            ));
        }
        if self.multi_agent.max_parallel_coders == 0 {
            return invalid("multi_agent.max_parallel_coders must be > 0".to_string());
        }
        for (name, temperature) in [
            ("single_shot", self.single_shot.temperature),
            ("iterative", self.iterative.temperature),
            ("multi_agent", self.multi_agent.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return invalid(format!(
                    "{name}.temperature must be in [0, 2], got {temperature}"
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = EngineConfig::default();
        cfg.validate().expect("default config should be valid");
        assert_eq!(cfg.iterative.max_iterations, 3);
        assert_eq!(cfg.iterative.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.multi_agent.timeout(), Duration::from_secs(180));
        assert_eq!(cfg.multi_agent.review_rejection_severity, 4);
        assert_eq!(cfg.classifier.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = EngineConfig::from_toml(
            r#"
            [multi_agent]
            review_rejection_severity = 3

            [classifier]
            base_url = "http://classifier:8000"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.multi_agent.review_rejection_severity, 3);
        assert_eq!(cfg.multi_agent.max_parallel_coders, 4);
        assert_eq!(cfg.classifier.base_url.as_deref(), Some("http://classifier:8000"));
        assert_eq!(cfg.llm.model, DEFAULT_LLM_MODEL);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut cfg = EngineConfig::from_toml("[llm]\nmodel = \"from-file\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_LLM_MODEL, "from-env"),
            (ENV_CLASSIFIER_TIMEOUT_MS, "750"),
            (ENV_REVIEW_REJECTION_SEVERITY, "not-a-number"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.llm.model, "from-env");
        assert_eq!(cfg.classifier.timeout_ms, 750);
        assert_eq!(cfg.multi_agent.review_rejection_severity, 4);
    }

    #[test]
    fn blank_classifier_url_disables_remote() {
        let mut cfg = EngineConfig::default();
        cfg.classifier.base_url = Some("http://old".into());
        cfg.apply_overrides(|key| (key == ENV_CLASSIFIER_URL).then(|| "  ".to_string()));
        assert!(cfg.classifier.base_url.is_none());
    }

    #[test]
    fn severity_above_max_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.multi_agent.review_rejection_severity = 6;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.iterative.max_iterations = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[iterative]\nmax_iterations = 5").unwrap();
        let cfg = EngineConfig::load(file.path()).unwrap();
        assert_eq!(cfg.iterative.max_iterations, 5);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/engine.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
