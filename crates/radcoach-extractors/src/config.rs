//! Configuration loading and plug-in factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use radcoach_core::engine::{AnalysisEngine, AnalysisEngineConfig};
use radcoach_core::reconcile::{Reconciler, ScoreWeights};
use radcoach_core::style::{StyleCritic, StyleRules};
use radcoach_core::traits::{FindingDetector, FindingExtractor};

use crate::detector::CaseLabelDetector;
use crate::keyword::{KeywordConfig, KeywordExtractor};
use crate::remote::{RemoteDetector, RemoteExtractor};

/// Environment variable that adds a remote extractor named `remote`.
pub const EXTRACTOR_URL_ENV: &str = "RADCOACH_EXTRACTOR_URL";

/// Configuration for a single text extractor.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractorConfig {
    Keyword(KeywordConfig),
    Remote {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

/// Configuration for the auxiliary image detector.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Replay `auxiliary_findings` from the case file.
    #[default]
    CaseLabels,
    Remote {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    None,
}

fn masked(key: &Option<String>) -> Option<&'static str> {
    key.as_ref().map(|_| "***")
}

impl std::fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractorConfig::Keyword(config) => f.debug_tuple("Keyword").field(config).finish(),
            ExtractorConfig::Remote { base_url, api_key } => f
                .debug_struct("Remote")
                .field("base_url", base_url)
                .field("api_key", &masked(api_key))
                .finish(),
        }
    }
}

impl std::fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorConfig::CaseLabels => f.write_str("CaseLabels"),
            DetectorConfig::Remote { base_url, api_key } => f
                .debug_struct("Remote")
                .field("base_url", base_url)
                .field("api_key", &masked(api_key))
                .finish(),
            DetectorConfig::None => f.write_str("None"),
        }
    }
}

/// Top-level radcoach configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadcoachConfig {
    /// Max concurrent analyses in a batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Retries on transient extractor errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Limit for one extractor or detector call.
    #[serde(default = "default_timeout")]
    pub extractor_timeout_secs: u64,
    /// Extractor configurations keyed by name. Empty means the default
    /// keyword extractor.
    #[serde(default)]
    pub extractors: BTreeMap<String, ExtractorConfig>,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub style: StyleRules,
    #[serde(default)]
    pub scoring: ScoreWeights,
    /// Replaces the built-in tips when set.
    #[serde(default)]
    pub tips: Option<Vec<String>>,
}

fn default_parallelism() -> usize {
    4
}
fn default_retries() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    500
}
fn default_timeout() -> u64 {
    30
}

impl Default for RadcoachConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            extractor_timeout_secs: default_timeout(),
            extractors: BTreeMap::new(),
            detector: DetectorConfig::default(),
            style: StyleRules::default(),
            scoring: ScoreWeights::default(),
            tips: None,
        }
    }
}

impl RadcoachConfig {
    pub fn engine_config(&self) -> AnalysisEngineConfig {
        AnalysisEngineConfig {
            parallelism: self.parallelism.max(1),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            extractor_timeout: Duration::from_secs(self.extractor_timeout_secs.max(1)),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        let reconciler = Reconciler::new(StyleCritic::new(self.style.clone()), self.scoring.clone());
        match &self.tips {
            Some(tips) => reconciler.with_tips(tips.clone()),
            None => reconciler,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_remote(base_url: &mut String, api_key: &mut Option<String>) {
    *base_url = resolve_env_vars(base_url);
    if let Some(key) = api_key.as_mut() {
        *key = resolve_env_vars(key);
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `radcoach.toml` in the current directory
/// 2. `~/.config/radcoach/config.toml`
///
/// Environment variable override: `RADCOACH_EXTRACTOR_URL`.
pub fn load_config() -> Result<RadcoachConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<RadcoachConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("radcoach.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => RadcoachConfig::default(),
    };

    if let Ok(url) = std::env::var(EXTRACTOR_URL_ENV) {
        if !url.trim().is_empty() {
            if config.extractors.is_empty() {
                config.extractors.insert(
                    "keyword".into(),
                    ExtractorConfig::Keyword(KeywordConfig::default()),
                );
            }
            config.extractors.insert(
                "remote".into(),
                ExtractorConfig::Remote {
                    base_url: url,
                    api_key: None,
                },
            );
        }
    }

    resolve_config(&mut config);
    Ok(config)
}

/// Parse a config file's contents.
pub fn parse_config(content: &str) -> Result<RadcoachConfig> {
    Ok(toml::from_str::<RadcoachConfig>(content)?)
}

fn resolve_config(config: &mut RadcoachConfig) {
    for extractor in config.extractors.values_mut() {
        if let ExtractorConfig::Remote { base_url, api_key } = extractor {
            resolve_remote(base_url, api_key);
        }
    }
    if let DetectorConfig::Remote { base_url, api_key } = &mut config.detector {
        resolve_remote(base_url, api_key);
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("radcoach"))
}

/// Create an extractor instance from its configuration.
pub fn create_extractor(
    name: &str,
    config: &ExtractorConfig,
    timeout: Duration,
) -> Result<Arc<dyn FindingExtractor>> {
    match config {
        ExtractorConfig::Keyword(keywords) => Ok(Arc::new(KeywordExtractor::new(name, keywords))),
        ExtractorConfig::Remote { base_url, api_key } => {
            let extractor = RemoteExtractor::new(name, base_url, api_key.clone(), Some(timeout))
                .with_context(|| format!("failed to create extractor '{name}'"))?;
            Ok(Arc::new(extractor))
        }
    }
}

/// Create the detector, or `None` when detection is disabled.
pub fn create_detector(
    config: &DetectorConfig,
    timeout: Duration,
) -> Result<Option<Arc<dyn FindingDetector>>> {
    match config {
        DetectorConfig::CaseLabels => Ok(Some(Arc::new(CaseLabelDetector))),
        DetectorConfig::Remote { base_url, api_key } => {
            let detector = RemoteDetector::new(base_url, api_key.clone(), Some(timeout))
                .context("failed to create remote detector")?;
            Ok(Some(Arc::new(detector)))
        }
        DetectorConfig::None => Ok(None),
    }
}

/// Build a ready-to-run engine from configuration.
pub fn build_engine(config: &RadcoachConfig) -> Result<AnalysisEngine> {
    let engine_config = config.engine_config();
    let timeout = engine_config.extractor_timeout;

    let extractors = if config.extractors.is_empty() {
        vec![Arc::new(KeywordExtractor::default()) as Arc<dyn FindingExtractor>]
    } else {
        config
            .extractors
            .iter()
            .map(|(name, c)| create_extractor(name, c, timeout))
            .collect::<Result<Vec<_>>>()?
    };
    let detector = create_detector(&config.detector, timeout)?;

    tracing::info!(
        "engine ready: extractors [{}], detector {}",
        extractors
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(", "),
        detector.as_ref().map(|d| d.name()).unwrap_or("none")
    );

    Ok(AnalysisEngine::new(
        extractors,
        detector,
        config.reconciler(),
        engine_config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_RADCOACH_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_RADCOACH_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_RADCOACH_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_RADCOACH_TEST_VAR");
    }

    #[test]
    fn resolved_values_are_not_expanded_again() {
        std::env::set_var("_RADCOACH_TEST_SELF", "${_RADCOACH_TEST_SELF}");
        std::env::set_var("_RADCOACH_TEST_OTHER", "a${b");
        assert_eq!(
            resolve_env_vars("${_RADCOACH_TEST_SELF}"),
            "${_RADCOACH_TEST_SELF}"
        );
        assert_eq!(
            resolve_env_vars("${_RADCOACH_TEST_OTHER}/${_RADCOACH_TEST_SELF}"),
            "a${b/${_RADCOACH_TEST_SELF}"
        );
        std::env::remove_var("_RADCOACH_TEST_SELF");
        std::env::remove_var("_RADCOACH_TEST_OTHER");
    }

    #[test]
    fn default_config() {
        let config = RadcoachConfig::default();
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.max_retries, 2);
        assert!(config.extractors.is_empty());
        assert!(matches!(config.detector, DetectorConfig::CaseLabels));
        assert_eq!(config.scoring, ScoreWeights::default());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
parallelism = 8
extractor_timeout_secs = 10
tips = ["Compare with prior studies."]

[extractors.rules]
type = "keyword"
negation_terms = ["no", "without"]

[extractors.chexbert]
type = "remote"
base_url = "http://localhost:8000"
api_key = "secret"

[detector]
type = "none"

[style]
min_words = 10

[scoring]
negation_error = 30
"#;
        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.extractors.len(), 2);
        assert!(matches!(
            config.extractors.get("rules"),
            Some(ExtractorConfig::Keyword(k)) if k.negation_terms.len() == 2 && k.patterns.len() == 7
        ));
        assert!(matches!(config.detector, DetectorConfig::None));
        assert_eq!(config.style.min_words, 10);
        assert_eq!(config.style.max_words, 100);
        assert_eq!(config.scoring.negation_error, 30);
        assert_eq!(config.scoring.missed_finding, 15);
        assert_eq!(config.reconciler().weights().negation_error, 30);
        assert_eq!(config.engine_config().extractor_timeout, Duration::from_secs(10));
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = ExtractorConfig::Remote {
            base_url: "http://x".into(),
            api_key: Some("super-secret".into()),
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("***"));
    }

    #[test]
    fn remote_keys_resolve_from_env() {
        std::env::set_var("_RADCOACH_TEST_KEY", "sk-123");
        let mut config = parse_config(
            r#"
[detector]
type = "remote"
base_url = "http://detector"
api_key = "${_RADCOACH_TEST_KEY}"
"#,
        )
        .unwrap();
        resolve_config(&mut config);
        match &config.detector {
            DetectorConfig::Remote { api_key, .. } => {
                assert_eq!(api_key.as_deref(), Some("sk-123"))
            }
            other => panic!("unexpected detector: {other:?}"),
        }
        std::env::remove_var("_RADCOACH_TEST_KEY");
    }

    #[test]
    fn unknown_extractor_type_is_rejected() {
        let err = parse_config("[extractors.x]\ntype = \"magic\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("magic"));
    }

    #[test]
    fn explicit_missing_path_fails() {
        let err = load_config_from(Some(Path::new("/nonexistent/radcoach.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radcoach.toml");
        std::fs::write(&path, "max_retries = 0\n[detector]\ntype = \"case_labels\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn build_default_engine() {
        let engine = build_engine(&RadcoachConfig::default()).unwrap();
        assert_eq!(engine.extractor_names(), vec!["keyword"]);
    }

    #[test]
    fn build_engine_rejects_empty_remote_url() {
        let mut config = RadcoachConfig::default();
        config.extractors.insert(
            "broken".into(),
            ExtractorConfig::Remote {
                base_url: String::new(),
                api_key: None,
            },
        );
        let err = build_engine(&config).err().map(|e| format!("{e:#}")).unwrap_or_default();
        assert!(err.contains("failed to create extractor 'broken'"));
    }
}
