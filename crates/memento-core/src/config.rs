//! Engine configuration: defaults, TOML file, and `MEMENTO_*` env overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which embedding provider is selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderChoice {
    HostedPrimary,
    HostedSecondary,
    Local,
}

impl Default for ProviderChoice {
    fn default() -> Self {
        ProviderChoice::Local
    }
}

/// `ranking_weights.*` — defaults match spec §4.6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankingWeights {
    pub relevance: f64,
    pub recency: f64,
    pub importance: f64,
    pub usage: f64,
    pub duplication: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        RankingWeights {
            relevance: 0.50,
            recency: 0.20,
            importance: 0.20,
            usage: 0.10,
            duplication: 0.15,
        }
    }
}

/// `forget.thresholds.*` — defaults match spec §4.8.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ForgetThresholds {
    pub soft: f64,
    pub hard: f64,
    pub review: f64,
}

impl Default for ForgetThresholds {
    fn default() -> Self {
        ForgetThresholds {
            soft: 0.60,
            hard: 0.80,
            review: 0.70,
        }
    }
}

/// `forget.weights.*` — weights for the forget-score formula (spec §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ForgetWeights {
    pub recency: f64,
    pub disuse: f64,
    pub duplication: f64,
    pub importance: f64,
}

impl Default for ForgetWeights {
    fn default() -> Self {
        ForgetWeights {
            recency: 0.35,
            disuse: 0.25,
            duplication: 0.20,
            importance: 0.20,
        }
    }
}

/// Per-type TTLs (days) for the soft/hard delete gates (spec §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TypeTtls {
    pub working: i64,
    pub episodic: i64,
    pub semantic: i64,
    pub procedural: i64,
}

/// `forget.review.*` — the spaced-review multiplier constants (Open Question #3
/// in SPEC_FULL.md §9 — MUST be configurable per spec §9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReviewConfig {
    pub helpful_bonus: f64,
    pub unhelpful_penalty: f64,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            helpful_bonus: 0.2,
            unhelpful_penalty: 0.3,
            min_interval_days: 1.0,
            max_interval_days: 365.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerIntervals {
    pub forget_secs: u64,
    pub metrics_secs: u64,
    pub cache_secs: u64,
}

impl Default for SchedulerIntervals {
    fn default() -> Self {
        SchedulerIntervals {
            forget_secs: 3600,
            metrics_secs: 30,
            cache_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ForgetConfig {
    pub thresholds: ForgetThresholds,
    pub weights: ForgetWeights,
    pub ttl_soft: TypeTtls,
    pub ttl_hard: TypeTtls,
    pub review: ReviewConfig,
}

impl Default for ForgetConfig {
    fn default() -> Self {
        ForgetConfig {
            thresholds: ForgetThresholds::default(),
            weights: ForgetWeights::default(),
            ttl_soft: TypeTtls {
                working: 2,
                episodic: 30,
                semantic: 180,
                procedural: 90,
            },
            ttl_hard: TypeTtls {
                working: 7,
                episodic: 180,
                semantic: 365,
                procedural: 180,
            },
            review: ReviewConfig::default(),
        }
    }
}

/// Top-level engine configuration. Loaded from an optional TOML file and
/// overridden by `MEMENTO_*` environment variables (see [`Config::load`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
#[non_exhaustive]
pub struct Config {
    pub embedding_provider: ProviderChoice,
    pub embedding_dimensions: usize,
    pub ranking_weights: RankingWeights,
    pub forget: ForgetConfig,
    pub scheduler: SchedulerIntervals,
    pub search_timeout_ms: u64,
    pub embedding_timeout_ms: u64,
    pub cache_max_size: usize,
    pub cache_ttl_ms: u64,
    pub hosted_primary_endpoint: Option<String>,
    pub hosted_secondary_endpoint: Option<String>,
    pub hosted_primary_api_key: Option<String>,
    pub hosted_secondary_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            embedding_provider: ProviderChoice::default(),
            embedding_dimensions: 512,
            ranking_weights: RankingWeights::default(),
            forget: ForgetConfig::default(),
            scheduler: SchedulerIntervals::default(),
            search_timeout_ms: 5_000,
            embedding_timeout_ms: 10_000,
            cache_max_size: 10_000,
            cache_ttl_ms: 24 * 3_600_000,
            hosted_primary_endpoint: None,
            hosted_secondary_endpoint: None,
            hosted_primary_api_key: None,
            hosted_secondary_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply any
    /// `MEMENTO_*` environment overrides on top.
    pub fn load(path: Option<&Path>) -> crate::error::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml_from_str(&text)?
            }
            _ => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MEMENTO_EMBEDDING_PROVIDER") {
            self.embedding_provider = match v.as_str() {
                "hosted_primary" => ProviderChoice::HostedPrimary,
                "hosted_secondary" => ProviderChoice::HostedSecondary,
                _ => ProviderChoice::Local,
            };
        }
        if let Ok(v) = std::env::var("MEMENTO_SEARCH_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.search_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("MEMENTO_EMBEDDING_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.embedding_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("MEMENTO_HOSTED_PRIMARY_ENDPOINT") {
            self.hosted_primary_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("MEMENTO_HOSTED_SECONDARY_ENDPOINT") {
            self.hosted_secondary_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("MEMENTO_HOSTED_PRIMARY_API_KEY") {
            self.hosted_primary_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("MEMENTO_HOSTED_SECONDARY_API_KEY") {
            self.hosted_secondary_api_key = Some(v);
        }
    }
}

fn toml_from_str(text: &str) -> crate::error::Result<Config> {
    toml::from_str(text).map_err(|e| crate::error::Error::internal(e.to_string()))
}
