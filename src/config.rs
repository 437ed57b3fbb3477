//! Pipeline configuration
//!
//! Every tunable constant of the generation pipeline lives in [`SampleConfig`],
//! which can be loaded from YAML. Logging is configured separately through
//! [`LogConfig`] and installed once by the binary.

use crate::producer::RepConfig;
use crate::store::StoreBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::Level;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fixed-point iteration settings for document scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergeConfig {
    pub init: f64,
    pub maxsteps: usize,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self { init: crate::util::CONVERGE_INIT, maxsteps: crate::util::CONVERGE_MAXSTEPS }
    }
}

/// Tag-cluster overlap settings for relation arcs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// An intersection counts as big when `overlap_factor * |x| > |cluster|`
    pub overlap_factor: usize,
    /// Number of leading cluster tags taken as its representatives
    pub representatives: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { overlap_factor: 3, representatives: 3 }
    }
}

/// Community ensemble settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Lower bound of the power-law fit over producer sizes
    pub xmin: usize,
    /// Label propagation runs aggregated into the initial labelling
    pub label_propagation_runs: usize,
    /// Random walk length for walktrap
    pub walktrap_steps: usize,
    /// Include the edge-betweenness dendrogram; slow on large graphs
    pub edge_betweenness: bool,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self { xmin: 6, label_propagation_runs: 4, walktrap_steps: 4, edge_betweenness: true }
    }
}

/// Routing table arc weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtableConfig {
    pub self_weight: f64,
    pub member_weight: f64,
}

impl Default for PtableConfig {
    fn default() -> Self {
        Self { self_weight: 1.0, member_weight: 0.5 }
    }
}

/// How per-target closeness values combine into one score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosenessAggregate {
    Max,
    Sum,
    #[default]
    Mean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub rep_doc: RepConfig,
    pub rep_tag: RepConfig,
    /// Representative tags of tgraphs; coverage is off by default
    pub rep_tgraph_tag: RepConfig,
    pub converge: ConvergeConfig,
    pub cluster: ClusterConfig,
    pub community: CommunityConfig,
    pub ptable: PtableConfig,
    pub closeness: ClosenessAggregate,
    /// Seed for every random choice in the pipeline
    pub seed: u64,
    /// Progress lines logged per producer stage
    pub progress_steps: usize,
    /// Progress lines logged per relation stage
    pub relation_progress_steps: usize,
    /// LRU cache entries in front of the producer stores, 0 to disable
    pub cache_size: usize,
    /// Backend for stores that do not exist yet
    pub store_backend: StoreBackend,
    /// Worker threads for parallel statistics, 0 for one per core
    pub threads: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            rep_doc: RepConfig::docs(),
            rep_tag: RepConfig::tags(),
            rep_tgraph_tag: RepConfig { cover: 0, ..RepConfig::tags() },
            converge: ConvergeConfig::default(),
            cluster: ClusterConfig::default(),
            community: CommunityConfig::default(),
            ptable: PtableConfig::default(),
            closeness: ClosenessAggregate::default(),
            seed: 0,
            progress_steps: 0x100,
            relation_progress_steps: 0x10000,
            cache_size: 0,
            store_backend: StoreBackend::RocksDb,
            threads: 0,
        }
    }
}

impl SampleConfig {
    /// Load from a YAML file; absent fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SampleConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, rep) in [("rep_doc", &self.rep_doc), ("rep_tag", &self.rep_tag), ("rep_tgraph_tag", &self.rep_tgraph_tag)] {
            if !(0.0..=1.0).contains(&rep.prop) {
                return Err(ConfigError::Invalid(format!("{}.prop must be within [0, 1], got {}", name, rep.prop)));
            }
        }
        if !(0.0..=1.0).contains(&self.converge.init) {
            return Err(ConfigError::Invalid(format!("converge.init must be within [0, 1], got {}", self.converge.init)));
        }
        if self.community.xmin == 0 {
            return Err(ConfigError::Invalid("community.xmin must be positive".to_string()));
        }
        Ok(())
    }
}

/// Logging configuration, passed explicitly to [`init_logging`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LogConfig {
    /// Level from a `-v` count: 0 warn, 1 info, 2 debug, more trace
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self { level }
    }
}

/// Install the global fmt subscriber; later calls are no-ops
pub fn init_logging(config: &LogConfig) {
    let _ = tracing_subscriber::fmt().with_max_level(config.level).with_target(false).try_init();
}
