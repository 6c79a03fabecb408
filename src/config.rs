//! Loading [`ExpectimaxConfig`] from JSON.
//!
//! Every field is optional in the file; missing ones keep their defaults.
//!
//! ```
//! use threes_ai::config;
//! let cfg = config::from_json(r#"{ "prob_cutoff": 0.001, "weights": { "empty_weight": 300.0 } }"#).unwrap();
//! assert_eq!(cfg.prob_cutoff, 0.001);
//! assert_eq!(cfg.weights.empty_weight, 300.0);
//! assert_eq!(cfg.cache_depth_limit, 6);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::expectimax::ExpectimaxConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected 6 heuristic weights, got {0}")]
    WeightCount(usize),
}

pub fn from_json(text: &str) -> Result<ExpectimaxConfig, ConfigError> {
    Ok(serde_json::from_str(text)?)
}

pub fn load(path: &Path) -> Result<ExpectimaxConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    from_json(&text)
}

pub fn to_json(cfg: &ExpectimaxConfig) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(cfg)?)
}
