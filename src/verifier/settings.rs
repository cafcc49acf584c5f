//! Checker configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Options passed to the external model checker
///
/// The algorithm options are opaque to this crate and forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    /// Abstract domain
    pub domain: String,
    /// Edge encoding
    pub encoding: String,
    /// Initial precision
    pub init_prec: String,
    /// Precision granularity
    pub prec_granularity: String,
    /// Predicate splitting
    pub pred_split: String,
    /// Refinement strategy
    pub refinement: String,
    /// Search strategy
    pub search: String,
    /// Maximal enumeration count
    pub max_enum: String,

    /// Timeout in seconds; 0 means unbounded
    pub timeout_secs: u64,
    /// Checker jar or executable
    pub tool_path: PathBuf,
    /// Program that runs `tool_path`, looked up on `PATH` (e.g. `java`)
    pub launcher: Option<String>,
    /// Directory of native libraries the checker loads
    pub library_path: Option<PathBuf>,
    /// Environment variable receiving `library_path`
    pub library_path_env: String,
    /// Checker log level
    pub log_level: String,

    /// Log the raw counterexample text
    pub print_raw_cex: bool,
    /// Keep the written model file after the run
    pub keep_model: bool,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            domain: "PRED_CART".to_string(),
            encoding: "LBE".to_string(),
            init_prec: "EMPTY".to_string(),
            prec_granularity: "GLOBAL".to_string(),
            pred_split: "WHOLE".to_string(),
            refinement: "BW_BIN_ITP".to_string(),
            search: "ERR".to_string(),
            max_enum: "0".to_string(),
            timeout_secs: 0,
            tool_path: PathBuf::from("theta/theta-cfa-cli.jar"),
            launcher: Some("java".to_string()),
            library_path: Some(PathBuf::from("theta/lib")),
            library_path_env: "LD_LIBRARY_PATH".to_string(),
            log_level: "RESULT".to_string(),
            print_raw_cex: false,
            keep_model: false,
        }
    }
}

impl VerifierSettings {
    /// Load settings from a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Timeout as a duration; `None` when unbounded
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Checker arguments following the tool path
    pub fn tool_args(&self, model: &str) -> Vec<String> {
        let mut args = vec!["--model".to_string(), model.to_string()];
        let options = [
            ("--domain", &self.domain),
            ("--encoding", &self.encoding),
            ("--initprec", &self.init_prec),
            ("--precgranularity", &self.prec_granularity),
            ("--predsplit", &self.pred_split),
            ("--refinement", &self.refinement),
            ("--search", &self.search),
            ("--maxenum", &self.max_enum),
        ];
        for (flag, value) in options {
            args.push(flag.to_string());
            args.push(value.clone());
        }
        args.push("--cex".to_string());
        args.push("--loglevel".to_string());
        args.push(self.log_level.clone());
        args
    }
}
