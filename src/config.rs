use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

pub const DEFAULT_LIMIT: u32 = 20;

/// Compiler settings, usually loaded alongside the rest of the service
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Row limit applied to plural selections that set none.
    pub default_limit: u32,
    /// Values substituted into filters at compile time, keyed by variable
    /// name. These win over request variables.
    pub vars: HashMap<String, String>,
    /// Extra names a table can be queried by, keyed by table name.
    pub aliases: HashMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_limit: DEFAULT_LIMIT,
            vars: HashMap::new(),
            aliases: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_json(source: &str) -> Result<Config> {
        Ok(serde_json::from_str(source)?)
    }
}
