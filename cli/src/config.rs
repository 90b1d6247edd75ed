//! Configuration file handling.
//!
//! Loads `.sqlcursor.json` from the current directory, or from the home
//! directory when the current directory has none. Example:
//!
//! ```json
//! {
//!   "database": { "type": "sqlite", "path": "./app.db" },
//!   "max_rows": 500
//! }
//! ```

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use db::DatabaseConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = ".sqlcursor.json";

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Database to open when `--db` and the environment say nothing
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Row cap applied to `query` when `--max-rows` is not given
    #[serde(default)]
    pub max_rows: Option<u32>,
}

impl ConfigFile {
    /// Load the first config file found, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or is not
    /// valid JSON.
    pub fn load() -> Result<Option<Self>, Box<dyn Error>> {
        for path in candidate_paths() {
            if path.exists() {
                return Self::load_from(&path).map(Some);
            }
        }
        Ok(None)
    }

    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        let config = serde_json::from_str(&content).map_err(|e| {
            format!(
                "Invalid JSON in {}: {}\n\n\
                 Expected for example:\n\
                 {{\n  \
                   \"database\": {{ \"type\": \"sqlite\", \"path\": \"./app.db\" }},\n  \
                   \"max_rows\": 500\n\
                 }}",
                path.display(),
                e
            )
        })?;

        Ok(config)
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home_dir) = home::home_dir() {
        paths.push(home_dir.join(CONFIG_FILE_NAME));
    }
    paths
}
