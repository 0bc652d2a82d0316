use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub profile: Option<String>,
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    /// URL the realm is served under; absolute, ending with `/`.
    pub realm_url: String,
    /// Directory holding the realm's files.
    pub realm_root: String,
    /// Other realms that may own card types this realm adopts from.
    #[serde(default)]
    pub known_realms: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Keep the published snapshot in memory only.
    #[default]
    Memory,
    /// Persist published instances to SQLite.
    Sqlite,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    #[default]
    InProcess,
    /// Run index jobs on a per-realm worker thread.
    Queue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub dispatch: DispatchMode,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { backend: Backend::default(), db_path: default_db_path(), dispatch: DispatchMode::default() }
    }
}

fn default_db_path() -> String {
    "{{realm_root}}/.cardindex/index.db".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone)]
pub struct ResolvedIndexConfig {
    pub backend: Backend,
    pub db_path: PathBuf,
    pub dispatch: DispatchMode,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub active_profile: String,
    pub realm_url: Url,
    pub realm_root: PathBuf,
    pub known_realms: Vec<Url>,
    pub index: ResolvedIndexConfig,
    pub logging: LoggingConfig,
}
