use std::path::Path;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;
use crate::rendering::links::Permalinks;
use crate::scan::markers::Marker;
use crate::scan::scanner::ScanStrategy;

/// Prefix of environment overrides, e.g. `POSTFINDER__STORE__MONGODB_URI`.
pub const ENV_PREFIX: &str = "POSTFINDER";
const ENV_SEPARATOR: &str = "__";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "postfinder";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub site: SiteSettings,
    pub store: StoreSettings,
    pub search: SearchSettings,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSettings {
    /// Base of every permalink.
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub mongodb_uri: String,
    pub database: String,
    pub collection: String,
    /// Load the demo documents into the memory backend at startup.
    pub seed_demo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub default_per_page: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    pub strategy: ScanStrategy,
    pub batch_size: u64,
    pub marker: String,
    pub default_window_days: u64,
}

impl Settings {
    /// Defaults, then the config file, then `POSTFINDER__*` environment variables.
    ///
    /// An explicit `path` must exist; the default `postfinder.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(path, Self::environment())
    }

    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    pub fn load_with_env(path: Option<&Path>, environment: Environment) -> Result<Self, AppError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .set_default("server.bind_addr", "127.0.0.1:3000")?
            .set_default("site.base_url", "http://localhost:3000/")?
            .set_default("store.backend", "mongo")?
            .set_default("store.mongodb_uri", "mongodb://localhost:27017")?
            .set_default("store.database", "postfinder")?
            .set_default("store.collection", "documents")?
            .set_default("store.seed_demo", false)?
            .set_default("search.default_per_page", 10)?
            .set_default("scan.strategy", ScanStrategy::default().as_str())?
            .set_default("scan.batch_size", 100)?
            .set_default("scan.marker", "postfinder/reference")?
            .set_default("scan.default_window_days", 30)?
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.search.default_per_page == 0 {
            return Err(AppError::Config("search.default_per_page must be at least 1".into()));
        }
        if self.scan.batch_size == 0 {
            return Err(AppError::Config("scan.batch_size must be at least 1".into()));
        }
        self.permalinks()?;
        self.marker()?;
        Ok(())
    }

    pub fn permalinks(&self) -> Result<Permalinks, AppError> {
        Permalinks::parse(&self.site.base_url)
    }

    pub fn marker(&self) -> Result<Marker, AppError> {
        Marker::new(&self.scan.marker)
            .map_err(|e| AppError::Config(format!("scan.marker: {e}")))
    }
}
