use crate::{info, AppError};
use config::{Config, Environment, File};
use dotenv::dotenv;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Once;

static DOTENV_ONCE: Once = Once::new();

fn ensure_dotenv_loaded() {
    DOTENV_ONCE.call_once(|| match dotenv() {
        Ok(_) => info!("Config loaded including .env file."),
        Err(_) => info!("Config loaded without .env file."),
    });
}

/// Reads `path` (any format the config crate knows) overlaid with `PREFIX__SECTION__KEY`
/// environment variables.
pub fn load_config<T>(path: &str, prefix: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Debug,
{
    ensure_dotenv_loaded();

    let builder = Config::builder()
        .add_source(File::with_name(path).required(true))
        .add_source(Environment::with_prefix(prefix).try_parsing(true).separator("__"));

    let cfg = builder.build()?.try_deserialize::<T>()?;
    info!("{:#?}", cfg);
    Ok(cfg)
}

fn default_fetch_batch_size() -> usize {
    500
}

fn default_object_cache_size() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MaterializeSettings {
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,
    #[serde(default = "default_object_cache_size")]
    pub object_cache_size: usize,
    /// Refresh statistics of the written class after every committed pass.
    #[serde(default = "default_true")]
    pub refresh_statistics: bool,
}

impl Default for MaterializeSettings {
    fn default() -> Self {
        MaterializeSettings {
            fetch_batch_size: default_fetch_batch_size(),
            object_cache_size: default_object_cache_size(),
            refresh_statistics: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub db_path: PathBuf,
    #[serde(default = "default_db_cache_size_mb")]
    pub db_cache_size_mb: usize,
}

fn default_db_cache_size_mb() -> usize {
    256
}
