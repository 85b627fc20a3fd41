pub mod demo;
pub mod model;
pub mod stages;

pub use refmat::*;

use std::path::PathBuf;

/// Settings of the `genomic` binary, read from `config/settings.toml` and `GENOMIC__*` variables.
#[derive(Debug, Deserialize, Clone)]
pub struct GenomicConfig {
    pub store: StoreSettings,
    #[serde(default)]
    pub materialize: MaterializeSettings,
    #[serde(default)]
    pub seed_demo_graph: bool,
    #[serde(default)]
    pub populate_orthologues: bool,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}
