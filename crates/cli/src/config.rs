use anyhow::Result;
use clap::Args;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Utility function to expand $HOME in a PathBuf
pub fn expand_home_in_path(path: &Path) -> Result<PathBuf> {
    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in path"))?;

    if path_str.contains("$HOME") {
        let expanded = path_str.replace("$HOME", home_dir.to_str().unwrap_or("."));
        Ok(PathBuf::from(expanded))
    } else {
        Ok(path.to_path_buf())
    }
}

#[derive(Config, Clone, Serialize, Deserialize)]
#[config(layer_attr(derive(Args, Serialize, Clone)))]
pub struct AppConfig {
    #[config(nested, layer_attr(command(flatten)))]
    pub store: StoreConfig,

    #[config(nested, layer_attr(command(flatten)))]
    pub log: LogConfig,
}

#[derive(Clone, Config, Deserialize, Serialize)]
#[config(layer_attr(derive(Args, Clone, Serialize)))]
pub struct StoreConfig {
    /// The ballot snapshot file
    #[config(
        env = "BALLOT_STORE",
        default = "$HOME/.ballot/ballot.cbor",
        layer_attr(arg(long = "store"))
    )]
    pub path: PathBuf,
}

#[derive(Clone, Config, Deserialize, Serialize)]
#[config(layer_attr(derive(Args, Clone, Serialize)))]
pub struct LogConfig {
    /// Log level used when --verbose is not given
    #[config(env = "BALLOT_LOG", default = "info", layer_attr(arg(long = "log-level")))]
    pub level: String,
}

impl AppConfig {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve $HOME placeholders in configured paths
    pub fn with_resolved_paths(mut self) -> Result<Self> {
        self.store.path = expand_home_in_path(&self.store.path)?;
        Ok(self)
    }
}
