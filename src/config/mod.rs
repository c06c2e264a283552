use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
    #[serde(default = "default_transforms")]
    pub transforms: PathBuf,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_convert_bin")]
    pub convert_bin: String,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_cache_size() -> u64 {
    1024 * 1024 * 1024
}

fn default_transforms() -> PathBuf {
    PathBuf::from("Transforms.toml")
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("magickd/{}", env!("CARGO_PKG_VERSION"))
}

fn default_convert_bin() -> String {
    "convert".to_string()
}
