#![allow(dead_code)]
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct OrchestratorConfig {
    pub cycle_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct OsintConfig {
    pub search_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ReconConfig {
    pub nmap_path: Option<String>,
    pub nmap_args: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub orchestrator: Option<OrchestratorConfig>,
    pub store: Option<StoreConfig>,
    pub osint: Option<OsintConfig>,
    pub recon: Option<ReconConfig>,
}

pub fn load_config(path: Option<&Path>) -> Option<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new("cortex.yaml");
            if p.exists() { p.to_path_buf() } else { return None; }
        }
    };
    let s = fs::read_to_string(path).ok()?;
    serde_yaml::from_str(&s).ok()
}
