use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const ENV_API_URL: &str = "COBRANCA_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub search_debounce_ms: u64,
    pub cliente_limit: u32,
    pub atividades_limit: u32,
    pub status_duration_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            search_debounce_ms: 400,
            cliente_limit: 200,
            atividades_limit: 10,
            status_duration_ms: 5000,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Loads the config file if present and applies the environment
    /// override. A broken file falls back to defaults instead of blocking
    /// the app from starting.
    pub fn load() -> Self {
        let mut config = match try_load() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(err) => {
                eprintln!("Ignoring invalid config file: {err:#}");
                Config::default()
            }
        };

        if let Ok(url) = std::env::var(ENV_API_URL) {
            let url = url.trim();
            if !url.is_empty() {
                config.api_url = url.to_string();
            }
        }

        config
    }
}

fn try_load() -> Result<Option<Config>> {
    let Some(path) = config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(config))
}

fn config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "Cobranca", "cobranca_desk")?;
    Some(proj.config_dir().join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_batem_com_o_frontend_original() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000/api");
        assert_eq!(config.search_debounce_ms, 400);
        assert_eq!(config.cliente_limit, 200);
        assert_eq!(config.atividades_limit, 10);
        assert_eq!(config.status_duration_ms, 5000);
    }

    #[test]
    fn arquivo_parcial_preenche_o_resto_com_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api_url": "https://painel.exemplo.com/api"}"#)
                .expect("decode config");
        assert_eq!(config.api_url, "https://painel.exemplo.com/api");
        assert_eq!(config.search_debounce_ms, 400);
        assert_eq!(config.cliente_limit, 200);
    }
}
