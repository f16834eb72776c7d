//! Configuration for the farm finance reporter

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub report: Option<ReportConfig>,
    #[serde(default)]
    pub crops: Option<CropsConfig>,
}

/// Backend API section
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the HarvestEase backend, e.g. "https://api.harvestease.lk"
    pub base_url: String,
    /// Bearer token for the admin endpoints
    #[serde(default)]
    pub token: Option<String>,
}

/// Report branding section
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub farm_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// JPEG logo embedded in the PDF header band
    #[serde(default)]
    pub logo_path: Option<PathBuf>,
}

/// Known crop varieties section
#[derive(Debug, Deserialize)]
pub struct CropsConfig {
    pub varieties: Vec<String>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).with_context(|| "Failed to parse config.toml")
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Main configuration struct
pub struct Config {
    /// Backend API base URL
    pub api_base_url: String,
    /// Bearer token for admin endpoints
    pub api_token: Option<String>,
    /// Application name (branding and PDF filename)
    pub app_name: String,
    /// Cooperative name shown in the report header
    pub farm_name: String,
    /// Currency prefix for formatted amounts
    pub currency: String,
    /// Optional logo image for the PDF header
    pub logo_path: Option<PathBuf>,
    /// Known crop varieties, in report order
    pub varieties: Vec<String>,
}

impl Config {
    /// Create config from file config and optional API URL override
    pub fn from_file(file_config: &FileConfig, api_url: Option<String>) -> Self {
        let report = file_config.report.clone().unwrap_or(ReportConfig {
            app_name: None,
            farm_name: None,
            currency: None,
            logo_path: None,
        });

        let app_name = report
            .app_name
            .unwrap_or_else(|| constants::DEFAULT_APP_NAME.to_string());

        Self {
            api_base_url: api_url
                .unwrap_or_else(|| file_config.api.base_url.trim_end_matches('/').to_string()),
            api_token: file_config.api.token.clone(),
            farm_name: report.farm_name.unwrap_or_else(|| app_name.clone()),
            currency: report
                .currency
                .unwrap_or_else(|| constants::DEFAULT_CURRENCY.to_string()),
            logo_path: report.logo_path,
            varieties: file_config
                .crops
                .as_ref()
                .map(|c| c.varieties.clone())
                .unwrap_or_else(|| {
                    constants::DEFAULT_VARIETIES
                        .iter()
                        .map(|v| v.to_string())
                        .collect()
                }),
            app_name,
        }
    }

    /// Format an amount with the configured currency prefix
    pub fn money(&self, amount: f64) -> String {
        format!("{} {:.2}", self.currency, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let file_config: FileConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.lk/"
            "#,
        )
        .unwrap();

        let config = Config::from_file(&file_config, None);
        assert_eq!(config.api_base_url, "https://api.example.lk");
        assert_eq!(config.app_name, "HarvestEase");
        assert_eq!(config.varieties.len(), 5);
        assert_eq!(config.money(1234.5), "Rs. 1234.50");
    }

    #[test]
    fn test_overrides_win() {
        let file_config: FileConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.lk"
            token = "secret"

            [report]
            farm_name = "Polonnaruwa Growers"
            currency = "LKR"

            [crops]
            varieties = ["Nadu", "Samba"]
            "#,
        )
        .unwrap();

        let config = Config::from_file(&file_config, Some("http://localhost:5000".to_string()));
        assert_eq!(config.api_base_url, "http://localhost:5000");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.farm_name, "Polonnaruwa Growers");
        assert_eq!(config.varieties, vec!["Nadu", "Samba"]);
    }
}
