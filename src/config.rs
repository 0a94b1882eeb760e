use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the dossier workflow client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DossierConfig {
    /// Compliance backend connection
    pub api: ApiConfig,
    /// Plan storage limits
    pub storage: StorageConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the web application serving `/api/*`
    pub base_url: String,
    /// Bearer access token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Response cache lifetime for use case and document reads
    pub cache_ttl_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Plan ceiling used when the backend does not report one
    pub max_storage_mb: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// Emit JSON log lines instead of the compact format
    pub json_logs: bool,
}

impl Default for DossierConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:3000".to_string(),
                token: None, // Read from DOSSIER_API_TOKEN when unset
                timeout_seconds: 30,
                cache_ttl_seconds: 60,
                rate_limit: RateLimitConfig {
                    requests_per_second: 10,
                    burst_capacity: 20,
                },
            },
            storage: StorageConfig {
                max_storage_mb: 250.0,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl DossierConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (dossier-workflow.toml, .dossier-workflow-rc)
    /// 3. Environment variables (prefixed with DOSSIER_WORKFLOW_)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`DossierConfig::load`], resolving config files relative to `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let defaults = Config::try_from(&DossierConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        let toml_path = dir.join("dossier-workflow.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".dossier-workflow-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("DOSSIER_WORKFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut dossier_config: DossierConfig = builder.build()?.try_deserialize()?;

        if dossier_config.api.token.is_none() {
            if let Ok(token) = std::env::var("DOSSIER_API_TOKEN") {
                dossier_config.api.token = Some(token);
            }
        }

        Ok(dossier_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<DossierConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = DossierConfig::load_env_file();
        DossierConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static DossierConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
