//! Configuration types and loading logic.

use cnfast_tracing::TracingConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Environment variable naming an alternative TOML config file.
pub const CONFIG_PATH_ENV: &str = "CNFAST_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "cnfast.toml";

/// Log filter used when `debug` is on and no explicit level was configured.
const DEBUG_LOG_LEVEL: &str = "cnfast=debug,warn";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the endpoint directory service.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Directory lookup timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Print routed command lines and raise the log level.
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Keys set only to seed defaults that depend on other keys.
#[derive(Serialize)]
struct DebugDefaults {
    tracing: DebugTracing,
}

#[derive(Serialize)]
struct DebugTracing {
    log_level: &'static str,
}

fn default_api_host() -> String {
    "https://cnfast-api.521456.xyz".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Resolve the config file path from `CNFAST_CONFIG`, else `cnfast.toml`.
    pub fn config_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (CNFAST_ prefix, __ for nesting)
    /// 2. TOML config file (missing file is fine)
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("CNFAST_").ignore(&["config"]).split("__")),
        )
    }

    /// Extract from a prepared figment. When `debug` is on and no log level
    /// was given explicitly, the debug filter becomes the default.
    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let debug = figment.extract_inner::<bool>("debug").unwrap_or(false);
        let figment = if debug {
            Figment::from(Serialized::defaults(DebugDefaults {
                tracing: DebugTracing {
                    log_level: DEBUG_LOG_LEVEL,
                },
            }))
            .merge(figment)
        } else {
            figment
        };

        Ok(figment.extract()?)
    }
}
