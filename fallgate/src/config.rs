//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The configuration file path defaults to `config.yaml` but can
//! be specified via `-f` flag or the `FALLGATE_CONFIG` environment variable.
//!
//! Sources are merged in order (later overrides earlier):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `FALLGATE_`
//!
//! For nested values, use double underscores: `FALLGATE_BACKEND__URL` sets
//! `backend.url`.
//!
//! ```bash
//! FALLGATE_PORT=8080
//! FALLGATE_BACKEND__URL="http://analysis:8000"
//! FALLGATE_STORAGE__BUCKET="fall-uploads-prod"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FALLGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Analysis backend the relay forwards to
    pub backend: BackendConfig,
    /// Object-storage sink for opt-in upload persistence
    pub storage: StorageConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Maximum accepted size for a video upload body, in bytes
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            backend: BackendConfig::default(),
            storage: StorageConfig::default(),
            cors: CorsConfig::default(),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Where the analysis backend lives and how long each operation may take.
///
/// Timeouts are fixed per operation: health and progress checks are short,
/// frame analysis and async submission are a minute (submission only starts
/// a job), and synchronous video work gets the full ten minutes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend (no trailing path)
    pub url: Url,
    /// Timeout for health and job-progress requests
    #[serde(with = "humantime_serde")]
    pub status_timeout: Duration,
    /// Timeout for single-frame analysis
    #[serde(with = "humantime_serde")]
    pub frame_timeout: Duration,
    /// Timeout for synchronous video analysis/annotation and result download
    #[serde(with = "humantime_serde")]
    pub video_timeout: Duration,
    /// Timeout for async job submission
    #[serde(with = "humantime_serde")]
    pub submit_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://127.0.0.1:8000").expect("default backend url is valid"),
            status_timeout: Duration::from_secs(10),
            frame_timeout: Duration::from_secs(60),
            video_timeout: Duration::from_secs(600),
            submit_timeout: Duration::from_secs(60),
        }
    }
}

/// Object-storage sink configuration.
///
/// Credentials are optional: when both keys are set they are used directly,
/// otherwise the SDK's ambient provider chain (environment, shared config,
/// instance role) resolves them on first use.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket raw uploads are persisted to
    pub bucket: String,
    /// Region for the storage client
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    pub force_path_style: bool,
    /// Explicit access key; requires `secret_access_key`
    pub access_key_id: Option<String>,
    /// Explicit secret key; requires `access_key_id`
    pub secret_access_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "fall-uploads".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` permits any origin
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the YAML file and environment overrides.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let config: Config = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("FALLGATE_").split("__"))
            .extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.backend.url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(config.backend.video_timeout, Duration::from_secs(600));
        assert_eq!(config.storage.bucket, "fall-uploads");
        assert_eq!(config.cors.allowed_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_yaml_with_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
port: 9000
backend:
  url: "http://analysis:8000"
  frame_timeout: 30s
storage:
  bucket: from-yaml
"#,
            )?;
            jail.set_env("FALLGATE_STORAGE__BUCKET", "from-env");
            jail.set_env("FALLGATE_PORT", "9001");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load");

            assert_eq!(config.port, 9001);
            assert_eq!(config.backend.url.as_str(), "http://analysis:8000/");
            assert_eq!(config.backend.frame_timeout, Duration::from_secs(30));
            // Defaults survive partial sections
            assert_eq!(config.backend.video_timeout, Duration::from_secs(600));
            assert_eq!(config.storage.bucket, "from-env");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FALLGATE_HOST", "127.0.0.1");
            let args = Args {
                config: "does-not-exist.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load");
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8001);
            Ok(())
        });
    }
}
