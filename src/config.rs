use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration for the rmad daemon
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RmadConfig {
    /// JSON state file of the running RMA session
    pub store_path: PathBuf,
    /// Directory searched for test-mode marker files
    pub working_dir: PathBuf,
    /// Unencrypted stateful directory; final metrics snapshots live here
    pub unencrypted_rma_dir: PathBuf,
    /// Destination of `save-log`
    pub log_output_dir: PathBuf,
    /// Region table consulted when listing selectable regions
    pub regions_database: PathBuf,
    /// Use the in-memory fake device instead of the platform tools
    pub test_mode: bool,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for RmadConfig {
    fn default() -> Self {
        let rma_dir = PathBuf::from("/mnt/stateful_partition/unencrypted/rma-data");
        Self {
            store_path: rma_dir.join("state"),
            working_dir: PathBuf::from("/var/lib/rmad"),
            unencrypted_rma_dir: rma_dir,
            log_output_dir: PathBuf::from("/var/log/rmad"),
            regions_database: PathBuf::from("/usr/share/misc/cros-regions.json"),
            test_mode: false,
            log_level: "info".to_string(),
        }
    }
}

impl RmadConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. `rmad.toml` in the current directory, or `explicit` when given
    /// 3. Environment variables (prefixed with RMAD_)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match explicit {
            Some(path) => builder = builder.add_source(File::from(path.to_path_buf())),
            None if Path::new("rmad.toml").exists() => {
                builder = builder.add_source(File::with_name("rmad"));
            }
            None => {}
        }

        builder = builder.add_source(Environment::with_prefix("RMAD").try_parsing(true));

        let config = builder.build()?;
        let rmad_config: RmadConfig = config.try_deserialize()?;
        Ok(rmad_config)
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

    /// Final metrics snapshots are kept next to the state file directory
    pub fn metrics_dir(&self) -> PathBuf {
        self.unencrypted_rma_dir.join("metrics")
    }
}
