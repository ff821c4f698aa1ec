pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV: &str = "CLOUDGATE_CONFIG_PATH";
const EXTERNAL_NETWORK_ENV: &str = "CLOUDGATE_EXTERNAL_NETWORK";
const DEFAULT_STATE_DIR: &str = ".cloudgate";

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Name of the externally routable network floating IPs are allocated from
    pub external_network: String,

    /// Project the gateway acts for; reported as the network interface owner
    #[serde(default)]
    pub project_id: String,

    /// Directory of the local record store
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Endpoint of the legacy API that serves the unmanaged address pool
    #[serde(default)]
    pub legacy_endpoint: Option<String>,

    /// `clouds.yaml` entry used by the openstack CLI
    #[serde(default)]
    pub openstack_cloud: Option<String>,

    #[serde(default)]
    pub region: Option<String>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

impl GatewayConfig {
    /// Find the config file, parse it and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = find_config_file()?;
        Self::from_file(&path)
    }

    /// Parse a config file and apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env();
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(network) = std::env::var(EXTERNAL_NETWORK_ENV) {
            if !network.is_empty() {
                self.external_network = network;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.external_network.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "external_network must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the gateway config file
///
/// Search order:
/// 1. `CLOUDGATE_CONFIG_PATH` (explicit path)
/// 2. current directory: cloudgate.local.yaml, cloudgate.yaml
/// 3. ~/.config/cloudgate/config.yaml
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["cloudgate.local.yaml", "cloudgate.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("cloudgate").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const MINIMAL: &str = "external_network: public\n";

    #[test]
    fn test_parse_defaults() {
        let config = GatewayConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.external_network, "public");
        assert_eq!(config.state_dir, PathBuf::from(".cloudgate"));
        assert_eq!(config.legacy_endpoint, None);
        assert!(config.project_id.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let config = GatewayConfig::parse(
            "external_network: ext-net\n\
             project_id: proj-1\n\
             state_dir: /var/lib/cloudgate\n\
             legacy_endpoint: http://127.0.0.1:8773/services/Cloud\n\
             openstack_cloud: devstack\n\
             region: RegionOne\n",
        )
        .unwrap();
        assert_eq!(config.project_id, "proj-1");
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/cloudgate"));
        assert_eq!(config.openstack_cloud.as_deref(), Some("devstack"));
    }

    #[test]
    fn test_validate_empty_network() {
        let config = GatewayConfig::parse("external_network: ''\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("cloudgate.yaml"), MINIMAL).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("cloudgate.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("cloudgate.yaml"), MINIMAL).unwrap();
        fs::write(temp_dir.path().join("cloudgate.local.yaml"), MINIMAL).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("cloudgate.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, MINIMAL).unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        let result = find_config_file();

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    #[serial]
    fn test_external_network_env_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("cloudgate.yaml");
        fs::write(&config_path, MINIMAL).unwrap();

        unsafe {
            std::env::set_var(EXTERNAL_NETWORK_ENV, "floating");
        }

        let config = GatewayConfig::from_file(&config_path);

        unsafe {
            std::env::remove_var(EXTERNAL_NETWORK_ENV);
        }

        assert_eq!(config.unwrap().external_network, "floating");
    }
}
