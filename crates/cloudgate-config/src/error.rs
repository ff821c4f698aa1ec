use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Config file not found. Looked in:\n\
        - current directory: cloudgate.local.yaml, cloudgate.yaml\n\
        - ~/.config/cloudgate/config.yaml\n\
        Set CLOUDGATE_CONFIG_PATH to point at a file directly"
    )]
    ConfigFileNotFound,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
