use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Settings file not found. Looked in:\n\
        - ./reconflow.yaml\n\
        - ./.reconflow/reconflow.yaml\n\
        - ~/.config/reconflow/reconflow.yaml\n\
        Or point RECONFLOW_CONFIG (or --config) at a file"
    )]
    ConfigFileNotFound,

    #[error("Settings file does not exist: {0}")]
    ExplicitFileMissing(PathBuf),

    #[error("Invalid settings in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
