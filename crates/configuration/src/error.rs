use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from the environment: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to initialise tracing: {0}")]
    Tracing(String),
}
