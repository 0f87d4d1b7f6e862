use crate::error::ConfigError;
use crate::settings::Settings;
use tracing_subscriber::EnvFilter;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{main_lot, Policy, MAIN_LOT_MAP};

/// Loads the application settings from the process environment.
///
/// A `.env` file next to the binary is honoured first, matching how the
/// deployment ships its secrets. Variable names map 1:1 onto the fields of
/// [`Settings`] (`BASE_URL`, `URL_WS`, `API_KEY`, `SECRET_KEY`, `DB_URL`,
/// `TOKEN`, `ADMIN`).
pub fn load_settings() -> Result<Settings, ConfigError> {
    // Missing .env is fine in containerised deployments; the variables are
    // then expected directly in the environment.
    let _ = dotenvy::dotenv();

    let builder = config::Config::builder()
        .add_source(config::Environment::default())
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;

    Ok(settings)
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls the filter; the default keeps the engine chatty and
/// the HTTP stack quiet.
pub fn init_tracing() -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| ConfigError::Tracing(e.to_string()))
}
