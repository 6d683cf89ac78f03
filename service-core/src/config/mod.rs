use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load settings from a required YAML file, overridden by environment
/// variables such as `APP_SERVER__PORT=9000`.
pub fn load_settings<T: DeserializeOwned>(file: &Path, env_prefix: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let settings = Config::builder()
        .add_source(File::from(file).required(true))
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Deserialize a standalone YAML document (no environment overrides).
pub fn load_document<T: DeserializeOwned>(file: &Path) -> Result<T, AppError> {
    let document = Config::builder()
        .add_source(File::from(file).required(true))
        .build()?;

    Ok(document.try_deserialize()?)
}
