use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub oauth2: OAuth2Settings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Only send the session cookie over HTTPS.
    #[serde(default = "default_secure_cookie")]
    pub secure_cookie: bool,
    #[serde(default = "default_session_inactivity_minutes")]
    pub session_inactivity_minutes: i64,
}

fn default_secure_cookie() -> bool {
    true
}

fn default_session_inactivity_minutes() -> i64 {
    30
}

#[derive(Deserialize, Clone)]
pub struct BrokerSettings {
    /// Base URL of the GUI the browser is redirected back to.
    pub client_url: String,
    pub start_broker_endpoint: String,
    #[serde(default)]
    pub local: bool,
    /// Allow `/api/start` to echo correlation maps carrying a `code` key.
    #[serde(default)]
    pub allow_playground: bool,
    /// Relative paths are resolved against the configuration directory.
    pub service_registry_path: PathBuf,
}

/// Client-credentials settings shared by every OAUTH2 institution.
#[derive(Deserialize, Clone)]
pub struct OAuth2Settings {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
}

#[derive(Deserialize, Clone)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector, e.g. http://tempo:4317. Spans are not exported when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Feature toggles handed to the GUI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureToggles {
    pub start_broker_endpoint: String,
    pub local: bool,
    pub allow_playground: bool,
}

impl From<&BrokerSettings> for FeatureToggles {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            start_broker_endpoint: settings.start_broker_endpoint.clone(),
            local: settings.local,
            allow_playground: settings.allow_playground,
        }
    }
}

pub fn get_configuration() -> Result<Settings, service_core::error::AppError> {
    let base_path = std::env::current_dir()?;

    // Check if we're already in broker-service directory or need to navigate to it
    let configuration_directory = if base_path.ends_with("broker-service") {
        base_path.join("config")
    } else {
        base_path.join("broker-service").join("config")
    };

    let mut settings: Settings = service_core::config::load_settings(
        &configuration_directory.join("base.yaml"),
        "APP",
    )?;

    if settings.broker.service_registry_path.is_relative() {
        settings.broker.service_registry_path =
            configuration_directory.join(&settings.broker.service_registry_path);
    }

    Ok(settings)
}
