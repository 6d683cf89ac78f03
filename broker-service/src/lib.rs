pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod session;
pub mod startup;

use config::FeatureToggles;
use services::{Broker, ServiceRegistry};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub registry: Arc<ServiceRegistry>,
    pub features: Arc<FeatureToggles>,
    pub client_url: String,
}

impl AppState {
    /// Redirect target on the GUI, e.g. `<client_url>?step=approve`.
    pub fn redirect_url(&self, query: &str) -> String {
        format!("{}?{}", self.client_url, query)
    }
}
