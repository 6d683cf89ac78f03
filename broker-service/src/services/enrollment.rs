use crate::error::BrokerError;
use crate::models::{Institution, Offering};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;
use service_core::observability::TracedClientExt;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Proxies the final registration call to the home institution.
#[derive(Clone)]
pub struct EnrollmentProxy {
    client: Client,
}

impl EnrollmentProxy {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// POST the offering to the home institution's registration endpoint and
    /// return its JSON body unchanged.
    pub async fn register(
        &self,
        home: &Institution,
        correlation_id: Option<&str>,
        offering: &Offering,
    ) -> Result<Value, BrokerError> {
        let url = home.registration_endpoint.as_str();

        let mut request = self
            .client
            .traced_post(url)
            .basic_auth(
                &home.registration_user,
                home.registration_password.expose_secret(),
            )
            .json(offering);
        if let Some(correlation_id) = correlation_id {
            request = request.header(CORRELATION_ID_HEADER, correlation_id);
        }

        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(BrokerError::upstream(url))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| BrokerError::MalformedResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}
