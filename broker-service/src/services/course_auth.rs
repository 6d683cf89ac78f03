//! Builds the headers for calling an institution's course endpoint,
//! according to the institution's declared course authentication.

use crate::config::OAuth2Settings;
use crate::error::BrokerError;
use crate::models::{CourseAuthentication, Institution};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::observability::TracedClientExt;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
pub struct CourseAuthenticator {
    client: Client,
    oauth2: OAuth2Settings,
}

impl CourseAuthenticator {
    pub fn new(client: Client, oauth2: OAuth2Settings) -> Self {
        Self { client, oauth2 }
    }

    /// Headers for a GET on `institution`'s course endpoint.
    pub async fn headers_for(&self, institution: &Institution) -> Result<HeaderMap, BrokerError> {
        match &institution.course_authentication {
            CourseAuthentication::None => Ok(HeaderMap::new()),
            CourseAuthentication::Basic { username, password } => {
                basic_auth_headers(username, password.expose_secret())
            }
            CourseAuthentication::OAuth2 => self.access_token_headers().await,
        }
    }

    // A fresh token for every call; the hit ratio of a token cache would be negligible.
    async fn access_token_headers(&self) -> Result<HeaderMap, BrokerError> {
        let url = self.oauth2.token_endpoint.as_str();
        tracing::debug!(token_endpoint = %url, "Requesting client credentials access token");

        let response = self
            .client
            .traced_post(url)
            .basic_auth(
                &self.oauth2.client_id,
                self.oauth2.client_secret.expose_secret(),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(BrokerError::upstream(url))?;

        let token: TokenResponse = response.json().await.map_err(|e| {
            BrokerError::MalformedResponse {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        bearer_headers(&token.access_token, url)
    }
}

pub fn basic_auth_headers(username: &str, password: &str) -> Result<HeaderMap, BrokerError> {
    let encoded = STANDARD.encode(format!("{}:{}", username, password));
    authorization_headers(&format!("Basic {}", encoded)).ok_or_else(|| {
        BrokerError::Configuration(format!(
            "Basic credentials for {} are not a valid header value",
            username
        ))
    })
}

fn bearer_headers(access_token: &str, url: &str) -> Result<HeaderMap, BrokerError> {
    authorization_headers(&format!("Bearer {}", access_token)).ok_or_else(|| {
        BrokerError::MalformedResponse {
            url: url.to_string(),
            reason: "access_token is not a valid header value".to_string(),
        }
    })
}

fn authorization_headers(value: &str) -> Option<HeaderMap> {
    let mut value = HeaderValue::from_str(value).ok()?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Some(headers)
}
