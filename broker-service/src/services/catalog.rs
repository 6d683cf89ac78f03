use crate::error::BrokerError;
use crate::models::{Institution, Offering};
use crate::services::course_auth::CourseAuthenticator;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use service_core::observability::TracedClientExt;

/// Retrieves offerings from a guest institution's course catalog.
#[derive(Clone)]
pub struct CourseCatalogClient {
    client: Client,
    authenticator: CourseAuthenticator,
}

pub fn offering_url(course_endpoint: &str, offering_id: &str) -> String {
    format!("{}/{}", course_endpoint, offering_id)
}

impl CourseCatalogClient {
    pub fn new(client: Client, authenticator: CourseAuthenticator) -> Self {
        Self {
            client,
            authenticator,
        }
    }

    #[tracing::instrument(skip(self, guest), fields(guest = %guest.schac_home))]
    pub async fn fetch_offering(
        &self,
        guest: &Institution,
        offering_id: &str,
    ) -> Result<Offering, BrokerError> {
        let url = offering_url(&guest.course_endpoint, offering_id);
        let mut headers = self.authenticator.headers_for(guest).await?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        tracing::debug!(
            url = %url,
            authentication = ?guest.course_authentication.mode(),
            "Fetching offering"
        );

        let response = self
            .client
            .traced_get(&url)
            .headers(headers)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(BrokerError::upstream(&url))?;

        response
            .json::<Offering>()
            .await
            .map_err(|e| BrokerError::MalformedResponse {
                url: url.clone(),
                reason: e.to_string(),
            })
    }
}
