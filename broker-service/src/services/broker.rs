//! The broker workflow: validate a request, fetch the offering from the
//! guest institution, start the registration at the home institution.
//!
//! State lives in the browser session between the three calls:
//!
//! ```text
//! Start --validate--> Validated --offering--> Offered --start--> (invalidated)
//! ```
//!
//! A failed validation leaves the session untouched. Calling `validate`
//! again overwrites whatever the session held.

use crate::error::BrokerError;
use crate::models::{BrokerRequest, EnrollmentRequest, Offering, SanitizedInstitution};
use crate::services::catalog::CourseCatalogClient;
use crate::services::enrollment::EnrollmentProxy;
use crate::services::registry::ServiceRegistry;
use crate::session::{BrokerPhase, SessionContext, SessionStore};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Correlation map key that triggers the playground bypass.
pub const PLAYGROUND_KEY: &str = "code";
/// Correlation map key forwarded as `X-Correlation-ID`.
pub const CORRELATION_ID_KEY: &str = "correlationID";

/// Everything the GUI needs to render the approval screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingResponse {
    pub guest_institution: SanitizedInstitution,
    pub home_institution: SanitizedInstitution,
    pub authentication_action_url: String,
    pub enrollment_request: EnrollmentRequest,
    pub offering: Offering,
}

pub struct Broker {
    registry: Arc<ServiceRegistry>,
    catalog: CourseCatalogClient,
    enrollment: EnrollmentProxy,
    allow_playground: bool,
}

impl Broker {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        catalog: CourseCatalogClient,
        enrollment: EnrollmentProxy,
        allow_playground: bool,
    ) -> Self {
        Self {
            registry,
            catalog,
            enrollment,
            allow_playground,
        }
    }

    /// Validate an inbound request and, when valid, make it the session's
    /// current request.
    pub async fn validate<S: SessionStore + ?Sized>(
        &self,
        session: &S,
        request: BrokerRequest,
    ) -> Result<(), BrokerError> {
        tracing::debug!(?request, "Starting session for broker request");

        request.validate()?;
        self.registry.lookup(&request.home_institution_schac_home)?;
        self.registry.lookup(&request.guest_institution_schac_home)?;

        SessionContext::new(session).begin(&request).await?;
        Ok(())
    }

    /// Fetch the offering for the session's request and remember it for `start`.
    pub async fn offering<S: SessionStore + ?Sized>(
        &self,
        session: &S,
    ) -> Result<OfferingResponse, BrokerError> {
        let context = SessionContext::new(session);
        let request = context.request().await?;

        tracing::debug!(?request, "Received request for offering");

        let guest = self.registry.lookup(&request.guest_institution_schac_home)?;
        let home = self.registry.lookup(&request.home_institution_schac_home)?;

        let offering = self
            .catalog
            .fetch_offering(guest, &request.offering_id)
            .await?;
        context.set_offering(&offering).await?;

        Ok(OfferingResponse {
            guest_institution: guest.sanitize(),
            home_institution: home.sanitize(),
            authentication_action_url: home.authentication_endpoint.clone(),
            enrollment_request: EnrollmentRequest::from(home),
            offering,
        })
    }

    /// Start the registration at the home institution.
    ///
    /// Upstream failures never reach the caller: they are logged and replaced
    /// by a generic `{message, code: 500}` payload naming the guest institution.
    /// The session is invalidated either way.
    pub async fn start<S: SessionStore + ?Sized>(
        &self,
        session: &S,
        correlation: HashMap<String, String>,
    ) -> Result<Value, BrokerError> {
        if self.allow_playground && correlation.contains_key(PLAYGROUND_KEY) {
            tracing::debug!(?correlation, "Returning playground request");
            return Ok(json!(correlation));
        }

        let context = SessionContext::new(session);
        let (request, offering) = match context.state().await?.into_phase() {
            BrokerPhase::Offered { request, offering } => (request, offering),
            BrokerPhase::Validated(_) => {
                return Err(BrokerError::MissingSessionState("offering"));
            }
            BrokerPhase::Start => {
                return Err(BrokerError::MissingSessionState("broker request"));
            }
        };

        tracing::debug!(?request, "Received start registration request");

        // Resolved up front so reporting a failure cannot fail itself.
        let guest_name = self
            .registry
            .find_institution_by_schac_home(&request.guest_institution_schac_home)
            .map(|guest| guest.name.clone())
            .unwrap_or_else(|| request.guest_institution_schac_home.clone());

        let correlation_id = correlation.get(CORRELATION_ID_KEY).map(String::as_str);
        let body = match self.register(&request, correlation_id, &offering).await {
            Ok(body) => {
                tracing::debug!(?request, %body, "Returning start registration response");
                body
            }
            Err(e) => {
                tracing::error!(error = %e, ?request, "Start registration failed");
                server_error_payload(&guest_name)
            }
        };

        if let Err(e) = context.invalidate().await {
            tracing::error!(error = %e, "Failed to invalidate broker session");
        }

        Ok(body)
    }

    async fn register(
        &self,
        request: &BrokerRequest,
        correlation_id: Option<&str>,
        offering: &Offering,
    ) -> Result<Value, BrokerError> {
        let home = self.registry.lookup(&request.home_institution_schac_home)?;
        self.enrollment
            .register(home, correlation_id, offering)
            .await
    }
}

pub fn server_error_payload(guest_institution_name: &str) -> Value {
    json!({
        "message": format!("Server error at {}", guest_institution_name),
        "code": 500,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuth2Settings;
    use crate::models::institution::test_config;
    use crate::models::{CourseAuthenticationMode, InstitutionConfig};
    use crate::services::course_auth::CourseAuthenticator;
    use crate::session::testing::MemorySession;
    use crate::session::SessionState;
    use reqwest::Client;
    use secrecy::Secret;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HOME: &str = "utrecht.nl";
    const GUEST: &str = "eindhoven.nl";

    fn institutions(server_uri: &str) -> Vec<InstitutionConfig> {
        let mut home = test_config(HOME, CourseAuthenticationMode::None);
        home.registration_endpoint = format!("{}/api/start", server_uri);

        let mut guest = test_config(GUEST, CourseAuthenticationMode::None);
        guest.name = "Eindhoven University of Technology".to_string();
        guest.course_endpoint = format!("{}/courses", server_uri);

        vec![home, guest]
    }

    fn broker(server_uri: &str, allow_playground: bool) -> Broker {
        let client = Client::new();
        let registry =
            Arc::new(ServiceRegistry::from_configs(institutions(server_uri)).unwrap());
        let authenticator = CourseAuthenticator::new(
            client.clone(),
            OAuth2Settings {
                token_endpoint: format!("{}/oidc/token", server_uri),
                client_id: "broker".to_string(),
                client_secret: Secret::new("secret".to_string()),
            },
        );

        Broker::new(
            registry,
            CourseCatalogClient::new(client.clone(), authenticator),
            EnrollmentProxy::new(client),
            allow_playground,
        )
    }

    async fn offered_session(broker: &Broker) -> MemorySession {
        let session = MemorySession::default();
        broker
            .validate(&session, BrokerRequest::new(HOME, GUEST, "1"))
            .await
            .unwrap();
        broker.offering(&session).await.unwrap();
        session
    }

    fn correlation(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn mount_offering(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/courses/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"offeringId": "1", "name": "Mathematics"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_unknown_institution_leaves_session_untouched() {
        let broker = broker("http://localhost:1", false);
        let session = MemorySession::default();

        let err = broker
            .validate(&session, BrokerRequest::new(HOME, "nope.nl", "1"))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::NotFound(id) if id == "nope.nl"));
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_leaves_session_untouched() {
        let broker = broker("http://localhost:1", false);
        let session = MemorySession::default();

        let err = broker
            .validate(&session, BrokerRequest::new(HOME, GUEST, ""))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::InvalidRequest(_)));
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_lookup() {
        let broker = broker("http://localhost:1", false);
        let session = MemorySession::default();
        let mut request = BrokerRequest::new(HOME, "nope.nl", "1");
        request.home_institution_schac_home = String::new();

        let err = broker.validate(&session, request).await.unwrap_err();

        assert!(matches!(err, BrokerError::InvalidRequest(_)));
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_validate_stores_request() {
        let broker = broker("http://localhost:1", false);
        let session = MemorySession::default();

        broker
            .validate(&session, BrokerRequest::new(HOME, GUEST, "1"))
            .await
            .unwrap();

        let state = SessionContext::new(&session).state().await.unwrap();
        assert_eq!(
            state.into_phase(),
            BrokerPhase::Validated(BrokerRequest::new(HOME, GUEST, "1"))
        );
    }

    #[tokio::test]
    async fn test_offering_requires_validated_request() {
        let broker = broker("http://localhost:1", false);
        let err = broker
            .offering(&MemorySession::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::MissingSessionState(_)));
    }

    #[tokio::test]
    async fn test_offering_response() {
        let server = MockServer::start().await;
        mount_offering(&server).await;
        let broker = broker(&server.uri(), false);
        let session = MemorySession::default();
        broker
            .validate(&session, BrokerRequest::new(HOME, GUEST, "1"))
            .await
            .unwrap();

        let response = broker.offering(&session).await.unwrap();

        assert_eq!(response.guest_institution.schac_home, GUEST);
        assert_eq!(response.home_institution.schac_home, HOME);
        assert_eq!(
            response.authentication_action_url,
            "http://localhost:9091/authentication"
        );
        assert_eq!(
            response.enrollment_request.person_uri,
            "http://localhost:9093/persons/me"
        );
        assert_eq!(response.offering.as_value()["name"], "Mathematics");

        let state = SessionContext::new(&session).state().await.unwrap();
        assert!(matches!(state.into_phase(), BrokerPhase::Offered { .. }));
    }

    #[tokio::test]
    async fn test_playground_echoes_correlation_map() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let broker = broker(&server.uri(), true);
        let session = MemorySession::default();

        let body = broker
            .start(
                &session,
                correlation(&[("code", "200"), ("result", "playground")]),
            )
            .await
            .unwrap();

        assert_eq!(body, json!({"code": "200", "result": "playground"}));
        assert_eq!(session.invalidation_count(), 0);
    }

    #[tokio::test]
    async fn test_code_key_without_playground_takes_normal_path() {
        let broker = broker("http://localhost:1", false);
        let err = broker
            .start(&MemorySession::default(), correlation(&[("code", "200")]))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::MissingSessionState(_)));
    }

    #[tokio::test]
    async fn test_start_passes_body_through_and_invalidates() {
        let server = MockServer::start().await;
        mount_offering(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/start"))
            .and(header("X-Correlation-ID", "correlation-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": "ok", "code": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let broker = broker(&server.uri(), false);
        let session = offered_session(&broker).await;

        let body = broker
            .start(&session, correlation(&[("correlationID", "correlation-1")]))
            .await
            .unwrap();

        assert_eq!(body, json!({"result": "ok", "code": "ok"}));
        assert_eq!(session.invalidation_count(), 1);
        assert_eq!(
            SessionContext::new(&session).state().await.unwrap(),
            SessionState::default()
        );
    }

    #[tokio::test]
    async fn test_start_masks_upstream_failure() {
        let server = MockServer::start().await;
        mount_offering(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/start"))
            .respond_with(ResponseTemplate::new(503).set_body_string("database down"))
            .mount(&server)
            .await;
        let broker = broker(&server.uri(), false);
        let session = offered_session(&broker).await;

        let body = broker
            .start(&session, correlation(&[("correlationID", "c")]))
            .await
            .unwrap();

        assert_eq!(
            body,
            json!({"message": "Server error at Eindhoven University of Technology", "code": 500})
        );
        assert_eq!(session.invalidation_count(), 1);
    }

    #[tokio::test]
    async fn test_start_registers_null_offering() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        let broker = broker(&server.uri(), false);
        let session = offered_session(&broker).await;

        let body = broker.start(&session, HashMap::new()).await.unwrap();

        assert_eq!(body, json!({"result": "ok"}));
        assert_eq!(session.invalidation_count(), 1);
    }

    #[tokio::test]
    async fn test_start_without_offering_is_rejected() {
        let broker = broker("http://localhost:1", false);
        let session = MemorySession::default();
        broker
            .validate(&session, BrokerRequest::new(HOME, GUEST, "1"))
            .await
            .unwrap();

        let err = broker.start(&session, HashMap::new()).await.unwrap_err();

        assert!(matches!(err, BrokerError::MissingSessionState("offering")));
        assert_eq!(session.invalidation_count(), 0);
    }

    #[test]
    fn test_server_error_payload() {
        assert_eq!(
            server_error_payload("Utrecht"),
            json!({"message": "Server error at Utrecht", "code": 500})
        );
    }
}
