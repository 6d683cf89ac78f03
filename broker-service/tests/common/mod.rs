use broker_service::config::{
    BrokerSettings, HttpSettings, OAuth2Settings, ServerSettings, Settings, TelemetrySettings,
};
use broker_service::models::{CourseAuthenticationMode, InstitutionConfig};
use broker_service::services::ServiceRegistry;
use broker_service::startup::Application;
use secrecy::Secret;
use wiremock::MockServer;

pub const CLIENT_URL: &str = "http://localhost:3003";
pub const HOME: &str = "utrecht.nl";
pub const BASIC_GUEST: &str = "basic.nl";
pub const OAUTH2_GUEST: &str = "oauth2.nl";
pub const OPEN_GUEST: &str = "open.nl";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    /// Stands in for every institution endpoint and the token endpoint.
    pub upstream: MockServer,
}

fn institution(
    upstream: &str,
    schac_home: &str,
    name: &str,
    mode: CourseAuthenticationMode,
) -> InstitutionConfig {
    let basic = mode == CourseAuthenticationMode::Basic;
    InstitutionConfig {
        schac_home: schac_home.to_string(),
        name: name.to_string(),
        abbreviation: Some(schac_home.to_uppercase()),
        logo_uri: None,
        authentication_endpoint: format!("{}/{}/authentication", upstream, schac_home),
        course_endpoint: format!("{}/{}/courses", upstream, schac_home),
        course_authentication: Some(mode),
        course_authentication_user_name: basic.then(|| "course-user".to_string()),
        course_authentication_password: basic.then(|| Secret::new("course-secret".to_string())),
        persons_endpoint: format!("{}/{}/persons/me", upstream, schac_home),
        results_endpoint: Some(format!("{}/{}/results", upstream, schac_home)),
        registration_endpoint: format!("{}/{}/api/start", upstream, schac_home),
        registration_user: "registration-user".to_string(),
        registration_password: Secret::new("registration-secret".to_string()),
        scopes: "https://long-term.ooapi".to_string(),
    }
}

fn settings(upstream: &str, allow_playground: bool) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            secure_cookie: false,
            session_inactivity_minutes: 5,
        },
        broker: BrokerSettings {
            client_url: CLIENT_URL.to_string(),
            start_broker_endpoint: "http://localhost:8091/api/broker".to_string(),
            local: true,
            allow_playground,
            service_registry_path: "unused".into(),
        },
        oauth2: OAuth2Settings {
            token_endpoint: format!("{}/oidc/token", upstream),
            client_id: "broker".to_string(),
            client_secret: Secret::new("broker-secret".to_string()),
        },
        http: HttpSettings { timeout_seconds: 5 },
        telemetry: TelemetrySettings::default(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_playground(false).await
    }

    pub async fn spawn_with_playground(allow_playground: bool) -> Self {
        let upstream = MockServer::start().await;
        let uri = upstream.uri();

        let registry = ServiceRegistry::from_configs(vec![
            institution(&uri, HOME, "University of Utrecht", CourseAuthenticationMode::None),
            institution(
                &uri,
                BASIC_GUEST,
                "Basic University",
                CourseAuthenticationMode::Basic,
            ),
            institution(
                &uri,
                OAUTH2_GUEST,
                "OAuth2 University",
                CourseAuthenticationMode::Oauth2,
            ),
            institution(&uri, OPEN_GUEST, "Open University", CourseAuthenticationMode::None),
        ])
        .expect("Failed to build test registry");

        let application =
            Application::build_with_registry(settings(&uri, allow_playground), registry)
                .await
                .expect("Failed to build application");
        let address = format!("http://127.0.0.1:{}", application.port());
        tokio::spawn(application.run_until_stopped());

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            address,
            client,
            upstream,
        }
    }

    pub async fn post_broker(&self, fields: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(format!("{}/api/broker", self.address))
            .form(fields)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Submit a broker request and return the redirect location.
    pub async fn broker(&self, home: &str, guest: &str, offering_id: &str) -> String {
        let response = self
            .post_broker(&[
                ("homeInstitutionSchacHome", home),
                ("guestInstitutionSchacHome", guest),
                ("offeringID", offering_id),
            ])
            .await;
        location(&response)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn start(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/start", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

pub fn location(response: &reqwest::Response) -> String {
    assert!(
        response.status().is_redirection(),
        "expected redirect, got {}",
        response.status()
    );
    response.headers()[reqwest::header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}
