//! Participating institutions and the two views the broker keeps of them.
//!
//! [`Institution`] is the full record, credentials included, and is never
//! serialized. [`SanitizedInstitution`] is what leaves the process.

use crate::error::BrokerError;
use secrecy::Secret;
use serde::{Deserialize, Serialize};

/// How the broker authenticates against an institution's course endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourseAuthenticationMode {
    None,
    Basic,
    Oauth2,
}

/// Course-endpoint authentication, carrying the credentials the mode needs.
#[derive(Debug, Clone)]
pub enum CourseAuthentication {
    None,
    Basic {
        username: String,
        password: Secret<String>,
    },
    /// Client-credentials grant against the broker-wide token endpoint.
    OAuth2,
}

impl CourseAuthentication {
    pub fn mode(&self) -> CourseAuthenticationMode {
        match self {
            CourseAuthentication::None => CourseAuthenticationMode::None,
            CourseAuthentication::Basic { .. } => CourseAuthenticationMode::Basic,
            CourseAuthentication::OAuth2 => CourseAuthenticationMode::Oauth2,
        }
    }
}

/// Raw registry record as it appears in the service registry file.
#[derive(Debug, Clone, Deserialize)]
pub struct InstitutionConfig {
    pub schac_home: String,
    pub name: String,
    pub abbreviation: Option<String>,
    pub logo_uri: Option<String>,
    /// Not secured endpoint where the authentication will start
    pub authentication_endpoint: String,
    pub course_endpoint: String,
    pub course_authentication: Option<CourseAuthenticationMode>,
    pub course_authentication_user_name: Option<String>,
    pub course_authentication_password: Option<Secret<String>>,
    /// Secured endpoint where person information about the authenticated user lives
    pub persons_endpoint: String,
    /// Secured endpoint where offering results for a person are posted
    pub results_endpoint: Option<String>,
    pub registration_endpoint: String,
    pub registration_user: String,
    pub registration_password: Secret<String>,
    /// Space separated scopes
    #[serde(default)]
    pub scopes: String,
}

#[derive(Debug, Clone)]
pub struct Institution {
    pub schac_home: String,
    pub name: String,
    pub abbreviation: Option<String>,
    pub logo_uri: Option<String>,
    pub authentication_endpoint: String,
    pub course_endpoint: String,
    pub course_authentication: CourseAuthentication,
    pub persons_endpoint: String,
    pub results_endpoint: Option<String>,
    pub registration_endpoint: String,
    pub registration_user: String,
    pub registration_password: Secret<String>,
    pub scopes: String,
}

impl TryFrom<InstitutionConfig> for Institution {
    type Error = BrokerError;

    fn try_from(config: InstitutionConfig) -> Result<Self, Self::Error> {
        if config.schac_home.trim().is_empty() {
            return Err(BrokerError::Configuration(
                "schac_home is required for every institution".to_string(),
            ));
        }

        let mode = config.course_authentication.ok_or_else(|| {
            BrokerError::Configuration(format!(
                "course_authentication is required for institution {}",
                config.schac_home
            ))
        })?;

        let course_authentication = match mode {
            CourseAuthenticationMode::None => CourseAuthentication::None,
            CourseAuthenticationMode::Oauth2 => CourseAuthentication::OAuth2,
            CourseAuthenticationMode::Basic => {
                match (
                    config.course_authentication_user_name,
                    config.course_authentication_password,
                ) {
                    (Some(username), Some(password)) => {
                        CourseAuthentication::Basic { username, password }
                    }
                    (None, _) => {
                        return Err(BrokerError::Configuration(format!(
                            "course_authentication_user_name is required for BASIC authentication of {}",
                            config.schac_home
                        )));
                    }
                    (_, None) => {
                        return Err(BrokerError::Configuration(format!(
                            "course_authentication_password is required for BASIC authentication of {}",
                            config.schac_home
                        )));
                    }
                }
            }
        };

        Ok(Institution {
            schac_home: config.schac_home,
            name: config.name,
            abbreviation: config.abbreviation,
            logo_uri: config.logo_uri,
            authentication_endpoint: config.authentication_endpoint,
            course_endpoint: config.course_endpoint,
            course_authentication,
            persons_endpoint: config.persons_endpoint,
            results_endpoint: config.results_endpoint,
            registration_endpoint: config.registration_endpoint,
            registration_user: config.registration_user,
            registration_password: config.registration_password,
            scopes: config.scopes,
        })
    }
}

impl Institution {
    pub fn sanitize(&self) -> SanitizedInstitution {
        SanitizedInstitution {
            schac_home: self.schac_home.clone(),
            name: self.name.clone(),
            abbreviation: self.abbreviation.clone(),
            logo_uri: self.logo_uri.clone(),
            course_endpoint: self.course_endpoint.clone(),
            course_authentication: self.course_authentication.mode(),
            scopes: self.scopes.clone(),
        }
    }
}

/// Public view of an institution. Holds no credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedInstitution {
    pub schac_home: String,
    pub name: String,
    pub abbreviation: Option<String>,
    #[serde(rename = "logoURI")]
    pub logo_uri: Option<String>,
    pub course_endpoint: String,
    pub course_authentication: CourseAuthenticationMode,
    pub scopes: String,
}

/// What the GUI needs to start authentication at the home institution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentRequest {
    #[serde(rename = "personURI")]
    pub person_uri: String,
    #[serde(rename = "resultsURI", skip_serializing_if = "Option::is_none")]
    pub results_uri: Option<String>,
    pub scope: String,
}

impl From<&Institution> for EnrollmentRequest {
    fn from(home: &Institution) -> Self {
        Self {
            person_uri: home.persons_endpoint.clone(),
            results_uri: home.results_endpoint.clone(),
            scope: home.scopes.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config(schac_home: &str, mode: CourseAuthenticationMode) -> InstitutionConfig {
    InstitutionConfig {
        schac_home: schac_home.to_string(),
        name: format!("University of {}", schac_home),
        abbreviation: Some("UNI".to_string()),
        logo_uri: Some("https://static.example.org/logo.png".to_string()),
        authentication_endpoint: "http://localhost:9091/authentication".to_string(),
        course_endpoint: "http://localhost:9092/courses".to_string(),
        course_authentication: Some(mode),
        course_authentication_user_name: Some("course-user".to_string()),
        course_authentication_password: Some(Secret::new("course-secret".to_string())),
        persons_endpoint: "http://localhost:9093/persons/me".to_string(),
        results_endpoint: Some("http://localhost:9093/results".to_string()),
        registration_endpoint: "http://localhost:9094/api/start".to_string(),
        registration_user: "registration-user".to_string(),
        registration_password: Secret::new("registration-secret".to_string()),
        scopes: "https://long-term.ooapi".to_string(),
    }
}
