use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// One cross-institution enrollment intent, as posted by the course catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BrokerRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "homeInstitutionSchacHome is required"))]
    pub home_institution_schac_home: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "guestInstitutionSchacHome is required"))]
    pub guest_institution_schac_home: String,

    #[serde(default, rename = "offeringID", deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "offeringID is required"))]
    pub offering_id: String,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

impl BrokerRequest {
    pub fn new(home: &str, guest: &str, offering_id: &str) -> Self {
        Self {
            home_institution_schac_home: home.to_string(),
            guest_institution_schac_home: guest.to_string(),
            offering_id: offering_id.to_string(),
        }
    }
}
