use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalog document for the requested course, kept verbatim between the
/// offering fetch and the registration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Offering(pub Value);

impl Offering {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
