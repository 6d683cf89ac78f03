use crate::config::FeatureToggles;
use crate::error::BrokerError;
use crate::models::{BrokerRequest, SanitizedInstitution};
use crate::services::OfferingResponse;
use crate::AppState;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    response::Redirect,
    Form, Json,
};
use serde_json::Value;
use service_core::error::AppError;
use std::collections::HashMap;
use tower_sessions::Session;

/// Form submit from the course catalog. Hands browser control back to the GUI.
pub async fn broker_request(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<BrokerRequest>, FormRejection>,
) -> Redirect {
    let outcome = match form {
        Ok(Form(request)) => state.broker.validate(&session, request).await,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Undecodable broker request");
            return Redirect::to(&state.redirect_url("error=invalid_request"));
        }
    };

    let query = match outcome {
        Ok(()) => "step=approve".to_string(),
        Err(BrokerError::InvalidRequest(errors)) => {
            tracing::debug!(error = %errors, "Invalid broker request");
            "error=invalid_request".to_string()
        }
        Err(err @ BrokerError::NotFound(_)) => {
            format!("error={}", urlencoding::encode(&err.to_string()))
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to store broker request");
            "error=server_error".to_string()
        }
    };

    Redirect::to(&state.redirect_url(&query))
}

pub async fn features(State(state): State<AppState>) -> Json<FeatureToggles> {
    tracing::debug!("Received request for feature toggles");
    Json(state.features.as_ref().clone())
}

pub async fn offering(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<OfferingResponse>, AppError> {
    let response = state.broker.offering(&session).await?;
    Ok(Json(response))
}

/// Proxy the registration of the enrollment to the home institution.
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<HashMap<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) =
        body.map_err(|rejection| AppError::BadRequest(anyhow::anyhow!(rejection.body_text())))?;
    let correlation = correlation_map(body)?;

    let body = state.broker.start(&session, correlation).await?;
    Ok(Json(body))
}

/// Scalar values are taken as their string form; `null` entries are dropped.
fn correlation_map(body: HashMap<String, Value>) -> Result<HashMap<String, String>, AppError> {
    let mut correlation = HashMap::with_capacity(body.len());
    for (key, value) in body {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Correlation value for {} must be a string, number or boolean",
                    key
                )));
            }
        };
        correlation.insert(key, value);
    }
    Ok(correlation)
}

pub async fn service_registry(State(state): State<AppState>) -> Json<Vec<SanitizedInstitution>> {
    Json(
        state
            .registry
            .institutions()
            .into_iter()
            .map(|institution| institution.sanitize())
            .collect(),
    )
}
