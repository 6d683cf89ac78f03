//! Per-browser-session storage for the broker workflow.
//!
//! The hosting layer owns the actual store (cookie-keyed, see `startup`);
//! the workflow only sees the [`SessionStore`] seam and the typed
//! [`SessionContext`] on top of it.

use crate::error::BrokerError;
use crate::models::{BrokerRequest, Offering};
use async_trait::async_trait;
use serde_json::Value;

pub const BROKER_REQUEST_SESSION_KEY: &str = "broker_request";
pub const OFFERING_SESSION_KEY: &str = "offering";

/// Key-value store scoped to a single browser session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, BrokerError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), BrokerError>;

    async fn remove(&self, key: &str) -> Result<(), BrokerError>;

    /// Drop every value and the session itself.
    async fn invalidate(&self) -> Result<(), BrokerError>;
}

#[async_trait]
impl SessionStore for tower_sessions::Session {
    async fn get(&self, key: &str) -> Result<Option<Value>, BrokerError> {
        self.get_value(key)
            .await
            .map_err(|e| BrokerError::Session(e.to_string()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BrokerError> {
        self.insert_value(key, value)
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Session(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), BrokerError> {
        self.remove_value(key)
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Session(e.to_string()))
    }

    async fn invalidate(&self) -> Result<(), BrokerError> {
        self.flush()
            .await
            .map_err(|e| BrokerError::Session(e.to_string()))
    }
}

/// Where a broker session currently stands, with the state that phase owns.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerPhase {
    Start,
    Validated(BrokerRequest),
    Offered {
        request: BrokerRequest,
        offering: Offering,
    },
}

/// Snapshot of everything the workflow keeps in the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub request: Option<BrokerRequest>,
    pub offering: Option<Offering>,
}

impl SessionState {
    pub fn into_phase(self) -> BrokerPhase {
        match (self.request, self.offering) {
            (Some(request), Some(offering)) => BrokerPhase::Offered { request, offering },
            (Some(request), None) => BrokerPhase::Validated(request),
            // An offering without a request is a stale leftover.
            (None, _) => BrokerPhase::Start,
        }
    }
}

/// Typed access to the broker's session attributes.
pub struct SessionContext<'a, S: SessionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SessionStore + ?Sized> SessionContext<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn state(&self) -> Result<SessionState, BrokerError> {
        Ok(SessionState {
            request: self.read(BROKER_REQUEST_SESSION_KEY).await?,
            offering: self.read(OFFERING_SESSION_KEY).await?,
        })
    }

    pub async fn request(&self) -> Result<BrokerRequest, BrokerError> {
        self.read(BROKER_REQUEST_SESSION_KEY)
            .await?
            .ok_or(BrokerError::MissingSessionState("broker request"))
    }

    /// Replaces any previous workflow state; a new request starts over.
    pub async fn begin(&self, request: &BrokerRequest) -> Result<(), BrokerError> {
        self.write(BROKER_REQUEST_SESSION_KEY, request).await?;
        self.store.remove(OFFERING_SESSION_KEY).await
    }

    pub async fn set_offering(&self, offering: &Offering) -> Result<(), BrokerError> {
        self.write(OFFERING_SESSION_KEY, offering).await
    }

    pub async fn invalidate(&self) -> Result<(), BrokerError> {
        self.store.invalidate().await
    }

    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, BrokerError> {
        match self.store.get(key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| BrokerError::Session(format!("corrupt {} attribute: {}", key, e))),
        }
    }

    async fn write<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), BrokerError> {
        let value =
            serde_json::to_value(value).map_err(|e| BrokerError::Session(e.to_string()))?;
        self.store.set(key, value).await
    }
}
