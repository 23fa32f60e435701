use crate::error::{DispatchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single pending GET request.
///
/// Everything except `response_payload` is fixed at creation. The payload moves
/// from `None` to `Some` exactly once, after a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    id: Uuid,
    url: String,
    created_at: DateTime<Utc>,
    response_payload: Option<String>,
}

impl WorkItem {
    /// Create a new item with a fresh id stamped with the current time
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), url, Utc::now())
    }

    #[must_use]
    pub fn with_id(id: Uuid, url: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url: url.into(),
            created_at,
            response_payload: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn response_payload(&self) -> Option<&str> {
        self.response_payload.as_deref()
    }

    /// Whether the item carries a url worth dispatching
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidItem`] if the url is empty or whitespace.
    pub fn ensure_dispatchable(&self) -> Result<()> {
        if self.is_dispatchable() {
            Ok(())
        } else {
            Err(DispatchError::InvalidItem)
        }
    }

    /// Attach the body of a successful response
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PayloadAlreadySet`] if a payload was attached before.
    pub fn attach_payload(&mut self, body: String) -> Result<()> {
        if self.response_payload.is_some() {
            return Err(DispatchError::PayloadAlreadySet(self.id));
        }
        self.response_payload = Some(body);
        Ok(())
    }
}
