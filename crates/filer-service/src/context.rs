//! Request context carrying the acting user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use filer_core::types::UserId;
use filer_entity::user::Actor;

/// Context for the current operation.
///
/// Passed into service methods so that every operation knows *who* is
/// acting. Log lines carry the request id for correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The acting user with flags and group memberships.
    pub actor: Actor,
    /// Correlation id for log lines.
    pub request_id: Uuid,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context for `actor`.
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            request_id: Uuid::now_v7(),
            request_time: Utc::now(),
        }
    }

    /// The acting user's ID.
    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    /// Returns whether the current user bypasses folder permissions.
    pub fn is_superuser(&self) -> bool {
        self.actor.is_superuser
    }
}
