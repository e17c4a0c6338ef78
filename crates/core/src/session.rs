//! Request-scoped user identity, supplied by the external auth service.

use serde::{Deserialize, Serialize};
use crate::id::UserId;

/// The current user, passed explicitly to every operation that stamps
/// identity (timers, assignees). There is no ambient "current user"
/// singleton anywhere in Trellis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Auth-service id
    pub user_id: UserId,

    /// Display name
    pub name: String,

    /// Email address
    pub email: String,
}

impl UserContext {
    /// Build a context from auth-service fields.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: UserId::new(user_id),
            name: name.into(),
            email: email.into(),
        }
    }
}
