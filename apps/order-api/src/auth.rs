//! Caller identity.
//!
//! Authentication happens upstream. The gateway injects `x-user-id` and
//! `x-user-role`; this module only reads them and enforces roles.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    /// Unknown or missing roles are treated as customers.
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("admin") => Role::Admin,
            Some("staff") => Role::Staff,
            _ => Role::Customer,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let Some(user_id) = header(USER_ID_HEADER) else {
            warn!(uri = %parts.uri, "Request without user identity");
            return Err(ApiError::Unauthorized);
        };
        let user = CurrentUser {
            user_id: user_id.to_string(),
            role: Role::parse(header(USER_ROLE_HEADER)),
        };

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// A caller allowed to run admin and warehouse operations.
#[derive(Debug, Clone)]
pub struct StaffUser(pub CurrentUser);

impl<S: Send + Sync> FromRequestParts<S> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.role.is_staff() {
            warn!(user_id = %user.user_id, uri = %parts.uri, "Staff route refused");
            return Err(ApiError::Forbidden("Staff or admin role required".to_string()));
        }
        Ok(StaffUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse(Some("admin")), Role::Admin);
        assert_eq!(Role::parse(Some(" Staff ")), Role::Staff);
        assert_eq!(Role::parse(Some("customer")), Role::Customer);
        assert_eq!(Role::parse(Some("root")), Role::Customer);
        assert_eq!(Role::parse(None), Role::Customer);
        assert!(Role::Admin.is_staff());
        assert!(!Role::Customer.is_staff());
    }
}
