//! RBAC connectors guarding the admin surface.

use async_trait::async_trait;
use retention_core::{Error, Result};
use secrecy::{ExposeSecret, Secret};

/// Roles resolved for a bearer token.
#[derive(Debug, Clone, Default)]
pub struct UserRoles {
    /// User identifier.
    pub user_id: String,
    /// List of role names assigned to the user.
    pub roles: Vec<String>,
    /// Whether the user may trigger retention runs.
    pub is_admin: bool,
}

/// Connector for validating bearer tokens.
#[async_trait]
pub trait RbacConnector: Send + Sync {
    /// Validate a token and return the caller's roles.
    async fn validate(&self, token: &str) -> Result<UserRoles>;
}

/// A connector that treats the literal token `admin` as an administrator
/// and anything else as a regular user (for testing/development).
pub struct NoOpRbacConnector;

#[async_trait]
impl RbacConnector for NoOpRbacConnector {
    async fn validate(&self, token: &str) -> Result<UserRoles> {
        let is_admin = token == "admin";
        Ok(UserRoles {
            user_id: if is_admin { "admin" } else { "anonymous" }.to_string(),
            roles: if is_admin {
                vec!["admin".to_string()]
            } else {
                vec!["user".to_string()]
            },
            is_admin,
        })
    }
}

/// A connector accepting exactly one configured admin token.
pub struct StaticTokenRbacConnector {
    token: Secret<String>,
}

impl StaticTokenRbacConnector {
    pub fn new(token: Secret<String>) -> Self {
        Self { token }
    }
}

/// Byte comparison that does not short-circuit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

#[async_trait]
impl RbacConnector for StaticTokenRbacConnector {
    async fn validate(&self, token: &str) -> Result<UserRoles> {
        if constant_time_eq(token.as_bytes(), self.token.expose_secret().as_bytes()) {
            Ok(UserRoles {
                user_id: "admin".to_string(),
                roles: vec!["admin".to_string()],
                is_admin: true,
            })
        } else {
            Err(Error::Unauthorized("invalid admin token".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let rbac = StaticTokenRbacConnector::new(Secret::new("s3cret".to_string()));
        assert!(rbac.validate("s3cret").await.unwrap().is_admin);
        assert!(rbac.validate("s3cre").await.is_err());
        assert!(rbac.validate("s3cret!").await.is_err());
        assert!(rbac.validate("").await.is_err());
    }

    #[tokio::test]
    async fn test_noop_connector() {
        assert!(NoOpRbacConnector.validate("admin").await.unwrap().is_admin);
        assert!(!NoOpRbacConnector.validate("someone").await.unwrap().is_admin);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
