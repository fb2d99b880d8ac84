//! Identity provider seam.
//!
//! The user id and display name come from outside the process. Providers are
//! re-queried on every bootstrap attempt, so a manual retry picks up an
//! identity that became available in the meantime.

use std::env;

pub const USER_ID_ENV: &str = "CEXSCAN_USER_ID";
pub const USERNAME_ENV: &str = "CEXSCAN_USERNAME";

/// Opaque user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username,
        }
    }
}

/// Source of the current user's identity.
pub trait IdentityProvider: Send + Sync {
    /// `None` when no identity is available.
    fn identity(&self) -> Option<Identity>;
}

/// Identity from configuration, overridable by environment variables.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    user_id: Option<String>,
    username: Option<String>,
}

impl ConfiguredIdentity {
    pub fn new(user_id: Option<String>, username: Option<String>) -> Self {
        Self { user_id, username }
    }
}

impl IdentityProvider for ConfiguredIdentity {
    fn identity(&self) -> Option<Identity> {
        let user_id = env::var(USER_ID_ENV)
            .ok()
            .or_else(|| self.user_id.clone())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())?;
        let username = env::var(USERNAME_ENV)
            .ok()
            .or_else(|| self.username.clone())
            .filter(|name| !name.trim().is_empty());
        Some(Identity::new(user_id, username))
    }
}

/// Fixed identity (tests, `--user-id`).
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Option<Identity>);

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity() {
        let provider = StaticIdentity(Some(Identity::new("42", None)));
        assert_eq!(provider.identity().map(|i| i.user_id), Some("42".to_string()));
        assert!(StaticIdentity(None).identity().is_none());
    }

    #[test]
    fn test_configured_identity_rejects_blank_id() {
        // Only meaningful when the override variable is unset.
        if env::var(USER_ID_ENV).is_ok() {
            return;
        }
        let provider = ConfiguredIdentity::new(Some("  ".to_string()), Some("bob".to_string()));
        assert!(provider.identity().is_none());

        let provider = ConfiguredIdentity::new(Some("7".to_string()), None);
        assert_eq!(provider.identity(), Some(Identity::new("7", None)));
    }
}
