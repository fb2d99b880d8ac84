//! Session bootstrap: resolve identity, fetch or create the user, load
//! reference lists.

use cexscan_api::{ApiClient, ApiResult, UserRecord};
use cexscan_core::ReferenceItem;
use tracing::{info, warn};

use crate::error::{SessionError, SessionResult};
use crate::identity::{Identity, IdentityProvider};

/// Authenticated user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Identity,
    pub user: UserRecord,
    /// The user did not exist and was created during bootstrap.
    pub created: bool,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Display name: identity first, then the stored record.
    pub fn display_name(&self) -> &str {
        self.identity
            .username
            .as_deref()
            .or(self.user.username.as_deref())
            .unwrap_or("user")
    }
}

/// Get the user, creating it when the lookup fails.
///
/// Fails with `AuthenticationRequired` when no identity is available or both
/// lookup and creation fail. A failed `last_active` update is ignored.
pub async fn bootstrap(api: &ApiClient, provider: &dyn IdentityProvider) -> SessionResult<Session> {
    let identity = provider.identity().ok_or(SessionError::NoIdentity)?;
    let user_id = identity.user_id.clone();

    let (user, created) = match api.get_user(&user_id).await {
        Ok(user) => (user, false),
        Err(lookup_err) => {
            info!(user_id = %user_id, error = %lookup_err, "User lookup failed, creating user");
            match api.create_user(&user_id, identity.username.as_deref()).await {
                Ok(user) => (user, true),
                Err(create_err) => {
                    return Err(SessionError::AuthenticationRequired(format!(
                        "lookup failed ({lookup_err}), creation failed ({create_err})"
                    )));
                }
            }
        }
    };

    if let Err(e) = api.update_last_active(&user_id).await {
        warn!(user_id = %user_id, error = %e, "Failed to update last_active");
    }

    info!(
        user_id = %user_id,
        created,
        license = ?user.license.as_ref().map(|l| l.license_type.as_str()),
        "Session established"
    );
    Ok(Session {
        identity,
        user,
        created,
    })
}

/// Active exchanges and coins offered as filter tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    pub exchanges: Vec<ReferenceItem>,
    pub coins: Vec<ReferenceItem>,
}

/// Fetch both lists concurrently; a failed list is empty.
pub async fn load_reference_data(api: &ApiClient) -> ReferenceData {
    let (exchanges, coins) = tokio::join!(api.get_exchanges(), api.get_coins());
    ReferenceData {
        exchanges: active_items(exchanges, "exchanges"),
        coins: active_items(coins, "coins"),
    }
}

fn active_items(result: ApiResult<Vec<ReferenceItem>>, kind: &str) -> Vec<ReferenceItem> {
    match result {
        Ok(items) => items.into_iter().filter(|item| item.is_active).collect(),
        Err(e) => {
            warn!(kind, error = %e, "Failed to load reference list");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use cexscan_api::{HttpMethod, MockReply, MockTransport, RetryConfig, RetryingHttpClient};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MockTransport>, ApiClient) {
        let mock = Arc::new(MockTransport::new());
        let http = Arc::new(RetryingHttpClient::new(
            mock.clone(),
            RetryConfig {
                max_retries: 1,
                max_jitter: Duration::ZERO,
                ..Default::default()
            },
        ));
        (mock.clone(), ApiClient::new("http://mock", http).unwrap())
    }

    fn alice() -> StaticIdentity {
        StaticIdentity(Some(Identity::new("42", Some("alice".to_string()))))
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_user() {
        let (mock, api) = setup();
        mock.on(
            HttpMethod::Get,
            "/users/42",
            MockReply::ok(json!({
                "telegram_id": 42,
                "license": {"type": "Pro", "is_active": true}
            })),
        )
        .on(HttpMethod::Put, "/users/42/last_active", MockReply::ok(json!({"success": true})));

        let session = bootstrap(&api, &alice()).await.unwrap();

        assert!(!session.created);
        assert_eq!(session.user_id(), "42");
        assert_eq!(session.display_name(), "alice");
        assert_eq!(mock.call_count(HttpMethod::Post, "/users/42"), 0);
        assert_eq!(mock.call_count(HttpMethod::Put, "/users/42/last_active"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_user_is_created() {
        let (mock, api) = setup();
        mock.on(HttpMethod::Get, "/users/42", MockReply::status(404))
            .on(
                HttpMethod::Post,
                "/users/42",
                MockReply::ok(json!({
                    "telegram_id": "42",
                    "license": {"type": "Free", "is_active": true}
                })),
            );

        let session = bootstrap(&api, &alice()).await.unwrap();

        assert!(session.created);
        let post = &mock.calls_to(HttpMethod::Post, "/users/42")[0];
        assert!(post.url.ends_with("?username=alice"));
        assert!(session.user.license.unwrap().is_free());
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_failures_require_authentication() {
        let (mock, api) = setup();
        mock.on(HttpMethod::Get, "/users/42", MockReply::status(500))
            .on(HttpMethod::Post, "/users/42", MockReply::status(500));

        let err = bootstrap(&api, &alice()).await.unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationRequired(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_identity() {
        let (_mock, api) = setup();
        let err = bootstrap(&api, &StaticIdentity(None)).await.unwrap_err();
        assert!(matches!(err, SessionError::NoIdentity));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_lists_keep_active_and_tolerate_failure() {
        let (mock, api) = setup();
        mock.on(
            HttpMethod::Get,
            "/exchanges",
            MockReply::ok(json!([
                {"symbol": "binance", "is_active": true},
                {"symbol": "defunct", "is_active": false}
            ])),
        )
        .on(HttpMethod::Get, "/coins", MockReply::status(500));

        let data = load_reference_data(&api).await;

        assert_eq!(data.exchanges.len(), 1);
        assert_eq!(data.exchanges[0].symbol, "binance");
        assert!(data.coins.is_empty());
    }
}
