//! Typed client for the cexscan backend REST API.
//!
//! Every call goes through `RetryingHttpClient`; response bodies are
//! normalized (MongoDB extended JSON unwrapped) before any typed decoding.
//! A body carrying `success: false`, or an `error` without `success: true`,
//! is a recoverable `ApiError::Rejected`.

use cexscan_core::{normalize, License, PinnedPair, ReferenceItem, TradingPair, UserSettings};
use cexscan_telemetry::Metrics;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::retry::RetryingHttpClient;
use crate::transport::{ApiRequest, HttpMethod};

/// Username sent when the identity provider has none.
pub const DEFAULT_USERNAME: &str = "unknown";

/// User document with embedded license and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub license: Option<License>,
    pub settings: UserSettings,
}

#[derive(Deserialize)]
struct RawUserIds {
    #[serde(default, alias = "telegram_id", deserialize_with = "de_opt_id")]
    user_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl UserRecord {
    /// Decode `{user: {...}}` or a bare user object.
    pub fn from_response(body: &Value) -> ApiResult<Self> {
        let user = match body.get("user") {
            Some(inner) if inner.is_object() => inner,
            _ => body,
        };
        if !user.is_object() {
            return Err(ApiError::Malformed("user record is not an object".to_string()));
        }
        let ids: RawUserIds = serde_json::from_value(user.clone())
            .map_err(|e| ApiError::Malformed(format!("user record: {e}")))?;
        let license = user
            .get("license")
            .filter(|l| l.is_object())
            .and_then(|l| match serde_json::from_value::<License>(l.clone()) {
                Ok(license) => Some(license),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed embedded license");
                    None
                }
            });
        let settings = user
            .get("settings")
            .cloned()
            .map(UserSettings::from_value)
            .unwrap_or_default();
        Ok(Self {
            user_id: ids.user_id,
            username: ids.username,
            license,
            settings,
        })
    }
}

/// Result of `GET /pairs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairsResponse {
    pub active_pairs: Vec<TradingPair>,
    pub pinned_pairs: Vec<PinnedPair>,
    /// Entries dropped because they failed to decode.
    pub skipped: usize,
}

impl PairsResponse {
    pub fn from_response(body: &Value) -> ApiResult<Self> {
        let items = body
            .get("active_pairs")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::Malformed("missing active_pairs".to_string()))?;
        let (active_pairs, skipped) = decode_items::<TradingPair>(items, "pair");
        let pinned_pairs = body
            .get("pinned_pairs")
            .and_then(Value::as_array)
            .map(|items| decode_items::<PinnedPair>(items, "pin").0)
            .unwrap_or_default();
        Ok(Self {
            active_pairs,
            pinned_pairs,
            skipped,
        })
    }
}

/// Decode each element independently, skipping failures.
fn decode_items<T: serde::de::DeserializeOwned>(items: &[Value], kind: &str) -> (Vec<T>, usize) {
    let mut out = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (idx, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(decoded) => out.push(decoded),
            Err(e) => {
                warn!(idx, kind, error = %e, "Skipping malformed entry");
                skipped += 1;
            }
        }
    }
    (out, skipped)
}

/// Outcome of a settings write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsWriteOutcome {
    /// Server confirmed with `success: true`.
    Persisted,
    /// Skipped because the endpoint is cooling down; treated as success so
    /// the UI keeps the change.
    LocalOnly,
    /// Server answered without success.
    Rejected(String),
    /// Every attempt failed.
    Failed(String),
}

impl SettingsWriteOutcome {
    /// Whether the caller should adopt the sent settings locally.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SettingsWriteOutcome::Persisted | SettingsWriteOutcome::LocalOnly
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsWriteOutcome::Persisted => "persisted",
            SettingsWriteOutcome::LocalOnly => "local_only",
            SettingsWriteOutcome::Rejected(_) => "rejected",
            SettingsWriteOutcome::Failed(_) => "failed",
        }
    }
}

/// REST client for the backend.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<RetryingHttpClient>,
    base_url: reqwest::Url,
}

impl ApiClient {
    pub fn new(base_url: &str, http: Arc<RetryingHttpClient>) -> ApiResult<Self> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    pub fn http(&self) -> &Arc<RetryingHttpClient> {
        &self.http
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> ApiResult<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.to_string())
    }

    async fn call(&self, request: ApiRequest) -> ApiResult<Value> {
        let body = normalize(self.http.request(request).await?);
        check_envelope(&body)?;
        Ok(body)
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// `GET /users/{id}`
    pub async fn get_user(&self, user_id: &str) -> ApiResult<UserRecord> {
        let url = self.url(&["users", user_id], &[])?;
        let body = self.call(ApiRequest::get(url)).await?;
        UserRecord::from_response(&body)
    }

    /// `POST /users/{id}?username=`
    pub async fn create_user(
        &self,
        user_id: &str,
        username: Option<&str>,
    ) -> ApiResult<UserRecord> {
        let username = username.filter(|u| !u.is_empty()).unwrap_or(DEFAULT_USERNAME);
        let url = self.url(&["users", user_id], &[("username", username)])?;
        info!(user_id, username, "Creating user");
        let body = self.call(ApiRequest::new(HttpMethod::Post, url)).await?;
        UserRecord::from_response(&body)
    }

    /// `PUT /users/{id}/last_active`
    pub async fn update_last_active(&self, user_id: &str) -> ApiResult<()> {
        let url = self.url(&["users", user_id, "last_active"], &[])?;
        self.call(ApiRequest::new(HttpMethod::Put, url)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // License
    // ------------------------------------------------------------------------

    /// `GET /users/{id}/license`
    ///
    /// Accepts `{license: {...}}` or a bare license object; anything else is
    /// `ApiError::Malformed`.
    pub async fn get_license(&self, user_id: &str) -> ApiResult<License> {
        let url = self.url(&["users", user_id, "license"], &[])?;
        let body = self.call(ApiRequest::get(url)).await?;
        License::from_response(&body)
            .ok_or_else(|| ApiError::Malformed("response carries no license".to_string()))
    }

    /// `PUT /users/{id}/license`
    pub async fn update_license(&self, user_id: &str, license: &License) -> ApiResult<()> {
        let url = self.url(&["users", user_id, "license"], &[])?;
        let body = serde_json::to_value(license)
            .map_err(|e| ApiError::Malformed(format!("license encode: {e}")))?;
        self.call(ApiRequest::new(HttpMethod::Put, url).with_body(body))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    /// `GET /users/{id}/settings`
    pub async fn get_settings(&self, user_id: &str) -> ApiResult<UserSettings> {
        let url = self.url(&["users", user_id, "settings"], &[])?;
        let body = self.call(ApiRequest::get(url)).await?;
        let settings = match body.get("settings") {
            Some(inner) => inner.clone(),
            None => body,
        };
        Ok(UserSettings::from_value(settings))
    }

    /// `PUT /users/{id}/settings` with the full settings object.
    ///
    /// Never fails: a cooling-down endpoint yields `LocalOnly`, a
    /// non-success answer `Rejected`, and exhausted retries `Failed`.
    pub async fn update_settings(
        &self,
        user_id: &str,
        settings: &UserSettings,
    ) -> SettingsWriteOutcome {
        let outcome = self.write_settings(user_id, settings).await;
        Metrics::settings_write(outcome.as_str());
        outcome
    }

    async fn write_settings(&self, user_id: &str, settings: &UserSettings) -> SettingsWriteOutcome {
        let url = match self.url(&["users", user_id, "settings"], &[]) {
            Ok(url) => url,
            Err(e) => return SettingsWriteOutcome::Rejected(e.to_string()),
        };
        let request = ApiRequest::new(HttpMethod::Put, url);
        if self.http.is_cooling_down(&request.endpoint()) {
            warn!(user_id, "Settings update kept local, endpoint cooling down");
            return SettingsWriteOutcome::LocalOnly;
        }
        let body = match serde_json::to_value(settings) {
            Ok(body) => body,
            Err(e) => return SettingsWriteOutcome::Rejected(format!("settings encode: {e}")),
        };

        match self.call(request.with_body(body)).await {
            Ok(resp) if resp.get("success").and_then(Value::as_bool) == Some(true) => {
                debug!(user_id, "Settings persisted");
                SettingsWriteOutcome::Persisted
            }
            Ok(_) => SettingsWriteOutcome::Rejected("response without success flag".to_string()),
            Err(ApiError::Rejected(reason)) => SettingsWriteOutcome::Rejected(reason),
            Err(e) if e.is_cooling_down() => {
                warn!(user_id, "Settings update kept local, endpoint cooling down");
                SettingsWriteOutcome::LocalOnly
            }
            Err(e) => {
                warn!(user_id, error = %e, "Settings update failed");
                SettingsWriteOutcome::Failed(e.to_string())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    /// `GET /users/{id}/notifications`
    pub async fn get_notifications(&self, user_id: &str) -> ApiResult<Vec<Value>> {
        let url = self.url(&["users", user_id, "notifications"], &[])?;
        let body = self.call(ApiRequest::get(url)).await?;
        Ok(list_payload(body, "notifications"))
    }

    /// `PUT /users/{id}/notifications`
    pub async fn update_notifications(
        &self,
        user_id: &str,
        notifications: &Value,
    ) -> ApiResult<Value> {
        let url = self.url(&["users", user_id, "notifications"], &[])?;
        self.call(ApiRequest::new(HttpMethod::Put, url).with_body(notifications.clone()))
            .await
    }

    /// `GET /users/{id}/notification_settings`
    pub async fn get_notification_settings(&self, user_id: &str) -> ApiResult<Value> {
        let url = self.url(&["users", user_id, "notification_settings"], &[])?;
        let body = self.call(ApiRequest::get(url)).await?;
        Ok(body
            .get("notification_settings")
            .or_else(|| body.get("settings"))
            .cloned()
            .unwrap_or(body))
    }

    /// `PUT /users/{id}/notification_settings`
    pub async fn update_notification_settings(
        &self,
        user_id: &str,
        settings: &Value,
    ) -> ApiResult<Value> {
        let url = self.url(&["users", user_id, "notification_settings"], &[])?;
        self.call(ApiRequest::new(HttpMethod::Put, url).with_body(settings.clone()))
            .await
    }

    // ------------------------------------------------------------------------
    // Reference data and pairs
    // ------------------------------------------------------------------------

    /// `GET /exchanges`
    pub async fn get_exchanges(&self) -> ApiResult<Vec<ReferenceItem>> {
        self.reference_list("exchanges").await
    }

    /// `GET /coins`
    pub async fn get_coins(&self) -> ApiResult<Vec<ReferenceItem>> {
        self.reference_list("coins").await
    }

    async fn reference_list(&self, resource: &str) -> ApiResult<Vec<ReferenceItem>> {
        let url = self.url(&[resource], &[])?;
        let body = self.call(ApiRequest::get(url)).await?;
        let items = list_payload(body, resource);
        Ok(decode_items::<ReferenceItem>(&items, resource).0)
    }

    /// `GET /pairs?user_id=`
    pub async fn get_pairs(&self, user_id: Option<&str>) -> ApiResult<PairsResponse> {
        let url = match user_id {
            Some(id) => self.url(&["pairs"], &[("user_id", id)])?,
            None => self.url(&["pairs"], &[])?,
        };
        let body = self.call(ApiRequest::get(url)).await?;
        let pairs = PairsResponse::from_response(&body)?;
        debug!(
            active = pairs.active_pairs.len(),
            pinned = pairs.pinned_pairs.len(),
            skipped = pairs.skipped,
            "Pairs fetched"
        );
        Ok(pairs)
    }

    /// `POST /pairs/{id}/pin?user_id=`
    pub async fn pin_pair(&self, pair_id: &str, user_id: &str) -> ApiResult<()> {
        let url = self.url(&["pairs", pair_id, "pin"], &[("user_id", user_id)])?;
        self.call(ApiRequest::new(HttpMethod::Post, url)).await?;
        Ok(())
    }

    /// `DELETE /pairs/{id}/pin?user_id=`
    pub async fn unpin_pair(&self, pair_id: &str, user_id: &str) -> ApiResult<()> {
        let url = self.url(&["pairs", pair_id, "pin"], &[("user_id", user_id)])?;
        self.call(ApiRequest::new(HttpMethod::Delete, url)).await?;
        Ok(())
    }
}

/// Reject bodies that report failure.
fn check_envelope(body: &Value) -> ApiResult<()> {
    let success = body.get("success").and_then(Value::as_bool);
    let error = body.get("error");
    if success == Some(false) || (success != Some(true) && error.is_some()) {
        let reason = match error {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request rejected")
                .to_string(),
        };
        return Err(ApiError::Rejected(reason));
    }
    Ok(())
}

/// A bare array, or the array under `key`.
fn list_payload(body: Value, key: &str) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
