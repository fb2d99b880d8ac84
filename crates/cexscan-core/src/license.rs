//! License record, access predicate and change classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::wire::de_opt_timestamp;

/// License type that never grants access.
pub const FREE_LICENSE: &str = "Free";

/// Remaining time below which a license is flagged as expiring.
pub const EXPIRING_SOON_SECS: i64 = 3600;

/// License attached to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "type")]
    pub license_type: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(
        default,
        deserialize_with = "de_opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl License {
    pub fn new(license_type: impl Into<String>, is_active: bool) -> Self {
        Self {
            license_type: license_type.into(),
            is_active,
            expires_at: None,
            extra: Map::new(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.license_type == FREE_LICENSE
    }

    /// Extract a license from a response body.
    ///
    /// Accepts `{"license": {...}}` or a bare object carrying both `type` and
    /// `is_active`. Anything else is malformed and yields `None`.
    pub fn from_response(body: &Value) -> Option<License> {
        let candidate = match body.get("license") {
            Some(inner) if inner.is_object() => inner,
            _ if body.get("type").is_some() && body.get("is_active").is_some() => body,
            _ => return None,
        };
        serde_json::from_value(candidate.clone()).ok()
    }

    /// Seconds until expiry. `None` without an expiry date.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds())
    }

    /// Less than an hour left, but not yet expired.
    pub fn expiring_soon(&self, now: DateTime<Utc>) -> bool {
        matches!(self.remaining_secs(now), Some(secs) if secs > 0 && secs < EXPIRING_SOON_SECS)
    }
}

/// Access decision for the data pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Free license: data is withheld.
    Free,
    /// Paid license that is not active.
    Inactive,
    /// No license known yet.
    Missing,
}

impl Access {
    pub fn of(license: Option<&License>) -> Self {
        match license {
            None => Self::Missing,
            Some(l) if l.is_free() => Self::Free,
            Some(l) if !l.is_active => Self::Inactive,
            Some(_) => Self::Granted,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Free => write!(f, "free account"),
            Self::Inactive => write!(f, "inactive license"),
            Self::Missing => write!(f, "no license"),
        }
    }
}

/// Access is granted iff a license exists, is not Free, and is active.
pub fn has_access(license: Option<&License>) -> bool {
    Access::of(license).is_granted()
}

/// Transition between a cached and a freshly fetched license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseChange {
    /// No license was cached; the new one is adopted without a notification.
    Adopted,
    /// Changed to the Free tier.
    DowngradedToFree,
    Activated,
    Deactivated,
    /// Type changed between paid tiers with the same activity.
    TypeChanged,
}

impl LicenseChange {
    /// Classify the transition, or `None` when neither `type` nor
    /// `is_active` differ.
    pub fn detect(old: Option<&License>, new: &License) -> Option<Self> {
        let Some(old) = old else {
            return Some(Self::Adopted);
        };
        if old.license_type == new.license_type && old.is_active == new.is_active {
            return None;
        }
        Some(if new.is_free() {
            Self::DowngradedToFree
        } else if new.is_active && !old.is_active {
            Self::Activated
        } else if !new.is_active && old.is_active {
            Self::Deactivated
        } else {
            Self::TypeChanged
        })
    }
}

impl fmt::Display for LicenseChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adopted => write!(f, "adopted"),
            Self::DowngradedToFree => write!(f, "downgraded_to_free"),
            Self::Activated => write!(f, "activated"),
            Self::Deactivated => write!(f, "deactivated"),
            Self::TypeChanged => write!(f, "type_changed"),
        }
    }
}
