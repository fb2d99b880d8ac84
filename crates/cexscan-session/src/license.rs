//! License gate.
//!
//! Throttled license polling with an in-progress guard and exponential
//! backoff on failure, plus change detection against the cached license.
//! The access predicate decides whether the data pipeline may hold pairs.

use cexscan_api::{ApiClient, ApiResult, BoxFuture};
use cexscan_core::{Access, License, LicenseChange};
use cexscan_telemetry::Metrics;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where license records come from.
pub trait LicenseSource: Send + Sync {
    fn fetch_license<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, ApiResult<License>>;
}

impl LicenseSource for ApiClient {
    fn fetch_license<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, ApiResult<License>> {
        Box::pin(self.get_license(user_id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LicenseGateConfig {
    /// Minimum spacing between checks after a success.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Timeout for one license fetch.
    pub check_timeout: Duration,
}

impl Default for LicenseGateConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(60_000),
            max_delay: Duration::from_millis(900_000),
            check_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug)]
struct CheckStatus {
    in_progress: bool,
    last_check: Option<Instant>,
    error_count: u32,
    next_check_delay: Duration,
}

/// Result of applying a fetched license to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseUpdate {
    pub change: LicenseChange,
    pub license: License,
    pub access_before: Access,
    pub access_after: Access,
}

impl LicenseUpdate {
    pub fn access_lost(&self) -> bool {
        self.access_before.is_granted() && !self.access_after.is_granted()
    }

    pub fn access_gained(&self) -> bool {
        !self.access_before.is_granted() && self.access_after.is_granted()
    }
}

/// Clears the in-progress flag when a check ends, including on cancellation.
struct InProgressGuard<'a> {
    gate: &'a LicenseGate,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.gate.status.lock().in_progress = false;
    }
}

pub struct LicenseGate {
    config: LicenseGateConfig,
    status: Mutex<CheckStatus>,
    cached: Mutex<Option<License>>,
}

impl LicenseGate {
    pub fn new(config: LicenseGateConfig) -> Self {
        let next_check_delay = config.initial_delay;
        Self {
            config,
            status: Mutex::new(CheckStatus {
                in_progress: false,
                last_check: None,
                error_count: 0,
                next_check_delay,
            }),
            cached: Mutex::new(None),
        }
    }

    /// Throttled license fetch.
    ///
    /// Returns `None` without any network call while another check is in
    /// progress or before `next_check_delay` has elapsed since the last one.
    /// Also `None` when the fetch fails or times out; the delay then doubles
    /// up to the ceiling and the cached license is left alone.
    pub async fn check_license(
        &self,
        source: &dyn LicenseSource,
        user_id: &str,
    ) -> Option<License> {
        let _guard = {
            let mut status = self.status.lock();
            if status.in_progress {
                debug!("License check already in progress");
                Metrics::license_check("skipped");
                return None;
            }
            let now = Instant::now();
            if let Some(last) = status.last_check {
                if now.duration_since(last) < status.next_check_delay {
                    Metrics::license_check("skipped");
                    return None;
                }
            }
            status.in_progress = true;
            status.last_check = Some(now);
            InProgressGuard { gate: self }
        };

        let result =
            tokio::time::timeout(self.config.check_timeout, source.fetch_license(user_id)).await;

        let mut status = self.status.lock();
        match result {
            Ok(Ok(license)) => {
                status.error_count = 0;
                status.next_check_delay = self.config.initial_delay;
                Metrics::license_check("ok");
                Some(license)
            }
            Ok(Err(e)) => {
                self.register_failure(&mut status, &e.to_string());
                None
            }
            Err(_) => {
                self.register_failure(&mut status, "timed out");
                None
            }
        }
    }

    fn register_failure(&self, status: &mut CheckStatus, reason: &str) {
        status.error_count += 1;
        let exponent = (status.error_count - 1).min(16);
        status.next_check_delay = self
            .config
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_delay);
        Metrics::license_check("failed");
        warn!(
            error = %reason,
            error_count = status.error_count,
            next_check_ms = status.next_check_delay.as_millis() as u64,
            "License check failed"
        );
    }

    /// Compare `license` with the cache and adopt it if `type` or
    /// `is_active` changed. `None` when nothing changed.
    pub fn observe(&self, license: License) -> Option<LicenseUpdate> {
        let mut cached = self.cached.lock();
        let change = LicenseChange::detect(cached.as_ref(), &license)?;
        let access_before = Access::of(cached.as_ref());
        let access_after = Access::of(Some(&license));
        *cached = Some(license.clone());
        info!(
            %change,
            license_type = %license.license_type,
            is_active = license.is_active,
            %access_after,
            "License changed"
        );
        Some(LicenseUpdate {
            change,
            license,
            access_before,
            access_after,
        })
    }

    /// Throttled check followed by change detection.
    pub async fn poll(&self, source: &dyn LicenseSource, user_id: &str) -> Option<LicenseUpdate> {
        let license = self.check_license(source, user_id).await?;
        self.observe(license)
    }

    /// Replace the cached license without change detection (bootstrap).
    pub fn adopt(&self, license: Option<License>) {
        *self.cached.lock() = license;
    }

    pub fn license(&self) -> Option<License> {
        self.cached.lock().clone()
    }

    pub fn access(&self) -> Access {
        Access::of(self.cached.lock().as_ref())
    }

    pub fn has_access(&self) -> bool {
        self.access().is_granted()
    }

    pub fn next_check_delay(&self) -> Duration {
        self.status.lock().next_check_delay
    }

    pub fn error_count(&self) -> u32 {
        self.status.lock().error_count
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.lock().in_progress
    }

    /// Forget failures (connectivity restored). The next check is allowed
    /// once the initial delay has passed since the last one.
    pub fn reset_backoff(&self) {
        let mut status = self.status.lock();
        status.error_count = 0;
        status.next_check_delay = self.config.initial_delay;
    }
}
