//! User session for the cexscan client.
//!
//! - `bootstrap`: identity → get-or-create user → last_active
//! - `LicenseGate`: throttled license polling, change detection, access
//! - `SettingsSync`: merged, optionally debounced settings writes
//! - `KeyedTasks`: cancellable scheduled tasks keyed by name

pub mod bootstrap;
pub mod error;
pub mod identity;
pub mod license;
pub mod scheduler;
pub mod settings;

pub use bootstrap::{bootstrap, load_reference_data, ReferenceData, Session};
pub use error::{SessionError, SessionResult};
pub use identity::{ConfiguredIdentity, Identity, IdentityProvider, StaticIdentity};
pub use license::{LicenseGate, LicenseGateConfig, LicenseSource, LicenseUpdate};
pub use scheduler::KeyedTasks;
pub use settings::SettingsSync;
