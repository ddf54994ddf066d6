//! Plumbing shared by every backend service: the credential gate, health
//! probes, configuration, registry announcement and server lifecycle.

pub mod config;
pub mod error;
pub mod gate;
pub mod openapi;
pub mod probes;
pub mod startup;
pub mod telemetry;

pub use config::{AnnounceArgs, RegistryArgs, SecretArgs};
pub use error::{ApiError, StartupError};
pub use gate::{Gate, GateRejection, authenticate, bearer_token, require_role};
pub use startup::{Announcement, announce, registration_for, serve, shutdown_signal};
