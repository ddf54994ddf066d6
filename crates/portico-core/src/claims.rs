use serde::{Deserialize, Serialize};

use crate::role::Role;
use crate::time::Clock;

/// Lifetime of a credential issued by an interactive login.
pub const INTERACTIVE_TTL_SECS: i64 = 24 * 60 * 60;

/// Lifetime of the health-checker credential. The checker has no refresh
/// path, so a leaked system credential stays valid for this whole period.
pub const SYSTEM_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Subject name carried by the health-checker credential.
pub const HEALTH_CHECKER: &str = "health_checker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuerScope {
    /// Issued to an end user by the identity service.
    User,
    /// Issued by a service to itself, e.g. for its registry health check.
    System,
}

/// Signed claims bundle. Flat on the wire: every field is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id (user primary key, or the system principal name).
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub scope: IssuerScope,
}

impl Claims {
    /// Claims for an end user, valid for `ttl_secs` from now. A negative
    /// ttl produces claims that are already expired.
    pub fn for_user(
        subject_id: impl ToString,
        username: impl Into<String>,
        role: Role,
        ttl_secs: i64,
        clock: &dyn Clock,
    ) -> Self {
        let iat = clock.now_secs();
        Self {
            sub: subject_id.to_string(),
            username: username.into(),
            role,
            iat,
            exp: iat.saturating_add(ttl_secs),
            scope: IssuerScope::User,
        }
    }

    /// Long-lived claims for the registry health checker.
    pub fn for_system(principal: impl Into<String>, ttl_secs: i64, clock: &dyn Clock) -> Self {
        let principal = principal.into();
        let iat = clock.now_secs();
        Self {
            sub: principal.clone(),
            username: principal,
            role: Role::System,
            iat,
            exp: iat.saturating_add(ttl_secs),
            scope: IssuerScope::System,
        }
    }

    /// Numeric subject id for user credentials.
    pub fn user_id(&self) -> Option<i64> {
        match self.scope {
            IssuerScope::User => self.sub.parse().ok(),
            IssuerScope::System => None,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
