use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller role carried in every credential.
///
/// The set is closed: anything that is not one of the named roles decodes
/// into [`Role::Unrecognized`] so that a correctly signed token with a
/// foreign role still verifies, and is then denied by [`permits`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Editor,
    Admin,
    /// Health-checker identity. Recognised, but grants no business access.
    System,
    Unrecognized(String),
}

impl Role {
    /// Every named role, weakest first.
    pub const NAMED: [Role; 4] = [Role::User, Role::Editor, Role::Admin, Role::System];

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "USER",
            Role::Editor => "EDITOR",
            Role::Admin => "ADMIN",
            Role::System => "SYSTEM",
            Role::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        match raw {
            "USER" => Role::User,
            "EDITOR" => Role::Editor,
            "ADMIN" => Role::Admin,
            "SYSTEM" => Role::System,
            other => Role::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::from(raw.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Unrecognized(raw) => raw,
            named => named.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether `caller` may use a route that requires `required`.
///
/// This is a lookup table. A new role grants nothing until it is given a
/// row here.
pub fn permits(caller: &Role, required: &Role) -> bool {
    match caller {
        Role::Admin => matches!(required, Role::User | Role::Editor | Role::Admin),
        Role::Editor => matches!(required, Role::User | Role::Editor),
        Role::User => matches!(required, Role::User),
        Role::System | Role::Unrecognized(_) => false,
    }
}
