//! Tenant roles shared by every service that scopes data by organization/branch.

use std::fmt;

/// Role of a caller within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Admin,
    Manager,
    Cashier,
    /// Unscoped tier used when no role is supplied.
    #[default]
    Guest,
}

impl Role {
    /// Parse a role name, ignoring ASCII case and surrounding whitespace.
    ///
    /// Returns `None` for unknown names so callers can decide how to degrade.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("ADMIN") {
            Some(Role::Admin)
        } else if raw.eq_ignore_ascii_case("MANAGER") {
            Some(Role::Manager)
        } else if raw.eq_ignore_ascii_case("CASHIER") {
            Some(Role::Cashier)
        } else if raw.eq_ignore_ascii_case("GUEST") {
            Some(Role::Guest)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Cashier => "CASHIER",
            Role::Guest => "GUEST",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
