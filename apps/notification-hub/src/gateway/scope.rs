//! Tenant scope attached to a connection at handshake time.

use notify_common::Role;
use serde::Deserialize;

/// Query parameters accepted by `GET /ws`.
///
/// Trusted as-is: the upstream gateway has already authenticated the caller.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub role: Option<String>,
    pub organization_id: Option<String>,
    pub branch_id: Option<String>,
}

/// The (role, organization, branch) triple that decides what a session sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    pub role: Role,
    pub organization_id: Option<String>,
    pub branch_id: Option<String>,
}

impl Scope {
    pub fn new(role: Role, organization_id: Option<&str>, branch_id: Option<&str>) -> Self {
        Self {
            role,
            organization_id: non_empty(organization_id),
            branch_id: non_empty(branch_id),
        }
    }

    /// Build a scope from handshake parameters. A missing or unknown role
    /// falls back to the guest tier.
    pub fn from_params(params: &ConnectParams) -> Self {
        let role = match params.role.as_deref().map(str::trim) {
            None | Some("") => Role::Guest,
            Some(raw) => Role::parse(raw).unwrap_or_else(|| {
                tracing::debug!(role = %raw, "unknown role, treating as guest");
                Role::Guest
            }),
        };
        Self::new(
            role,
            params.organization_id.as_deref(),
            params.branch_id.as_deref(),
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}
