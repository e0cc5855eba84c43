//! Tenant visibility rules for fan-out.

use notify_common::Role;

use super::events::Event;
use super::scope::Scope;

/// Decide whether `event` should be offered to a session with `scope`.
///
/// - Admins see everything.
/// - Managers see their organization's events and org-less events. A manager
///   without an organization therefore still sees every org-less event.
/// - Everyone else sees their branch's events and branch-less events, and only
///   if they have a branch at all.
pub fn should_deliver(event: &Event, scope: &Scope) -> bool {
    match scope.role {
        Role::Admin => true,
        Role::Manager => match event.organization_id.as_deref() {
            None => true,
            Some(org) => scope.organization_id.as_deref() == Some(org),
        },
        Role::Cashier | Role::Guest => match scope.branch_id.as_deref() {
            None => false,
            Some(branch) => event
                .branch_id
                .as_deref()
                .map_or(true, |event_branch| event_branch == branch),
        },
    }
}
