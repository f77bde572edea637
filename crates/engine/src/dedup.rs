//! Tracks base organization memberships granted during one import run.
//!
//! Every organization or space role needs the user to be a plain member of
//! the owning organization first. A user with several roles in one
//! organization only needs that membership once.

use std::collections::HashSet;

use user_migration_types::{OrgGuid, UserGuid};

/// Set of `(user, organization)` memberships granted in this run.
#[derive(Debug, Default)]
pub struct MembershipLedger {
    granted: HashSet<(UserGuid, OrgGuid)>,
}

impl MembershipLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `user` was already made a member of `organization`.
    #[must_use]
    pub fn has_org_membership(&self, user: &UserGuid, organization: &OrgGuid) -> bool {
        self.granted.contains(&(user.clone(), organization.clone()))
    }

    /// Records a successful membership grant.
    pub fn record_org_membership(&mut self, user: &UserGuid, organization: &OrgGuid) {
        self.granted.insert((user.clone(), organization.clone()));
    }

    /// Number of memberships recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.granted.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }
}
