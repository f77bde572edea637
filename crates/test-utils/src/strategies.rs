//! Proptest strategies for migration domain types.
//!
//! # Usage
//!
//! ```no_run
//! use proptest::prelude::*;
//! use user_migration_test_utils::strategies;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(summary in strategies::arb_summary()) {
//!         // test invariant with a randomly generated summary
//!     }
//! }
//! ```

use proptest::prelude::*;
use user_migration_types::{
    EmailRecord, MigrationSnapshot, OrgEntity, OrgResource, OrgRole, OrgRoleKind, Resource,
    ResourceMetadata, SpaceEntity, SpaceResource, SpaceRole, SpaceRoleKind, UserMigrationRecord,
    UserSummary,
};

/// Number of organizations in [`arb_summary`].
pub const SUMMARY_ORGS: usize = 3;

/// Guid of the space [`arb_summary`] never embeds in an organization.
pub const ORPHAN_SPACE_GUID: &str = "s5";

/// Builds a space resource.
pub fn space_resource(guid: &str, name: &str) -> SpaceResource {
    Resource {
        metadata: ResourceMetadata { guid: guid.to_owned(), url: format!("/v2/spaces/{guid}") },
        entity: SpaceEntity { name: name.to_owned() },
    }
}

/// Builds an organization resource embedding `spaces`.
pub fn org_resource(guid: &str, name: &str, spaces: Vec<SpaceResource>) -> OrgResource {
    Resource {
        metadata: ResourceMetadata {
            guid: guid.to_owned(),
            url: format!("/v2/organizations/{guid}"),
        },
        entity: OrgEntity { name: name.to_owned(), spaces },
    }
}

/// Generates a login name matching `[a-z][a-z0-9._-]{0,15}`.
pub fn arb_username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._-]{0,15}"
}

/// Generates a resource name matching `[a-z][a-z0-9-]{0,11}`.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}"
}

/// Generates an organization role kind.
pub fn arb_org_role_kind() -> impl Strategy<Value = OrgRoleKind> {
    prop::sample::select(OrgRoleKind::ALL.to_vec())
}

/// Generates a space role kind.
pub fn arb_space_role_kind() -> impl Strategy<Value = SpaceRoleKind> {
    prop::sample::select(SpaceRoleKind::ALL.to_vec())
}

/// Generates a record with up to 4 organization and 4 space roles.
pub fn arb_record() -> impl Strategy<Value = UserMigrationRecord> {
    (
        arb_username(),
        "cn=[a-z]{1,12}",
        prop::collection::vec(("[a-z]{1,8}@example\\.com", any::<bool>()), 0..3),
        prop::collection::vec((arb_name(), arb_org_role_kind()), 0..4),
        prop::collection::vec((arb_name(), arb_name(), arb_space_role_kind()), 0..4),
    )
        .prop_map(|(username, external_id, emails, org_roles, space_roles)| {
            let emails =
                emails.into_iter().map(|(value, primary)| EmailRecord::new(value, primary));
            let org_roles = org_roles.into_iter().map(|(org, role)| OrgRole::new(org, role));
            let space_roles =
                space_roles.into_iter().map(|(org, space, role)| SpaceRole::new(org, space, role));
            UserMigrationRecord::builder()
                .username(username)
                .external_id(external_id)
                .emails(emails.collect())
                .org_roles(org_roles.collect())
                .space_roles(space_roles.collect())
                .build()
        })
}

/// Generates a snapshot of up to 5 records.
pub fn arb_snapshot() -> impl Strategy<Value = MigrationSnapshot> {
    ("https://api\\.sys\\.[a-z]{1,8}\\.example\\.com", prop::collection::vec(arb_record(), 0..5))
        .prop_map(|(source_api_url, records)| MigrationSnapshot { source_api_url, records })
}

/// Generates a user summary over a fixed layout.
///
/// Organizations `o0`..`o2` (named `org-0`..`org-2`) embed spaces `s0`..`s4`
/// by index modulo 3. Space [`ORPHAN_SPACE_GUID`] belongs to no organization.
/// Role categories pick organizations and spaces at random, with repeats.
pub fn arb_summary() -> impl Strategy<Value = UserSummary> {
    let org_picks = || prop::collection::vec(0usize..SUMMARY_ORGS, 0..4);
    let space_picks = || prop::collection::vec(0usize..6, 0..6);
    (org_picks(), org_picks(), org_picks(), space_picks(), space_picks(), space_picks()).prop_map(
        |(managed, billing, audited, developer, space_managed, space_audited)| {
            let space = |s: usize| space_resource(&format!("s{s}"), &format!("space-{s}"));
            let organizations: Vec<OrgResource> = (0..SUMMARY_ORGS)
                .map(|o| {
                    let spaces = (0..5).filter(|s| s % SUMMARY_ORGS == o).map(space).collect();
                    org_resource(&format!("o{o}"), &format!("org-{o}"), spaces)
                })
                .collect();
            let pick_orgs = |picks: Vec<usize>| -> Vec<OrgResource> {
                picks.into_iter().map(|o| organizations[o].clone()).collect()
            };
            let pick_spaces = |picks: Vec<usize>| -> Vec<SpaceResource> {
                picks.into_iter().map(space).collect()
            };

            UserSummary {
                managed_organizations: pick_orgs(managed),
                billing_managed_organizations: pick_orgs(billing),
                audited_organizations: pick_orgs(audited),
                spaces: pick_spaces(developer),
                managed_spaces: pick_spaces(space_managed),
                audited_spaces: pick_spaces(space_audited),
                organizations,
            }
        },
    )
}
