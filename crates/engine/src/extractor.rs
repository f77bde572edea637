//! Flattens a user's membership summary into role assignments.
//!
//! Organization roles come straight from the three organization categories.
//! Space roles need their owning organization, which the summary only
//! records as a back-reference: every organization in the user's full
//! organization list embeds its spaces, so a space's owner is the
//! organization embedding a space with the same guid.

use user_migration_types::{
    OrgResource, OrgRole, OrgRoleKind, SpaceGuid, SpaceResource, SpaceRole, SpaceRoleKind,
    UserSummary,
};

/// A space role that could not be attributed to an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedSpace {
    /// Guid of the space.
    pub space_guid: SpaceGuid,
    /// Name of the space.
    pub space_name: String,
    /// Role the user holds in it.
    pub role: SpaceRoleKind,
}

/// Roles extracted from one summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Organization roles: managed, then billing-managed, then audited.
    pub org_roles: Vec<OrgRole>,
    /// Space roles: developer, then managed, then audited.
    pub space_roles: Vec<SpaceRole>,
    /// Space roles dropped because no owning organization was found.
    pub orphaned: Vec<OrphanedSpace>,
}

impl Extraction {
    /// Total number of role assignments produced.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.org_roles.len() + self.space_roles.len()
    }
}

/// Extracts every role held in `summary`.
///
/// Each category contributes independently; a space held as both developer
/// and auditor yields two roles.
#[must_use]
pub fn extract_roles(summary: &UserSummary) -> Extraction {
    let mut extraction = Extraction::default();

    let org_categories = [
        (&summary.managed_organizations, OrgRoleKind::Manager),
        (&summary.billing_managed_organizations, OrgRoleKind::BillingManager),
        (&summary.audited_organizations, OrgRoleKind::Auditor),
    ];
    for (organizations, role) in org_categories {
        extraction
            .org_roles
            .extend(organizations.iter().map(|org| OrgRole::new(org.entity.name.clone(), role)));
    }

    let space_categories = [
        (&summary.spaces, SpaceRoleKind::Developer),
        (&summary.managed_spaces, SpaceRoleKind::Manager),
        (&summary.audited_spaces, SpaceRoleKind::Auditor),
    ];
    for (spaces, role) in space_categories {
        for space in spaces {
            match owning_organization(&summary.organizations, space) {
                Some(org_name) => extraction.space_roles.push(SpaceRole::new(
                    org_name,
                    space.entity.name.clone(),
                    role,
                )),
                None => extraction.orphaned.push(OrphanedSpace {
                    space_guid: SpaceGuid::new(space.guid()),
                    space_name: space.entity.name.clone(),
                    role,
                }),
            }
        }
    }

    extraction
}

/// Name of the first organization embedding `space`, if it has a name.
fn owning_organization<'a>(
    organizations: &'a [OrgResource],
    space: &SpaceResource,
) -> Option<&'a str> {
    organizations
        .iter()
        .find(|org| org.contains_space(space.guid()))
        .map(|org| org.entity.name.as_str())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use proptest::prelude::*;
    use user_migration_test_utils::strategies::{ORPHAN_SPACE_GUID, arb_summary};
    use user_migration_types::{OrgEntity, Resource, ResourceMetadata, SpaceEntity};

    use super::*;

    fn space(guid: &str, name: &str) -> SpaceResource {
        Resource {
            metadata: ResourceMetadata { guid: guid.to_owned(), url: String::new() },
            entity: SpaceEntity { name: name.to_owned() },
        }
    }

    fn org(guid: &str, name: &str, spaces: Vec<SpaceResource>) -> OrgResource {
        Resource {
            metadata: ResourceMetadata { guid: guid.to_owned(), url: String::new() },
            entity: OrgEntity { name: name.to_owned(), spaces },
        }
    }

    #[test]
    fn test_space_role_resolves_owner_by_back_reference() {
        let summary = UserSummary {
            organizations: vec![
                org("o2", "globex", vec![space("s2", "prod")]),
                org("o1", "acme", vec![space("s1", "sandbox")]),
            ],
            spaces: vec![space("s1", "sandbox")],
            ..Default::default()
        };

        let extraction = extract_roles(&summary);
        assert_eq!(
            extraction.space_roles,
            vec![SpaceRole::new("acme", "sandbox", SpaceRoleKind::Developer)]
        );
        assert!(extraction.orphaned.is_empty());
    }

    #[test]
    fn test_multiple_categories_emit_independent_roles() {
        let summary = UserSummary {
            organizations: vec![org("o1", "acme", vec![space("s1", "sandbox")])],
            spaces: vec![space("s1", "sandbox")],
            audited_spaces: vec![space("s1", "sandbox")],
            ..Default::default()
        };

        let roles: Vec<SpaceRoleKind> =
            extract_roles(&summary).space_roles.iter().map(|r| r.role).collect();
        assert_eq!(roles, vec![SpaceRoleKind::Developer, SpaceRoleKind::Auditor]);
    }

    #[test]
    fn test_org_roles_in_category_order() {
        let acme = org("o1", "acme", vec![]);
        let globex = org("o2", "globex", vec![]);
        let summary = UserSummary {
            organizations: vec![acme.clone(), globex.clone()],
            managed_organizations: vec![globex.clone()],
            billing_managed_organizations: vec![acme.clone()],
            audited_organizations: vec![acme, globex],
            ..Default::default()
        };

        assert_eq!(
            extract_roles(&summary).org_roles,
            vec![
                OrgRole::new("globex", OrgRoleKind::Manager),
                OrgRole::new("acme", OrgRoleKind::BillingManager),
                OrgRole::new("acme", OrgRoleKind::Auditor),
                OrgRole::new("globex", OrgRoleKind::Auditor),
            ]
        );
    }

    #[test]
    fn test_plain_membership_yields_no_org_role() {
        let summary = UserSummary {
            organizations: vec![org("o1", "acme", vec![])],
            ..Default::default()
        };
        assert_eq!(extract_roles(&summary).role_count(), 0);
    }

    #[test]
    fn test_space_without_owner_is_orphaned() {
        let summary = UserSummary {
            organizations: vec![org("o1", "acme", vec![space("s1", "sandbox")])],
            managed_spaces: vec![space("s9", "detached"), space("s1", "sandbox")],
            ..Default::default()
        };

        let extraction = extract_roles(&summary);
        assert_eq!(
            extraction.orphaned,
            vec![OrphanedSpace {
                space_guid: SpaceGuid::new("s9"),
                space_name: "detached".to_owned(),
                role: SpaceRoleKind::Manager,
            }]
        );
        assert_eq!(extraction.space_roles.len(), 1);
    }

    #[test]
    fn test_owner_with_empty_name_counts_as_missing() {
        let summary = UserSummary {
            organizations: vec![org("o1", "", vec![space("s1", "sandbox")])],
            spaces: vec![space("s1", "sandbox")],
            ..Default::default()
        };

        let extraction = extract_roles(&summary);
        assert!(extraction.space_roles.is_empty());
        assert_eq!(extraction.orphaned.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_every_membership_accounted_for(summary in arb_summary()) {
            let extraction = extract_roles(&summary);

            let org_memberships = summary.managed_organizations.len()
                + summary.billing_managed_organizations.len()
                + summary.audited_organizations.len();
            let space_memberships =
                summary.spaces.len() + summary.managed_spaces.len() + summary.audited_spaces.len();

            prop_assert_eq!(extraction.org_roles.len(), org_memberships);
            prop_assert_eq!(
                extraction.space_roles.len() + extraction.orphaned.len(),
                space_memberships
            );
        }

        #[test]
        fn prop_space_roles_never_have_empty_org(summary in arb_summary()) {
            let extraction = extract_roles(&summary);
            prop_assert!(extraction.space_roles.iter().all(|role| !role.org_name.is_empty()));
            prop_assert!(
                extraction.orphaned.iter().all(|gap| gap.space_guid.as_str() == ORPHAN_SPACE_GUID)
            );
        }
    }
}
