//! Role comparison helpers.
//!
//! Guids differ between deployments, so roles are compared by the names of
//! the organizations and spaces they apply to.

use user_migration_sdk::mock::MockControlPlane;
use user_migration_types::{OrgRole, SpaceRole, UserGuid};

/// Returns the roles a control-plane user holds, by name, sorted.
///
/// Roles in organizations or spaces the control plane no longer knows are
/// left out.
pub fn named_roles(
    control_plane: &MockControlPlane,
    user: &UserGuid,
) -> (Vec<OrgRole>, Vec<SpaceRole>) {
    let mut org_roles: Vec<OrgRole> = control_plane
        .org_roles_of(user)
        .into_iter()
        .filter_map(|(org, role)| {
            control_plane.organization_name(&org).map(|name| OrgRole::new(name, role))
        })
        .collect();
    org_roles.sort();

    let mut space_roles: Vec<SpaceRole> = control_plane
        .space_roles_of(user)
        .into_iter()
        .filter_map(|(space, role)| {
            control_plane
                .space_path(&space)
                .map(|(org_name, space_name)| SpaceRole::new(org_name, space_name, role))
        })
        .collect();
    space_roles.sort();

    (org_roles, space_roles)
}

/// Asserts that `user_a` on `a` and `user_b` on `b` hold the same roles by name.
///
/// # Panics
///
/// Panics with both role sets if they differ.
#[allow(clippy::panic)]
pub fn assert_same_roles(
    a: &MockControlPlane,
    user_a: &UserGuid,
    b: &MockControlPlane,
    user_b: &UserGuid,
) {
    let left = named_roles(a, user_a);
    let right = named_roles(b, user_b);
    if left != right {
        panic!("role sets differ:\n  {user_a}: {left:?}\n  {user_b}: {right:?}");
    }
}
