//! Seeded in-memory deployments.
//!
//! A [`Deployment`] pairs a [`MockControlPlane`] with a
//! [`MockIdentityDirectory`] and offers a compact way to declare the
//! organizations, spaces, users and roles a test needs.

use user_migration_sdk::mock::{MockControlPlane, MockIdentityDirectory};
use user_migration_types::{EmailRecord, OrgGuid, OrgRoleKind, SpaceGuid, SpaceRoleKind, UserGuid};

/// API URL used for source deployments in tests.
pub const SOURCE_API: &str = "https://api.sys.source.example.com";

/// API URL used for target deployments in tests.
pub const TARGET_API: &str = "https://api.sys.target.example.com";

/// A control plane and identity directory seeded together.
pub struct Deployment {
    /// Control-plane double.
    pub control_plane: MockControlPlane,
    /// Identity-directory double.
    pub directory: MockIdentityDirectory,
}

#[bon::bon]
impl Deployment {
    /// Creates an empty deployment.
    ///
    /// `page_size` controls how many users the control plane returns per
    /// listing page (default 50).
    #[builder]
    pub fn new(
        #[builder(into, default = SOURCE_API.to_owned())] api: String,
        #[builder(default = 50)] page_size: usize,
    ) -> Self {
        Self {
            control_plane: MockControlPlane::new(api).with_page_size(page_size),
            directory: MockIdentityDirectory::new(),
        }
    }

    /// Creates organizations with the given spaces.
    ///
    /// Calling it twice with the same organization name creates two
    /// organizations; tests use that to provoke ambiguity.
    pub fn with_organization(self, name: &str, spaces: &[&str]) -> Self {
        let org = self.control_plane.add_organization(name);
        for space in spaces {
            self.control_plane.add_space(&org, space);
        }
        self
    }

    /// Adds a control-plane user and a matching directory identity.
    ///
    /// The identity's external id is `cn={username}` and its primary
    /// email `{username}@example.com`.
    pub fn add_person(&self, username: &str) -> UserGuid {
        let guid = self.control_plane.add_user(username);
        self.directory.add_identity(
            username,
            &format!("cn={username}"),
            vec![EmailRecord::new(format!("{username}@example.com"), true)],
        );
        guid
    }

    /// Grants `role` in the named organization.
    ///
    /// # Panics
    ///
    /// Panics if the organization does not exist.
    pub fn grant_org(&self, user: &UserGuid, org: &str, role: OrgRoleKind) {
        let org = self.org(org);
        self.control_plane.assign_org_role(&org, user, role);
    }

    /// Grants `role` in the named space.
    ///
    /// # Panics
    ///
    /// Panics if the organization or space does not exist.
    pub fn grant_space(&self, user: &UserGuid, org: &str, space: &str, role: SpaceRoleKind) {
        let space = self.space(org, space);
        self.control_plane.assign_space_role(&space, user, role);
    }

    /// Looks up an organization by name.
    ///
    /// # Panics
    ///
    /// Panics if the organization does not exist.
    #[allow(clippy::expect_used)]
    pub fn org(&self, name: &str) -> OrgGuid {
        self.control_plane.organization_guid(name).expect("organization seeded")
    }

    /// Looks up a space by organization and space name.
    ///
    /// # Panics
    ///
    /// Panics if the organization or space does not exist.
    #[allow(clippy::expect_used)]
    pub fn space(&self, org: &str, name: &str) -> SpaceGuid {
        let org = self.org(org);
        self.control_plane.space_guid(&org, name).expect("space seeded")
    }
}
