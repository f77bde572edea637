//! Core type definitions for user migration.
//!
//! - Identifier types (OrgGuid, SpaceGuid, UserGuid)
//! - Resolved control-plane entities (Organization, Space)
//! - Role vocabulary and role assignments
//! - Migration records and the portable snapshot

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a `String` for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<String>`, `From<&str>` and `Into<String>` conversions
/// - `Display` with the raw value (identifiers are embedded in request paths)
/// - `new()` constructor and `as_str()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a raw value.
            #[inline]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw identifier.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is the empty string.
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Control-plane identifier of an organization.
    ///
    /// Only meaningful within the deployment that issued it.
    OrgGuid
);

define_id!(
    /// Control-plane identifier of a space.
    SpaceGuid
);

define_id!(
    /// Identifier of a user.
    ///
    /// On the target deployment the control-plane user guid is the
    /// identity-directory id of the re-created identity, so one type
    /// serves both services.
    UserGuid
);

// ============================================================================
// Resolved Entities
// ============================================================================

/// An organization resolved by name on a specific deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Organization {
    /// Organization name, unique per deployment by convention only.
    pub name: String,
    /// Deployment-specific identifier.
    pub guid: OrgGuid,
}

/// A space resolved by `(organization guid, name)` on a specific deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Space {
    /// Space name, unique only within its organization.
    pub name: String,
    /// Deployment-specific identifier.
    pub guid: SpaceGuid,
    /// Identifier of the owning organization.
    pub organization_guid: OrgGuid,
}

// ============================================================================
// Role Vocabulary
// ============================================================================

/// Organization-level role kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrgRoleKind {
    /// Organization manager.
    #[serde(rename = "OrgManager")]
    Manager,
    /// Billing manager.
    #[serde(rename = "BillingManager")]
    BillingManager,
    /// Organization auditor.
    #[serde(rename = "OrgAuditor")]
    Auditor,
}

impl OrgRoleKind {
    /// All organization role kinds in extraction order.
    pub const ALL: [OrgRoleKind; 3] = [Self::Manager, Self::BillingManager, Self::Auditor];

    /// Snapshot name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "OrgManager",
            Self::BillingManager => "BillingManager",
            Self::Auditor => "OrgAuditor",
        }
    }

    /// Control-plane collection that holds members of this role.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Manager => "managers",
            Self::BillingManager => "billing_managers",
            Self::Auditor => "auditors",
        }
    }
}

impl fmt::Display for OrgRoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Space-level role kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpaceRoleKind {
    /// Space developer (plain space membership).
    #[serde(rename = "SpaceDeveloper")]
    Developer,
    /// Space manager.
    #[serde(rename = "SpaceManager")]
    Manager,
    /// Space auditor.
    #[serde(rename = "SpaceAuditor")]
    Auditor,
}

impl SpaceRoleKind {
    /// All space role kinds in extraction order.
    pub const ALL: [SpaceRoleKind; 3] = [Self::Developer, Self::Manager, Self::Auditor];

    /// Snapshot name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "SpaceDeveloper",
            Self::Manager => "SpaceManager",
            Self::Auditor => "SpaceAuditor",
        }
    }

    /// Control-plane collection that holds members of this role.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Developer => "developers",
            Self::Manager => "managers",
            Self::Auditor => "auditors",
        }
    }
}

impl fmt::Display for SpaceRoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any role kind, tagged by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// Organization family.
    Org(OrgRoleKind),
    /// Space family.
    Space(SpaceRoleKind),
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Org(kind) => kind.fmt(f),
            Self::Space(kind) => kind.fmt(f),
        }
    }
}

// ============================================================================
// Role Assignments
// ============================================================================

/// An organization-level role held by a user, addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrgRole {
    /// Organization name.
    #[serde(rename = "OrgName")]
    pub org_name: String,
    /// Role kind.
    #[serde(rename = "RoleName")]
    pub role: OrgRoleKind,
}

impl OrgRole {
    /// Creates an organization role.
    pub fn new(org_name: impl Into<String>, role: OrgRoleKind) -> Self {
        Self { org_name: org_name.into(), role }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.org_name, self.role)
    }
}

/// A space-level role held by a user, addressed by organization and space name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpaceRole {
    /// Owning organization name. Never empty for a valid assignment.
    #[serde(rename = "OrgName")]
    pub org_name: String,
    /// Space name.
    #[serde(rename = "SpaceName")]
    pub space_name: String,
    /// Role kind.
    #[serde(rename = "RoleName")]
    pub role: SpaceRoleKind,
}

impl SpaceRole {
    /// Creates a space role.
    pub fn new(
        org_name: impl Into<String>,
        space_name: impl Into<String>,
        role: SpaceRoleKind,
    ) -> Self {
        Self { org_name: org_name.into(), space_name: space_name.into(), role }
    }
}

impl fmt::Display for SpaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.org_name, self.space_name, self.role)
    }
}

/// A role assignment of either family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleAssignment {
    /// Organization-level role.
    Org(OrgRole),
    /// Space-level role.
    Space(SpaceRole),
}

impl RoleAssignment {
    /// Returns the tagged role kind.
    #[must_use]
    pub fn kind(&self) -> RoleKind {
        match self {
            Self::Org(role) => RoleKind::Org(role.role),
            Self::Space(role) => RoleKind::Space(role.role),
        }
    }

    /// Returns the organization name the role is scoped to.
    #[must_use]
    pub fn org_name(&self) -> &str {
        match self {
            Self::Org(role) => &role.org_name,
            Self::Space(role) => &role.org_name,
        }
    }
}

impl From<OrgRole> for RoleAssignment {
    fn from(role: OrgRole) -> Self {
        Self::Org(role)
    }
}

impl From<SpaceRole> for RoleAssignment {
    fn from(role: SpaceRole) -> Self {
        Self::Space(role)
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Org(role) => role.fmt(f),
            Self::Space(role) => role.fmt(f),
        }
    }
}

// ============================================================================
// Identities
// ============================================================================

/// An email address attached to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Address.
    pub value: String,
    /// Whether this is the identity's primary address.
    #[serde(default)]
    pub primary: bool,
}

impl EmailRecord {
    /// Creates an email record.
    pub fn new(value: impl Into<String>, primary: bool) -> Self {
        Self { value: value.into(), primary }
    }
}

/// An identity held by the identity directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Directory-assigned identifier.
    pub id: UserGuid,
    /// Login name; matched against control-plane usernames exactly.
    pub username: String,
    /// Identifier in the upstream identity provider. May be empty.
    pub external_id: String,
    /// Email addresses.
    pub emails: Vec<EmailRecord>,
}

/// Data required to create an identity on the target directory.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct NewIdentity {
    /// Login name.
    #[builder(into)]
    pub username: String,
    /// Identifier in the upstream identity provider.
    #[builder(into)]
    pub external_id: String,
    /// Email addresses.
    #[builder(default)]
    pub emails: Vec<EmailRecord>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything needed to re-create one user on another deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct UserMigrationRecord {
    /// Login name.
    #[serde(rename = "Username")]
    #[builder(into)]
    pub username: String,
    /// Identifier in the upstream identity provider. Non-empty for exported records.
    #[serde(rename = "ExternalID")]
    #[builder(into)]
    pub external_id: String,
    /// Email addresses.
    #[serde(rename = "Emails", default)]
    #[builder(default)]
    pub emails: Vec<EmailRecord>,
    /// Organization roles in extraction order.
    #[serde(rename = "OrgRoles", default)]
    #[builder(default)]
    pub org_roles: Vec<OrgRole>,
    /// Space roles in extraction order.
    #[serde(rename = "SpaceRoles", default)]
    #[builder(default)]
    pub space_roles: Vec<SpaceRole>,
}

impl UserMigrationRecord {
    /// Returns the data needed to re-create this user's identity.
    #[must_use]
    pub fn new_identity(&self) -> NewIdentity {
        NewIdentity {
            username: self.username.clone(),
            external_id: self.external_id.clone(),
            emails: self.emails.clone(),
        }
    }

    /// Iterates over all role assignments, organization roles first.
    pub fn assignments(&self) -> impl Iterator<Item = RoleAssignment> + '_ {
        self.org_roles
            .iter()
            .cloned()
            .map(RoleAssignment::Org)
            .chain(self.space_roles.iter().cloned().map(RoleAssignment::Space))
    }
}

/// The portable export artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSnapshot {
    /// API URL of the deployment the snapshot was exported from.
    #[serde(rename = "CfApiUrl")]
    pub source_api_url: String,
    /// Exported users in control-plane listing order.
    #[serde(rename = "UserMigrations", default)]
    pub records: Vec<UserMigrationRecord>,
}

impl MigrationSnapshot {
    /// Creates an empty snapshot for the given source deployment.
    pub fn new(source_api_url: impl Into<String>) -> Self {
        Self { source_api_url: source_api_url.into(), records: Vec::new() }
    }

    /// Returns true if `api_url` names the deployment this snapshot came from.
    ///
    /// Comparison ignores ASCII case and trailing slashes.
    #[must_use]
    pub fn is_from(&self, api_url: &str) -> bool {
        normalize_api_url(&self.source_api_url) == normalize_api_url(api_url)
    }
}

fn normalize_api_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_is_raw_value() {
        let guid = OrgGuid::new("4c1b7e55");
        assert_eq!(guid.to_string(), "4c1b7e55");
        assert_eq!(guid.as_str(), "4c1b7e55");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let guid = UserGuid::from("u-1");
        assert_eq!(serde_json::to_string(&guid).unwrap(), "\"u-1\"");
    }

    #[test]
    fn test_org_role_kind_wire_names() {
        let names: Vec<String> = OrgRoleKind::ALL
            .iter()
            .map(|k| serde_json::to_string(k).unwrap())
            .collect();
        assert_eq!(names, vec!["\"OrgManager\"", "\"BillingManager\"", "\"OrgAuditor\""]);
    }

    #[test]
    fn test_space_role_kind_wire_names() {
        let names: Vec<&str> = SpaceRoleKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["SpaceDeveloper", "SpaceManager", "SpaceAuditor"]);
    }

    #[test]
    fn test_unknown_role_name_rejected() {
        let result: Result<OrgRole, _> =
            serde_json::from_str(r#"{"OrgName": "acme", "RoleName": "OrgOwner"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_space_role_name_not_accepted_as_org_role() {
        let result: Result<OrgRole, _> =
            serde_json::from_str(r#"{"OrgName": "acme", "RoleName": "SpaceManager"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_role_collections() {
        assert_eq!(OrgRoleKind::BillingManager.collection(), "billing_managers");
        assert_eq!(SpaceRoleKind::Developer.collection(), "developers");
        assert_eq!(SpaceRoleKind::Auditor.collection(), "auditors");
    }

    #[test]
    fn test_assignments_lists_org_roles_first() {
        let record = UserMigrationRecord::builder()
            .username("alice")
            .external_id("cn=alice")
            .org_roles(vec![OrgRole::new("acme", OrgRoleKind::Auditor)])
            .space_roles(vec![SpaceRole::new("acme", "dev", SpaceRoleKind::Developer)])
            .build();

        let kinds: Vec<RoleKind> = record.assignments().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![RoleKind::Org(OrgRoleKind::Auditor), RoleKind::Space(SpaceRoleKind::Developer)]
        );
    }

    #[test]
    fn test_snapshot_is_from_ignores_case_and_trailing_slash() {
        let snapshot = MigrationSnapshot::new("https://api.sys.example.com");
        assert!(snapshot.is_from("https://API.sys.example.com/"));
        assert!(!snapshot.is_from("https://api.sys.other.example.com"));
    }

    #[test]
    fn test_new_identity_copies_record_fields() {
        let record = UserMigrationRecord::builder()
            .username("bob")
            .external_id("uid=bob")
            .emails(vec![EmailRecord::new("bob@example.com", true)])
            .build();

        let identity = record.new_identity();
        assert_eq!(identity.username, "bob");
        assert_eq!(identity.external_id, "uid=bob");
        assert_eq!(identity.emails.len(), 1);
    }
}
