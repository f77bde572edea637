//! Control-plane resources as returned by the v2 REST API.
//!
//! Every resource is a `{metadata, entity}` pair; listings are wrapped in a
//! [`Page`]. Fields the migration does not read are ignored on decode.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{OrgGuid, Organization, Space, SpaceGuid, UserGuid};

/// One page of a paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Total number of results across all pages.
    #[serde(rename = "total_results", default)]
    pub total: u64,
    /// Path of the next page, or `None` on the last page.
    #[serde(rename = "next_url", default)]
    pub next: Option<String>,
    /// Items on this page.
    #[serde(rename = "resources", default)]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Creates a single, final page holding `items`.
    pub fn single(items: Vec<T>) -> Self {
        Self { total: items.len() as u64, next: None, items }
    }

    /// Checks if there are more pages available.
    pub fn has_next_page(&self) -> bool {
        self.next.is_some()
    }
}

/// Resource metadata common to every control-plane resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Resource identifier.
    pub guid: String,
    /// Canonical resource path.
    #[serde(default)]
    pub url: String,
}

/// A control-plane resource: metadata plus a typed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource<E> {
    /// Identifier and path.
    pub metadata: ResourceMetadata,
    /// Resource body.
    pub entity: E,
}

impl<E> Resource<E> {
    /// Returns the resource identifier.
    pub fn guid(&self) -> &str {
        &self.metadata.guid
    }
}

/// A control-plane user record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserEntity {
    /// Whether the user is a platform administrator.
    #[serde(default)]
    pub admin: bool,
    /// Whether the user is active.
    #[serde(default)]
    pub active: bool,
    /// Login name. Absent for users that exist only as client principals.
    #[serde(default)]
    pub username: Option<String>,
}

/// An organization with its embedded spaces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrgEntity {
    /// Organization name.
    pub name: String,
    /// Spaces of this organization. Only populated inside user summaries.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub spaces: Vec<SpaceResource>,
}

/// A space. Spaces do not carry their owning organization inline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpaceEntity {
    /// Space name.
    pub name: String,
}

/// A user's memberships grouped by relation category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserSummary {
    /// Every organization the user belongs to, with embedded spaces.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub organizations: Vec<OrgResource>,
    /// Organizations the user manages.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub managed_organizations: Vec<OrgResource>,
    /// Organizations the user billing-manages.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub billing_managed_organizations: Vec<OrgResource>,
    /// Organizations the user audits.
    #[serde(
        default,
        alias = "audited_managed_organizations",
        deserialize_with = "null_as_empty"
    )]
    pub audited_organizations: Vec<OrgResource>,
    /// Spaces the user develops in.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub spaces: Vec<SpaceResource>,
    /// Spaces the user manages.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub managed_spaces: Vec<SpaceResource>,
    /// Spaces the user audits.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub audited_spaces: Vec<SpaceResource>,
}

/// A user resource.
pub type UserResource = Resource<UserEntity>;

/// An organization resource.
pub type OrgResource = Resource<OrgEntity>;

/// A space resource.
pub type SpaceResource = Resource<SpaceEntity>;

/// A user summary resource.
pub type UserSummaryResource = Resource<UserSummary>;

impl UserResource {
    /// Returns the user's identifier.
    pub fn user_guid(&self) -> UserGuid {
        UserGuid::new(self.metadata.guid.clone())
    }

    /// Returns the username if present and non-empty.
    pub fn username(&self) -> Option<&str> {
        self.entity.username.as_deref().filter(|name| !name.is_empty())
    }
}

impl OrgResource {
    /// Converts to a resolved [`Organization`].
    pub fn to_organization(&self) -> Organization {
        Organization {
            name: self.entity.name.clone(),
            guid: OrgGuid::new(self.metadata.guid.clone()),
        }
    }

    /// Returns true if `space` is embedded in this organization.
    pub fn contains_space(&self, space: &str) -> bool {
        self.entity.spaces.iter().any(|embedded| embedded.metadata.guid == space)
    }
}

impl SpaceResource {
    /// Converts to a resolved [`Space`] owned by `organization_guid`.
    pub fn to_space(&self, organization_guid: OrgGuid) -> Space {
        Space {
            name: self.entity.name.clone(),
            guid: SpaceGuid::new(self.metadata.guid.clone()),
            organization_guid,
        }
    }
}

/// Treats an explicit JSON `null` list the same as a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
