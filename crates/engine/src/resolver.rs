//! Name-to-identifier resolution with per-run memoization.
//!
//! Snapshots address organizations and spaces by name; grants need
//! identifiers of the target deployment. A [`ResourceResolver`] belongs to a
//! single run: successful lookups are cached for the rest of that run,
//! failures are not cached, and nothing is shared between runs.

use std::collections::HashMap;

use snafu::ensure;

use user_migration_sdk::ControlPlane;
use user_migration_types::{OrgGuid, Organization, Space};

use crate::error::{AmbiguousSnafu, NotFoundSnafu, ResourceKind, Result};

/// Memoizing resolver for organizations and spaces.
#[derive(Debug, Default)]
pub struct ResourceResolver {
    organizations: HashMap<String, Organization>,
    spaces: HashMap<(OrgGuid, String), Space>,
}

impl ResourceResolver {
    /// Creates a resolver with empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves an organization by exact name.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::NotFound`](crate::MigrationError::NotFound) when no organization matches
    /// - [`MigrationError::Ambiguous`](crate::MigrationError::Ambiguous) when several do
    /// - [`MigrationError::Transport`](crate::MigrationError::Transport) when the lookup fails
    pub async fn resolve_organization<C>(
        &mut self,
        control_plane: &C,
        name: &str,
    ) -> Result<Organization>
    where
        C: ControlPlane + ?Sized,
    {
        if let Some(cached) = self.organizations.get(name) {
            return Ok(cached.clone());
        }

        let page = control_plane.find_organizations(name).await?;
        let matches = page.items.len();
        ensure!(matches > 0, NotFoundSnafu { kind: ResourceKind::Organization, name });
        ensure!(matches == 1, AmbiguousSnafu { kind: ResourceKind::Organization, name, matches });

        let organization = page.items[0].to_organization();
        tracing::debug!(name, guid = %organization.guid, "resolved organization");
        self.organizations.insert(name.to_owned(), organization.clone());
        Ok(organization)
    }

    /// Resolves a space by exact name within an organization.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_organization`](Self::resolve_organization), for spaces.
    pub async fn resolve_space<C>(
        &mut self,
        control_plane: &C,
        organization: &OrgGuid,
        name: &str,
    ) -> Result<Space>
    where
        C: ControlPlane + ?Sized,
    {
        let key = (organization.clone(), name.to_owned());
        if let Some(cached) = self.spaces.get(&key) {
            return Ok(cached.clone());
        }

        let page = control_plane.find_spaces(organization, name).await?;
        let matches = page.items.len();
        ensure!(matches > 0, NotFoundSnafu { kind: ResourceKind::Space, name });
        ensure!(matches == 1, AmbiguousSnafu { kind: ResourceKind::Space, name, matches });

        let space = page.items[0].to_space(organization.clone());
        tracing::debug!(name, guid = %space.guid, organization = %organization, "resolved space");
        self.spaces.insert(key, space.clone());
        Ok(space)
    }

    /// Number of cached organizations.
    #[must_use]
    pub fn cached_organizations(&self) -> usize {
        self.organizations.len()
    }

    /// Number of cached spaces.
    #[must_use]
    pub fn cached_spaces(&self) -> usize {
        self.spaces.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use user_migration_sdk::mock::{MockControlPlane, MockOperation};

    use super::*;
    use crate::error::MigrationError;

    #[tokio::test]
    async fn test_organization_lookup_is_memoized() {
        let cp = MockControlPlane::new("https://api.target.example.com");
        let acme = cp.add_organization("acme");
        let mut resolver = ResourceResolver::new();

        let first = resolver.resolve_organization(&cp, "acme").await.unwrap();
        let second = resolver.resolve_organization(&cp, "acme").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.guid, acme);
        assert_eq!(cp.call_count(MockOperation::FindOrganizations), 1);
        assert_eq!(resolver.cached_organizations(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_organization_names_are_ambiguous() {
        let cp = MockControlPlane::new("https://api.target.example.com");
        cp.add_organization("acme");
        cp.add_organization("acme");
        let mut resolver = ResourceResolver::new();

        let err = resolver.resolve_organization(&cp, "acme").await.unwrap_err();
        assert!(matches!(err, MigrationError::Ambiguous { matches: 2, .. }));
        assert_eq!(resolver.cached_organizations(), 0);
    }

    #[tokio::test]
    async fn test_missing_organization_not_cached() {
        let cp = MockControlPlane::new("https://api.target.example.com");
        let mut resolver = ResourceResolver::new();

        let err = resolver.resolve_organization(&cp, "ghost").await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::NotFound { kind: ResourceKind::Organization, .. }
        ));

        cp.add_organization("ghost");
        assert!(resolver.resolve_organization(&cp, "ghost").await.is_ok());
        assert_eq!(cp.call_count(MockOperation::FindOrganizations), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_not_cached() {
        let cp = MockControlPlane::new("https://api.target.example.com");
        cp.add_organization("acme");
        cp.inject_failure(MockOperation::FindOrganizations, 1);
        let mut resolver = ResourceResolver::new();

        let err = resolver.resolve_organization(&cp, "acme").await.unwrap_err();
        assert!(matches!(err, MigrationError::Transport { .. }));
        assert!(resolver.resolve_organization(&cp, "acme").await.is_ok());
    }

    #[tokio::test]
    async fn test_space_lookup_keyed_by_organization() {
        let cp = MockControlPlane::new("https://api.target.example.com");
        let acme = cp.add_organization("acme");
        let globex = cp.add_organization("globex");
        let acme_dev = cp.add_space(&acme, "dev");
        let globex_dev = cp.add_space(&globex, "dev");
        let mut resolver = ResourceResolver::new();

        let first = resolver.resolve_space(&cp, &acme, "dev").await.unwrap();
        let second = resolver.resolve_space(&cp, &globex, "dev").await.unwrap();
        let again = resolver.resolve_space(&cp, &acme, "dev").await.unwrap();

        assert_eq!(first.guid, acme_dev);
        assert_eq!(second.guid, globex_dev);
        assert_eq!(again, first);
        assert_eq!(cp.call_count(MockOperation::FindSpaces), 2);
        assert_eq!(resolver.cached_spaces(), 2);
    }

    #[tokio::test]
    async fn test_missing_space() {
        let cp = MockControlPlane::new("https://api.target.example.com");
        let acme = cp.add_organization("acme");
        let mut resolver = ResourceResolver::new();

        let err = resolver.resolve_space(&cp, &acme, "prod").await.unwrap_err();
        assert!(matches!(err, MigrationError::NotFound { kind: ResourceKind::Space, .. }));
    }
}
