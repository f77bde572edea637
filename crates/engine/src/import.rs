//! Import: replay a snapshot against a target deployment.
//!
//! Records are replayed one at a time. For each record the identity is
//! created first, then the control-plane user bound to it, then every role.
//! A failure abandons the smallest unit it affects: a failed role is
//! reported and the next role is attempted; a failed creation abandons the
//! record and the next record is attempted.

use snafu::ensure;
use user_migration_sdk::{ControlPlane, IdentityDirectory};
use user_migration_types::{
    MigrationSnapshot, OrgGuid, OrgRole, RoleAssignment, SpaceRole, UserGuid, UserMigrationRecord,
};

use crate::{
    dedup::MembershipLedger,
    error::{InvalidSnafu, MigrationError, Result},
    report::{FailureStage, ImportReport, RecordOutcome, RecordReport, RoleFailure},
    resolver::ResourceResolver,
};

/// Replays a snapshot into one deployment.
///
/// An importer owns the resolver cache and membership ledger of a single
/// run; [`run`](Self::run) consumes it.
pub struct Importer<'a, C: ?Sized, D: ?Sized> {
    control_plane: &'a C,
    directory: &'a D,
    resolver: ResourceResolver,
    memberships: MembershipLedger,
}

impl<'a, C, D> Importer<'a, C, D>
where
    C: ControlPlane + ?Sized,
    D: IdentityDirectory + ?Sized,
{
    /// Creates an importer over the target's control plane and directory.
    pub fn new(control_plane: &'a C, directory: &'a D) -> Self {
        Self {
            control_plane,
            directory,
            resolver: ResourceResolver::new(),
            memberships: MembershipLedger::new(),
        }
    }

    /// Replays every record of `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Guard`] without touching the target if the
    /// snapshot was exported from the target itself. Individual record and
    /// role failures never fail the run; they are collected in the report.
    pub async fn run(mut self, snapshot: &MigrationSnapshot) -> Result<ImportReport> {
        let target = self.control_plane.api_endpoint();
        if snapshot.is_from(target) {
            tracing::error!(api = %target, "snapshot was exported from the import target");
            return Err(MigrationError::Guard { url: snapshot.source_api_url.clone() });
        }

        tracing::info!(
            source = %snapshot.source_api_url,
            target = %target,
            records = snapshot.records.len(),
            "importing users"
        );

        let mut report = ImportReport::default();
        for record in &snapshot.records {
            let outcome = self.import_record(record).await;
            match &outcome {
                RecordOutcome::Succeeded { granted } => {
                    tracing::info!(username = %record.username, granted, "imported user");
                },
                RecordOutcome::Partial { granted, failed } => {
                    tracing::warn!(
                        username = %record.username,
                        granted,
                        failed = failed.len(),
                        "imported user with failed roles"
                    );
                },
                RecordOutcome::Failed { stage, error } => {
                    tracing::warn!(
                        username = %record.username,
                        stage = %stage,
                        error = %error,
                        "skipped user"
                    );
                },
            }
            report.records.push(RecordReport { username: record.username.clone(), outcome });
        }

        tracing::info!(
            processed = report.processed(),
            skipped = report.skipped(),
            succeeded = report.succeeded(),
            cached_organizations = self.resolver.cached_organizations(),
            cached_spaces = self.resolver.cached_spaces(),
            memberships = self.memberships.len(),
            "import finished"
        );
        Ok(report)
    }

    async fn import_record(&mut self, record: &UserMigrationRecord) -> RecordOutcome {
        if let Err(error) = validate_record(record) {
            return RecordOutcome::Failed { stage: FailureStage::Validation, error };
        }

        let user = match self.directory.create_identity(&record.new_identity()).await {
            Ok(id) => id,
            Err(e) => {
                return RecordOutcome::Failed { stage: FailureStage::Identity, error: e.into() };
            },
        };
        tracing::debug!(username = %record.username, user = %user, "created identity");

        if let Err(e) = self.control_plane.create_user(&user).await {
            return RecordOutcome::Failed {
                stage: FailureStage::ControlPlaneUser,
                error: e.into(),
            };
        }

        let mut granted = 0;
        let mut failed = Vec::new();
        for role in record.assignments() {
            let result = match &role {
                RoleAssignment::Org(org_role) => self.grant_org_role(&user, org_role).await,
                RoleAssignment::Space(space_role) => self.grant_space_role(&user, space_role).await,
            };
            match result {
                Ok(()) => granted += 1,
                Err(error) => {
                    tracing::debug!(
                        username = %record.username,
                        role = %role,
                        error = %error,
                        "role failed"
                    );
                    failed.push(RoleFailure { role, error });
                },
            }
        }

        if failed.is_empty() {
            RecordOutcome::Succeeded { granted }
        } else {
            RecordOutcome::Partial { granted, failed }
        }
    }

    async fn grant_org_role(&mut self, user: &UserGuid, role: &OrgRole) -> Result<()> {
        ensure!(!role.org_name.is_empty(), InvalidSnafu { reason: "empty organization name" });
        let organization =
            self.resolver.resolve_organization(self.control_plane, &role.org_name).await?;
        self.ensure_membership(user, &organization.guid).await?;
        self.control_plane.grant_organization_role(&organization.guid, user, role.role).await?;
        Ok(())
    }

    async fn grant_space_role(&mut self, user: &UserGuid, role: &SpaceRole) -> Result<()> {
        ensure!(!role.org_name.is_empty(), InvalidSnafu { reason: "empty organization name" });
        ensure!(!role.space_name.is_empty(), InvalidSnafu { reason: "empty space name" });
        let organization =
            self.resolver.resolve_organization(self.control_plane, &role.org_name).await?;
        let space = self
            .resolver
            .resolve_space(self.control_plane, &organization.guid, &role.space_name)
            .await?;
        self.ensure_membership(user, &organization.guid).await?;
        self.control_plane.grant_space_role(&space.guid, user, role.role).await?;
        Ok(())
    }

    /// Grants base membership unless this run already did. Failures are not
    /// recorded, so the next role in the same organization tries again.
    async fn ensure_membership(&mut self, user: &UserGuid, organization: &OrgGuid) -> Result<()> {
        if self.memberships.has_org_membership(user, organization) {
            return Ok(());
        }
        self.control_plane.associate_user_with_organization(organization, user).await?;
        self.memberships.record_org_membership(user, organization);
        Ok(())
    }
}

/// A record needs a username and an external id before anything is created.
fn validate_record(record: &UserMigrationRecord) -> Result<()> {
    ensure!(!record.username.is_empty(), InvalidSnafu { reason: "empty username" });
    ensure!(
        !record.external_id.is_empty(),
        InvalidSnafu { reason: format!("user '{}' has an empty external id", record.username) }
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use user_migration_sdk::mock::{MockControlPlane, MockIdentityDirectory, MockOperation};
    use user_migration_types::{OrgRoleKind, SpaceRoleKind};

    use super::*;

    const SOURCE: &str = "https://api.sys.source.example.com";
    const TARGET: &str = "https://api.sys.target.example.com";

    fn record(username: &str) -> UserMigrationRecord {
        UserMigrationRecord::builder()
            .username(username)
            .external_id(format!("cn={username}"))
            .build()
    }

    #[tokio::test]
    async fn test_guard_rejects_self_import() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        let mut snapshot = MigrationSnapshot::new(format!("{TARGET}/"));
        snapshot.records.push(record("alice"));

        let err = Importer::new(&cp, &directory).run(&snapshot).await.unwrap_err();

        assert!(matches!(err, MigrationError::Guard { .. }));
        assert_eq!(directory.call_count(MockOperation::CreateIdentity), 0);
        assert_eq!(cp.call_count(MockOperation::CreateUser), 0);
    }

    #[tokio::test]
    async fn test_space_roles_share_one_membership() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        let acme = cp.add_organization("acme");
        let dev = cp.add_space(&acme, "dev");
        let prod = cp.add_space(&acme, "prod");

        let mut snapshot = MigrationSnapshot::new(SOURCE);
        let mut alice = record("alice");
        alice.space_roles = vec![
            SpaceRole::new("acme", "dev", SpaceRoleKind::Developer),
            SpaceRole::new("acme", "dev", SpaceRoleKind::Auditor),
            SpaceRole::new("acme", "prod", SpaceRoleKind::Manager),
        ];
        snapshot.records.push(alice);

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        assert!(report.record("alice").unwrap().is_success());
        assert_eq!(cp.call_count(MockOperation::AssociateUser), 1);
        assert_eq!(cp.call_count(MockOperation::FindOrganizations), 1);
        assert_eq!(cp.call_count(MockOperation::FindSpaces), 2);

        let user = directory.identity("alice").unwrap().id;
        let mut expected = vec![
            (dev.clone(), SpaceRoleKind::Developer),
            (dev, SpaceRoleKind::Auditor),
            (prod, SpaceRoleKind::Manager),
        ];
        expected.sort();
        assert_eq!(cp.space_roles_of(&user), expected);
    }

    #[tokio::test]
    async fn test_no_roles_means_no_membership() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        cp.add_organization("acme");
        let mut snapshot = MigrationSnapshot::new(SOURCE);
        snapshot.records.push(record("alice"));

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        assert!(matches!(
            report.records[0].outcome,
            RecordOutcome::Succeeded { granted: 0 }
        ));
        assert_eq!(cp.call_count(MockOperation::AssociateUser), 0);
        assert_eq!(cp.call_count(MockOperation::CreateUser), 1);
    }

    #[tokio::test]
    async fn test_failed_membership_is_retried_by_next_role() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        let acme = cp.add_organization("acme");
        cp.inject_failure(MockOperation::AssociateUser, 1);

        let mut snapshot = MigrationSnapshot::new(SOURCE);
        let mut alice = record("alice");
        alice.org_roles = vec![
            OrgRole::new("acme", OrgRoleKind::Manager),
            OrgRole::new("acme", OrgRoleKind::Auditor),
        ];
        snapshot.records.push(alice);

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        match &report.records[0].outcome {
            RecordOutcome::Partial { granted, failed } => {
                assert_eq!(*granted, 1);
                assert_eq!(failed.len(), 1);
                assert!(matches!(failed[0].error, MigrationError::Transport { .. }));
            },
            other => panic!("expected partial outcome, got {other:?}"),
        }
        assert_eq!(cp.call_count(MockOperation::AssociateUser), 2);

        let user = directory.identity("alice").unwrap().id;
        assert_eq!(cp.org_roles_of(&user), vec![(acme, OrgRoleKind::Auditor)]);
    }

    #[tokio::test]
    async fn test_unknown_organization_fails_only_that_role() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        let acme = cp.add_organization("acme");

        let mut snapshot = MigrationSnapshot::new(SOURCE);
        let mut alice = record("alice");
        alice.org_roles = vec![
            OrgRole::new("ghost", OrgRoleKind::Manager),
            OrgRole::new("acme", OrgRoleKind::BillingManager),
        ];
        snapshot.records.push(alice);

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        let failures: Vec<_> = report.role_failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1.error, MigrationError::NotFound { .. }));

        let user = directory.identity("alice").unwrap().id;
        assert_eq!(cp.org_roles_of(&user), vec![(acme, OrgRoleKind::BillingManager)]);
    }

    #[tokio::test]
    async fn test_record_without_external_id_is_rejected_before_creation() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();

        let mut snapshot = MigrationSnapshot::new(SOURCE);
        snapshot
            .records
            .push(UserMigrationRecord::builder().username("mallory").external_id("").build());
        snapshot
            .records
            .push(UserMigrationRecord::builder().username("").external_id("cn=nobody").build());
        snapshot.records.push(record("alice"));

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        for rejected in &report.records[..2] {
            match &rejected.outcome {
                RecordOutcome::Failed { stage, error } => {
                    assert_eq!(*stage, FailureStage::Validation);
                    assert!(matches!(error, MigrationError::Invalid { .. }));
                },
                other => panic!("expected validation failure, got {other:?}"),
            }
        }
        assert!(report.record("alice").unwrap().is_success());
        assert_eq!(report.skipped(), 2);
        assert_eq!(directory.call_count(MockOperation::CreateIdentity), 1);
        assert_eq!(cp.call_count(MockOperation::CreateUser), 1);
    }

    #[tokio::test]
    async fn test_space_role_without_organization_name_fails_only_that_role() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        let acme = cp.add_organization("acme");
        let dev = cp.add_space(&acme, "dev");

        let mut snapshot = MigrationSnapshot::new(SOURCE);
        let mut alice = record("alice");
        alice.space_roles = vec![
            SpaceRole::new("", "dev", SpaceRoleKind::Developer),
            SpaceRole::new("acme", "dev", SpaceRoleKind::Manager),
        ];
        snapshot.records.push(alice);

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        let failures: Vec<_> = report.role_failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1.error, MigrationError::Invalid { .. }));
        assert_eq!(cp.call_count(MockOperation::FindOrganizations), 1);

        let user = directory.identity("alice").unwrap().id;
        assert_eq!(cp.space_roles_of(&user), vec![(dev, SpaceRoleKind::Manager)]);
    }

    #[tokio::test]
    async fn test_control_plane_user_failure_skips_record() {
        let cp = MockControlPlane::new(TARGET);
        let directory = MockIdentityDirectory::new();
        cp.add_organization("acme");
        cp.inject_failure(MockOperation::CreateUser, 1);

        let mut snapshot = MigrationSnapshot::new(SOURCE);
        let mut alice = record("alice");
        alice.org_roles = vec![OrgRole::new("acme", OrgRoleKind::Manager)];
        snapshot.records.push(alice);

        let report = Importer::new(&cp, &directory).run(&snapshot).await.unwrap();

        assert!(matches!(
            report.records[0].outcome,
            RecordOutcome::Failed { stage: FailureStage::ControlPlaneUser, .. }
        ));
        assert_eq!(report.skipped(), 1);
        assert_eq!(cp.call_count(MockOperation::FindOrganizations), 0);
    }
}
