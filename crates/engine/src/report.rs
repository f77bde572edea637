//! Structured outcomes of export and import runs.
//!
//! Reports collect success, skip and failure per unit (user, record, role).
//! Console output is derived from their [`Display`](std::fmt::Display) impls.

use std::fmt;

use user_migration_types::{RoleAssignment, UserGuid};

use crate::{error::MigrationError, extractor::OrphanedSpace};

// ============================================================================
// Export
// ============================================================================

/// Why a control-plane user was left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The user has no username (e.g. a client principal).
    MissingUsername,
    /// The membership summary could not be fetched.
    SummaryUnavailable {
        /// Error description.
        error: String,
    },
    /// No directory identity has the user's username.
    IdentityNotFound,
    /// The matching identity has no external id.
    MissingExternalId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUsername => f.write_str("no username"),
            Self::SummaryUnavailable { error } => write!(f, "summary unavailable: {error}"),
            Self::IdentityNotFound => f.write_str("no matching identity"),
            Self::MissingExternalId => f.write_str("identity has no external id"),
        }
    }
}

/// A user left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUser {
    /// Control-plane id of the user.
    pub user_guid: UserGuid,
    /// Username, when known.
    pub username: Option<String>,
    /// Why the user was skipped.
    pub reason: SkipReason,
}

/// A space role dropped from an exported user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedRole {
    /// User holding the role.
    pub username: String,
    /// The unattributed space role.
    pub space: OrphanedSpace,
}

/// Outcome of an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Usernames written to the snapshot, in order.
    pub exported: Vec<String>,
    /// Users left out, in listing order.
    pub skipped: Vec<SkippedUser>,
    /// Space roles dropped because their organization was unknown.
    pub orphaned: Vec<OrphanedRole>,
}

impl ExportReport {
    /// Number of users considered.
    #[must_use]
    pub fn total(&self) -> usize {
        self.exported.len() + self.skipped.len()
    }

    /// Returns true if any user or role was left out.
    #[must_use]
    pub fn has_gaps(&self) -> bool {
        !self.skipped.is_empty() || !self.orphaned.is_empty()
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} of {} users ({} skipped, {} orphaned space roles)",
            self.exported.len(),
            self.total(),
            self.skipped.len(),
            self.orphaned.len()
        )?;
        for skipped in &self.skipped {
            let name = skipped.username.as_deref().unwrap_or("<none>");
            writeln!(f, "  skipped {name} ({}): {}", skipped.user_guid, skipped.reason)?;
        }
        for gap in &self.orphaned {
            writeln!(
                f,
                "  orphaned {} {} in space {} ({})",
                gap.username, gap.space.role, gap.space.space_name, gap.space.space_guid
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Import
// ============================================================================

/// Stage at which a record was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Checking the record before any call.
    Validation,
    /// Creating the directory identity.
    Identity,
    /// Creating the control-plane user.
    ControlPlaneUser,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => f.write_str("validation"),
            Self::Identity => f.write_str("identity creation"),
            Self::ControlPlaneUser => f.write_str("user creation"),
        }
    }
}

/// A role that could not be replayed.
#[derive(Debug)]
pub struct RoleFailure {
    /// The role from the snapshot.
    pub role: RoleAssignment,
    /// Why it failed.
    pub error: MigrationError,
}

/// Result of replaying one record.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Every role was granted.
    Succeeded {
        /// Number of roles granted.
        granted: usize,
    },
    /// The user was created but some roles failed.
    Partial {
        /// Number of roles granted.
        granted: usize,
        /// Roles that failed, in replay order.
        failed: Vec<RoleFailure>,
    },
    /// The record was invalid or the user could not be created; no roles
    /// were attempted.
    Failed {
        /// Stage that failed.
        stage: FailureStage,
        /// Why it failed.
        error: MigrationError,
    },
}

/// Outcome of one record.
#[derive(Debug)]
pub struct RecordReport {
    /// Username from the record.
    pub username: String,
    /// What happened.
    pub outcome: RecordOutcome,
}

impl RecordReport {
    /// Returns true if the record replayed completely.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Succeeded { .. })
    }
}

/// Outcome of an import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Per-record outcomes in snapshot order.
    pub records: Vec<RecordReport>,
}

impl ImportReport {
    /// Number of records that reached role replay.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.records.iter().filter(|r| !matches!(r.outcome, RecordOutcome::Failed { .. })).count()
    }

    /// Number of records abandoned before role replay.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.records.len() - self.processed()
    }

    /// Number of records replayed without any failure.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    /// Iterates over every failed role with its username.
    pub fn role_failures(&self) -> impl Iterator<Item = (&str, &RoleFailure)> + '_ {
        self.records.iter().flat_map(|record| {
            let failed: &[RoleFailure] = match &record.outcome {
                RecordOutcome::Partial { failed, .. } => failed,
                _ => &[],
            };
            failed.iter().map(move |failure| (record.username.as_str(), failure))
        })
    }

    /// Returns the report of the record for `username`.
    #[must_use]
    pub fn record(&self, username: &str) -> Option<&RecordReport> {
        self.records.iter().find(|r| r.username == username)
    }

    /// Returns true if any record or role failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.succeeded() != self.records.len()
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Imported {} of {} records ({} complete, {} skipped)",
            self.processed(),
            self.records.len(),
            self.succeeded(),
            self.skipped()
        )?;
        for record in &self.records {
            match &record.outcome {
                RecordOutcome::Succeeded { .. } => {},
                RecordOutcome::Partial { granted, failed } => {
                    writeln!(
                        f,
                        "  {}: {granted} roles granted, {} failed",
                        record.username,
                        failed.len()
                    )?;
                    for failure in failed {
                        writeln!(f, "    {}: {}", failure.role, failure.error)?;
                    }
                },
                RecordOutcome::Failed { stage, error } => {
                    writeln!(f, "  {}: skipped at {stage}: {error}", record.username)?;
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use user_migration_types::{OrgRole, OrgRoleKind, SpaceGuid, SpaceRoleKind};

    use super::*;
    use crate::error::ResourceKind;

    fn sample_import() -> ImportReport {
        ImportReport {
            records: vec![
                RecordReport {
                    username: "alice".to_owned(),
                    outcome: RecordOutcome::Succeeded { granted: 2 },
                },
                RecordReport {
                    username: "bob".to_owned(),
                    outcome: RecordOutcome::Failed {
                        stage: FailureStage::Identity,
                        error: MigrationError::Parse { message: "bad".to_owned() },
                    },
                },
                RecordReport {
                    username: "carol".to_owned(),
                    outcome: RecordOutcome::Partial {
                        granted: 1,
                        failed: vec![RoleFailure {
                            role: OrgRole::new("ghost", OrgRoleKind::Auditor).into(),
                            error: MigrationError::NotFound {
                                kind: ResourceKind::Organization,
                                name: "ghost".to_owned(),
                            },
                        }],
                    },
                },
            ],
        }
    }

    #[test]
    fn test_import_counts() {
        let report = sample_import();
        assert_eq!(report.processed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(report.has_failures());
        assert!(report.record("alice").unwrap().is_success());
    }

    #[test]
    fn test_role_failures_carry_username() {
        let report = sample_import();
        let failures: Vec<_> = report.role_failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "carol");
    }

    #[test]
    fn test_import_display_lists_problems() {
        let text = sample_import().to_string();
        assert!(text.starts_with("Imported 2 of 3 records (1 complete, 1 skipped)"));
        assert!(text.contains("bob: skipped at identity creation"));
        assert!(text.contains("ghost OrgAuditor"));
        assert!(!text.contains("alice"));
    }

    #[test]
    fn test_export_display() {
        let report = ExportReport {
            exported: vec!["alice".to_owned()],
            skipped: vec![SkippedUser {
                user_guid: UserGuid::new("u-2"),
                username: None,
                reason: SkipReason::MissingUsername,
            }],
            orphaned: vec![OrphanedRole {
                username: "alice".to_owned(),
                space: OrphanedSpace {
                    space_guid: SpaceGuid::new("s-9"),
                    space_name: "detached".to_owned(),
                    role: SpaceRoleKind::Manager,
                },
            }],
        };

        let text = report.to_string();
        assert!(text.starts_with("Exported 1 of 2 users (1 skipped, 1 orphaned space roles)"));
        assert!(text.contains("skipped <none> (u-2): no username"));
        assert!(text.contains("orphaned alice SpaceManager in space detached (s-9)"));
        assert!(report.has_gaps());
    }

    #[test]
    fn test_empty_import_has_no_failures() {
        let report = ImportReport::default();
        assert!(!report.has_failures());
        assert_eq!(report.processed(), 0);
    }
}
