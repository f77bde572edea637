//! Export: read every user of a deployment into a snapshot.

use std::collections::HashMap;

use user_migration_sdk::{ControlPlane, IdentityDirectory};
use user_migration_types::{ExternalIdentity, MigrationSnapshot, UserMigrationRecord};

use crate::{
    error::Result,
    extractor::extract_roles,
    report::{ExportReport, OrphanedRole, SkipReason, SkippedUser},
};

/// Reads users, their roles and their identities from one deployment.
pub struct Exporter<'a, C: ?Sized, D: ?Sized> {
    control_plane: &'a C,
    directory: &'a D,
}

impl<'a, C, D> Exporter<'a, C, D>
where
    C: ControlPlane + ?Sized,
    D: IdentityDirectory + ?Sized,
{
    /// Creates an exporter over a deployment's control plane and directory.
    pub fn new(control_plane: &'a C, directory: &'a D) -> Self {
        Self { control_plane, directory }
    }

    /// Builds a snapshot of every exportable user.
    ///
    /// Users are visited in listing order. A user is skipped, and reported,
    /// when it has no username, its summary cannot be fetched, or no
    /// identity with an external id matches its username.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing users or identities fails.
    pub async fn run(&self) -> Result<(MigrationSnapshot, ExportReport)> {
        let source_api_url = self.control_plane.api_endpoint().to_owned();
        tracing::info!(api = %source_api_url, "exporting users");

        let identities = self.directory.list_identities().await?;
        // Usernames may repeat across origins; the first listed identity wins.
        let mut by_username: HashMap<&str, &ExternalIdentity> = HashMap::new();
        for identity in &identities {
            by_username.entry(identity.username.as_str()).or_insert(identity);
        }
        tracing::debug!(count = identities.len(), "loaded identities");

        let mut snapshot = MigrationSnapshot::new(source_api_url);
        let mut report = ExportReport::default();
        let mut next: Option<String> = None;

        loop {
            let page = self.control_plane.list_users(next.as_deref()).await?;

            for user in &page.items {
                let user_guid = user.user_guid();
                let Some(username) = user.username() else {
                    tracing::debug!(user = %user_guid, "skipping user without username");
                    report.skipped.push(SkippedUser {
                        user_guid,
                        username: None,
                        reason: SkipReason::MissingUsername,
                    });
                    continue;
                };

                let skip = |reason: SkipReason| SkippedUser {
                    user_guid: user_guid.clone(),
                    username: Some(username.to_owned()),
                    reason,
                };

                let summary = match self.control_plane.user_summary(&user_guid).await {
                    Ok(summary) => summary.entity,
                    Err(e) => {
                        tracing::warn!(username, error = %e, "failed to fetch user summary");
                        report.skipped.push(skip(SkipReason::SummaryUnavailable {
                            error: e.to_string(),
                        }));
                        continue;
                    },
                };

                let extraction = extract_roles(&summary);
                for gap in &extraction.orphaned {
                    tracing::warn!(
                        username,
                        space = %gap.space_guid,
                        space_name = %gap.space_name,
                        role = %gap.role,
                        "space has no owning organization; role not exported"
                    );
                }

                let identity = match by_username.get(username) {
                    Some(identity) => identity,
                    None => {
                        tracing::warn!(username, "no identity found for user");
                        report.skipped.push(skip(SkipReason::IdentityNotFound));
                        continue;
                    },
                };
                if identity.external_id.is_empty() {
                    tracing::warn!(username, "identity has no external id");
                    report.skipped.push(skip(SkipReason::MissingExternalId));
                    continue;
                }

                report.orphaned.extend(
                    extraction
                        .orphaned
                        .iter()
                        .cloned()
                        .map(|space| OrphanedRole { username: username.to_owned(), space }),
                );

                tracing::debug!(
                    username,
                    org_roles = extraction.org_roles.len(),
                    space_roles = extraction.space_roles.len(),
                    "exported user"
                );
                snapshot.records.push(
                    UserMigrationRecord::builder()
                        .username(username)
                        .external_id(identity.external_id.clone())
                        .emails(identity.emails.clone())
                        .org_roles(extraction.org_roles)
                        .space_roles(extraction.space_roles)
                        .build(),
                );
                report.exported.push(username.to_owned());
            }

            match page.next {
                Some(url) => next = Some(url),
                None => break,
            }
        }

        tracing::info!(
            exported = report.exported.len(),
            skipped = report.skipped.len(),
            orphaned = report.orphaned.len(),
            "export finished"
        );
        Ok((snapshot, report))
    }
}
