//! Export and import of users and their roles between deployments.
//!
//! The engine is written against the [`ControlPlane`] and
//! [`IdentityDirectory`] traits and never talks HTTP itself.
//!
//! - [`Exporter`] walks every control-plane user, flattens the membership
//!   summary into named roles ([`extract_roles`]) and joins each user with its
//!   directory identity.
//! - [`Importer`] replays a [`MigrationSnapshot`] into another deployment,
//!   resolving names to ids through [`ResourceResolver`] and granting each
//!   organization membership once per user ([`MembershipLedger`]).
//!
//! Both return a report rather than failing on a single bad user or role.
//!
//! [`ControlPlane`]: user_migration_sdk::ControlPlane
//! [`IdentityDirectory`]: user_migration_sdk::IdentityDirectory
//! [`MigrationSnapshot`]: user_migration_types::MigrationSnapshot

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dedup;
pub mod error;
pub mod export;
pub mod extractor;
pub mod import;
pub mod report;
pub mod resolver;

pub use dedup::MembershipLedger;
pub use error::{MigrationError, ResourceKind, Result};
pub use export::Exporter;
pub use extractor::{Extraction, OrphanedSpace, extract_roles};
pub use import::Importer;
pub use report::{
    ExportReport, FailureStage, ImportReport, OrphanedRole, RecordOutcome, RecordReport,
    RoleFailure, SkipReason, SkippedUser,
};
pub use resolver::ResourceResolver;
