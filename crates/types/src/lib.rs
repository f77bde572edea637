//! Core types for user migration between control-plane deployments.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Identifier newtypes (OrgGuid, SpaceGuid, UserGuid)
//! - Role vocabulary and role assignments
//! - Control-plane wire resources and the generic [`Page`] wrapper
//! - The portable [`MigrationSnapshot`] and its JSON codec

pub mod resources;
pub mod snapshot;
pub mod types;

// Re-export commonly used types at crate root
pub use resources::{
    OrgEntity, OrgResource, Page, Resource, ResourceMetadata, SpaceEntity, SpaceResource,
    UserEntity, UserResource, UserSummary, UserSummaryResource,
};
pub use snapshot::{SnapshotError, decode, encode, read_snapshot, write_snapshot, write_snapshot_to};
pub use types::*;
