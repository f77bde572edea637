//! Shared test utilities for the user migration crates.
//!
//! - [`TestDir`] - temporary directory for snapshot and config files
//! - [`Deployment`] - seeded control plane and identity directory doubles
//! - [`named_roles`] / [`assert_same_roles`] - compare roles across deployments
//! - [`strategies`] - proptest generators for domain types

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::{assert_same_roles, named_roles};

mod fixtures;
pub use fixtures::{Deployment, SOURCE_API, TARGET_API};

pub mod strategies;
