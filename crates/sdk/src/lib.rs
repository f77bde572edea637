//! Clients for the services a user migration talks to.
//!
//! A migration reads from and writes to two services per deployment:
//!
//! - the **control plane**, which owns organizations, spaces, users and role grants
//! - the **identity directory**, which owns login identities and their upstream ids
//!
//! Both are reached through traits ([`ControlPlane`], [`IdentityDirectory`]) so
//! the migration engine can run against live deployments or the in-memory
//! doubles in [`mock`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use user_migration_sdk::{CloudControllerClient, ClientConfig, UaaClient, UaaConfig};
//!
//! let config = ClientConfig::builder()
//!     .with_api_endpoint("https://api.sys.example.com")
//!     .with_access_token(session_token)
//!     .build()?;
//! let control_plane = CloudControllerClient::new(config)?;
//!
//! let uaa = UaaConfig::builder()
//!     .server_url("https://uaa.sys.example.com")
//!     .client_id("migrator")
//!     .client_secret(secret)
//!     .build()?;
//! let directory = UaaClient::connect(uaa).await?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │   CloudControllerClient      │         UaaClient            │
//! │   (ControlPlane)             │   (IdentityDirectory)        │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │              Resilience Layer (backon)                      │
//! │   Exponential backoff │ Jitter │ Idempotent requests only   │
//! ├─────────────────────────────────────────────────────────────┤
//! │              HttpTransport (reqwest)                        │
//! │   Bearer auth │ Error envelopes │ JSON decoding             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod control_plane;
mod error;
mod http;
mod identity;
pub mod mock;
mod retry;

// Public API exports
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_ORIGIN, RetryPolicy, RetryPolicyBuilder, UaaConfig,
};
pub use control_plane::{CloudControllerClient, ControlPlane};
pub use error::{Result, SdkError};
pub use identity::{IdentityDirectory, UaaClient};
pub use retry::with_retry;
