//! # Flume Types
//!
//! Domain models and error definitions shared by the exporter crates.
//!
//! - **`error`** - Typed errors for upstream calls and configuration
//! - **`models`** - Devices, credentials, usage readings, scrape outcomes
//!
//! ## Architecture Role
//!
//! ```text
//!     flume-types (this crate)
//!            │
//!            ▼
//!       flume-core
//!            │
//!            ▼
//!     flume-exporter
//! ```

pub mod error;
pub mod models;

pub use error::{ConfigError, UpstreamError, UpstreamResult};

pub use models::{
    AuthStatus, Credentials, Device, DeviceKind, Endpoint, FlowRate, ScrapeOutcome, TokenFile,
    TokenOwner, UsageBucket, UsagePoint,
};
