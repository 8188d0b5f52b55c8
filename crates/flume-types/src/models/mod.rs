//! Core domain models for the exporter.

mod device;
mod scrape;
mod token;
mod usage;

pub use device::{Device, DeviceKind};
pub use scrape::{Endpoint, ScrapeOutcome};
pub use token::{AuthStatus, Credentials, TokenFile, TokenOwner};
pub use usage::{FlowRate, UsageBucket, UsagePoint};
