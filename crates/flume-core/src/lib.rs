//! # Flume Core
//!
//! Authenticated, rate-limited collection against the Flume water API.
//!
//! ```text
//! flume-core/src/
//! ├── rate_limiter.rs   # global minimum spacing between upstream calls
//! ├── token_manager/    # OAuth lifecycle + token file persistence
//! ├── upstream/         # endpoint calls, response classification, decoding
//! ├── scheduler/        # collection passes, bulk cadence, device filter
//! ├── sink/             # MetricsSink trait + Prometheus recorder
//! └── config.rs         # validated exporter configuration
//! ```
//!
//! Every upstream call goes through [`RateLimiter::wait`] and
//! [`TokenManager::ensure_valid`] before a request is sent.

#![cfg_attr(
    test,
    allow(clippy::panic, clippy::float_cmp, clippy::assertions_on_result_states)
)]

pub mod clock;
pub mod config;
pub mod error;
pub mod rate_limiter;
pub mod scheduler;
pub mod sink;
pub mod token_manager;
pub mod upstream;
pub mod utils;

pub use clock::{Clock, Delay, ManualClock, SystemClock, TokioDelay};
pub use config::ExporterConfig;
pub use error::{AppError, AppResult};
pub use rate_limiter::RateLimiter;
pub use scheduler::{CollectionScheduler, CollectionWindow, DeviceFilter, PassReport};
pub use sink::{MetricsSink, PrometheusSink, RecordingSink};
pub use token_manager::{OAuthSettings, TokenManager, TokenPolicy, TokenStore};
pub use upstream::UpstreamClient;
