mod account;
mod client;
mod envelope;

#[cfg(test)]
mod tests;

pub use client::{UpstreamClient, QUERY_DATETIME_FORMAT};
