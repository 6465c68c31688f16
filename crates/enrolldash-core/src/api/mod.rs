//! Dashboard backend access.
//!
//! The coordinator only sees the `StatsEndpoint` and `ChartsEndpoint` traits.
//! `ApiClient` is the reqwest-backed implementation talking to
//! `GET /auth/dashboard` and `GET /auth/dashboard/charts`.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::ApiClient;
pub use endpoints::{ChartsEndpoint, StatsEndpoint};
pub use error::ApiError;
