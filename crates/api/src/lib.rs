//! Clipforge API Library
//!
//! HTTP surface over the reconciliation core: provider webhook endpoints,
//! client-driven payment confirmation, the manual payment channel, and
//! subscription reads.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
