//! Instagram Graph API adapter: publishes reels and reads their insights.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::{GraphClient, GraphConfig};
pub use error::GraphError;
