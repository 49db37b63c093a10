//! # cinesim API
//!
//! REST surface over a loaded [`cinesim_core::RecommendationEngine`]. The
//! engine is built before the server starts and injected into every handler
//! as shared app data.

pub mod error;
pub mod rest;
pub mod settings;

pub use error::{ApiError, ApiResult};
pub use rest::{routes, RestApi};
pub use settings::ServerSettings;
