//! REST API client module for the Discursis backend.
//!
//! This module provides the `ApiClient` for logging in, managing projects and
//! fetching the analysis data the visualizations are built from.
//!
//! Every request carries the session's token verbatim in the `Authorization`
//! header. A 401 whose message mentions an expired token invalidates the
//! session before the error reaches the caller.

pub mod client;
pub mod error;


pub use client::ApiClient;
pub use error::ApiError;
