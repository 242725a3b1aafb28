//! Core library for the Discursis text analytics client.
//!
//! - `auth`: session store, persisted auth cookie, advisory token decoding
//! - `api`: REST client with the expired-token response interceptor
//! - `models`: project and analysis payloads returned by the backend
//! - `config`: persisted client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{CookieJar, FileCookieJar, MemoryCookieJar, SessionEvent, SessionStore};
pub use config::Config;
