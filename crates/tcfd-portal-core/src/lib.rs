//! Core library for the TCFD reporting portal client.
//!
//! This crate holds everything that is not presentation:
//!
//! - `auth`: the session store, its persistent storage and keychain credentials
//! - `api`: the HTTP transport seam, the authenticated API client and the raw auth service
//! - `models`: request/response payloads for the backend services
//! - `controller`: page controllers (login, signup, TCFD dashboard, materiality)
//! - `cache`: on-disk cache of slowly-changing service data
//! - `config`: service base URLs and session policy

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod controller;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, AuthService};
pub use auth::{SessionSnapshot, SessionStore};
pub use config::Config;
