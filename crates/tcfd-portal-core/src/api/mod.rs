//! HTTP access to the portal's backend services.
//!
//! `transport` is the seam over reqwest, `client` the authenticated client
//! with refresh-and-replay on 401, and `auth` the raw Auth service calls the
//! session store relies on.

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::AuthService;
pub use client::{ApiClient, Auth, Endpoints};
pub use error::ApiError;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
