//! Quill API - blog platform REST server
//!
//! The authentication core: credential verification, JWT issuance and
//! validation, single-active-session enforcement through a Redis-backed
//! session cache, and the request-gating middleware.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
