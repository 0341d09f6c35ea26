//! # autopatch server
//!
//! Web front-end for the autopatch workflow. Users sign in against the local
//! credential table, upload a C source file, and get back every stage of the
//! compile → crash search → patch → verify run.
//!
//! Routes live under `/api/v1`; `GET /health` reports liveness.

pub mod auth;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use routes::create_app;
