//! Stowage file-serving endpoint
//!
//! Serves files from the local storage root at `GET /storage?path={key}`,
//! the URL that local-mode uploads resolve to.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;
