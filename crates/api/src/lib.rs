//! HTTP surface of the ICVK registration backend.
//!
//! Endpoints:
//! - POST /api/icvk/register: accept a registration, email a confirmation
//! - GET  /api/icvk/registrations: list registrations (admin JWT)
//! - POST /api/auth/login: exchange admin credentials for a JWT
//! - GET  /, /ping, /health: liveness

pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;
