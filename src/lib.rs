//! API gateway core: a reverse proxy that mediates traffic to a set of
//! backend services behind a configurable, hot-reloadable route table.
//!
//! - [`models`] - route table, per-request context, gateway-wide settings
//! - [`services`] - the C2–C8 collaborators the pipeline composes
//! - [`middleware`] - the C4–C6 admission-control stages
//! - [`pipeline`] - the gateway handler that wires C1–C8 together (C9)
//! - [`routes`] - the admin/control-plane surface (C10)
//! - [`config`] - route table loading and validation
//! - [`errors`] - the gateway-wide error type and its HTTP mapping
//! - [`logs`] - logger configuration

pub mod config;
pub mod errors;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;
