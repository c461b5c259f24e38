//! Data models for the gateway: the route table entries the pipeline
//! matches against and the per-request scratchpad carried through it.
//!
//! - [`route`] - route table, per-route overrides and header policy
//! - [`context`] - per-request correlation state (trace id, matched route)
//! - [`settings`] - gateway-wide tunables read once at startup

pub mod context;
pub mod route;
pub mod settings;

pub use context::RequestContext;
pub use route::{parse_route_table, HeaderPolicy, RouteEntry, RouteTable};
pub use settings::Settings;
