//! Configuration loading and validation.
//!
//! - [`loader`] - the injected external collaborator that returns a
//!   serialized route table on demand (spec §1)
//! - [`validation`] - comprehensive validation run before a table is
//!   ever installed

pub mod loader;
pub mod validation;

pub use loader::{FileRouteTableLoader, RouteTableLoader};
pub use validation::{ConfigValidator, ValidationResult};
