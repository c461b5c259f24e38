//! HTTP-facing handlers: the admin/control-plane surface (C10). The
//! gateway's own traffic-path handler lives in [`crate::pipeline`] since it
//! isn't a standalone route, it's the default service every non-admin
//! path falls through to.

pub mod admin;
