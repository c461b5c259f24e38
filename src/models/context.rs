//! Per-request correlation state, the Rust analogue of the Python
//! implementation's `contextvars.ContextVar`: stashed in the request's
//! extension map at ingress and read by every downstream stage and the
//! access logger.

use std::time::Instant;

/// Scratchpad created once per request at pipeline entry and dropped once
/// the response has been sent.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub started_at: Instant,
    pub matched_prefix: Option<String>,
}

impl RequestContext {
    pub fn new(trace_id: String) -> Self {
        RequestContext {
            trace_id,
            started_at: Instant::now(),
            matched_prefix: None,
        }
    }

    /// Placeholder used in log lines produced outside of any request.
    pub const NONE: &'static str = "-";
}
