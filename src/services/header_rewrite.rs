//! Header rewriter (C2): turns the raw inbound header list into the
//! name→value map forwarded to the backend, applying the route's
//! `HeaderPolicy` and stamping the trace id.

use actix_web::http::header::HeaderMap;
use std::collections::HashMap;

use crate::models::HeaderPolicy;

/// Headers that are meaningful only between one hop and the next and must
/// never be forwarded across the proxy boundary.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Applies `policy` to `headers`, in the exact order the contract requires:
/// decode+lowercase, drop `remove`, drop `host`, drop hop-by-hop, apply
/// `set` (overwrite), apply `append` (only if absent), stamp `x-trace-id`.
///
/// Duplicate inbound header names collapse to their last value before any
/// policy step runs, matching `HeaderMap`'s own iteration order semantics.
pub fn rewrite(headers: &HeaderMap, policy: &HeaderPolicy, trace_id: &str) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();

    for (name, value) in headers.iter() {
        let name = name.as_str().to_lowercase();
        if let Ok(value) = value.to_str() {
            out.insert(name, value.to_string());
        }
    }

    for name in &policy.remove {
        out.remove(name);
    }

    out.remove("host");

    for name in HOP_BY_HOP {
        out.remove(*name);
    }

    for (name, value) in &policy.set {
        out.insert(name.clone(), value.clone());
    }

    for (name, value) in &policy.append {
        out.entry(name.clone()).or_insert_with(|| value.clone());
    }

    out.insert("x-trace-id".to_string(), trace_id.to_string());

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn applies_remove_set_append_and_trace_id() {
        let mut remove = std::collections::HashSet::new();
        remove.insert("x-remove-this".to_string());
        let mut set = HashMap::new();
        set.insert("x-api".to_string(), "auth-service".to_string());
        let mut append = HashMap::new();
        append.insert("x-version".to_string(), "1.0".to_string());
        let policy = HeaderPolicy { remove, set, append };

        let result = rewrite(
            &headers(&[("x-remove-this", "bad"), ("accept", "*/*")]),
            &policy,
            "trace-123",
        );

        assert!(!result.contains_key("x-remove-this"));
        assert_eq!(result.get("x-api").unwrap(), "auth-service");
        assert_eq!(result.get("x-version").unwrap(), "1.0");
        assert_eq!(result.get("x-trace-id").unwrap(), "trace-123");
        assert_eq!(result.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn append_does_not_overwrite_existing() {
        let mut append = HashMap::new();
        append.insert("x-version".to_string(), "should-not-apply".to_string());
        let policy = HeaderPolicy {
            remove: Default::default(),
            set: Default::default(),
            append,
        };

        let result = rewrite(&headers(&[("x-version", "2.0")]), &policy, "t1");
        assert_eq!(result.get("x-version").unwrap(), "2.0");
    }

    #[test]
    fn strips_host_and_hop_by_hop() {
        let policy = HeaderPolicy::default();
        let result = rewrite(
            &headers(&[("host", "example.com"), ("connection", "keep-alive")]),
            &policy,
            "t1",
        );
        assert!(!result.contains_key("host"));
        assert!(!result.contains_key("connection"));
    }

    #[test]
    fn default_policy_strips_authorization_and_cookie() {
        let policy = HeaderPolicy::default_policy();
        let result = rewrite(
            &headers(&[("authorization", "Bearer x"), ("cookie", "a=b")]),
            &policy,
            "t1",
        );
        assert!(!result.contains_key("authorization"));
        assert!(!result.contains_key("cookie"));
        assert_eq!(result.get("x-gateway").unwrap(), "my-api-gateway");
    }
}
