//! Route table: the prefix → backend mapping the gateway matches every
//! inbound path against, plus the per-route overrides and header policy
//! carried alongside each entry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Header rewrite policy applied to a matched route.
///
/// Names are case-insensitive on input and normalized to lowercase once,
/// at construction time, so the rewrite step never has to re-normalize.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderPolicy {
    /// Header names to drop unconditionally.
    #[serde(default)]
    pub remove: HashSet<String>,

    /// Header name → value, overwrites any existing value.
    #[serde(default)]
    pub set: HashMap<String, String>,

    /// Header name → value, applied only if the header is absent.
    #[serde(default)]
    pub append: HashMap<String, String>,
}

impl HeaderPolicy {
    /// The policy used when a matched route supplies no override: strips
    /// credentials that shouldn't cross the proxy boundary and stamps the
    /// gateway's identity on the outbound request.
    pub fn default_policy() -> Self {
        let mut remove = HashSet::new();
        remove.insert("authorization".to_string());
        remove.insert("cookie".to_string());

        let mut set = HashMap::new();
        set.insert("x-gateway".to_string(), "my-api-gateway".to_string());

        HeaderPolicy {
            remove,
            set,
            append: HashMap::new(),
        }
    }

    /// Normalizes all header names to lowercase, collapsing any case-variant
    /// duplicates a hand-authored config might contain.
    fn normalized(self) -> Self {
        HeaderPolicy {
            remove: self.remove.into_iter().map(|n| n.to_lowercase()).collect(),
            set: self
                .set
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            append: self
                .append
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }
}

/// A single routed prefix: the backend it forwards to and any per-route
/// overrides of the pipeline defaults.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteEntry {
    /// Path prefix this entry matches. Never serialized; it's the map key
    /// in the wire format and is filled in during table construction.
    #[serde(skip)]
    pub prefix: String,

    /// Backend base URL (scheme + host + port).
    pub backend: String,

    /// Override of the pipeline's default retry count.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Override of the pipeline's default retry delay, in seconds.
    #[serde(default)]
    pub retry_delay: Option<f64>,

    /// Override of the pipeline's default per-attempt timeout, in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Override of the default header policy for this route.
    #[serde(default)]
    pub header_policy: Option<HeaderPolicy>,
}

impl RouteEntry {
    /// Validates this entry in isolation (prefix shape and backend URL are
    /// checked separately by the table, which owns uniqueness).
    pub fn validate(&self) -> Result<(), String> {
        if !self.prefix.starts_with('/') || self.prefix.is_empty() {
            return Err(format!(
                "route prefix must be non-empty and start with '/': {:?}",
                self.prefix
            ));
        }
        let url = reqwest::Url::parse(&self.backend)
            .map_err(|e| format!("invalid backend URL {:?}: {e}", self.backend))?;
        if url.host_str().is_none() {
            return Err(format!("backend URL has no host: {:?}", self.backend));
        }
        if let Some(r) = self.retry_delay {
            if r < 0.0 {
                return Err("retry_delay must be non-negative".to_string());
            }
        }
        if let Some(t) = self.timeout {
            if t <= 0.0 {
                return Err("timeout must be positive".to_string());
            }
        }
        Ok(())
    }

    /// The effective header policy for this route: its own override, or
    /// the gateway-wide default when none is configured.
    pub fn effective_header_policy(&self) -> HeaderPolicy {
        self.header_policy
            .clone()
            .map(HeaderPolicy::normalized)
            .unwrap_or_else(HeaderPolicy::default_policy)
    }
}

/// The live, swappable set of routes. Readers never take a lock: they load
/// an `Arc` snapshot of the whole table and match against it, so a
/// concurrent `replace` is observed as either fully-old or fully-new, never
/// torn.
pub struct RouteTable {
    inner: ArcSwap<Vec<RouteEntry>>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        RouteTable {
            inner: ArcSwap::from_pointee(Self::sorted(entries)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Sorts by descending prefix length so the first match encountered in
    /// a linear scan is always the longest.
    fn sorted(mut entries: Vec<RouteEntry>) -> Vec<RouteEntry> {
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        entries
    }

    /// Atomically replaces the table. Visible to subsequent `match_path`
    /// calls as a whole; in-flight matches keep using the snapshot they
    /// already loaded.
    pub fn replace(&self, entries: Vec<RouteEntry>) {
        self.inner.store(Arc::new(Self::sorted(entries)));
    }

    /// Longest-prefix match: a path matches an entry's prefix if it equals
    /// it or simply begins with it, no boundary check on the next
    /// character. The table is pre-sorted so the first hit is the longest.
    pub fn match_path(&self, path: &str) -> Option<RouteEntry> {
        let snapshot = self.inner.load();
        snapshot
            .iter()
            .find(|entry| Self::matches(&entry.prefix, path))
            .cloned()
    }

    fn matches(prefix: &str, path: &str) -> bool {
        path == prefix || path.starts_with(prefix)
    }

    /// A snapshot of the table keyed by prefix, for `/__routes`.
    pub fn snapshot(&self) -> HashMap<String, RouteEntry> {
        self.inner
            .load()
            .iter()
            .map(|e| (e.prefix.clone(), e.clone()))
            .collect()
    }
}

/// Parses the wire-format route table JSON (spec §6: an object keyed by
/// prefix, dict-valued entries only, a bare string value is rejected).
pub fn parse_route_table(json: &str) -> Result<Vec<RouteEntry>, String> {
    let raw: HashMap<String, RouteEntry> =
        serde_json::from_str(json).map_err(|e| format!("invalid route table JSON: {e}"))?;

    let mut entries = Vec::with_capacity(raw.len());
    let mut seen_prefixes: HashSet<String> = HashSet::new();
    for (prefix, mut entry) in raw {
        entry.prefix = prefix.clone();
        entry.validate()?;
        if !seen_prefixes.insert(prefix.clone()) {
            return Err(format!("duplicate route prefix: {prefix}"));
        }
        entries.push(entry);
    }

    // Two distinct prefixes of equal length can never both match the same
    // path (matching requires exact leading characters), so the "ties must
    // not occur" invariant in spec §3 is already guaranteed by the
    // duplicate-prefix check above; no further work is needed here.
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::new(vec![
            RouteEntry {
                prefix: "/a".to_string(),
                backend: "http://a".to_string(),
                retries: None,
                retry_delay: None,
                timeout: None,
                header_policy: None,
            },
            RouteEntry {
                prefix: "/a/b".to_string(),
                backend: "http://b".to_string(),
                retries: None,
                retry_delay: None,
                timeout: None,
                header_policy: None,
            },
        ]);

        let matched = table.match_path("/a/b/c").expect("should match");
        assert_eq!(matched.prefix, "/a/b");
    }

    #[test]
    fn exact_and_prefix_match() {
        let table = RouteTable::new(vec![RouteEntry {
            prefix: "/users".to_string(),
            backend: "http://u".to_string(),
            retries: None,
            retry_delay: None,
            timeout: None,
            header_policy: None,
        }]);

        assert!(table.match_path("/users").is_some());
        assert!(table.match_path("/users/42").is_some());
        // Plain prefix matching, no boundary check: "/usersx" still matches "/users".
        assert!(table.match_path("/usersx").is_some());
        assert!(table.match_path("/other").is_none());
    }

    #[test]
    fn replace_is_atomic_swap() {
        let table = RouteTable::empty();
        assert!(table.match_path("/api").is_none());
        table.replace(vec![RouteEntry {
            prefix: "/api".to_string(),
            backend: "http://b".to_string(),
            retries: None,
            retry_delay: None,
            timeout: None,
            header_policy: None,
        }]);
        assert!(table.match_path("/api").is_some());
    }

    #[test]
    fn default_header_policy_strips_credentials() {
        let policy = HeaderPolicy::default_policy();
        assert!(policy.remove.contains("authorization"));
        assert!(policy.remove.contains("cookie"));
        assert_eq!(policy.set.get("x-gateway").unwrap(), "my-api-gateway");
    }

    #[test]
    fn parse_rejects_duplicate_prefix_is_impossible_from_map() {
        // A JSON object cannot contain duplicate keys, so this exercises the
        // validate() path instead: an invalid backend URL is rejected.
        let err = parse_route_table(r#"{"/a": {"backend": "not-a-url"}}"#).unwrap_err();
        assert!(err.contains("invalid backend URL"));
    }

    #[test]
    fn parse_rejects_bad_prefix() {
        let err = parse_route_table(r#"{"": {"backend": "http://b"}}"#).unwrap_err();
        assert!(err.contains("prefix"));
    }
}
