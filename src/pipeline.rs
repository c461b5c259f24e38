//! Gateway pipeline (C9) and composer (C11): the innermost stage of the
//! admission chain. By the time a request reaches [`GatewayPipeline::handle`]
//! it has already cleared trace/concurrency/rate-limit admission (spec
//! §4.9); this module does the route match, header rewrite, circuit check
//! and retrying forward, then translates the outcome into a client
//! response.
//!
//! [`GatewayPipeline`] and [`crate::routes::admin::AdminState`] hold two
//! independent references to the same [`Forwarder`]: the pipeline drives
//! traffic through it, the admin surface only reads its circuit breaker for
//! introspection (spec §4.11); neither wraps the other.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use futures_util::future::BoxFuture;
use log::{info, warn};
use reqwest::Method;

use crate::errors::GatewayError;
use crate::models::{RequestContext, RouteTable};
use crate::services::forwarder::ForwardParams;
use crate::services::header_rewrite;
use crate::services::metrics::Metrics;
use crate::services::Forwarder;

pub struct GatewayPipeline {
    pub route_table: Arc<RouteTable>,
    pub forwarder: Arc<Forwarder>,
    pub default_retries: u32,
    pub default_retry_delay: Duration,
    pub default_timeout: Duration,
}

impl GatewayPipeline {
    /// Runs C1 (route match) through C8 (forward) for one inbound request
    /// and returns the client-facing response. `/__*` paths never reach
    /// here; the admin mux in [`crate::routes::admin::dispatch`] peels them
    /// off first.
    pub async fn handle(&self, req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let trace_id = req
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.trace_id.clone())
            .unwrap_or_else(|| RequestContext::NONE.to_string());

        let path = req.path();
        let method = req.method().clone();

        let Some(entry) = self.route_table.match_path(path) else {
            warn!("[{trace_id}] no route match for {path}");
            Metrics::record_request(method.as_str(), "", 404);
            return GatewayError::RouteNotFound.error_response();
        };

        let route_label = entry.prefix.clone();
        let policy = entry.effective_header_policy();
        let headers = header_rewrite::rewrite(req.headers(), &policy, &trace_id);

        let params = ForwardParams {
            retries: entry.retries.unwrap_or(self.default_retries),
            retry_delay: entry
                .retry_delay
                .map(Duration::from_secs_f64)
                .unwrap_or(self.default_retry_delay),
            timeout: entry
                .timeout
                .map(Duration::from_secs_f64)
                .unwrap_or(self.default_timeout),
        };

        let query = req.query_string();
        let full_path = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };
        let target_url = match reqwest::Url::parse(&format!(
            "{}{}",
            entry.backend.trim_end_matches('/'),
            full_path
        )) {
            Ok(url) => url,
            Err(e) => {
                warn!("[{trace_id}] invalid target URL for route {route_label}: {e}");
                Metrics::record_request(method.as_str(), &route_label, 502);
                return GatewayError::Internal(format!("invalid backend URL: {e}")).error_response();
            }
        };

        let reqwest_method =
            Method::from_bytes(method.as_str().as_bytes()).unwrap_or(Method::GET);

        info!("[{trace_id}] proxying {method} {path} -> {target_url}");

        Metrics::forwarder_entry();
        let start = Instant::now();
        let outcome = self
            .forwarder
            .forward(reqwest_method, &target_url, &headers, body.to_vec(), params)
            .await;
        Metrics::forwarder_exit();
        Metrics::observe_duration(&route_label, start.elapsed().as_secs_f64());

        match outcome {
            Ok(forwarded) => {
                Metrics::record_request(method.as_str(), &route_label, forwarded.status);
                let mut builder = HttpResponse::build(
                    actix_web::http::StatusCode::from_u16(forwarded.status)
                        .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
                );
                for (name, value) in forwarded.headers.iter() {
                    if let Ok(value_str) = value.to_str() {
                        builder.insert_header((name.as_str(), value_str));
                    }
                }
                builder.body(forwarded.body)
            }
            Err(err) => {
                let response = err.error_response();
                Metrics::record_request(method.as_str(), &route_label, response.status().as_u16());
                response
            }
        }
    }
}

/// The `default_service` every non-`/__health` path falls through to, once
/// past trace/concurrency/rate-limit admission: the admin mux (spec §4.9)
/// peels off the reserved `/__` prefix, everything else enters the pipeline.
pub async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    pipeline: web::Data<Arc<GatewayPipeline>>,
    admin: web::Data<Arc<crate::routes::admin::AdminState>>,
) -> HttpResponse {
    if req.path().starts_with("/__") {
        crate::routes::admin::dispatch(req, admin).await
    } else {
        pipeline.handle(req, body).await
    }
}

/// Lifecycle protocol (spec §4.9/§5): startup does no work beyond
/// component construction; shutdown invokes every registered cleanup
/// callback in registration order, awaiting each before moving to the
/// next, then logs completion. Closing the upstream client pool is the
/// canonical callback.
#[derive(Default)]
pub struct Lifecycle {
    callbacks: Vec<Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            callbacks: Vec::new(),
        }
    }

    /// Registers a cleanup callback to run on shutdown, in the order
    /// registered.
    pub fn register_cleanup<F, Fut>(&mut self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks.push(Box::new(move || Box::pin(callback())));
    }

    /// Runs every registered callback in order, awaiting each, then logs
    /// shutdown completion.
    pub async fn shutdown(&self) {
        for callback in &self.callbacks {
            callback().await;
        }
        info!("shutdown complete");
    }
}
