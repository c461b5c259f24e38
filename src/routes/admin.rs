//! Admin surface (C10): the control-plane endpoints under the reserved
//! `/__` prefix. `/__health` is registered as a plain route ahead of the
//! middleware stack (spec §4.9); everything else under `/__*`, including
//! the rest of this module, still passes through concurrency and rate
//! limiting first, so a saturated gateway cannot be probed for free.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::config::{ConfigValidator, RouteTableLoader};
use crate::models::{parse_route_table, RouteTable};
use crate::services::metrics::Metrics;
use crate::services::{ConcurrencyLimiter, Forwarder, RateLimiter};

/// How close together two `/__reload` calls may land before the second is
/// rejected (spec §4.10).
const RELOAD_THROTTLE: Duration = Duration::from_secs(10);

pub struct AdminState {
    pub route_table: Arc<RouteTable>,
    pub forwarder: Arc<Forwarder>,
    pub concurrency_limiter: Arc<ConcurrencyLimiter>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub rate_window: Duration,
    pub loader: Arc<dyn RouteTableLoader>,
    pub last_reload: Mutex<Option<Instant>>,
}

/// Dispatches any request whose path begins with `/__` by exact match,
/// mirroring the original `AdminRouter.__call__`'s prefix dispatch. Any
/// other `/__*` path is a 404.
pub async fn dispatch(req: HttpRequest, state: web::Data<Arc<AdminState>>) -> HttpResponse {
    match req.path() {
        "/__health" => health(),
        "/__routes" => routes(&state),
        "/__circuit" => circuit(&state).await,
        "/__limits" => limits(&state),
        "/__metrics" => metrics(),
        "/__reload" => reload(&req, &state).await,
        _ => HttpResponse::NotFound().finish(),
    }
}

pub fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

fn routes(state: &AdminState) -> HttpResponse {
    HttpResponse::Ok().json(state.route_table.snapshot())
}

async fn circuit(state: &AdminState) -> HttpResponse {
    HttpResponse::Ok().json(state.forwarder.circuit_breaker().status().await)
}

fn limits(state: &AdminState) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "rate_limit": {
            "limit": state.rate_limiter.limit(),
            "window_seconds": state.rate_window.as_secs(),
        },
        "concurrency_limit": {
            "max": state.concurrency_limiter.max_concurrent(),
            "in_flight": state.concurrency_limiter.in_flight(),
        },
    }))
}

fn metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(Metrics::render())
}

async fn reload(req: &HttpRequest, state: &AdminState) -> HttpResponse {
    if req.method() != actix_web::http::Method::POST {
        return HttpResponse::MethodNotAllowed().finish();
    }

    {
        let mut last = state.last_reload.lock().await;
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < RELOAD_THROTTLE {
                warn!("reload rejected: requested within {RELOAD_THROTTLE:?} of the last one");
                return HttpResponse::TooManyRequests().body("Too Many Requests");
            }
        }
        *last = Some(now);
    }

    let raw = match state.loader.load().await {
        Ok(raw) => raw,
        Err(e) => {
            error!("reload failed to load route table: {e}");
            return HttpResponse::InternalServerError().body("Reload failed");
        }
    };

    let entries = match parse_route_table(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            error!("reload failed to parse route table: {e}");
            return HttpResponse::InternalServerError().body("Reload failed");
        }
    };

    let validation = ConfigValidator::validate_comprehensive(&entries);
    if !validation.is_valid {
        error!("reload failed validation: {:?}", validation.errors);
        return HttpResponse::InternalServerError().body("Reload failed");
    }

    let count = entries.len();
    state.route_table.replace(entries);
    info!("route table reloaded ({count} routes)");
    HttpResponse::Ok().body("Reloaded")
}
