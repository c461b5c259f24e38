//! Rate limit middleware (C4): enforces the per-identity fixed-window
//! admission decision ahead of routing, so identity-based fairness applies
//! even to requests that will eventually 404.
//!
//! Identity is `client_ip:path` per spec §3. Every response carries
//! `RateLimit-Limit`/`RateLimit-Remaining`; a rejection additionally
//! carries `Retry-After` and is recorded against
//! `gateway_rate_limited_requests_total`.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::HeaderValue, StatusCode},
    Error as ActixError, HttpResponse,
};
use futures_util::future::LocalBoxFuture;

use crate::services::metrics::Metrics;
use crate::services::RateLimiter;

pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        RateLimitMiddleware { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client_ip = req
            .peer_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let path = req.path().to_string();
        let identity = format!("{client_ip}:{path}");
        let limiter = self.limiter.clone();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let limit = limiter.limit();
            let decision = limiter.allow(&identity).await;

            if !decision.admitted {
                Metrics::record_rate_limited(&path);
                let response = HttpResponse::build(StatusCode::TOO_MANY_REQUESTS)
                    .insert_header(("RateLimit-Limit", limit.to_string()))
                    .insert_header(("RateLimit-Remaining", "0"))
                    .insert_header(("Retry-After", decision.retry_after_seconds.to_string()))
                    .body("Too Many Requests");
                let (req, _) = req.into_parts();
                return Ok(ServiceResponse::new(req, response).map_into_right_body());
            }

            let remaining = limiter.remaining(&identity).await;
            let mut res = service.call(req).await?.map_into_left_body();
            if let Ok(limit_value) = HeaderValue::from_str(&limit.to_string()) {
                res.headers_mut().insert(
                    actix_web::http::header::HeaderName::from_static("ratelimit-limit"),
                    limit_value,
                );
            }
            if let Ok(remaining_value) = HeaderValue::from_str(&remaining.to_string()) {
                res.headers_mut().insert(
                    actix_web::http::header::HeaderName::from_static("ratelimit-remaining"),
                    remaining_value,
                );
            }
            Ok(res)
        })
    }
}
