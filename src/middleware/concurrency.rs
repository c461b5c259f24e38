//! Concurrency limiter middleware (C5): sheds at the global in-flight cap
//! before any downstream work, including the rate-limit map, is touched.
//!
//! Holds the admitted `InFlightGuard` for the request's full lifetime so
//! the decrement fires on every exit path (success, error, or the future
//! being dropped on client disconnect), per spec §4.5/§5.

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

use crate::services::ConcurrencyLimiter;

pub struct ConcurrencyMiddleware {
    limiter: Arc<ConcurrencyLimiter>,
}

impl ConcurrencyMiddleware {
    pub fn new(limiter: Arc<ConcurrencyLimiter>) -> Self {
        ConcurrencyMiddleware { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ConcurrencyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = ConcurrencyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ConcurrencyMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct ConcurrencyMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<ConcurrencyLimiter>,
}

impl<S, B> Service<ServiceRequest> for ConcurrencyMiddlewareService<S>
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
        let max = self.limiter.max_concurrent();

        let Some(guard) = self.limiter.try_admit() else {
            let response = HttpResponse::build(StatusCode::SERVICE_UNAVAILABLE)
                .insert_header(("X-Concurrency-Limit", max.to_string()))
                .insert_header(("X-Concurrency-Remaining", "0"))
                .body("Too Many Concurrent Requests");
            let (req, _) = req.into_parts();
            return Box::pin(async move {
                Ok(ServiceResponse::new(req, response).map_into_right_body())
            });
        };

        let limiter = self.limiter.clone();
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let mut res = service.call(req).await?.map_into_left_body();
            let remaining = max.saturating_sub(limiter.in_flight());
            if let Ok(limit_value) = HeaderValue::from_str(&max.to_string()) {
                res.headers_mut().insert(
                    actix_web::http::header::HeaderName::from_static("x-concurrency-limit"),
                    limit_value,
                );
            }
            if let Ok(remaining_value) = HeaderValue::from_str(&remaining.to_string()) {
                res.headers_mut().insert(
                    actix_web::http::header::HeaderName::from_static("x-concurrency-remaining"),
                    remaining_value,
                );
            }
            drop(guard);
            Ok(res)
        })
    }
}
