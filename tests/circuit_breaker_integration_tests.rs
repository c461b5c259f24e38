//! Exercises the forwarder's circuit breaker wiring end to end: an
//! always-failing backend trips the breaker, further calls are rejected
//! without ever reaching the network, and the breaker reopens for traffic
//! once the recovery window elapses (spec §4.3/§8 scenario S4).

mod common;

use std::time::Duration;

use actix_web::{test, web};
use gateway_rs::models::{RouteEntry, RouteTable};
use gateway_rs::pipeline::GatewayPipeline;
use gateway_rs::services::{CircuitBreaker, CircuitBreakerConfig, Forwarder};

fn pipeline_with(backend: String, failure_threshold: u64, recovery_time: Duration) -> GatewayPipeline {
    let forwarder = Forwarder::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold,
        recovery_time,
    }));

    GatewayPipeline {
        route_table: std::sync::Arc::new(RouteTable::new(vec![RouteEntry {
            prefix: "/flaky".to_string(),
            backend,
            retries: Some(0),
            retry_delay: Some(0.0),
            timeout: Some(1.0),
            header_policy: None,
        }])),
        forwarder: std::sync::Arc::new(forwarder),
        default_retries: 0,
        default_retry_delay: Duration::from_millis(1),
        default_timeout: Duration::from_secs(1),
    }
}

#[actix_web::test]
async fn breaker_opens_after_threshold_then_recovers() {
    // Three failing responses trip a threshold-of-3 breaker; a fourth,
    // healthy response is queued on the same authority for the request
    // that lands once the recovery window has elapsed.
    let (addr, _log) = common::spawn_mock_upstream(vec![
        (500, "a"),
        (500, "b"),
        (500, "c"),
        (200, "recovered"),
    ])
    .await;
    let backend = format!("http://{addr}");
    let pipeline = pipeline_with(backend, 3, Duration::from_millis(200));

    for _ in 0..3 {
        let req = test::TestRequest::get().uri("/flaky/x").to_http_request();
        let resp = pipeline.handle(req, web::Bytes::new()).await;
        assert_eq!(resp.status(), 502);
    }

    // The breaker is now open: this request is rejected before any
    // connection is attempted, leaving the queued 4th response untouched.
    let req = test::TestRequest::get().uri("/flaky/x").to_http_request();
    let resp = pipeline.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 502);
    assert_eq!(
        resp.headers().get("X-Circuit-Open").map(|v| v.to_str().unwrap()),
        Some("true")
    );

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Recovery window elapsed: the implicit probe request is let through
    // and consumes the queued healthy response.
    let req = test::TestRequest::get().uri("/flaky/x").to_http_request();
    let resp = pipeline.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn circuit_breaker_unit_allow_record_cycle() {
    let breaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        recovery_time: Duration::from_millis(50),
    });

    assert!(breaker.allow_request("svc").await);
    breaker.record_failure("svc").await;
    assert!(breaker.allow_request("svc").await);
    breaker.record_failure("svc").await;
    assert!(!breaker.allow_request("svc").await);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(breaker.allow_request("svc").await);

    breaker.record_success("svc").await;
    assert!(breaker.allow_request("svc").await);
}
