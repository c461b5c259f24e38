//! Concurrency limiter middleware (C5) exercised through the actix
//! `Service` it produces: requests beyond the global cap are shed with a
//! `503` while the cap is exhausted, then admitted again once in-flight
//! work completes (spec §8 scenario S7).

use std::time::Duration;

use actix_web::{test, web, App, HttpResponse};
use gateway_rs::middleware::ConcurrencyMiddleware;
use gateway_rs::services::ConcurrencyLimiter;

#[actix_web::test]
async fn sheds_past_the_cap_then_admits_once_freed() {
    let limiter = ConcurrencyLimiter::new(1);

    let app = test::init_service(
        App::new()
            .wrap(ConcurrencyMiddleware::new(limiter.clone()))
            .default_service(web::route().to(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                HttpResponse::Ok().body("ok")
            })),
    )
    .await;

    let slow = test::TestRequest::get().uri("/a").to_request();
    let shed = test::TestRequest::get().uri("/b").to_request();

    // Polled together so the slow request's admission (synchronous, ahead
    // of its sleep) lands before the shed attempt is evaluated.
    let (slow_resp, shed_resp) =
        tokio::join!(test::call_service(&app, slow), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            test::call_service(&app, shed).await
        });

    assert_eq!(shed_resp.status(), 503);
    assert_eq!(shed_resp.headers().get("x-concurrency-remaining").unwrap(), "0");

    assert_eq!(slow_resp.status(), 200);
    assert_eq!(limiter.in_flight(), 0);

    // The slot freed once the slow request finished.
    let follow_up = test::TestRequest::get().uri("/c").to_request();
    let follow_up_resp = test::call_service(&app, follow_up).await;
    assert_eq!(follow_up_resp.status(), 200);
}
