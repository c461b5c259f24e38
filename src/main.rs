//! Gateway binary entry point: logger setup, initial route table load and
//! validation, component construction, and the actix-web server wrapped in
//! the trace/concurrency/rate-limit admission chain (spec §4.9).

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use gateway_rs::config::{ConfigValidator, FileRouteTableLoader, RouteTableLoader};
use gateway_rs::logs::logger::configure_logger;
use gateway_rs::middleware::{ConcurrencyMiddleware, RateLimitMiddleware, TraceMiddleware};
use gateway_rs::models::{parse_route_table, RouteEntry, RouteTable, Settings};
use gateway_rs::pipeline::{self, GatewayPipeline, Lifecycle};
use gateway_rs::routes::admin::{self, AdminState};
use gateway_rs::services::{
    CircuitBreaker, CircuitBreakerConfig, ConcurrencyLimiter, Forwarder, LocalRateLimiter,
    RateLimiter, RedisRateLimiter,
};
use log::{error, info, warn};
use tokio::sync::Mutex;

async fn load_initial_routes(loader: &FileRouteTableLoader) -> Vec<RouteEntry> {
    let raw = match loader.load().await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("no initial route table loaded ({e}); starting with an empty table");
            return Vec::new();
        }
    };

    let entries = match parse_route_table(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            error!("initial route table failed to parse ({e}); starting with an empty table");
            return Vec::new();
        }
    };

    let validation = ConfigValidator::validate_comprehensive(&entries);
    if !validation.is_valid {
        error!("initial route table failed validation:");
        for err in &validation.errors {
            error!("  - {err}");
        }
        std::process::exit(1);
    }
    entries
}

async fn build_rate_limiter(settings: &Settings) -> Arc<dyn RateLimiter> {
    match &settings.redis_host {
        Some(host) => {
            let url = format!("redis://{host}:{}", settings.redis_port);
            match redis::Client::open(url.clone()) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(conn) => {
                        info!("using shared Redis rate limiter at {url}");
                        Arc::new(RedisRateLimiter::new(
                            conn,
                            settings.rate_limit,
                            settings.rate_window.as_millis() as i64,
                        ))
                    }
                    Err(e) => {
                        error!("failed to connect to Redis at {url} ({e}); falling back to the local rate limiter");
                        Arc::new(LocalRateLimiter::new(settings.rate_limit, settings.rate_window))
                    }
                },
                Err(e) => {
                    error!("invalid Redis URL {url} ({e}); falling back to the local rate limiter");
                    Arc::new(LocalRateLimiter::new(settings.rate_limit, settings.rate_window))
                }
            }
        }
        None => {
            info!("using local in-process rate limiter");
            Arc::new(LocalRateLimiter::new(settings.rate_limit, settings.rate_window))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = Settings::from_env();
    info!(
        "starting gateway-rs on {}:{} (config: {})",
        settings.host, settings.port, settings.config_path
    );

    let loader: Arc<FileRouteTableLoader> =
        Arc::new(FileRouteTableLoader::new(settings.config_path.clone()));
    let initial_entries = load_initial_routes(&loader).await;
    let route_table = Arc::new(RouteTable::new(initial_entries));

    let circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: settings.circuit_failure_threshold,
        recovery_time: settings.circuit_recovery_time,
    });
    let forwarder = Arc::new(Forwarder::new(circuit_breaker));
    let concurrency_limiter = ConcurrencyLimiter::new(settings.max_concurrent);
    let rate_limiter = build_rate_limiter(&settings).await;

    let gateway_pipeline = Arc::new(GatewayPipeline {
        route_table: route_table.clone(),
        forwarder: forwarder.clone(),
        default_retries: settings.default_retries,
        default_retry_delay: settings.default_retry_delay,
        default_timeout: settings.default_timeout,
    });

    let admin_state = Arc::new(AdminState {
        route_table: route_table.clone(),
        forwarder: forwarder.clone(),
        concurrency_limiter: concurrency_limiter.clone(),
        rate_limiter: rate_limiter.clone(),
        rate_window: settings.rate_window,
        loader: loader.clone(),
        last_reload: Mutex::new(None),
    });

    let mut lifecycle = Lifecycle::new();
    let cleanup_forwarder = forwarder.clone();
    lifecycle.register_cleanup(move || {
        let forwarder = cleanup_forwarder.clone();
        async move {
            drop(forwarder);
            info!("upstream client pool closed");
        }
    });

    let host = settings.host.clone();
    let port = settings.port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(gateway_pipeline.clone()))
            .app_data(web::Data::new(admin_state.clone()))
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024))
            .service(web::resource("/__health").route(web::get().to(admin::health)))
            .service(
                web::scope("")
                    .wrap(RateLimitMiddleware::new(rate_limiter.clone()))
                    .wrap(ConcurrencyMiddleware::new(concurrency_limiter.clone()))
                    .wrap(TraceMiddleware)
                    .default_service(web::route().to(pipeline::dispatch)),
            )
    })
    .bind((host.as_str(), port))?
    .run();

    info!("gateway-rs listening on {host}:{port}");

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("server stopped gracefully"),
                Err(e) => error!("server error: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping server...");
        }
    }

    lifecycle.shutdown().await;
    Ok(())
}
