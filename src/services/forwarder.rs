//! Forwarder (C8): the retrying HTTP client that actually talks to
//! backends, gated by the circuit breaker and bounded by per-route
//! retry/timeout overrides.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::{Client, Method};

use crate::errors::GatewayError;
use crate::services::circuit_breaker::CircuitBreaker;

/// A successfully relayed upstream response: status, headers, and buffered
/// body, ready for the caller to translate into a client response.
pub struct ForwardedResponse {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub body: bytes::Bytes,
}

/// Effective per-request parameters, after merging route overrides with
/// pipeline defaults.
#[derive(Debug, Clone, Copy)]
pub struct ForwardParams {
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

pub struct Forwarder {
    client: Client,
    circuit_breaker: CircuitBreaker,
}

impl Forwarder {
    pub fn new(circuit_breaker: CircuitBreaker) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("failed to build reqwest client");

        Forwarder {
            client,
            circuit_breaker,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Extracts the `host:port` authority the circuit breaker keys on.
    pub fn authority_of(url: &reqwest::Url) -> String {
        match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or(""), port),
            None => url.host_str().unwrap_or("").to_string(),
        }
    }

    /// Runs the retry algorithm in spec §4.8: a circuit-breaker pre-check,
    /// then up to `retries + 1` attempts with a flat `retry_delay` sleep
    /// between them. Status `< 500` is success; transport errors and
    /// `>= 500` both count as failures and continue the retry schedule.
    pub async fn forward(
        &self,
        method: Method,
        target_url: &reqwest::Url,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
        params: ForwardParams,
    ) -> Result<ForwardedResponse, GatewayError> {
        let authority = Self::authority_of(target_url);

        if !self.circuit_breaker.allow_request(&authority).await {
            warn!("circuit breaker is open for {authority}, request blocked");
            return Err(GatewayError::CircuitOpen { authority });
        }

        let mut header_map = reqwest::header::HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                header_map.insert(name, value);
            }
        }

        let mut attempt = 0u32;
        loop {
            debug!("attempt {} to {}", attempt + 1, target_url);
            let request = self
                .client
                .request(method.clone(), target_url.clone())
                .headers(header_map.clone())
                .body(body.clone())
                .timeout(params.timeout);

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status < 500 {
                        self.circuit_breaker.record_success(&authority).await;
                        let headers = response.headers().clone();
                        let body = response.bytes().await.map_err(|e| {
                            GatewayError::Internal(format!("failed reading upstream body: {e}"))
                        })?;
                        return Ok(ForwardedResponse {
                            status,
                            headers,
                            body,
                        });
                    }
                    warn!("upstream {target_url} returned {status}, treating as failure");
                    self.circuit_breaker.record_failure(&authority).await;
                }
                Err(e) => {
                    error!("request error to {target_url}: {e}");
                    self.circuit_breaker.record_failure(&authority).await;
                }
            }

            if attempt >= params.retries {
                break;
            }
            attempt += 1;
            tokio::time::sleep(params.retry_delay).await;
        }

        info!("all retries failed for {target_url}");
        Err(GatewayError::RetriesExhausted {
            retries: params.retries,
        })
    }
}
