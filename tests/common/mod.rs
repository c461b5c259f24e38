//! Shared test infrastructure: a bare-bones HTTP/1.1 upstream good enough
//! to drive the forwarder's retry/circuit logic without pulling in a real
//! web framework as a dev-dependency.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Binds an ephemeral port and replies to successive connections with the
/// given `(status, body)` pairs in order, one per connection, then closes
/// each connection so the client is forced to reconnect for the next reply.
/// Every raw request seen is appended (as lossy UTF-8) to the returned log
/// so a test can assert on header rewriting.
pub async fn spawn_mock_upstream(responses: Vec<(u16, &'static str)>) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock upstream");
    let addr = listener.local_addr().expect("local_addr");
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = log.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let mut buf = [0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            log_clone
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&buf[..n]).to_string());

            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n{body}",
                status = status,
                reason = reason_phrase(status),
                len = body.len(),
                body = body,
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, log)
}
