//! Endpoint server for exposing metrics and health checks

use crate::metrics;
use anyhow::Result;
use prometheus::{Encoder, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start the endpoint server
pub async fn endpoint_server(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("metrics endpoint listening on {addr}");

    loop {
        match listener.accept().await {
            Ok((mut socket, _)) => {
                tokio::spawn(async move {
                    let mut buf = [0; 1024];
                    match socket.read(&mut buf).await {
                        Ok(n) => {
                            let request = String::from_utf8_lossy(&buf[..n]);
                            let response = route(&request);
                            let _ = socket.write_all(response.as_bytes()).await;
                        }
                        Err(e) => {
                            tracing::error!("failed to read from socket: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("failed to accept connection: {e}");
            }
        }
    }
}

fn route(request: &str) -> String {
    if request.starts_with("GET /metrics") {
        let encoder = TextEncoder::new();
        let families = metrics::metrics().registry().gather();
        let mut body = Vec::new();
        if encoder.encode(&families, &mut body).is_err() {
            return http_response("500 Internal Server Error", "encoding error");
        }
        http_response("200 OK", &String::from_utf8_lossy(&body))
    } else if request.starts_with("GET /health") {
        http_response("200 OK", "OK")
    } else {
        http_response("404 Not Found", "not found")
    }
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}
