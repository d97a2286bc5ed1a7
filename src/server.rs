//! HTTP endpoint serving the metric registry.
//!
//! The endpoint reads gauge state on demand and is not synchronized with
//! the poll loop.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rocm_exporter::{FieldCatalog, MetricRegistry, MetricsServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = FieldCatalog::rocm_smi();
//!     let labels = catalog.label_dict()?;
//!     let registry = Arc::new(MetricRegistry::build(catalog.metrics(), &labels)?);
//!
//!     let config = ServerConfig::builder()
//!         .listen_addr("0.0.0.0:9101")
//!         .metrics_path("/metrics")
//!         .build();
//!
//!     let server = MetricsServer::bind(config, registry).await?;
//!     server.spawn().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, warn};

use crate::config::DEFAULT_PORT;
use crate::error::Result;
use crate::registry::MetricRegistry;

/// Content type of the text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Configuration for the metrics endpoint.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:9101")
    pub listen_addr: String,
    /// Path for metrics endpoint (e.g., "/metrics")
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new builder for ServerConfig.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig.
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    metrics_path: Option<String>,
}

impl ServerConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the metrics path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    /// Build the ServerConfig.
    pub fn build(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            metrics_path: self.metrics_path.unwrap_or(defaults.metrics_path),
        }
    }
}

/// A bound metrics endpoint, not yet accepting connections.
///
/// Binding happens up front so that an unusable port fails startup instead
/// of surfacing later on a background task.
#[derive(Debug)]
pub struct MetricsServer {
    listener: TcpListener,
    metrics_path: String,
    registry: Arc<MetricRegistry>,
}

impl MetricsServer {
    /// Bind the configured listen address.
    pub async fn bind(config: ServerConfig, registry: Arc<MetricRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Ok(Self {
            listener,
            metrics_path: config.metrics_path,
            registry,
        })
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawn the accept loop on a background task.
    ///
    /// The task only finishes if accepting connections fails.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!(error = %e, "metrics endpoint stopped");
            }
        })
    }

    async fn serve(self) -> std::io::Result<()> {
        let metrics_path: Arc<str> = Arc::from(self.metrics_path);

        loop {
            let (stream, peer) = self.listener.accept().await?;
            debug!(%peer, "metrics connection");
            let io = TokioIo::new(stream);

            let metrics_path = metrics_path.clone();
            let registry = self.registry.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let metrics_path = metrics_path.clone();
                    let registry = registry.clone();

                    async move { handle_request(req, &metrics_path, &registry) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(error = %e, %peer, "metrics connection error");
                }
            });
        }
    }
}

fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics_path: &str,
    registry: &MetricRegistry,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();

    if path == metrics_path {
        match registry.render() {
            Ok(body) => Ok(respond(StatusCode::OK, METRICS_CONTENT_TYPE, body)),
            Err(e) => {
                error!(error = %e, "failed to render metrics");
                Ok(respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string(),
                ))
            }
        }
    } else if path == "/health" || path == "/healthz" {
        Ok(respond(StatusCode::OK, "text/plain", "OK"))
    } else {
        Ok(respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"))
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldCatalog;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn registry() -> Arc<MetricRegistry> {
        let catalog = FieldCatalog::new(["Fan RPM"], ["Serial Number"]);
        let labels = catalog.label_dict().unwrap();
        Arc::new(MetricRegistry::build(catalog.metrics(), &labels).unwrap())
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn start(registry: Arc<MetricRegistry>) -> SocketAddr {
        let config = ServerConfig::builder().listen_addr("127.0.0.1:0").build();
        let server = MetricsServer::bind(config, registry).await.unwrap();
        let addr = server.local_addr().unwrap();
        server.spawn();
        addr
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .metrics_path("/custom-metrics")
            .build();

        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.metrics_path, "/custom-metrics");
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.listen_addr, "0.0.0.0:9101");
        assert_eq!(config.metrics_path, "/metrics");
    }

    #[tokio::test]
    async fn test_serves_metrics() {
        let registry = registry();
        registry
            .set_value("Fan RPM", &["card0", "abc123"], 1200.0)
            .unwrap();
        let addr = start(registry.clone()).await;

        let response = get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains(METRICS_CONTENT_TYPE));
        assert!(response.contains("fan_rpm{gpu=\"card0\",serial_number=\"abc123\"} 1200"));

        // Later writes are visible on the next scrape.
        registry
            .set_value("Fan RPM", &["card0", "abc123"], 900.0)
            .unwrap();
        let response = get(addr, "/metrics").await;
        assert!(response.contains("fan_rpm{gpu=\"card0\",serial_number=\"abc123\"} 900"));
    }

    #[tokio::test]
    async fn test_health_and_not_found() {
        let addr = start(registry()).await;

        let response = get(addr, "/healthz").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("OK"));

        let response = get(addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let first = MetricsServer::bind(
            ServerConfig::builder().listen_addr("127.0.0.1:0").build(),
            registry(),
        )
        .await
        .unwrap();
        let taken = first.local_addr().unwrap().to_string();

        let second =
            MetricsServer::bind(ServerConfig::builder().listen_addr(taken).build(), registry())
                .await;
        assert!(second.is_err());
    }
}
