//! Newline-delimited JSON server
//!
//! Each connection carries one request per line and receives one
//! response line per request, in order. Request lines are capped at
//! `MAX_REQUEST_BYTES` by default; a longer line is discarded up to its
//! newline and answered with `INVALID_REQUEST`, keeping the connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ApiHandler, Response};
use crate::config::Config;
use crate::engine::Engine;

use super::errors::{ServerError, ServerResult};

/// Default upper bound on one request line, newline excluded
pub const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// Line-protocol server over a shared engine
pub struct Server {
    handler: ApiHandler,
    limit: Arc<Semaphore>,
    timeout: Duration,
    max_request_bytes: usize,
}

impl Server {
    pub fn new(engine: Arc<Engine>, max_connections: usize, timeout: Duration) -> Self {
        Self {
            handler: ApiHandler::new(engine),
            limit: Arc::new(Semaphore::new(max_connections.max(1))),
            timeout,
            max_request_bytes: MAX_REQUEST_BYTES,
        }
    }

    pub fn with_max_request_bytes(mut self, max_request_bytes: usize) -> Self {
        self.max_request_bytes = max_request_bytes.max(1);
        self
    }

    pub fn from_config(engine: Arc<Engine>, config: &Config) -> Self {
        Self::new(
            engine,
            config.max_connections,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub async fn bind(addr: &str) -> ServerResult<TcpListener> {
        TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
    }

    /// Bind `addr` and serve until Ctrl-C
    pub async fn serve(self, addr: &str) -> ServerResult<()> {
        let listener = Self::bind(addr).await?;
        self.run(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        info!(addr = %local, "digitooldb server listening");
        tokio::pin!(shutdown);

        loop {
            // Wait for a free slot before accepting so excess clients queue
            // in the listen backlog.
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            let handler = self.handler.clone();
            let timeout = self.timeout;
            let max_request_bytes = self.max_request_bytes;
            tokio::spawn(async move {
                let _permit = permit;
                debug!(peer = %peer, "connection opened");
                if let Err(e) = serve_connection(stream, peer, handler, timeout, max_request_bytes).await {
                    debug!(peer = %peer, error = %e, "connection error");
                }
                debug!(peer = %peer, "connection closed");
            });
        }

        info!("digitooldb server shutting down");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: ApiHandler,
    timeout: Duration,
    max_request_bytes: usize,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    // Room for the longest allowed line plus its newline
    let read_limit = max_request_bytes as u64 + 1;

    loop {
        buf.clear();
        if (&mut reader).take(read_limit).read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }

        let response = if buf.len() as u64 == read_limit && !buf.ends_with(b"\n") {
            skip_line(&mut reader, read_limit).await?;
            warn!(peer = %peer, max_request_bytes, "request line too long");
            Response::error(&ApiError::invalid_request(format!(
                "Request line exceeds {} bytes",
                max_request_bytes
            )))
        } else {
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            dispatch(&handler, line.to_string(), timeout).await
        };
        if !response.is_success() {
            debug!(peer = %peer, response = %response.to_json(), "request failed");
        }
        let mut out = response.to_json();
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }
}

/// Discard input up to and including the next newline.
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R, chunk: u64) -> std::io::Result<()> {
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = (&mut *reader).take(chunk).read_until(b'\n', &mut scratch).await?;
        if n == 0 || scratch.ends_with(b"\n") {
            return Ok(());
        }
    }
}

/// Run one request on the blocking pool under the time budget
async fn dispatch(handler: &ApiHandler, line: String, timeout: Duration) -> Response {
    let handler = handler.clone();
    let task = tokio::task::spawn_blocking(move || handler.handle(&line));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(error = %e, "request task failed");
            Response::error(&ApiError::internal(format!("request task failed: {}", e)))
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "request timed out");
            Response::error(&ApiError::timeout(timeout.as_secs()))
        }
    }
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>) {
        let server = Server::new(Arc::new(Engine::in_memory()), 4, Duration::from_secs(5));
        let listener = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run(listener, async move {
            let _ = rx.await;
        }));
        (addr, tx)
    }

    async fn roundtrip(
        lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
        writer: &mut tokio::net::tcp::OwnedWriteHalf,
        request: &str,
    ) -> Value {
        writer.write_all(format!("{}\n", request).as_bytes()).await.unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_requests_over_one_connection() {
        let (addr, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let resp = roundtrip(&mut lines, &mut writer, r#"{"operation":"create_database","database":"t"}"#).await;
        assert_eq!(resp["status"], "ok");

        let resp = roundtrip(&mut lines, &mut writer, "{broken").await;
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["code"], "INVALID_REQUEST");

        // The connection survives a bad request.
        let resp = roundtrip(&mut lines, &mut writer, r#"{"operation":"list_databases"}"#).await;
        assert_eq!(resp, json!({"status": "ok", "data": ["t"]}));

        let resp = roundtrip(&mut lines, &mut writer, r#"{"operation":"shutdown"}"#).await;
        assert_eq!(resp["code"], "UNKNOWN_OPERATION");
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected_and_connection_kept() {
        let server = Server::new(Arc::new(Engine::in_memory()), 4, Duration::from_secs(5))
            .with_max_request_bytes(64);
        let listener = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run(listener, async move {
            let _ = rx.await;
        }));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let oversized = format!(r#"{{"operation":"create_database","database":"{}"}}"#, "x".repeat(500));
        let resp = roundtrip(&mut lines, &mut writer, &oversized).await;
        assert_eq!(resp["code"], "INVALID_REQUEST");

        let resp = roundtrip(&mut lines, &mut writer, r#"{"operation":"list_databases"}"#).await;
        assert_eq!(resp, json!({"status": "ok", "data": []}));
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let server = Server::new(Arc::new(Engine::in_memory()), 1, Duration::from_secs(1));
        let listener = Server::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(listener, async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }
}
