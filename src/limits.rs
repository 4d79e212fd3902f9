//! Server configuration limits and timeouts.
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Memory overflows
//! - Slowloris attacks
//! - Header flooding
//!
//! # Examples
//!
//! ```no_run
//! use forge_web::{limits::{ConnLimits, ReqLimits, ServerLimits}, Server};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let server = Server::builder()
//!     .listener(tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!     .server_limits(ServerLimits {
//!         worker_count: 500, // Higher concurrency
//!         ..ServerLimits::default()
//!     })
//!     .connection_limits(ConnLimits {
//!         socket_read_timeout: Duration::from_secs(2),
//!         ..ConnLimits::default()
//!     })
//!     .request_limits(ReqLimits {
//!         header_count: 64,      // More headers for complex APIs
//!         body_size: 64 * 1024,  // 64KB for larger payloads
//!         ..ReqLimits::default()
//!     })
//!     .build();
//! # }
//! ```

use std::time::Duration;

/// Controls server-level concurrency and queueing behavior.
///
/// Workers are continuously running tasks, created once at start. Each
/// runs an infinite loop, taking accepted connections from a shared
/// queue replenished by the acceptor tasks, so no task is created per
/// connection.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of worker tasks processing connections (default: `100`).
    ///
    /// One connection is processed per worker at a time; the worker
    /// performs the full parse-dispatch-respond sequence before taking
    /// the next connection.
    pub worker_count: usize,

    /// Maximum number of accepted connections waiting in the queue
    /// (default: `250`).
    ///
    /// When the queue is full, further accepted connections are dropped
    /// with a warning until workers drain the backlog.
    pub max_pending_connections: usize,

    /// Strategy for worker waiting behavior when the queue is empty
    /// (default: `Sleep(50µs)`).
    ///
    /// Affects latency, CPU usage and throughput characteristics.
    pub wait_strategy: WaitStrategy,
}

impl Default for ServerLimits {
    fn default() -> Self {
        ServerLimits {
            worker_count: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::default(),
        }
    }
}

/// How an idle worker waits for the next connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Yield back to the scheduler between polls. Lowest latency,
    /// highest idle CPU.
    Yield,
    /// Sleep a fixed interval between polls.
    Sleep(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Sleep(Duration::from_micros(50))
    }
}

/// Per-connection I/O limits.
///
/// Connections are not reused: each handles exactly one request/response
/// exchange, then closes. There is consequently no keep-alive or
/// request-per-connection budget to configure.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Timeout for a single socket read (default: `5s`).
    pub socket_read_timeout: Duration,

    /// Timeout for writing the serialized response (default: `5s`).
    pub socket_write_timeout: Duration,
}

impl Default for ConnLimits {
    fn default() -> Self {
        ConnLimits {
            socket_read_timeout: Duration::from_secs(5),
            socket_write_timeout: Duration::from_secs(5),
        }
    }
}

/// Request parsing limits.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum size of the request head - request line plus headers -
    /// in bytes (default: `8192`).
    pub head_size: usize,

    /// Maximum number of stored request headers (default: `32`).
    pub header_count: usize,

    /// Maximum request body size in bytes (default: `16384`).
    ///
    /// Enforced against the `Content-Length` declaration and against
    /// the bytes actually buffered for transfer-encoded bodies.
    pub body_size: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        ReqLimits {
            head_size: 8192,
            header_count: 32,
            body_size: 16384,
        }
    }
}
