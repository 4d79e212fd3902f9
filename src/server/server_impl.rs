//! Server lifecycle, acceptor loop and worker pool.

use crate::{
    coding::{chunked::ChunkedCoding, registry::CodingRegistry},
    errors::ServerError,
    limits::{ConnLimits, ReqLimits, ServerLimits, WaitStrategy},
    recovery::{DefaultRecovery, FaultRecovery},
    routing::{
        dispatcher::Dispatcher,
        table::{RouteConfig, RouteOwner, RouteTable},
    },
    server::connection,
};
use crossbeam::queue::SegQueue;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, RwLock,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep,
};
use tracing::{debug, info, warn};

/// The server lifecycle state.
///
/// `Created -> Running` on start (idempotent), `Running -> Halted` on
/// halt (idempotent). There is no `Halted -> Running` transition: a
/// halted server is not restartable, a new instance must be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Halted,
}

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const HALTED: u8 = 2;

struct ServerInner {
    listeners: Mutex<Vec<TcpListener>>,
    state: AtomicU8,
    table: Arc<RouteTable>,
    dispatcher: Dispatcher,
    codings: Arc<CodingRegistry>,
    recovery: RwLock<Arc<dyn FaultRecovery>>,
    server_limits: ServerLimits,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    queue: SegQueue<(TcpStream, SocketAddr)>,
}

/// A cheap, cloneable reference to a server instance.
///
/// Handed to workers, fault-recovery strategies and route-owner setup
/// hooks; everything reachable from it stays valid for the server's
/// lifetime.
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<ServerInner>,
}

impl ServerHandle {
    #[inline]
    pub fn state(&self) -> ServerState {
        match self.inner.state.load(Ordering::Relaxed) {
            CREATED => ServerState::Created,
            RUNNING => ServerState::Running,
            _ => ServerState::Halted,
        }
    }

    /// Stops future accept iterations. In-flight connections complete
    /// naturally on their own workers; nothing is forcibly interrupted.
    pub fn halt(&self) {
        self.inner.state.store(HALTED, Ordering::Relaxed);
    }

    /// The transfer-coding registry owned by this server.
    #[inline]
    pub fn codings(&self) -> &CodingRegistry {
        &self.inner.codings
    }

    /// A handle for mapping and removing routes.
    #[inline]
    pub fn routes(&self) -> RouteConfig {
        RouteConfig::new(self.inner.table.clone())
    }

    /// Replaces the fault-recovery strategy. `None` restores the
    /// default, so the server is never left without one. Visible to
    /// subsequently dispatched connections only.
    pub fn set_fault_recovery(&self, strategy: Option<Arc<dyn FaultRecovery>>) {
        let strategy = strategy.unwrap_or_else(|| Arc::new(DefaultRecovery));
        *self
            .inner
            .recovery
            .write()
            .unwrap_or_else(|e| e.into_inner()) = strategy;
    }

    pub(crate) fn recovery(&self) -> Arc<dyn FaultRecovery> {
        self.inner
            .recovery
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    #[inline]
    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    #[inline]
    pub(crate) fn conn_limits(&self) -> &ConnLimits {
        &self.inner.conn_limits
    }

    #[inline]
    pub(crate) fn req_limits(&self) -> &ReqLimits {
        &self.inner.req_limits
    }
}

/// An HTTP/1.1 server.
///
/// One acceptor task runs per listening socket; accepted connections are
/// handed to a fixed pool of workers, each performing the full
/// parse-dispatch-respond sequence for one connection at a time.
///
/// # Examples
///
/// ```no_run
/// use forge_web::{
///     async_trait, Args, BindingRole, Handler, HandlerError, HandlerSpec, Method, Response,
///     Server, StatusCode,
/// };
/// use std::sync::Arc;
///
/// struct Hello;
///
/// #[async_trait]
/// impl Handler for Hello {
///     async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError> {
///         let name = args.query().and_then(|q| q.get("name")).unwrap_or("world");
///         Ok(Response::new(StatusCode::Ok).body(format!("hello {name}")))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let server = Server::builder()
///         .listener(tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap())
///         .build();
///     server.routes().map(
///         "/wow",
///         Method::Get,
///         Some(HandlerSpec::new(Arc::new(Hello), vec![BindingRole::QueryParams])),
///     );
///     server.start().unwrap();
///     std::future::pending::<()>().await;
/// }
/// ```
pub struct Server {
    handle: ServerHandle,
}

impl Server {
    /// Creates a new builder for configuring a server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listeners: Vec::new(),
            server_limits: None,
            connection_limits: None,
            request_limits: None,
            recovery: None,
        }
    }

    /// A cloneable handle to this server.
    #[inline]
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Registers a route-owning object: its declaratively bound routes
    /// are mapped, then its `setup` hook runs exactly once.
    pub fn register(&self, owner: &dyn RouteOwner) -> &Self {
        let routes = self.routes();
        for spec in owner.routes() {
            routes.map(&spec.template, spec.verb, Some(spec.handler));
        }
        debug!("invoking setup hook for registered route owner");
        owner.setup(&routes, &self.handle);
        self
    }

    /// See [`ServerHandle::routes`].
    #[inline]
    pub fn routes(&self) -> RouteConfig {
        self.handle.routes()
    }

    /// See [`ServerHandle::codings`].
    #[inline]
    pub fn codings(&self) -> &CodingRegistry {
        self.handle.codings()
    }

    /// See [`ServerHandle::set_fault_recovery`].
    #[inline]
    pub fn set_fault_recovery(&self, strategy: Option<Arc<dyn FaultRecovery>>) {
        self.handle.set_fault_recovery(strategy);
    }

    #[inline]
    pub fn state(&self) -> ServerState {
        self.handle.state()
    }

    /// Starts accepting connections: one acceptor task per listening
    /// socket plus the worker pool.
    ///
    /// Starting an already-running server is a no-op. Starting a halted
    /// server errors - construct a new instance instead. Must be called
    /// within a tokio runtime.
    pub fn start(&self) -> Result<(), ServerError> {
        let inner = &self.handle.inner;
        match inner
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => {}
            Err(RUNNING) => return Ok(()),
            Err(_) => return Err(ServerError::Halted),
        }

        let listeners: Vec<TcpListener> = inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        info!(
            "starting forge_web {} with {} listeners and {} workers",
            env!("CARGO_PKG_VERSION"),
            listeners.len(),
            inner.server_limits.worker_count,
        );

        for listener in listeners {
            tokio::spawn(run_acceptor(self.handle.clone(), listener));
        }
        for _ in 0..inner.server_limits.worker_count {
            tokio::spawn(run_worker(self.handle.clone()));
        }

        Ok(())
    }

    /// See [`ServerHandle::halt`].
    #[inline]
    pub fn halt(&self) {
        self.handle.halt();
    }
}

// The running flag is checked once per loop iteration; an accept blocked
// in-flight is not interrupted by a halt.
async fn run_acceptor(handle: ServerHandle, listener: TcpListener) {
    let local_addr = listener.local_addr().ok();
    while handle.state() == ServerState::Running {
        match listener.accept().await {
            Ok((stream, client_addr)) => {
                let inner = &handle.inner;
                if inner.queue.len() < inner.server_limits.max_pending_connections {
                    inner.queue.push((stream, client_addr));
                } else {
                    warn!("connection queue full, dropping connection from {client_addr}");
                }
            }
            Err(err) => warn!("failed to accept connection: {err}"),
        }
    }
    match local_addr {
        Some(addr) => info!("halted acceptor for {addr}"),
        None => info!("halted acceptor"),
    }
}

// Unordered, at-most-once execution per connection: whichever worker
// pops the queue entry serves it, synchronously within that worker.
async fn run_worker(handle: ServerHandle) {
    loop {
        if let Some((stream, client_addr)) = handle.inner.queue.pop() {
            connection::serve(stream, client_addr, handle.clone()).await;
            continue;
        }
        if handle.state() == ServerState::Halted {
            break;
        }
        match &handle.inner.server_limits.wait_strategy {
            WaitStrategy::Yield => yield_now().await,
            WaitStrategy::Sleep(time) => sleep(*time).await,
        }
    }
}

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    listeners: Vec<TcpListener>,
    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    recovery: Option<Arc<dyn FaultRecovery>>,
}

impl ServerBuilder {
    /// Adds a listening socket. May be called more than once; one
    /// acceptor task runs per listener.
    ///
    /// **At least one listener is required.**
    #[inline]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Configures concurrency and queueing limits.
    #[inline]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures per-connection I/O limits.
    #[inline]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request parsing limits.
    #[inline]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Installs a fault-recovery strategy other than the default.
    #[inline]
    pub fn fault_recovery(mut self, strategy: Arc<dyn FaultRecovery>) -> Self {
        self.recovery = Some(strategy);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] in the
    /// `Created` state.
    ///
    /// # Panics
    ///
    /// Panics when no listener was configured.
    #[track_caller]
    pub fn build(self) -> Server {
        assert!(
            !self.listeners.is_empty(),
            "the `listener` method must be called to build"
        );

        let codings = Arc::new(CodingRegistry::new());
        // "Transfer-Encoding: chunked" must always be supported
        codings.register(Arc::new(ChunkedCoding));

        let table = Arc::new(RouteTable::new());
        let dispatcher = Dispatcher::new(table.clone());
        let recovery: Arc<dyn FaultRecovery> =
            self.recovery.unwrap_or_else(|| Arc::new(DefaultRecovery));

        Server {
            handle: ServerHandle {
                inner: Arc::new(ServerInner {
                    listeners: Mutex::new(self.listeners),
                    state: AtomicU8::new(CREATED),
                    table,
                    dispatcher,
                    codings,
                    recovery: RwLock::new(recovery),
                    server_limits: self.server_limits.unwrap_or_default(),
                    conn_limits: self.connection_limits.unwrap_or_default(),
                    req_limits: self.request_limits.unwrap_or_default(),
                    queue: SegQueue::new(),
                }),
            },
        }
    }
}
