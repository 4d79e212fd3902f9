//! forge_web - Security-first HTTP/1.1 server for microservices
//!
//! A from-scratch HTTP/1.1 server owning the raw byte stream from an
//! accepted connection through to the framed response: request-line and
//! header parsing, transfer-coding negotiation with request-smuggling
//! detection, route resolution with path-parameter binding, handler
//! dispatch, and fault-to-response translation.
//!
//! # Design
//!
//! - **One exchange per connection** - connections are never reused.
//!   Disabling keep-alive removes the request-smuggling ambiguity that
//!   pipelining reintroduces. A request carrying both `Transfer-Encoding`
//!   and `Content-Length` is rejected outright as an attack signal.
//! - **Explicit registration** - routes are (template, verb, descriptor)
//!   bindings in a [`RouteTable`]; a template segment equal to `{}`
//!   matches exactly one path segment and binds it as a path parameter.
//!   Handlers declare their parameters as an ordered list of
//!   [`BindingRole`]s, resolved once at registration.
//! - **Pluggable fault recovery** - every per-connection error converts
//!   to a well-formed response through the installed [`FaultRecovery`]
//!   strategy; only a fatal fault may end the server itself.
//! - **Worker pool** - built on Tokio: one acceptor task per listening
//!   socket feeding a fixed pool of worker tasks through a lock-free
//!   queue.
//!
//! # Examples
//!
//! ```no_run
//! use forge_web::{
//!     async_trait, Args, BindingRole, Handler, HandlerError, HandlerSpec, Method, Response,
//!     Server, StatusCode,
//! };
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError> {
//!         let name = args.query().and_then(|q| q.get("name")).unwrap_or("world");
//!         Ok(Response::new(StatusCode::Ok).body(format!("hello {name}")))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::builder()
//!         .listener(tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .build();
//!     server.routes().map(
//!         "/wow",
//!         Method::Get,
//!         Some(HandlerSpec::new(Arc::new(Hello), vec![BindingRole::QueryParams])),
//!     );
//!     server.start().unwrap();
//!     std::future::pending::<()>().await;
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod coding {
    pub(crate) mod chunked;
    pub(crate) mod registry;
}
pub(crate) mod routing {
    pub(crate) mod dispatcher;
    pub(crate) mod table;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;
pub mod marshal;
pub(crate) mod recovery;
pub(crate) mod resources;

pub use crate::{
    coding::{
        chunked::ChunkedCoding,
        registry::{CodingRegistry, TransferCoding},
    },
    errors::{FatalFault, Fault, HandlerError, ServerError},
    http::{
        query::QueryParams,
        request::{Request, RequestBuilder},
        response::Response,
        types::{Header, Method, StatusCode, PROTOCOL},
    },
    recovery::{DefaultRecovery, FaultRecovery},
    resources::ResourceHandler,
    routing::{
        dispatcher::{Args, BindingRole, BoundValue, Handler, Session},
        table::{HandlerSpec, RouteConfig, RouteOwner, RouteSpec, RouteTable, WILDCARD},
    },
    server::server_impl::{Server, ServerBuilder, ServerHandle, ServerState},
};

// handlers are stored as trait objects, so implementations need the same
// macro the trait was declared with
pub use async_trait::async_trait;
