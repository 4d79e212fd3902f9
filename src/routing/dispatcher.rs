//! Handler invocation: the parameter-binding contract and request
//! dispatch.

use crate::{
    errors::{Fault, HandlerError},
    http::{query::QueryParams, request::Request, response::Response},
    routing::table::{RouteConfig, RouteEntry, RouteTable},
};
use async_trait::async_trait;
use std::{net::SocketAddr, sync::Arc};
use tracing::debug;

/// The semantic role of one declared handler parameter.
///
/// A handler declares an ordered list of roles at registration; the
/// dispatcher resolves the list once per invocation into an [`Args`]
/// vector - a static table walk, not a per-call inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRole {
    /// The originating request.
    Request,
    /// The parsed query-parameter container.
    QueryParams,
    /// A route-configuration handle, for handlers that register further
    /// routes.
    RouteConfig,
    /// The per-connection session handle.
    Session,
    /// The raw request body.
    Body,
    /// The next path parameter, bound positionally in appearance order.
    PathParam,
}

/// A value bound for one declared role.
pub enum BoundValue<'a> {
    Request(&'a Request),
    QueryParams(&'a QueryParams),
    RouteConfig(RouteConfig),
    Session(&'a Session),
    Body(Option<&'a [u8]>),
    /// Absent when the matched route bound fewer path parameters than the
    /// handler declared.
    PathParam(Option<&'a str>),
}

/// Arguments bound for one handler invocation, ordered as declared.
///
/// The accessors look values up by role; positional access via
/// [`get`](Self::get) mirrors the declaration order.
pub struct Args<'a> {
    values: Vec<BoundValue<'a>>,
}

impl<'a> Args<'a> {
    #[inline]
    pub fn get(&self, index: usize) -> Option<&BoundValue<'a>> {
        self.values.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn request(&self) -> Option<&'a Request> {
        self.values.iter().find_map(|value| match value {
            BoundValue::Request(request) => Some(*request),
            _ => None,
        })
    }

    pub fn query(&self) -> Option<&'a QueryParams> {
        self.values.iter().find_map(|value| match value {
            BoundValue::QueryParams(query) => Some(*query),
            _ => None,
        })
    }

    pub fn routes(&self) -> Option<RouteConfig> {
        self.values.iter().find_map(|value| match value {
            BoundValue::RouteConfig(routes) => Some(routes.clone()),
            _ => None,
        })
    }

    pub fn session(&self) -> Option<&'a Session> {
        self.values.iter().find_map(|value| match value {
            BoundValue::Session(session) => Some(*session),
            _ => None,
        })
    }

    /// The raw request body, when the body role was declared and a body
    /// was framed.
    pub fn body(&self) -> Option<&'a [u8]> {
        self.values.iter().find_map(|value| match value {
            BoundValue::Body(body) => *body,
            _ => None,
        })
    }

    /// The `index`-th declared path parameter. Absent on arity mismatch -
    /// a deliberately lenient contract, never an error.
    pub fn path_param(&self, index: usize) -> Option<&'a str> {
        self.values
            .iter()
            .filter_map(|value| match value {
                BoundValue::PathParam(param) => Some(*param),
                _ => None,
            })
            .nth(index)
            .flatten()
    }
}

/// A request handler bound into the route table.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Processes a request and produces a complete response.
    ///
    /// A recoverable fault is routed through the fault-recovery
    /// strategy's exception path; a fatal fault through its error path.
    async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError>;
}

/// Per-connection session handle, bound via [`BindingRole::Session`].
#[derive(Debug, Clone)]
pub struct Session {
    client_addr: SocketAddr,
}

impl Session {
    #[inline]
    pub(crate) fn new(client_addr: SocketAddr) -> Self {
        Session { client_addr }
    }

    #[inline]
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }
}

/// Matches requests against the route table and invokes the bound
/// handler through the parameter-binding contract.
pub(crate) struct Dispatcher {
    table: Arc<RouteTable>,
    config: RouteConfig,
}

impl Dispatcher {
    pub(crate) fn new(table: Arc<RouteTable>) -> Self {
        let config = RouteConfig::new(table.clone());
        Dispatcher { table, config }
    }

    /// Resolves and invokes the handler for a parsed request.
    ///
    /// Faults: handler-not-found when no route matches; malformed when a
    /// verb that does not allow a body carries one.
    pub(crate) async fn dispatch(
        &self,
        request: &Request,
        query: &QueryParams,
        session: &Session,
    ) -> Result<Response, HandlerError> {
        let Some((entry, path_params)) = self.table.lookup(request.path(), request.method())
        else {
            return Err(Fault::HandlerNotFound {
                verb: request.method(),
                path: request.path().to_string(),
            }
            .into());
        };

        if request.body().is_some() && !request.method().allows_body() {
            return Err(
                Fault::malformed(format!("{} requests cannot have request bodies", request.method()))
                    .into(),
            );
        }

        debug!(
            route = %entry.route,
            "located {} handler with {} path parameters",
            request.method(),
            path_params.len()
        );

        let args = bind(&entry, request, query, session, &path_params, &self.config);
        entry.handler.handle(args).await
    }
}

// Walks the declared role list; path parameters are consumed
// left-to-right, arity mismatches bind as absent.
fn bind<'a>(
    entry: &RouteEntry,
    request: &'a Request,
    query: &'a QueryParams,
    session: &'a Session,
    path_params: &'a [String],
    config: &RouteConfig,
) -> Args<'a> {
    let mut values = Vec::with_capacity(entry.bindings.len());
    let mut next_param = 0usize;
    for role in &entry.bindings {
        values.push(match role {
            BindingRole::Request => BoundValue::Request(request),
            BindingRole::QueryParams => BoundValue::QueryParams(query),
            BindingRole::RouteConfig => BoundValue::RouteConfig(config.clone()),
            BindingRole::Session => BoundValue::Session(session),
            BindingRole::Body => BoundValue::Body(request.body()),
            BindingRole::PathParam => {
                let param = path_params.get(next_param).map(String::as_str);
                next_param += 1;
                BoundValue::PathParam(param)
            }
        });
    }
    Args { values }
}
