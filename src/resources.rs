//! Static-resource route owner.

use crate::{
    errors::{Fault, HandlerError},
    http::{
        response::Response,
        types::{Method, StatusCode},
    },
    routing::{
        dispatcher::{Args, BindingRole, Handler},
        table::{HandlerSpec, RouteConfig, RouteOwner, WILDCARD},
    },
    server::server_impl::ServerHandle,
};
use async_trait::async_trait;
use std::{path::PathBuf, sync::Arc};
use tracing::debug;

/// Serves GET requests for a configured set of filesystem paths.
///
/// At setup time this maps a single wildcard route under its prefix; the
/// bound segment is then resolved as a suffix against the configured
/// paths, never against the filesystem at large. A directory match is
/// answered with its `index.html` when enabled.
///
/// Request paths are case-folded before dispatch, so configured resources
/// need lowercase names to be reachable. This handler provides no
/// security beyond the configured allowlist.
///
/// # Examples
/// ```no_run
/// use forge_web::ResourceHandler;
///
/// let resources = ResourceHandler::new("/static")
///     .resource("site/index.html")
///     .resource("site/style.css");
/// // server.register(&resources);
/// ```
pub struct ResourceHandler {
    prefix: String,
    resources: Vec<PathBuf>,
    index_file: bool,
}

impl ResourceHandler {
    /// Creates a handler rooted at the given route prefix.
    #[inline]
    pub fn new(prefix: impl Into<String>) -> Self {
        ResourceHandler {
            prefix: prefix.into(),
            resources: Vec::new(),
            index_file: true,
        }
    }

    /// Adds a servable filesystem path.
    #[inline]
    pub fn resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources.push(path.into());
        self
    }

    /// Whether a directory match serves its `index.html` (default:
    /// `true`).
    #[inline]
    pub fn index_file(mut self, enabled: bool) -> Self {
        self.index_file = enabled;
        self
    }
}

impl RouteOwner for ResourceHandler {
    // the route is registered dynamically rather than declaratively so
    // the prefix can be normalized first
    fn setup(&self, routes: &RouteConfig, _server: &ServerHandle) {
        let mut prefix = self.prefix.clone();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        let handler = Arc::new(ResourceGet {
            resources: self.resources.clone(),
            index_file: self.index_file,
        });
        routes.map(
            &format!("{prefix}{WILDCARD}"),
            Method::Get,
            Some(HandlerSpec::new(handler, vec![BindingRole::PathParam])),
        );
    }
}

struct ResourceGet {
    resources: Vec<PathBuf>,
    index_file: bool,
}

#[async_trait]
impl Handler for ResourceGet {
    async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError> {
        let Some(resource) = args.path_param(0) else {
            return Ok(not_found());
        };
        let Some(target) = self.locate(resource) else {
            debug!("no configured resource matches {resource:?}");
            return Ok(not_found());
        };

        let data = tokio::fs::read(&target).await.map_err(|err| {
            Fault::handler(
                StatusCode::InternalServerError,
                format!("unable to read resource {}: {err}", target.display()),
            )
        })?;
        let mime = mime_guess::from_path(&target).first_or_octet_stream();

        Ok(Response::new(StatusCode::Ok)
            .header("Content-Type", format!("{mime}; charset=utf-8"))
            .body(data))
    }
}

impl ResourceGet {
    // suffix match against the configured allowlist only
    fn locate(&self, resource: &str) -> Option<PathBuf> {
        for candidate in &self.resources {
            let text = candidate.to_string_lossy().replace('\\', "/");
            if text.ends_with(resource) {
                if candidate.is_dir() {
                    return self
                        .index_file
                        .then(|| candidate.join("index.html"));
                }
                return Some(candidate.clone());
            }
        }
        None
    }
}

fn not_found() -> Response {
    Response::new(StatusCode::NotFound)
}
