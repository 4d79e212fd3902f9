//! Route table: (path template, verb) bindings and template matching.

use crate::{
    http::types::Method,
    routing::dispatcher::{BindingRole, Handler},
    server::server_impl::ServerHandle,
};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// The reserved wildcard token: a template segment equal to this matches
/// exactly one path segment and binds it as a path parameter.
pub const WILDCARD: &str = "{}";

/// A handler descriptor: the callable plus its parameter-binding roles,
/// declared once at registration.
#[derive(Clone)]
pub struct HandlerSpec {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) bindings: Vec<BindingRole>,
}

impl HandlerSpec {
    #[inline]
    pub fn new(handler: Arc<dyn Handler>, bindings: Vec<BindingRole>) -> Self {
        HandlerSpec { handler, bindings }
    }
}

// One registered binding. The verb set lets a single descriptor answer to
// more than one verb.
#[derive(Clone)]
pub(crate) struct RouteEntry {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) bindings: Vec<BindingRole>,
    pub(crate) verbs: BTreeSet<Method>,
    pub(crate) route: String,
}

/// Thread-safe table of (path template, verb) to handler-descriptor
/// bindings.
///
/// Templates are `/`-delimited; a segment equal to [`WILDCARD`] matches
/// exactly one path segment and contributes a path parameter in
/// left-to-right order. Templates are normalized to end with `/` before
/// storage and lookup, so trailing-slash presence is not observable.
pub struct RouteTable {
    entries: RwLock<HashMap<(String, Method), RouteEntry>>,
}

impl RouteTable {
    #[inline]
    pub fn new() -> Self {
        RouteTable {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Upserts or removes a binding.
    ///
    /// With `None`, any entry under `(template, verb)` is removed, trying
    /// the template both with and without a trailing `/`. Otherwise: if no
    /// entry exists one is created seeded with `verb`; if one exists its
    /// handler is replaced and `verb` joins its verb set.
    pub fn map(&self, template: &str, verb: Method, spec: Option<HandlerSpec>) {
        let mut entries = self.write_entries();
        match spec {
            None => {
                entries.remove(&(template.to_string(), verb));
                entries.remove(&(normalize(template), verb));
            }
            Some(spec) => {
                let route = normalize(template);
                entries
                    .entry((route.clone(), verb))
                    .and_modify(|entry| {
                        entry.handler = spec.handler.clone();
                        entry.bindings = spec.bindings.clone();
                        entry.verbs.insert(verb);
                    })
                    .or_insert_with(|| RouteEntry {
                        handler: spec.handler,
                        bindings: spec.bindings,
                        verbs: BTreeSet::from([verb]),
                        route,
                    });
            }
        }
    }

    /// Resolves a normalized request path against the table.
    ///
    /// `HEAD` is treated as `GET` for matching purposes only. The exact
    /// wildcard-free match is tried first; the wildcard scan runs as a
    /// fallback. When more than one wildcard template could match the
    /// same path, the most specific one wins - fewest wildcard segments
    /// first, remaining ties broken by lexicographic template order - so
    /// the outcome never depends on map iteration order.
    pub(crate) fn lookup(&self, path: &str, verb: Method) -> Option<(RouteEntry, Vec<String>)> {
        let verb = verb.effective();
        let entries = self.read_entries();

        // fast path: exact match on a wildcard-free template
        if let Some(entry) = entries.get(&(path.to_string(), verb)) {
            if !has_wildcard(&entry.route) {
                return Some((entry.clone(), Vec::new()));
            }
        }

        let requested: Vec<&str> = path.split('/').collect();
        let mut best: Option<(usize, RouteEntry, Vec<String>)> = None;
        for entry in entries.values() {
            if !entry.verbs.contains(&verb) {
                continue;
            }
            let template: Vec<&str> = entry.route.split('/').collect();
            if template.len() != requested.len() {
                continue;
            }

            let mut params = Vec::new();
            let mut matched = true;
            for (tmpl, req) in template.iter().zip(&requested) {
                if tmpl != req {
                    if *tmpl == WILDCARD {
                        params.push((*req).to_string());
                    } else {
                        matched = false;
                        break;
                    }
                }
            }
            if !matched {
                continue;
            }

            let wildcards = template.iter().filter(|s| **s == WILDCARD).count();
            let better = match &best {
                None => true,
                Some((best_wildcards, best_entry, _)) => {
                    wildcards < *best_wildcards
                        || (wildcards == *best_wildcards && entry.route < best_entry.route)
                }
            };
            if better {
                best = Some((wildcards, entry.clone(), params));
            }
        }

        best.map(|(_, entry, params)| (entry, params))
    }

    /// The number of registered bindings.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<(String, Method), RouteEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<(String, Method), RouteEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(template: &str) -> String {
    if template.ends_with('/') {
        template.to_string()
    } else {
        format!("{template}/")
    }
}

fn has_wildcard(template: &str) -> bool {
    template.split('/').any(|segment| segment == WILDCARD)
}

/// A handle for registering routes, given to route-owning objects at
/// setup time and to handlers that bind the route-config role.
#[derive(Clone)]
pub struct RouteConfig {
    table: Arc<RouteTable>,
}

impl RouteConfig {
    #[inline]
    pub(crate) fn new(table: Arc<RouteTable>) -> Self {
        RouteConfig { table }
    }

    /// See [`RouteTable::map`].
    #[inline]
    pub fn map(&self, template: &str, verb: Method, spec: Option<HandlerSpec>) {
        self.table.map(template, verb, spec);
    }
}

/// A declaratively bound route, evaluated once at registration.
pub struct RouteSpec {
    pub verb: Method,
    pub template: String,
    pub handler: HandlerSpec,
}

impl RouteSpec {
    #[inline]
    pub fn new(verb: Method, template: impl Into<String>, handler: HandlerSpec) -> Self {
        RouteSpec {
            verb,
            template: template.into(),
            handler,
        }
    }
}

/// An external route-owning object.
///
/// Registration evaluates [`routes`](Self::routes) and then invokes
/// [`setup`](Self::setup) exactly once, letting the object register
/// further routes programmatically.
pub trait RouteOwner: Send + Sync {
    /// Declaratively bound routes.
    fn routes(&self) -> Vec<RouteSpec> {
        Vec::new()
    }

    /// Programmatic registration hook, invoked once when the object is
    /// registered with a server.
    fn setup(&self, routes: &RouteConfig, server: &ServerHandle) {
        let _ = (routes, server);
    }
}
