//! Route registry and proxy cache.
//!
//! # Responsibilities
//! - Map prefix → backend URL (latest registration wins)
//! - Memoize one constructed handler per prefix
//! - Evict a prefix's handler whenever that prefix is re-registered
//!
//! # Design Decisions
//! - Routes and handlers share one `RwLock` so a registration and its
//!   eviction are a single atomic step
//! - Cache hits take only the read lock
//! - Misses take the write lock and re-check before building, so concurrent
//!   first requests build exactly one handler
//! - Backend URLs are stored verbatim; parsing happens at construction time

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::GatewayError;
use crate::routing::matcher::longest_match;

#[derive(Debug)]
struct RouteState<H> {
    routes: HashMap<String, String>,
    handlers: HashMap<String, Arc<H>>,
}

/// Outcome of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Backend URL the prefix pointed to before, if any.
    pub previous: Option<String>,
    /// Whether a cached handler was dropped.
    pub evicted: bool,
}

/// Concurrent prefix → backend registry with a lazily built handler cache.
#[derive(Debug)]
pub struct RouteRegistry<H> {
    state: RwLock<RouteState<H>>,
}

impl<H> RouteRegistry<H> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RouteState {
                routes: HashMap::new(),
                handlers: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RouteState<H>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RouteState<H>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `prefix` to `backend`, replacing any earlier binding and
    /// evicting its cached handler.
    pub fn register(&self, prefix: impl Into<String>, backend: impl Into<String>) -> Registration {
        let prefix = prefix.into();
        let mut state = self.write();
        let evicted = state.handlers.remove(&prefix).is_some();
        let previous = state.routes.insert(prefix, backend.into());
        Registration { previous, evicted }
    }

    pub fn lookup(&self, prefix: &str) -> Option<String> {
        self.read().routes.get(prefix).cloned()
    }

    /// Point-in-time copy of all registered prefixes.
    pub fn prefixes(&self) -> Vec<String> {
        self.read().routes.keys().cloned().collect()
    }

    /// Point-in-time copy of the whole table, ordered by prefix.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read()
            .routes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longest registered prefix covering `path`, matched against a snapshot.
    pub fn match_prefix(&self, path: &str) -> Option<String> {
        let prefixes = self.prefixes();
        longest_match(prefixes.iter().map(String::as_str), path).map(str::to_string)
    }

    /// Cached handler for `prefix`, without building one.
    pub fn cached(&self, prefix: &str) -> Option<Arc<H>> {
        self.read().handlers.get(prefix).cloned()
    }

    /// Return the cached handler for `prefix`, building it from the current
    /// backend URL on a miss. A failed build caches nothing.
    pub fn get_or_build<F>(&self, prefix: &str, build: F) -> Result<Arc<H>, GatewayError>
    where
        F: FnOnce(&str) -> Result<H, GatewayError>,
    {
        if let Some(handler) = self.cached(prefix) {
            return Ok(handler);
        }

        let mut state = self.write();
        if let Some(handler) = state.handlers.get(prefix) {
            return Ok(Arc::clone(handler));
        }

        let backend = state
            .routes
            .get(prefix)
            .cloned()
            .ok_or_else(|| GatewayError::NoRoute {
                path: prefix.to_string(),
            })?;

        let handler = Arc::new(build(&backend)?);
        state.handlers.insert(prefix.to_string(), Arc::clone(&handler));
        Ok(handler)
    }
}

impl<H> Default for RouteRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
