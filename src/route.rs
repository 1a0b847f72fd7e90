//! Routing bindings between a source reference and a destination.
//!
//! The engine never owns routing policy; it asks a [`RouteResolver`] for the
//! candidate bindings of a reference id when a request stream begins.
//! [`RouteTable`] is a simple in-memory resolver for embedders and tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a binding or of a correlation created from one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteKind {
    /// Requests arriving from a source partner.
    Input,
    /// Replies established by a destination for an earlier request.
    OutputEstablished,
}

/// A binding from `(source, source_ref)` to `(target, target_ref)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub kind: RouteKind,
    /// Name of the partner the bound requests come from.
    pub source: String,
    pub source_ref: u64,
    /// Name of the sink requests are forwarded to.
    pub target: String,
    pub target_ref: u64,
}

impl Route {
    /// Create an input binding.
    #[must_use]
    pub fn input(
        source: impl Into<String>,
        source_ref: u64,
        target: impl Into<String>,
        target_ref: u64,
    ) -> Self {
        Self {
            kind: RouteKind::Input,
            source: source.into(),
            source_ref,
            target: target.into(),
            target_ref,
        }
    }

    /// Create a reply binding, used to answer requests from `source` that
    /// have no forwarding destination.
    #[must_use]
    pub fn reply(
        source: impl Into<String>,
        source_ref: u64,
        target: impl Into<String>,
        target_ref: u64,
    ) -> Self {
        Self {
            kind: RouteKind::OutputEstablished,
            ..Self::input(source, source_ref, target, target_ref)
        }
    }

    /// Returns `true` if the binding's source partner is `name`.
    #[must_use]
    pub fn source_matches(&self, name: &str) -> bool { self.source == name }
}

/// Looks up the bindings for a reference id.
pub trait RouteResolver: Send {
    /// Candidate bindings for `reference_id`, in priority order.
    fn resolve(&self, reference_id: u64) -> Vec<Route>;

    /// First binding for `reference_id` whose source is `own_name`; used to
    /// answer a request that has no forwarding destination.
    fn resolve_reply(&self, reference_id: u64, own_name: &str) -> Option<Route> {
        self.resolve(reference_id)
            .into_iter()
            .find(|route| route.source_matches(own_name))
    }
}

/// Errors returned by [`RouteTable`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// An identical binding already exists.
    #[error(
        "route {}:{} -> {}:{} already exists",
        .route.source, .route.source_ref, .route.target, .route.target_ref
    )]
    Duplicate { route: Route },
}

/// Ordered in-memory list of bindings. The first match wins.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a binding.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Duplicate`] if the same binding is already present.
    pub fn add(&mut self, route: Route) -> Result<(), RouteError> {
        if self.routes.contains(&route) {
            return Err(RouteError::Duplicate { route });
        }
        self.routes.push(route);
        Ok(())
    }

    /// Remove a binding, returning whether it was present.
    pub fn remove(&mut self, route: &Route) -> bool {
        let before = self.routes.len();
        self.routes.retain(|existing| existing != route);
        self.routes.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize { self.routes.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}

impl RouteResolver for RouteTable {
    /// Input bindings for `reference_id`.
    fn resolve(&self, reference_id: u64) -> Vec<Route> {
        self.routes
            .iter()
            .filter(|route| route.kind == RouteKind::Input && route.source_ref == reference_id)
            .cloned()
            .collect()
    }

    /// First reply binding for `reference_id` from `own_name`.
    fn resolve_reply(&self, reference_id: u64, own_name: &str) -> Option<Route> {
        self.routes
            .iter()
            .find(|route| {
                route.kind == RouteKind::OutputEstablished
                    && route.source_ref == reference_id
                    && route.source_matches(own_name)
            })
            .cloned()
    }
}
