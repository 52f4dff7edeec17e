//! Login relocation and admin-area gating.
//!
//! Every request goes through the same stages:
//!
//! 1. [`RequestClassifier`] sorts the request into a [`RequestClassification`]
//! 2. [`InterceptionEngine`] decides what to do and rewrites the routing inputs
//!    through a [`RoutingContext`]
//! 3. [`AccessGate`] turns the result into a [`GateOutcome`]
//!
//! [`LoginShield`] runs these stages in order, and [`LoginShieldLayer`] puts it
//! in front of an `axum::Router`. [`UrlRewriter`] handles the other direction:
//! links and redirects that still point at the legacy login script.

mod classify;
mod engine;
mod exemption;
mod gate;
mod pipeline;
mod rewrite;
mod routes;
mod routing;
mod service;
mod slug;

pub use classify::{RequestClassification, RequestClassifier};
pub use engine::{InterceptionDecision, InterceptionEngine, RequestContext};
pub use exemption::{CallerKind, ExemptionContext, ExemptionDetector};
pub use gate::{
    AccessGate, AuthenticatedSession, ExtensionSession, FnSession, GateOutcome, SessionVerifier,
    suppress_caching,
};
pub use pipeline::{Inspection, LoginShield, RequestFacts};
pub use rewrite::UrlRewriter;
pub use routes::{ReservedPathSet, RouteTable, SYSTEM_RESERVED};
pub use routing::{HttpRoutingContext, InMemoryRoutingContext, RoutingContext, ScriptName};
pub use service::{LoginShieldLayer, LoginShieldService};
pub use slug::{DEFAULT_SLUG, LoginSlug, SlugResolver, normalize_slug};
