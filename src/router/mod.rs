//! SiteRouter and ambient middleware.
//!
//! - [`site`] - Core `SiteRouter` struct, initialization and shield wiring
//! - [`layers`] - Request id, sensitive headers, logging, timeout, panic catching
//! - [`builder`] - Orchestration (setup_middleware, start, router delegation)
//! - [`shutdown`] - Shutdown phases and notifier

mod builder;
mod layers;
mod shutdown;
mod site;

pub use shutdown::{ShutdownNotifier, ShutdownPhase};
pub use site::SiteRouter;

#[cfg(test)]
mod tests;
