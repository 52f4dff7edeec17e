//! Shutdown notifications for the site server.
//!
//! Background tasks spawned next to the site can either watch a
//! [`CancellationToken`] or subscribe to the individual [`ShutdownPhase`]
//! events.
//!
//! ```rust,no_run
//! use axum_login_shield::{Config, ShutdownPhase, SiteRouter};
//!
//! # async fn example() -> axum_login_shield::Result<()> {
//! let router = SiteRouter::without_state(Config::default())?;
//! let token = router.cancellation_token();
//! let mut phases = router.subscribe_to_shutdown();
//!
//! tokio::spawn(async move {
//!     token.cancelled().await;
//!     tracing::info!("Stopping background task");
//! });
//!
//! tokio::spawn(async move {
//!     while let Ok(phase) = phases.recv().await {
//!         if let ShutdownPhase::GracePeriodStarted { timeout } = phase {
//!             tracing::info!("{}s left to drain requests", timeout.as_secs());
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// The phases of a graceful shutdown, emitted in this order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// SIGTERM or SIGINT received. The server stops accepting connections and
    /// the [`CancellationToken`] fires.
    Initiated,

    /// In-flight requests are draining for at most `timeout`.
    GracePeriodStarted { timeout: Duration },

    /// The grace period expired and the server is about to exit.
    GracePeriodEnded,
}

/// Broadcasts [`ShutdownPhase`] events and owns the shutdown [`CancellationToken`].
///
/// Clones share the same channel and token.
#[derive(Clone)]
pub struct ShutdownNotifier {
    sender: broadcast::Sender<ShutdownPhase>,
    cancel_token: CancellationToken,
}

impl ShutdownNotifier {
    /// Creates a notifier whose subscribers can buffer up to `capacity` phases.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribers only see phases emitted after they subscribed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.sender.subscribe()
    }

    /// Returns the token that is cancelled on [`ShutdownPhase::Initiated`].
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub fn is_shutdown_initiated(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Sends `phase` to every subscriber and returns how many received it.
    pub(crate) fn emit(&self, phase: ShutdownPhase) -> usize {
        if phase == ShutdownPhase::Initiated {
            self.cancel_token.cancel();
        }

        // No receivers is not an error
        self.sender.send(phase).unwrap_or(0)
    }
}

impl Default for ShutdownNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl std::fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownNotifier")
            .field("subscriber_count", &self.sender.receiver_count())
            .field("is_shutdown_initiated", &self.is_shutdown_initiated())
            .finish()
    }
}
