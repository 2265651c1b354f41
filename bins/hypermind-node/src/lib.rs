//! Hypermind node library.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod geo;
pub mod history;
pub mod service;

pub use config::NodeConfig;
pub use service::NodeService;

use std::time::Duration;

/// Minimum spacing between dashboard pushes, barring forced refreshes.
pub const BROADCAST_THROTTLE: Duration = Duration::from_millis(1000);

/// How long the goodbye gets to flush before the process exits.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Default dashboard port.
pub const DEFAULT_HTTP_PORT: u16 = 3000;
