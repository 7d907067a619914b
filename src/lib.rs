//! Prometheus-backed cluster dashboard
//!
//! `core` holds the query set, the fan-out dispatcher, the normalizer and the
//! poller. `server` exposes them over HTTP; `app` and `screens` render them
//! in the terminal.

pub mod core;
pub mod server;
pub mod utils;

#[cfg(feature = "tui")]
pub mod app;

#[cfg(feature = "tui")]
pub mod screens;
