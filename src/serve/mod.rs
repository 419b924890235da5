// src/serve/mod.rs

//! Static dev server with live-reload notifications.
//!
//! - [`reload`] holds the broadcast hub connecting the build runtime to
//!   connected browser sessions.
//! - [`server`] serves the build output and the WebSocket endpoint.

pub mod reload;
pub mod server;

pub use reload::{ReloadHub, ReloadSignal};
pub use server::run_server;
