//! Gateway: HTTP surface for the proactive dispatch engine.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Open the reference store, build the connector and dispatch engine
//! 3. Serve the bot webhook (`/api/messages`) and the notification triggers
//!
//! All dispatch logic lives in `herald-proactive`; handlers here only map
//! requests to trigger calls and errors to status codes.

pub mod error;
pub mod server;
pub mod state;
