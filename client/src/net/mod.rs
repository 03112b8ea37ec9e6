//! Transport layer: HTTP API client and websocket sync client.

pub mod api;
pub mod sync;
