//! Headless app core for `ShareNight` sessions.
//!
//! ARCHITECTURE
//! ============
//! This crate is everything a `ShareNight` front end needs except the views:
//! HTTP and websocket transports (`net`), the screen-level state holders
//! (`state`), the leaderboard reorder rules (`reorder`), and the screenshot
//! upload workflow (`upload`). A UI layer owns one `ApiClient` and one
//! `SyncClient`, feeds incoming snapshot frames into the state holders, and
//! renders from them.
//!
//! All types here are plain data or tokio-native async; nothing assumes a
//! particular UI framework.

pub mod net;
pub mod reorder;
pub mod state;
pub mod upload;
