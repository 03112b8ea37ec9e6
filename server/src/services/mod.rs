//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod comment;
pub mod participant;
pub mod screenshot;
pub mod session;
pub mod storage;
pub mod sweep;
pub mod workspace;
