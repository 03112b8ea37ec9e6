//! Screen-level state holders.
//!
//! DESIGN
//! ======
//! One holder per screen collection (workspace list, roster, leaderboard,
//! comment feed), each a plain struct the UI renders from. Holders ingest
//! whole snapshot frames and re-derive their summary state; they never merge
//! deltas, because the server always broadcasts the full collection.

pub mod comments;
pub mod leaderboard;
pub mod participants;
pub mod workspaces;
