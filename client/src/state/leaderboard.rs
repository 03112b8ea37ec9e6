//! Leaderboard screen state.
//!
//! DESIGN
//! ======
//! The committed list mirrors the server's last `screenshot:snapshot`. A drag
//! gesture overlays a provisional order for display while the reorder request
//! is in flight: `commit_reorder` promotes it on ack, `rollback_reorder`
//! discards it on an error reply, and any authoritative snapshot supersedes
//! both. The view is therefore never left disagreeing with backend truth, it
//! only runs ahead of it for the duration of one request.

#[cfg(test)]
#[path = "leaderboard_test.rs"]
mod tests;

use uuid::Uuid;

use wire::records::Screenshot;
use wire::Frame;

use crate::reorder;

/// State for the ranked screenshot leaderboard.
#[derive(Clone, Debug, Default)]
pub struct LeaderboardView {
    /// Last authoritative list, rank ascending.
    items: Vec<Screenshot>,
    /// Optimistic overlay shown while a reorder awaits its ack.
    provisional: Option<Vec<Screenshot>>,
}

impl LeaderboardView {
    /// Replace the committed list from a snapshot frame. Authoritative state
    /// supersedes any provisional overlay.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` when the frame payload is malformed.
    pub fn apply_snapshot(&mut self, frame: &Frame) -> Result<(), serde_json::Error> {
        self.items = frame.items()?;
        self.provisional = None;
        Ok(())
    }

    /// The list the screen should render: the provisional overlay when a
    /// reorder is in flight, the committed list otherwise.
    #[must_use]
    pub fn visible(&self) -> &[Screenshot] {
        self.provisional.as_deref().unwrap_or(&self.items)
    }

    /// Start an optimistic reorder for a drag of `source` onto `target`.
    ///
    /// Overlays the new order and returns the user-id sequence to persist via
    /// `screenshot:reorder`. Returns `None` for no-op drags and leaves the
    /// view untouched.
    pub fn begin_reorder(&mut self, source: Uuid, target: Uuid) -> Option<Vec<Uuid>> {
        let next = reorder::reorder(self.visible(), source, target)?;
        let order = reorder::order_ids(&next);
        self.provisional = Some(next);
        Some(order)
    }

    /// Promote the provisional order after the server acked the reorder.
    pub fn commit_reorder(&mut self) {
        if let Some(next) = self.provisional.take() {
            self.items = next;
        }
    }

    /// Discard the provisional order after the server rejected the reorder.
    pub fn rollback_reorder(&mut self) {
        self.provisional = None;
    }

    #[must_use]
    pub fn has_provisional(&self) -> bool {
        self.provisional.is_some()
    }

    /// The caller's own entry, if they have one on the visible list.
    #[must_use]
    pub fn mine(&self, user_id: Uuid) -> Option<&Screenshot> {
        self.visible().iter().find(|s| s.user_id == user_id)
    }

    #[must_use]
    pub fn is_mine(&self, user_id: Uuid) -> bool {
        self.mine(user_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.visible().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible().is_empty()
    }
}
