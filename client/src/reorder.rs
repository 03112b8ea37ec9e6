//! Leaderboard reorder rules.
//!
//! DESIGN
//! ======
//! A drag gesture names a source entry and a drop target. The new sequence
//! is the old one with the source removed and reinserted at the target's
//! original index, which lands the source immediately after the target when
//! moving down and immediately before it when moving up. Ranks are then
//! reassigned to 1-based positions, so the result is always a gapless
//! permutation of 1..=N.
//!
//! The function is pure. Persisting the new order is the sync layer's job,
//! and the server applies it all-or-nothing.

#[cfg(test)]
#[path = "reorder_test.rs"]
mod tests;

use uuid::Uuid;

use wire::records::Screenshot;

/// Compute the reordered leaderboard for a drag of `source` onto `target`.
///
/// Entries are identified by uploader user id. Returns `None` when the drag
/// is a no-op: source equals target, or either id is not in the list.
#[must_use]
pub fn reorder(items: &[Screenshot], source: Uuid, target: Uuid) -> Option<Vec<Screenshot>> {
    if source == target {
        return None;
    }
    let from = items.iter().position(|s| s.user_id == source)?;
    let to = items.iter().position(|s| s.user_id == target)?;

    let mut next = items.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);

    for (index, shot) in next.iter_mut().enumerate() {
        shot.rank = i32::try_from(index + 1).unwrap_or(i32::MAX);
    }
    Some(next)
}

/// The user-id sequence a reordered list persists, first rank first.
#[must_use]
pub fn order_ids(items: &[Screenshot]) -> Vec<Uuid> {
    items.iter().map(|s| s.user_id).collect()
}
