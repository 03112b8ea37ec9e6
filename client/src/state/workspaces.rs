//! Workspace list screen state and due-date labelling.

#[cfg(test)]
#[path = "workspaces_test.rs"]
mod tests;

use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use wire::records::Workspace;

/// State for the workspace list screen.
#[derive(Clone, Debug, Default)]
pub struct WorkspacesView {
    /// Known workspaces, soonest due first.
    pub items: Vec<Workspace>,
    pub loading: bool,
    pub create_pending: bool,
}

impl WorkspacesView {
    /// Replace the list with a fetched one, keeping the soonest-due-first order.
    pub fn set_items(&mut self, items: Vec<Workspace>) {
        self.items = items;
        self.sort();
        self.loading = false;
    }

    /// Insert or replace one workspace, preserving the list order.
    pub fn upsert(&mut self, workspace: Workspace) {
        if let Some(existing) = self.items.iter_mut().find(|w| w.id == workspace.id) {
            *existing = workspace;
        } else {
            self.items.push(workspace);
        }
        self.sort();
        self.create_pending = false;
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Workspace> {
        self.items.iter().find(|w| w.id == id)
    }

    fn sort(&mut self) {
        self.items.sort_by_key(|w| (w.due_at_ms, w.id));
    }
}

// =============================================================================
// DUE-DATE LABELLING
// =============================================================================

/// Whether a due timestamp falls on the viewer's current calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DueDay {
    Today,
    OtherDay,
}

/// Classify `due_at_ms` against `now_ms` at the given UTC offset.
///
/// The offset is an explicit parameter so the comparison is deterministic;
/// callers pass the viewer's local offset.
#[must_use]
pub fn due_day(due_at_ms: i64, now_ms: i64, offset: UtcOffset) -> DueDay {
    match (at_offset(due_at_ms, offset), at_offset(now_ms, offset)) {
        (Some(due), Some(now)) if due.date() == now.date() => DueDay::Today,
        _ => DueDay::OtherDay,
    }
}

/// Render a due timestamp as `"today HH:MM"` or `"MM-DD HH:MM"`.
#[must_use]
pub fn due_label(due_at_ms: i64, now_ms: i64, offset: UtcOffset) -> String {
    let Some(due) = at_offset(due_at_ms, offset) else {
        return "invalid date".to_string();
    };
    match due_day(due_at_ms, now_ms, offset) {
        DueDay::Today => format!("today {:02}:{:02}", due.hour(), due.minute()),
        DueDay::OtherDay => format!(
            "{:02}-{:02} {:02}:{:02}",
            u8::from(due.month()),
            due.day(),
            due.hour(),
            due.minute()
        ),
    }
}

fn at_offset(ms: i64, offset: UtcOffset) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ms.div_euclid(1000))
        .ok()
        .map(|dt| dt.to_offset(offset))
}
