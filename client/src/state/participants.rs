//! Roster screen state: who joined and how far along they are.

#[cfg(test)]
#[path = "participants_test.rs"]
mod tests;

use uuid::Uuid;

use wire::records::{Participant, ParticipantStatus};
use wire::Frame;

/// State for the participant roster, fed by `participant:snapshot` frames.
#[derive(Clone, Debug, Default)]
pub struct ParticipantsView {
    /// Roster in join order, as the server sends it.
    pub items: Vec<Participant>,
}

/// Per-status tallies across the roster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    #[must_use]
    pub fn total(self) -> usize {
        self.not_started + self.in_progress + self.completed
    }
}

impl ParticipantsView {
    /// Replace the roster from a snapshot frame.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` when the frame payload is malformed.
    pub fn apply_snapshot(&mut self, frame: &Frame) -> Result<(), serde_json::Error> {
        self.items = frame.items()?;
        Ok(())
    }

    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for participant in &self.items {
            match participant.status {
                ParticipantStatus::NotStarted => counts.not_started += 1,
                ParticipantStatus::InProgress => counts.in_progress += 1,
                ParticipantStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn my_status(&self, user_id: Uuid) -> Option<ParticipantStatus> {
        self.items.iter().find(|p| p.user_id == user_id).map(|p| p.status)
    }

    #[must_use]
    pub fn is_joined(&self, user_id: Uuid) -> bool {
        self.items.iter().any(|p| p.user_id == user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
