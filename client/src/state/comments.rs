//! Comment feed state.

#[cfg(test)]
#[path = "comments_test.rs"]
mod tests;

use wire::records::Comment;
use wire::Frame;

/// State for the comment feed, fed by `comment:snapshot` frames.
#[derive(Clone, Debug, Default)]
pub struct CommentsView {
    /// Oldest first, as the server sends them.
    pub items: Vec<Comment>,
}

impl CommentsView {
    /// Replace the feed from a snapshot frame.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` when the frame payload is malformed.
    pub fn apply_snapshot(&mut self, frame: &Frame) -> Result<(), serde_json::Error> {
        self.items = frame.items()?;
        Ok(())
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Comment> {
        self.items.last()
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
