//! The story board: the ordered set of currently visible bubbles.
//!
//! Index 0 is the head of the board (the newest bubble); new bubbles always
//! go in at the head. Every structural mutation (insert, image replacement,
//! delete) serializes the full visible list and pushes the snapshot onto the
//! sync channel, so the persisted session is always a complete picture of
//! what is on screen, never a diff.

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::bubble::{StoredBubble, VisibleBubble};
use crate::error::CompanionError;

/// A full-board snapshot in on-screen order, ready to persist.
pub type SessionSnapshot = Vec<StoredBubble>;

#[derive(Default)]
pub struct Board {
    bubbles: Vec<VisibleBubble>,
    sync_tx: Option<mpsc::UnboundedSender<SessionSnapshot>>,
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    /// A board whose structural mutations push snapshots onto `tx`.
    pub fn with_sync(tx: mpsc::UnboundedSender<SessionSnapshot>) -> Self {
        Board {
            bubbles: Vec::new(),
            sync_tx: Some(tx),
        }
    }

    /// Drop the sync sender so the worker draining it can finish.
    pub fn detach_sync(&mut self) {
        self.sync_tx = None;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VisibleBubble> {
        self.bubbles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut VisibleBubble> {
        self.bubbles.get_mut(index)
    }

    /// Bubbles in on-screen order, newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, VisibleBubble> {
        self.bubbles.iter()
    }

    // -----------------------------------------------------------------------
    // Structural mutations
    // -----------------------------------------------------------------------

    /// Insert a bubble at the head of the board and push a snapshot.
    pub fn insert(&mut self, bubble: VisibleBubble) -> Uuid {
        let id = bubble.id;
        self.bubbles.insert(0, bubble);
        self.push_snapshot();
        id
    }

    /// Remove the bubble at `index` unconditionally. Pushes a snapshot when
    /// something was actually removed.
    pub fn delete(&mut self, index: usize) -> Option<VisibleBubble> {
        if index >= self.bubbles.len() {
            return None;
        }
        let removed = self.bubbles.remove(index);
        self.push_snapshot();
        Some(removed)
    }

    /// Start an image generation on the bubble at `index`.
    ///
    /// Not a structural mutation: nothing is persisted until the generation
    /// resolves.
    pub fn begin_image(&mut self, index: usize) -> Result<(), CompanionError> {
        self.bubbles
            .get_mut(index)
            .ok_or(CompanionError::UnknownBubble { index })?
            .begin_image_generation()
    }

    /// Attach a freshly generated image to the bubble at `index` and push a
    /// snapshot.
    pub fn complete_image(
        &mut self,
        index: usize,
        image_path: impl Into<String>,
    ) -> Result<(), CompanionError> {
        self.bubbles
            .get_mut(index)
            .ok_or(CompanionError::UnknownBubble { index })?
            .complete_image_generation(image_path);
        self.push_snapshot();
        Ok(())
    }

    /// Latch the bubble's image control into its failed state. The stored
    /// content is unchanged, so nothing is persisted.
    pub fn fail_image(&mut self, index: usize) -> Result<(), CompanionError> {
        self.bubbles
            .get_mut(index)
            .ok_or(CompanionError::UnknownBubble { index })?
            .fail_image_generation();
        Ok(())
    }

    /// Flip the reveal toggle on the secret bubble at `index`. Transient;
    /// nothing is persisted.
    pub fn toggle_reveal(&mut self, index: usize) -> Result<bool, CompanionError> {
        self.bubbles
            .get_mut(index)
            .ok_or(CompanionError::UnknownBubble { index })?
            .toggle_reveal()
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Extract `{timestamp, transcription, imagePath}` for every bubble,
    /// preserving on-screen order.
    pub fn serialize_visible(&self) -> SessionSnapshot {
        self.bubbles.iter().map(VisibleBubble::to_stored).collect()
    }

    fn push_snapshot(&self) {
        if let Some(tx) = &self.sync_tx {
            if tx.send(self.serialize_visible()).is_err() {
                debug!("sync channel closed, snapshot dropped");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
