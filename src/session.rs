//! Session startup and persistence.
//!
//! ## Startup state machine (per process run)
//! ```text
//! CheckingSession -> Prompting  (backend reports a prior session)
//! CheckingSession -> Idle       (no prior session)
//! Prompting       -> Replaying  (user resumes)
//! Prompting       -> Idle       (user archives and starts fresh)
//! Replaying       -> Idle
//! ```
//! `Idle` is terminal; bubble CRUD only happens there, and there is no way
//! back to the prompting states within one run.
//!
//! ## Persistence
//! Snapshot pushes are fire-and-forget: a spawned worker drains the channel
//! and POSTs each snapshot, logging the outcome either way. No retry, no
//! acknowledgment, no conflict detection; concurrent writers race and the
//! backend keeps the last write.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::board::{Board, SessionSnapshot};
use crate::bubble::{BubbleOptions, StoredBubble, VisibleBubble};
use crate::error::CompanionError;
use crate::gateway::Gateway;

// ---------------------------------------------------------------------------
// Startup phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    CheckingSession,
    Prompting,
    Replaying,
    Idle,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::CheckingSession => "checking session",
            SessionPhase::Prompting => "prompting",
            SessionPhase::Replaying => "replaying",
            SessionPhase::Idle => "idle",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the startup phase and rejects out-of-order transitions.
#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            phase: SessionPhase::CheckingSession,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    fn step(
        &mut self,
        from: SessionPhase,
        to: SessionPhase,
        event: &'static str,
    ) -> Result<(), CompanionError> {
        if self.phase != from {
            return Err(CompanionError::Phase {
                phase: self.phase.as_str(),
                event,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// The backend reported a prior session.
    pub fn found(&mut self) -> Result<(), CompanionError> {
        self.step(
            SessionPhase::CheckingSession,
            SessionPhase::Prompting,
            "report a found session",
        )
    }

    /// The backend reported no prior session.
    pub fn missing(&mut self) -> Result<(), CompanionError> {
        self.step(
            SessionPhase::CheckingSession,
            SessionPhase::Idle,
            "report a missing session",
        )
    }

    /// The user chose to resume.
    pub fn begin_replay(&mut self) -> Result<(), CompanionError> {
        self.step(
            SessionPhase::Prompting,
            SessionPhase::Replaying,
            "begin replay",
        )
    }

    /// The replay finished.
    pub fn finish_replay(&mut self) -> Result<(), CompanionError> {
        self.step(SessionPhase::Replaying, SessionPhase::Idle, "finish replay")
    }

    /// The user chose to archive and start fresh.
    pub fn fresh(&mut self) -> Result<(), CompanionError> {
        self.step(SessionPhase::Prompting, SessionPhase::Idle, "start fresh")
    }

    /// Guard for the archive call that precedes a fresh start.
    pub fn ensure_prompting(&self) -> Result<(), CompanionError> {
        if self.phase == SessionPhase::Prompting {
            Ok(())
        } else {
            Err(CompanionError::Phase {
                phase: self.phase.as_str(),
                event: "start fresh",
            })
        }
    }

    /// Guard for operations that are only legal once startup has settled.
    pub fn ensure_idle(&self, event: &'static str) -> Result<(), CompanionError> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(CompanionError::Phase {
                phase: self.phase.as_str(),
                event,
            })
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Replay stored bubbles onto the board, in stored order, each inserted at
/// the head like a live bubble. The net effect is that the on-screen order
/// after a reload is the reverse of the stored order; the source behaves
/// this way and downstream sessions depend on the stored shape, so it is
/// preserved rather than fixed (see DESIGN.md).
///
/// Each insert fires a persist, as a live creation would.
pub fn replay_stored(board: &mut Board, stored: Vec<StoredBubble>) -> usize {
    let mut replayed = 0;
    for item in stored {
        board.insert(VisibleBubble::render(
            item.timestamp,
            item.transcription,
            BubbleOptions {
                image_path: item.image_path,
                ..Default::default()
            },
        ));
        replayed += 1;
    }
    replayed
}

// ---------------------------------------------------------------------------
// Sync worker
// ---------------------------------------------------------------------------

/// Drain board snapshots and persist each one.
///
/// Outcomes are logged and otherwise dropped: no retry, no user-facing
/// error. The worker exits when every sender is gone, so dropping the board
/// (or detaching its sync channel) and awaiting the handle flushes whatever
/// is still queued.
pub fn spawn_sync_worker(
    gateway: Arc<Gateway>,
    mut rx: mpsc::UnboundedReceiver<SessionSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            let bubbles = snapshot.len();
            match gateway.save_session(&snapshot).await {
                Ok(()) => info!(bubbles, "session saved"),
                Err(e) => warn!(error = %e, bubbles, "session save failed"),
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
