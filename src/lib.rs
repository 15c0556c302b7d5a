pub mod audio;
pub mod board;
pub mod bubble;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod session;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use board::Board;
use bubble::{BubbleOptions, ImageGenMode, StoredBubble, VisibleBubble};
use error::CompanionError;
use export::ExportSummary;
use gateway::{Gateway, LocationRequest};
use session::SessionState;

/// Human-readable local creation time, e.g. `1/1/24, 9:00 AM`.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%-m/%-d/%y, %-I:%M %p").to_string()
}

// ---------------------------------------------------------------------------
// Companion: session orchestrator
// ---------------------------------------------------------------------------

/// Owns the board, the backend gateway, the startup state, and the
/// persistence worker. Every user action flows through here: gateway call,
/// then renderer, then board mutation, then (via the board's sync channel)
/// a full-session persist.
pub struct Companion {
    gateway: Arc<Gateway>,
    board: Board,
    state: SessionState,
    sync_handle: Option<JoinHandle<()>>,
    export_folder: String,
}

impl Companion {
    pub fn new(gateway: Gateway, export_folder: impl Into<String>) -> Self {
        let gateway = Arc::new(gateway);
        let (tx, rx) = mpsc::unbounded_channel();
        let sync_handle = session::spawn_sync_worker(Arc::clone(&gateway), rx);
        Companion {
            gateway,
            board: Board::with_sync(tx),
            state: SessionState::new(),
            sync_handle: Some(sync_handle),
            export_folder: export_folder.into(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Ask the backend whether a prior session exists.
    ///
    /// `Some(stored)` means the caller must choose between [`resume`] and
    /// [`start_fresh`]; `None` means startup is done and the board is live.
    /// A failed check is logged and treated as no session, matching the
    /// source behavior of carrying on without one.
    pub async fn check_session(&mut self) -> Result<Option<Vec<StoredBubble>>, CompanionError> {
        match self.gateway.load_session().await {
            Ok(Some(stored)) => {
                self.state.found()?;
                Ok(Some(stored))
            }
            Ok(None) => {
                self.state.missing()?;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "session check failed, starting without a session");
                self.state.missing()?;
                Ok(None)
            }
        }
    }

    /// Replay a found session onto the board. Returns the bubble count.
    pub fn resume(&mut self, stored: Vec<StoredBubble>) -> Result<usize, CompanionError> {
        self.state.begin_replay()?;
        let replayed = session::replay_stored(&mut self.board, stored);
        self.state.finish_replay()?;
        Ok(replayed)
    }

    /// Archive the found session on the backend and start with an empty
    /// board. An archive failure leaves the old session (and the prompt
    /// phase) in place.
    pub async fn start_fresh(&mut self) -> Result<(), CompanionError> {
        self.state.ensure_prompting()?;
        self.gateway.archive_session().await?;
        self.state.fresh()
    }

    // -----------------------------------------------------------------------
    // Bubble creation
    // -----------------------------------------------------------------------

    /// Pin a free-typed note to the board.
    pub fn add_note(&mut self, text: &str) -> Result<Uuid, CompanionError> {
        self.state.ensure_idle("add a note")?;
        let message = text.trim();
        if message.is_empty() {
            return Err(CompanionError::MissingInput {
                what: "message text",
            });
        }
        Ok(self.board.insert(VisibleBubble::render(
            local_timestamp(),
            message,
            BubbleOptions::default(),
        )))
    }

    /// Transcribe a recording and pin the result.
    pub async fn record_from_wav(&mut self, wav: Vec<u8>) -> Result<Uuid, CompanionError> {
        self.state.ensure_idle("transcribe a recording")?;
        let text = audio::transcribe_recording(&self.gateway, wav).await?;
        Ok(self.board.insert(VisibleBubble::render(
            local_timestamp(),
            text,
            BubbleOptions::default(),
        )))
    }

    /// Generate an NPC: a secret personality bubble, then a public
    /// description bubble (which therefore sits above it) with a portrait.
    ///
    /// A failed portrait degrades to a bubble without an image; its control
    /// keeps the `Portrait` label so the user can retry. A failed profile
    /// fetch creates nothing and propagates.
    pub async fn create_character(&mut self) -> Result<(), CompanionError> {
        self.state.ensure_idle("generate a character")?;
        let profile = self.gateway.generate_character().await?;
        let timestamp = local_timestamp();

        let portrait = match self
            .gateway
            .generate_image(&profile.physical_description, Some(ImageGenMode::Portrait))
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "portrait generation failed, creating the bubble without an image");
                None
            }
        };

        self.board.insert(VisibleBubble::render(
            timestamp.clone(),
            profile.personality,
            BubbleOptions {
                secret: true,
                ..Default::default()
            },
        ));
        self.board.insert(VisibleBubble::render(
            timestamp,
            profile.physical_description,
            BubbleOptions {
                image_path: portrait,
                image_gen_mode: Some(ImageGenMode::Portrait),
                ..Default::default()
            },
        ));
        Ok(())
    }

    /// Generate a location: a secret bubble for its hidden truths, then a
    /// public description bubble set up for map generation.
    pub async fn create_location(
        &mut self,
        request: LocationRequest,
    ) -> Result<(), CompanionError> {
        self.state.ensure_idle("generate a location")?;
        if request.place_name.trim().is_empty() {
            return Err(CompanionError::MissingInput { what: "place name" });
        }
        if request.short_description.trim().is_empty() {
            return Err(CompanionError::MissingInput {
                what: "place description",
            });
        }

        let profile = self.gateway.generate_location(&request).await?;
        let timestamp = local_timestamp();

        self.board.insert(VisibleBubble::render(
            timestamp.clone(),
            format!("Secret: {}", profile.secrets),
            BubbleOptions {
                secret: true,
                ..Default::default()
            },
        ));
        self.board.insert(VisibleBubble::render(
            timestamp,
            format!(
                "Place: {}\n\nDescription: {}\n",
                profile.place_name, profile.long_description
            ),
            BubbleOptions {
                image_gen_mode: Some(ImageGenMode::Map),
                ..Default::default()
            },
        ));
        Ok(())
    }

    /// Ask the oracle. The answer is returned for display, not pinned.
    pub async fn consult_oracle(&self) -> Result<String, CompanionError> {
        self.gateway.consult_oracle().await
    }

    // -----------------------------------------------------------------------
    // Bubble mutation
    // -----------------------------------------------------------------------

    /// Run one image generation for the bubble at `index`.
    ///
    /// The control is disabled for the whole round trip, so a second
    /// activation on the same bubble cannot overlap; other bubbles are
    /// untouched and fully independent.
    pub async fn generate_image_for(&mut self, index: usize) -> Result<(), CompanionError> {
        self.state.ensure_idle("generate an image")?;
        let (content, mode) = {
            let bubble = self
                .board
                .get(index)
                .ok_or(CompanionError::UnknownBubble { index })?;
            (bubble.content.clone(), bubble.image_gen_mode)
        };
        self.board.begin_image(index)?;
        match self.gateway.generate_image(&content, mode).await {
            Ok(path) => self.board.complete_image(index, path),
            Err(e) => {
                self.board.fail_image(index)?;
                Err(e)
            }
        }
    }

    /// Remove the bubble at `index`. No confirmation step.
    pub fn delete_bubble(&mut self, index: usize) -> Result<VisibleBubble, CompanionError> {
        self.state.ensure_idle("delete a bubble")?;
        self.board
            .delete(index)
            .ok_or(CompanionError::UnknownBubble { index })
    }

    /// Flip the reveal toggle on the secret bubble at `index`.
    pub fn toggle_reveal(&mut self, index: usize) -> Result<bool, CompanionError> {
        self.state.ensure_idle("toggle a secret")?;
        self.board.toggle_reveal(index)
    }

    // -----------------------------------------------------------------------
    // Side surfaces
    // -----------------------------------------------------------------------

    /// Upload a map image from disk, returning the backend's stored path.
    pub async fn upload_map(&self, path: &Path) -> Result<String, CompanionError> {
        if !path.exists() {
            return Err(CompanionError::MissingInput { what: "map file" });
        }
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(CompanionError::MissingInput { what: "map file" })?;
        self.gateway.upload_map(bytes, &filename).await
    }

    /// Export the board as a zip archive at `out_path`.
    pub async fn export_archive(&self, out_path: &Path) -> Result<ExportSummary, CompanionError> {
        export::export_board(&self.gateway, &self.board, &self.export_folder, out_path).await
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Close the sync channel and wait for queued persists to drain.
    pub async fn shutdown(mut self) {
        self.board.detach_sync();
        if let Some(handle) = self.sync_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync worker ended abnormally");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
