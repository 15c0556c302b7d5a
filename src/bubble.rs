//! Story bubbles: the unit of displayed session content.
//!
//! A bubble is created once with a timestamp and text, may later gain or
//! replace an image, and is destroyed only by explicit deletion. Secret
//! bubbles start fully suppressed behind a reveal toggle. The rendered form
//! carries explicit control state so callers never have to re-derive which
//! actions are legal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CompanionError;

// ---------------------------------------------------------------------------
// Image generation mode
// ---------------------------------------------------------------------------

/// How the backend should frame a generated image for this bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageGenMode {
    /// A character portrait (`person` on the wire).
    Portrait,
    /// A location map (`place` on the wire).
    Map,
}

impl ImageGenMode {
    /// The `object` form value the image endpoint expects.
    pub fn wire_value(&self) -> &'static str {
        match self {
            ImageGenMode::Portrait => "person",
            ImageGenMode::Map => "place",
        }
    }
}

impl std::fmt::Display for ImageGenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_value())
    }
}

// ---------------------------------------------------------------------------
// Persisted summary
// ---------------------------------------------------------------------------

/// The slice of a bubble that survives a session save.
///
/// Field names mirror the backend's session format: the text travels as
/// `transcription` whatever its origin, and a missing image is an explicit
/// `null` rather than an omitted key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBubble {
    pub timestamp: String,
    pub transcription: String,
    #[serde(rename = "imagePath")]
    pub image_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Render options
// ---------------------------------------------------------------------------

/// Options accepted by [`VisibleBubble::render`].
#[derive(Debug, Clone, Default)]
pub struct BubbleOptions {
    pub image_path: Option<String>,
    pub secret: bool,
    pub image_gen_mode: Option<ImageGenMode>,
}

// ---------------------------------------------------------------------------
// Image control state machine
// ---------------------------------------------------------------------------

/// State of the image-action control on a non-secret bubble.
///
/// `Ready -> Busy -> Ready` on success, `Ready -> Busy -> Failed` on error.
/// `Failed` is terminal: the control stays disabled and there is no
/// automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageControl {
    Ready,
    Busy,
    Failed,
}

// ---------------------------------------------------------------------------
// Content style
// ---------------------------------------------------------------------------

/// How the bubble text is presented.
///
/// A freshly rendered bubble shows plain text even when it already carries
/// an image; the emphasized caption style appears only after a successful
/// in-place (re)generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStyle {
    Plain,
    Caption,
}

// ---------------------------------------------------------------------------
// VisibleBubble
// ---------------------------------------------------------------------------

/// One rendered unit of session content.
#[derive(Debug, Clone)]
pub struct VisibleBubble {
    pub id: Uuid,
    /// Human-readable creation time. Set once, never mutated.
    pub timestamp: String,
    /// Primary text. Immutable after creation.
    pub content: String,
    pub image_path: Option<String>,
    pub secret: bool,
    /// Transient reveal state for secret bubbles. Never persisted.
    pub revealed: bool,
    pub image_gen_mode: Option<ImageGenMode>,
    /// `None` for secret bubbles: they expose only the reveal toggle.
    pub image_control: Option<ImageControl>,
    pub content_style: ContentStyle,
}

impl VisibleBubble {
    /// Build a bubble from a timestamp, its text, and render options.
    ///
    /// A secret bubble gets exactly one reveal toggle and no image control;
    /// a non-secret bubble gets exactly one image-action control.
    pub fn render(
        timestamp: impl Into<String>,
        content: impl Into<String>,
        options: BubbleOptions,
    ) -> Self {
        VisibleBubble {
            id: Uuid::new_v4(),
            timestamp: timestamp.into(),
            content: content.into(),
            image_path: options.image_path,
            secret: options.secret,
            revealed: false,
            image_gen_mode: options.image_gen_mode,
            image_control: if options.secret {
                None
            } else {
                Some(ImageControl::Ready)
            },
            content_style: ContentStyle::Plain,
        }
    }

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    /// Current label of the image-action control, or `None` for secret bubbles.
    pub fn image_control_label(&self) -> Option<&'static str> {
        let label = match self.image_control? {
            ImageControl::Busy => "Generating Image...",
            ImageControl::Failed => "ERROR",
            ImageControl::Ready => {
                if self.image_path.is_some() {
                    "Regen Image"
                } else {
                    match self.image_gen_mode {
                        Some(ImageGenMode::Portrait) => "Portrait",
                        Some(ImageGenMode::Map) => "Map",
                        None => "Generate Image",
                    }
                }
            }
        };
        Some(label)
    }

    /// Current label of the reveal toggle, or `None` for non-secret bubbles.
    pub fn reveal_label(&self) -> Option<&'static str> {
        if !self.secret {
            return None;
        }
        Some(if self.revealed {
            "Hide Secret"
        } else {
            "Reveal Secret"
        })
    }

    /// Whether the bubble's content (everything but the toggle) is shown.
    pub fn content_visible(&self) -> bool {
        !self.secret || self.revealed
    }

    // -----------------------------------------------------------------------
    // Reveal toggle
    // -----------------------------------------------------------------------

    /// Flip the reveal state. Stored data is untouched; only visibility
    /// changes. Returns the new reveal state.
    pub fn toggle_reveal(&mut self) -> Result<bool, CompanionError> {
        if !self.secret {
            return Err(CompanionError::NoRevealToggle);
        }
        self.revealed = !self.revealed;
        Ok(self.revealed)
    }

    // -----------------------------------------------------------------------
    // Image generation flow
    // -----------------------------------------------------------------------

    /// Disable the control and mark the generation as in flight.
    ///
    /// Rejected while `Busy` (a request is already running) or `Failed`
    /// (the control is permanently disabled). The `Busy` gate is what keeps
    /// one bubble's disable/request/resolve sequence strictly ordered.
    pub fn begin_image_generation(&mut self) -> Result<(), CompanionError> {
        match self.image_control {
            None => Err(CompanionError::NoImageControl),
            Some(ImageControl::Busy) => Err(CompanionError::ImageBusy),
            Some(ImageControl::Failed) => Err(CompanionError::ImageControlDisabled),
            Some(ImageControl::Ready) => {
                self.image_control = Some(ImageControl::Busy);
                Ok(())
            }
        }
    }

    /// Record a successful generation: replace any existing image, restyle
    /// the text as an emphasized caption, re-enable the control.
    pub fn complete_image_generation(&mut self, image_path: impl Into<String>) {
        self.image_path = Some(image_path.into());
        self.content_style = ContentStyle::Caption;
        if self.image_control.is_some() {
            self.image_control = Some(ImageControl::Ready);
        }
    }

    /// Record a failed generation. Content and image reference are left
    /// untouched; the control latches into `Failed`.
    pub fn fail_image_generation(&mut self) {
        if self.image_control.is_some() {
            self.image_control = Some(ImageControl::Failed);
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Project the bubble onto its persisted form.
    pub fn to_stored(&self) -> StoredBubble {
        StoredBubble {
            timestamp: self.timestamp.clone(),
            transcription: self.content.clone(),
            image_path: self.image_path.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_bubble() -> VisibleBubble {
        VisibleBubble::render("1/1/24, 9:00 AM", "Hello", BubbleOptions::default())
    }

    fn secret_bubble() -> VisibleBubble {
        VisibleBubble::render(
            "1/1/24, 9:00 AM",
            "They are secretly the king",
            BubbleOptions {
                secret: true,
                ..Default::default()
            },
        )
    }

    // -- render --------------------------------------------------------------

    #[test]
    fn test_render_sets_timestamp_and_content() {
        let b = plain_bubble();
        assert_eq!(b.timestamp, "1/1/24, 9:00 AM");
        assert_eq!(b.content, "Hello");
        assert!(b.image_path.is_none());
        assert!(!b.secret);
    }

    #[test]
    fn test_render_plain_has_image_control_no_toggle() {
        let b = plain_bubble();
        assert_eq!(b.image_control, Some(ImageControl::Ready));
        assert!(b.reveal_label().is_none());
    }

    #[test]
    fn test_render_secret_has_toggle_no_image_control() {
        let b = secret_bubble();
        assert!(b.image_control.is_none());
        assert!(b.image_control_label().is_none());
        assert_eq!(b.reveal_label(), Some("Reveal Secret"));
    }

    #[test]
    fn test_render_starts_with_plain_style_even_with_image() {
        let b = VisibleBubble::render(
            "ts",
            "text",
            BubbleOptions {
                image_path: Some("static/images/a.png".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(b.content_style, ContentStyle::Plain);
    }

    #[test]
    fn test_render_assigns_unique_ids() {
        assert_ne!(plain_bubble().id, plain_bubble().id);
    }

    // -- labels --------------------------------------------------------------

    #[test]
    fn test_label_generate_image_without_image_or_mode() {
        assert_eq!(plain_bubble().image_control_label(), Some("Generate Image"));
    }

    #[test]
    fn test_label_regen_image_when_image_present() {
        let b = VisibleBubble::render(
            "ts",
            "text",
            BubbleOptions {
                image_path: Some("a.png".to_string()),
                image_gen_mode: Some(ImageGenMode::Portrait),
                ..Default::default()
            },
        );
        // Image presence wins over the mode label.
        assert_eq!(b.image_control_label(), Some("Regen Image"));
    }

    #[test]
    fn test_label_portrait_mode_without_image() {
        let b = VisibleBubble::render(
            "ts",
            "text",
            BubbleOptions {
                image_gen_mode: Some(ImageGenMode::Portrait),
                ..Default::default()
            },
        );
        assert_eq!(b.image_control_label(), Some("Portrait"));
    }

    #[test]
    fn test_label_map_mode_without_image() {
        let b = VisibleBubble::render(
            "ts",
            "text",
            BubbleOptions {
                image_gen_mode: Some(ImageGenMode::Map),
                ..Default::default()
            },
        );
        assert_eq!(b.image_control_label(), Some("Map"));
    }

    #[test]
    fn test_label_busy_and_failed() {
        let mut b = plain_bubble();
        b.begin_image_generation().expect("ready control");
        assert_eq!(b.image_control_label(), Some("Generating Image..."));
        b.fail_image_generation();
        assert_eq!(b.image_control_label(), Some("ERROR"));
    }

    // -- reveal toggle -------------------------------------------------------

    #[test]
    fn test_secret_content_hidden_until_revealed() {
        let mut b = secret_bubble();
        assert!(!b.content_visible());
        assert!(b.toggle_reveal().expect("secret bubble"));
        assert!(b.content_visible());
        assert_eq!(b.reveal_label(), Some("Hide Secret"));
    }

    #[test]
    fn test_double_toggle_restores_original_visibility() {
        let mut b = secret_bubble();
        b.toggle_reveal().expect("first toggle");
        b.toggle_reveal().expect("second toggle");
        assert!(!b.content_visible());
        assert_eq!(b.reveal_label(), Some("Reveal Secret"));
    }

    #[test]
    fn test_toggle_does_not_alter_stored_data() {
        let mut b = secret_bubble();
        let before = b.to_stored();
        b.toggle_reveal().expect("toggle");
        assert_eq!(b.to_stored(), before);
    }

    #[test]
    fn test_toggle_on_plain_bubble_is_rejected() {
        let mut b = plain_bubble();
        assert!(matches!(
            b.toggle_reveal(),
            Err(CompanionError::NoRevealToggle)
        ));
    }

    #[test]
    fn test_plain_content_always_visible() {
        assert!(plain_bubble().content_visible());
    }

    // -- image generation flow ----------------------------------------------

    #[test]
    fn test_successful_generation_attaches_image_and_caption() {
        let mut b = plain_bubble();
        b.begin_image_generation().expect("ready");
        b.complete_image_generation("static/images/xyz.png");
        assert_eq!(b.image_path.as_deref(), Some("static/images/xyz.png"));
        assert_eq!(b.content_style, ContentStyle::Caption);
        assert_eq!(b.image_control, Some(ImageControl::Ready));
        assert_eq!(b.image_control_label(), Some("Regen Image"));
    }

    #[test]
    fn test_regeneration_replaces_existing_image() {
        let mut b = plain_bubble();
        b.begin_image_generation().expect("ready");
        b.complete_image_generation("first.png");
        b.begin_image_generation().expect("ready again");
        b.complete_image_generation("second.png");
        assert_eq!(b.image_path.as_deref(), Some("second.png"));
    }

    #[test]
    fn test_begin_while_busy_is_rejected() {
        let mut b = plain_bubble();
        b.begin_image_generation().expect("ready");
        assert!(matches!(
            b.begin_image_generation(),
            Err(CompanionError::ImageBusy)
        ));
    }

    #[test]
    fn test_failed_generation_leaves_content_untouched() {
        let mut b = plain_bubble();
        b.begin_image_generation().expect("ready");
        b.fail_image_generation();
        assert!(b.image_path.is_none());
        assert_eq!(b.content, "Hello");
        assert_eq!(b.content_style, ContentStyle::Plain);
    }

    #[test]
    fn test_failed_control_stays_disabled() {
        let mut b = plain_bubble();
        b.begin_image_generation().expect("ready");
        b.fail_image_generation();
        assert!(matches!(
            b.begin_image_generation(),
            Err(CompanionError::ImageControlDisabled)
        ));
    }

    #[test]
    fn test_begin_on_secret_bubble_is_rejected() {
        let mut b = secret_bubble();
        assert!(matches!(
            b.begin_image_generation(),
            Err(CompanionError::NoImageControl)
        ));
    }

    // -- persistence ---------------------------------------------------------

    #[test]
    fn test_to_stored_maps_fields() {
        let b = plain_bubble();
        let stored = b.to_stored();
        assert_eq!(stored.timestamp, "1/1/24, 9:00 AM");
        assert_eq!(stored.transcription, "Hello");
        assert!(stored.image_path.is_none());
    }

    #[test]
    fn test_stored_bubble_serializes_null_image_path() {
        let stored = StoredBubble {
            timestamp: "1/1/24, 9:00 AM".to_string(),
            transcription: "Hello".to_string(),
            image_path: None,
        };
        let json = serde_json::to_string(&stored).expect("serialize");
        assert!(json.contains("\"imagePath\":null"), "json: {json}");
        assert!(json.contains("\"transcription\":\"Hello\""));
    }

    #[test]
    fn test_stored_bubble_deserializes_wire_names() {
        let json = r#"{"timestamp":"1/2/24, 3:00 PM","transcription":"A windy pass","imagePath":"static/images/pass.png"}"#;
        let stored: StoredBubble = serde_json::from_str(json).expect("deser");
        assert_eq!(stored.transcription, "A windy pass");
        assert_eq!(stored.image_path.as_deref(), Some("static/images/pass.png"));
    }

    // -- image gen mode ------------------------------------------------------

    #[test]
    fn test_image_gen_mode_wire_values() {
        assert_eq!(ImageGenMode::Portrait.wire_value(), "person");
        assert_eq!(ImageGenMode::Map.wire_value(), "place");
    }

    #[test]
    fn test_image_gen_mode_display_matches_wire() {
        assert_eq!(ImageGenMode::Portrait.to_string(), "person");
        assert_eq!(ImageGenMode::Map.to_string(), "place");
    }
}
