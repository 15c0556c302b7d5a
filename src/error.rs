use thiserror::Error;

/// Crate-level error type.
///
/// Every fallible path in the library funnels into one of these variants so
/// call sites report failures through a single channel instead of ad-hoc
/// per-handler logging.
#[derive(Debug, Error)]
pub enum CompanionError {
    /// The backend replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A TCP-level connection could not be established.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// Response body could not be parsed as the expected structure.
    #[error("unexpected response from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },

    /// The backend replied `success: false`.
    #[error("backend rejected the request to {endpoint}")]
    Backend { endpoint: String },

    /// Required input was absent or empty.
    #[error("no {what} provided")]
    MissingInput { what: &'static str },

    /// A bubble index did not resolve to a bubble on the board.
    #[error("no bubble at position {index}")]
    UnknownBubble { index: usize },

    /// The bubble is secret and carries no image control.
    #[error("bubble has no image control")]
    NoImageControl,

    /// The bubble is not secret and carries no reveal toggle.
    #[error("bubble has no reveal toggle")]
    NoRevealToggle,

    /// An image generation is already in flight for this bubble.
    #[error("image generation already in progress")]
    ImageBusy,

    /// A previous image generation failed; the control stays disabled.
    #[error("image control is disabled after a failed generation")]
    ImageControlDisabled,

    /// A session operation was attempted in the wrong startup phase.
    #[error("cannot {event} while {phase}")]
    Phase { phase: &'static str, event: &'static str },

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("archive write error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
