use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "talekeeper")]
#[command(version = "0.3.1")]
#[command(about = "A session companion for tabletop RPG campaigns")]
pub struct Args {
    /// Free-typed note to pin to the story board
    pub note: Option<String>,

    /// Config file path
    #[arg(long, default_value = "talekeeper.toml")]
    pub config: PathBuf,

    /// Backend base URL (overrides the config file and environment)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Resume the previous session without prompting
    #[arg(long, conflicts_with = "fresh")]
    pub resume: bool,

    /// Archive any previous session and start fresh without prompting
    #[arg(long)]
    pub fresh: bool,

    /// Transcribe a recorded WAV file into a story bubble
    #[arg(long)]
    pub transcribe: Option<PathBuf>,

    /// Generate an NPC: a public description plus a hidden personality
    #[arg(long)]
    pub character: bool,

    /// Generate a location with this name (requires --place-description)
    #[arg(long)]
    pub place: Option<String>,

    /// Short description seed for --place
    #[arg(long)]
    pub place_description: Option<String>,

    /// Area size for --place: small or large
    #[arg(long, default_value = "small")]
    pub area: String,

    /// Consult the oracle
    #[arg(long)]
    pub oracle: bool,

    /// Generate (or regenerate) the image for bubble N, newest first, 1-based
    #[arg(long)]
    pub image: Option<usize>,

    /// Delete bubble N
    #[arg(long)]
    pub delete: Option<usize>,

    /// Toggle the secret reveal on bubble N
    #[arg(long)]
    pub reveal: Option<usize>,

    /// Upload a map image to the backend
    #[arg(long)]
    pub upload_map: Option<PathBuf>,

    /// Export the story board (images + HTML snapshot) as a zip archive
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Store a backend API key and exit
    #[arg(long)]
    pub set_api_key: Option<String>,

    /// Print the story board even when no other action is requested
    #[arg(long)]
    pub show: bool,
}

impl Args {
    /// Whether any board-touching action was requested.
    pub fn has_action(&self) -> bool {
        self.note.is_some()
            || self.transcribe.is_some()
            || self.character
            || self.place.is_some()
            || self.oracle
            || self.image.is_some()
            || self.delete.is_some()
            || self.reveal.is_some()
            || self.upload_map.is_some()
            || self.export.is_some()
    }
}

/// Convert a 1-based display position (newest first) into a board index.
pub fn board_index(position: usize) -> Option<usize> {
    position.checked_sub(1)
}
