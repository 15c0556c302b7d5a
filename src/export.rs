//! Story-board export: one zip holding every displayed image plus an HTML
//! snapshot of the visible content. Built client-side; the only backend
//! traffic is fetching image bytes.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::board::Board;
use crate::bubble::ContentStyle;
use crate::error::CompanionError;
use crate::gateway::Gateway;

/// What an export produced.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bubbles: usize,
    pub images: usize,
    pub path: PathBuf,
}

/// Archive-relative name of the nth exported image. The HTML snapshot and
/// the zip entries use the same numbering, assigned top of board down.
pub fn image_file_name(index: usize) -> String {
    format!("image{index}.png")
}

/// Minimal HTML escaping for text nodes and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the board as a standalone HTML fragment. Image sources point at
/// the archive-relative `./imageN.png` names; unrevealed secrets keep their
/// suppressed styling, matching what is actually on screen.
pub fn board_html(board: &Board) -> String {
    let mut html = String::from("<div class=\"story-board\">\n");
    let mut image_index = 0usize;
    for bubble in board.iter() {
        html.push_str(&format!(
            "<div class=\"message-bubble\" id=\"{}\">\n",
            bubble.id
        ));
        let hidden = if bubble.content_visible() {
            ""
        } else {
            " style=\"display:none\""
        };
        html.push_str(&format!(
            "<span class=\"timestamp\"{hidden}>{}</span>\n",
            html_escape(&bubble.timestamp)
        ));
        if bubble.image_path.is_some() {
            html.push_str(&format!(
                "<img class=\"generated-image\" src=\"./{}\" alt=\"Generated Image\"{hidden}>\n",
                image_file_name(image_index)
            ));
            image_index += 1;
        }
        let mut styles: Vec<&str> = Vec::new();
        if !bubble.content_visible() {
            styles.push("display:none");
        }
        if bubble.content_style == ContentStyle::Caption {
            styles.push("font-style:italic");
        }
        let text_style = if styles.is_empty() {
            String::new()
        } else {
            format!(" style=\"{}\"", styles.join(";"))
        };
        html.push_str(&format!(
            "<p class=\"transcription-text\"{text_style}>{}</p>\n",
            html_escape(&bubble.content)
        ));
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");
    html
}

/// Write the archive to `out_path`.
///
/// Images are fetched through the gateway one by one; any fetch failure
/// aborts the export with the underlying error.
pub async fn export_board(
    gateway: &Gateway,
    board: &Board,
    folder: &str,
    out_path: &Path,
) -> Result<ExportSummary, CompanionError> {
    let file = File::create(out_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut images = 0usize;
    for bubble in board.iter() {
        if let Some(image_path) = &bubble.image_path {
            let bytes = gateway.fetch_image(image_path).await?;
            zip.start_file(format!("{folder}/{}", image_file_name(images)), options)?;
            zip.write_all(&bytes)?;
            images += 1;
        }
    }

    zip.start_file(format!("{folder}/story-board.html"), options)?;
    zip.write_all(board_html(board).as_bytes())?;
    zip.finish()?;

    Ok(ExportSummary {
        bubbles: board.len(),
        images,
        path: out_path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
