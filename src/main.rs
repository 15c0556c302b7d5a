use std::io::{self, Write};

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use talekeeper::board::Board;
use talekeeper::bubble::ContentStyle;
use talekeeper::cli::{board_index, Args};
use talekeeper::config::CompanionConfig;
use talekeeper::gateway::{AreaSize, Gateway, LocationRequest};
use talekeeper::Companion;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut config = CompanionConfig::load(&args.config)?;
    if let Some(url) = &args.backend_url {
        config.backend_url = url.clone();
    }

    let gateway = Gateway::new(config.gateway_config())?;

    // Key management is standalone: store the key and exit.
    if let Some(key) = &args.set_api_key {
        gateway.set_api_key(key).await?;
        println!("{}", "API key stored.".bright_green());
        return Ok(());
    }

    match gateway.confirm_api_key().await {
        Ok(true) => {}
        Ok(false) => eprintln!(
            "{}",
            "Backend has no usable API key; recording and generation will fail."
                .bright_red()
        ),
        Err(e) => eprintln!("{} {}", "API key check failed:".bright_red(), e),
    }

    let mut companion = Companion::new(gateway, config.export_folder.clone());

    // Startup: settle the session question before any board action.
    if let Some(stored) = companion.check_session().await? {
        let resume = if args.resume {
            true
        } else if args.fresh {
            false
        } else {
            prompt_session_choice(stored.len())?
        };
        if resume {
            let replayed = companion.resume(stored)?;
            println!(
                "{} {} entries.",
                "Resumed previous session:".bright_yellow(),
                replayed
            );
        } else {
            companion.start_fresh().await?;
            println!(
                "{}",
                "Previous session archived; starting fresh.".bright_yellow()
            );
        }
    }

    if let Some(path) = &args.upload_map {
        let stored = companion.upload_map(path).await?;
        println!("{} {}", "Map uploaded:".bright_green(), stored);
    }

    if let Some(note) = &args.note {
        companion.add_note(note)?;
    }

    if let Some(path) = &args.transcribe {
        let wav = talekeeper::audio::read_wav(path)?;
        companion.record_from_wav(wav).await?;
    }

    if args.character {
        companion.create_character().await?;
    }

    if let Some(name) = &args.place {
        let description = args
            .place_description
            .clone()
            .ok_or("--place requires --place-description")?;
        let area = AreaSize::from_str_loose(&args.area)
            .map_err(|e| format!("Invalid area: {}", e))?;
        companion
            .create_location(LocationRequest {
                place_name: name.clone(),
                short_description: description,
                area_size: area,
            })
            .await?;
    }

    if args.oracle {
        let answer = companion.consult_oracle().await?;
        println!("{} {}", "The Oracle Speaks:".bright_magenta(), answer);
    }

    if let Some(position) = args.image {
        let index = board_index(position).ok_or("bubble positions start at 1")?;
        // Surfaced but not fatal: the board still prints with the control
        // in its error state.
        if let Err(e) = companion.generate_image_for(index).await {
            eprintln!("{} {}", "Image generation failed:".bright_red(), e);
        }
    }

    if let Some(position) = args.delete {
        let index = board_index(position).ok_or("bubble positions start at 1")?;
        companion.delete_bubble(index)?;
    }

    if let Some(position) = args.reveal {
        let index = board_index(position).ok_or("bubble positions start at 1")?;
        companion.toggle_reveal(index)?;
    }

    if let Some(out) = &args.export {
        let summary = companion.export_archive(out).await?;
        println!(
            "{} {} ({} images, {} bubbles)",
            "Exported".bright_green(),
            summary.path.display(),
            summary.images,
            summary.bubbles
        );
    }

    if args.show || args.has_action() {
        print_board(companion.board());
    }

    companion.shutdown().await;
    Ok(())
}

/// Map a typed answer to the resume/fresh choice. Empty defaults to resume.
fn parse_session_choice(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer.is_empty() || answer == "y" || answer == "yes"
}

fn prompt_session_choice(entries: usize) -> Result<bool, Box<dyn std::error::Error>> {
    println!(
        "A previous session with {} entries was found.",
        entries.to_string().bright_yellow()
    );
    print!("Continue it? [Y/n] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(parse_session_choice(&line))
}

fn print_board(board: &Board) {
    if board.is_empty() {
        println!("{}", "The story board is empty.".dimmed());
        return;
    }
    println!("{}", "STORY BOARD".bright_cyan().bold());
    println!("{}", "=".repeat(50).bright_blue());
    for (i, bubble) in board.iter().enumerate() {
        println!("{:>3}. {}", i + 1, bubble.timestamp.bright_yellow());
        if bubble.content_visible() {
            if let Some(path) = &bubble.image_path {
                println!("     {} {}", "[image]".bright_magenta(), path.dimmed());
            }
            match bubble.content_style {
                ContentStyle::Caption => println!("     {}", bubble.content.italic()),
                ContentStyle::Plain => println!("     {}", bubble.content),
            }
        } else {
            println!("     {}", "[secret, hidden]".dimmed());
        }
        let mut controls = vec!["Delete".to_string()];
        if let Some(label) = bubble.reveal_label() {
            controls.push(label.to_string());
        }
        if let Some(label) = bubble.image_control_label() {
            controls.push(label.to_string());
        }
        let line = controls
            .iter()
            .map(|c| format!("[{c}]"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("     {}", line.dimmed());
    }
    println!("{}", "=".repeat(50).bright_blue());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
