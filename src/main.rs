// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "kokoro-camera")]
#[command(about = "Heart-rate and aperture driven photo booth")]
#[command(version = kokoro_camera::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Configuration file (default: ~/.config/kokoro-camera/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive booth in the terminal (default)
    Booth {
        /// Rear camera: an image, a directory of images, or synthetic[:BPM]
        #[arg(short, long, default_value = "synthetic")]
        source: String,

        /// Front camera source (default: same as the rear camera)
        #[arg(long)]
        front_source: Option<String>,
    },

    /// Print the exposure recipe for an aperture and heart rate
    Recipe {
        /// Aperture value (1-32)
        #[arg(short, long, default_value = "32")]
        aperture: u8,

        /// Heart rate in beats per minute
        #[arg(short, long, default_value = "60")]
        bpm: u32,
    },

    /// Measure a heart rate from a frame source
    Measure {
        /// An image, a directory of images, or synthetic[:BPM]
        #[arg(short, long, default_value = "synthetic")]
        source: String,

        /// Measurement window in seconds (default: from config)
        #[arg(long)]
        secs: Option<u64>,
    },

    /// Take one photo and export it
    Capture {
        /// An image, a directory of images, or synthetic[:BPM]
        #[arg(short, long, default_value = "synthetic")]
        source: String,

        /// Aperture value (1-32)
        #[arg(short, long, default_value = "32")]
        aperture: u8,

        /// Heart rate; measured from the source when omitted
        #[arg(short, long)]
        bpm: Option<u32>,

        /// Treat the source as the front camera
        #[arg(long)]
        front: bool,

        /// Write to the downloads directory instead of opening the photo
        #[arg(long)]
        no_share: bool,

        /// Participant label used in the filename
        #[arg(long)]
        who: Option<String>,

        /// Room label used in the filename
        #[arg(long)]
        room: Option<String>,
    },

    /// Manage stored photos
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
}

#[derive(Subcommand)]
enum GalleryAction {
    /// List stored photos, newest first
    List,

    /// Write a stored photo into the downloads directory
    Export {
        /// Photo id (from 'gallery list')
        id: String,

        /// Output directory (default: downloads directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Open a stored photo with the system viewer (downloads it if that fails)
    Share {
        /// Photo id (from 'gallery list')
        id: String,
    },

    /// Delete a stored photo
    Delete {
        /// Photo id (from 'gallery list')
        id: String,
    },

    /// Delete every stored photo
    Clear,

    /// Show how much space stored photos use
    Usage,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The booth owns the terminal, so it only logs when asked to
    let booth = matches!(cli.command, None | Some(Commands::Booth { .. }));
    if !booth || std::env::var_os("RUST_LOG").is_some() {
        // Initialize logging
        // Set RUST_LOG environment variable to control log level
        // Examples: RUST_LOG=debug, RUST_LOG=kokoro_camera=debug, RUST_LOG=info
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .init();
    }

    let config = cli::load_config(cli.config.as_deref());

    match cli.command {
        Some(Commands::Booth {
            source,
            front_source,
        }) => cli::run_booth(&config, &source, front_source.as_deref()),
        Some(Commands::Recipe { aperture, bpm }) => cli::print_recipe(&config, aperture, bpm),
        Some(Commands::Measure { source, secs }) => cli::measure(&config, &source, secs),
        Some(Commands::Capture {
            source,
            aperture,
            bpm,
            front,
            no_share,
            who,
            room,
        }) => cli::capture(
            &config,
            cli::CaptureOptions {
                source,
                aperture,
                bpm,
                front,
                share: !no_share,
                who,
                room,
            },
        ),
        Some(Commands::Gallery { action }) => match action {
            GalleryAction::List => cli::gallery_list(&config),
            GalleryAction::Export { id, output } => cli::gallery_export(&config, &id, output),
            GalleryAction::Share { id } => cli::gallery_share(&config, &id),
            GalleryAction::Delete { id } => cli::gallery_delete(&config, &id),
            GalleryAction::Clear => cli::gallery_clear(&config),
            GalleryAction::Usage => cli::gallery_usage(&config),
        },
        None => cli::run_booth(&config, "synthetic", None),
    }
}
