use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a video and extract its audio track
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the audio is saved into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Audio format used in the saved filename
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Download a YouTube video and extract its audio
    Youtube {
        /// Watch or shorts URL
        url: String,

        /// Directory results are saved into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Download an Instagram video and extract its audio
    Instagram {
        /// Post, reel, IGTV or story URL
        url: String,

        /// Directory results are saved into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Compose a short video from images and background music
    Shorts {
        /// Image files, in display order
        #[arg(short, long, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Directory of images, added after --images in name order
        #[arg(long)]
        images_dir: Option<PathBuf>,

        /// Background audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Overlay text shown over the whole video
        #[arg(short, long)]
        text: Vec<String>,

        /// Pin the nth --text value to the nth image instead
        #[arg(long)]
        text_per_image: bool,

        /// Overlay style (Minimal, Meme Style, Dynamic, Retro)
        #[arg(long)]
        style: Option<String>,

        /// Overlay position (top, center, bottom)
        #[arg(long)]
        position: Option<String>,

        /// Aspect ratio (16:9, 9:16, 1:1)
        #[arg(long)]
        aspect: Option<String>,

        /// Seconds each image is shown
        #[arg(short, long)]
        duration: Option<f32>,

        /// Seconds of transition between images
        #[arg(long)]
        transition: Option<f32>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Enable pan and zoom on images
        #[arg(long)]
        animations: Option<bool>,

        /// Start offset into the music, in seconds
        #[arg(long)]
        music_start: Option<f32>,

        /// Length of music to use, in seconds
        #[arg(long)]
        music_duration: Option<f32>,

        /// Name the service gives the composed video
        #[arg(long)]
        output_name: Option<String>,

        /// Directory the short is saved into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Save a result held by the service
    Download {
        /// Artifact id
        id: String,

        /// Filename to save under
        #[arg(short, long)]
        name: Option<String>,

        /// Directory the file is saved into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the retrieval URL of a result
    Url {
        /// Artifact id
        id: String,
    },

    /// Manage the upload cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Where to write it
        #[arg(short, long, default_value = "reelforge.toml")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List remembered uploads
    List,

    /// Forget every remembered upload
    Clear,
}
