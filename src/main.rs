//! Reelforge - media conversion client
//!
//! Command line front end for a remote media conversion service: audio
//! extraction from local or remote videos, and short videos composed from
//! images and music.

use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use walkdir::WalkDir;

use reelforge::artifact::{ArtifactId, ArtifactKind, ArtifactReference, LocalFile};
use reelforge::batch::{PreviewRegistry, UploadBatch};
use reelforge::cache::UploadCache;
use reelforge::cli::{Args, CacheAction, Commands};
use reelforge::config::Config;
use reelforge::console::{is_console_event, ConsoleNotifier, JobProgress};
use reelforge::error::ReelforgeError;
use reelforge::materialize::{self, ResultMaterializer};
use reelforge::transfer::{
    AspectRatio, ComposeOptions, HttpTransferClient, OverlayStyle, RemoteSource, TextOverlay,
    TextPosition, TransferClient,
};
use reelforge::validate::describe_instagram_url;
use reelforge::workflow::{plan, JobOrchestrator, JobOutcome, StepSpec};

const DEFAULT_CONFIG_FILE: &str = "reelforge.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env_overrides();
    info!("Using conversion service at {}", config.service.base_url);

    let console = ConsoleNotifier::new(MultiProgress::new());
    let notifier = Arc::new(console.clone());

    match args.command {
        Commands::Extract { input, output_dir, format } => {
            info!("Extracting audio from: {}", input.display());

            let file = LocalFile::open(&input).await?;
            let orchestrator = build_orchestrator(&config, build_client(&config)?, notifier)?;
            let outcome = run_job(&orchestrator, &console, plan::extract_from_file(file.clone())).await?;

            let audio = final_artifact(&outcome)?;
            let format = format.unwrap_or_else(|| config.output.audio_format.clone());
            let name = materialize::audio_name_for_local(&file.name, &format);
            save_result(&config, audio, &name, output_dir.as_deref()).await?;
        }
        Commands::Youtube { url, output_dir } => {
            info!("Fetching YouTube video: {}", url);

            let orchestrator = build_orchestrator(&config, build_client(&config)?, notifier)?;
            let outcome = run_job(
                &orchestrator,
                &console,
                plan::remote_to_audio(url.as_str(), RemoteSource::YouTube),
            )
            .await?;

            if let Some(video) = outcome.artifact(ArtifactKind::Video) {
                let name = materialize::youtube_video_name(video.path.as_deref(), &video.id);
                save_result(&config, video, &name, output_dir.as_deref()).await?;
            }
            let audio = final_artifact(&outcome)?;
            let name = materialize::extracted_audio_name(audio.path.as_deref(), &audio.id);
            save_result(&config, audio, &name, output_dir.as_deref()).await?;
        }
        Commands::Instagram { url, output_dir } => {
            let kind = describe_instagram_url(&url)?;
            info!("Fetching Instagram {}: {}", kind, url);

            let orchestrator = build_orchestrator(&config, build_client(&config)?, notifier)?;
            let outcome = run_job(
                &orchestrator,
                &console,
                plan::remote_to_audio(url.as_str(), RemoteSource::Instagram),
            )
            .await?;

            let video_path = outcome
                .artifact(ArtifactKind::Video)
                .and_then(|video| video.path.clone());
            let audio = final_artifact(&outcome)?;
            let name = materialize::instagram_audio_name(video_path.as_deref(), &config.output.audio_format);
            save_result(&config, audio, &name, output_dir.as_deref()).await?;
        }
        Commands::Shorts {
            images,
            images_dir,
            audio,
            text,
            text_per_image,
            style,
            position,
            aspect,
            duration,
            transition,
            fps,
            animations,
            music_start,
            music_duration,
            output_name,
            output_dir,
        } => {
            let mut image_paths = images;
            if let Some(dir) = &images_dir {
                image_paths.extend(collect_images(dir));
            }
            if image_paths.is_empty() {
                return Err(ReelforgeError::Validation("Select at least one image.".to_string()).into());
            }
            info!("Composing a short from {} images", image_paths.len());

            // Options are checked before anything is uploaded
            let mut options = ComposeOptions::from_config(&config.compose);
            if let Some(value) = aspect {
                options.aspect_ratio = parse_aspect_ratio(&value)?;
            }
            if let Some(value) = duration {
                options.display_duration_secs = value;
            }
            if let Some(value) = transition {
                options.transition_duration_secs = value;
            }
            if let Some(value) = fps {
                options.frame_rate = value;
            }
            if let Some(value) = animations {
                options.animations_enabled = value;
            }
            options.audio_start_secs = music_start;
            options.audio_duration_secs = music_duration;
            options.output_filename = output_name;

            let style = match style {
                Some(value) => parse_overlay_style(&value)?,
                None => config.compose.text_style,
            };
            let position = match position {
                Some(value) => parse_text_position(&value)?,
                None => config.compose.text_position,
            };
            options.text_overlays = TextOverlay::from_texts(text, style, position, text_per_image);
            options.validate()?;

            let mut files = Vec::with_capacity(image_paths.len());
            for path in &image_paths {
                files.push(LocalFile::open(path).await?);
            }
            let audio_file = LocalFile::open(&audio).await?;

            let client = build_client(&config)?;
            let batch = UploadBatch::new(
                client.clone(),
                config.limits.clone(),
                notifier.clone(),
                PreviewRegistry::new(),
            );
            let added = batch.add_files(files)?;
            batch.wait_idle().await;

            let image_ids = batch.uploaded_ids();
            if image_ids.is_empty() || image_ids.len() != added.accepted.len() || !added.rejected.is_empty() {
                return Err(ReelforgeError::Validation(format!(
                    "{} of {} images uploaded; fix the rejected or failed images and try again.",
                    image_ids.len(),
                    image_paths.len()
                ))
                .into());
            }

            let orchestrator = build_orchestrator(&config, client, notifier)?;
            let uploaded = run_job(&orchestrator, &console, plan::upload_only(audio_file, ArtifactKind::Audio)).await?;
            let audio_id = final_artifact(&uploaded)?.id.clone();

            let outcome = run_job(
                &orchestrator,
                &console,
                plan::compose_short(image_ids, audio_id, options),
            )
            .await?;

            let video = final_artifact(&outcome)?;
            let name = materialize::short_video_name(video.path.as_deref(), &video.id);
            save_result(&config, video, &name, output_dir.as_deref()).await?;
        }
        Commands::Download { id, name, output_dir } => {
            let id = ArtifactId::new(id);
            let name = name.unwrap_or_else(|| materialize::default_name(&id));
            let dest = output_dir.unwrap_or_else(|| config.output.dir.clone());

            let materializer = ResultMaterializer::new(&config.service)?;
            let saved = materializer.save(&id, &name, &dest).await?;
            println!("Saved {}", saved.display());
        }
        Commands::Url { id } => {
            let materializer = ResultMaterializer::new(&config.service)?;
            println!("{}", materializer.download_url(&ArtifactId::new(id)));
        }
        Commands::Cache { action } => {
            let cache = UploadCache::open(&config.cache.dir)?;

            match action {
                CacheAction::List => {
                    let entries = cache.list();
                    if entries.is_empty() {
                        println!("No cached uploads found.");
                    } else {
                        println!("\nCached Uploads:");
                        println!("{:<15} {:<12} {:<38} {:<40}", "Cached", "Size (MB)", "Artifact", "File");
                        println!("{}", "-".repeat(105));

                        let now = chrono::Utc::now().timestamp().max(0) as u64;
                        for entry in entries {
                            println!(
                                "{:<15} {:<12.1} {:<38} {:<40}",
                                format_duration(now.saturating_sub(entry.cached_at)),
                                entry.size as f64 / 1024.0 / 1024.0,
                                entry.artifact.id,
                                entry.file_name
                            );
                        }
                    }
                }
                CacheAction::Clear => {
                    let count = cache.clear()?;
                    println!("Cleared {} cached uploads", count);
                }
            }
        }
        Commands::InitConfig { output } => {
            if output.exists() {
                warn!("Overwriting existing configuration at {}", output.display());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn build_client(config: &Config) -> Result<Arc<dyn TransferClient>> {
    Ok(Arc::new(HttpTransferClient::new(&config.service)?))
}

fn build_orchestrator(
    config: &Config,
    client: Arc<dyn TransferClient>,
    notifier: Arc<ConsoleNotifier>,
) -> Result<JobOrchestrator> {
    let mut orchestrator = JobOrchestrator::new(client, notifier).with_limits(config.limits.clone());
    if config.cache.enabled {
        orchestrator = orchestrator.with_upload_cache(Arc::new(UploadCache::open(&config.cache.dir)?));
    }
    Ok(orchestrator)
}

/// Run one job with a progress bar attached.
async fn run_job(
    orchestrator: &JobOrchestrator,
    console: &ConsoleNotifier,
    steps: Vec<StepSpec>,
) -> reelforge::Result<JobOutcome> {
    let progress = JobProgress::attach(console.multi(), orchestrator.subscribe());
    let result = orchestrator.start(steps).await;
    match &result {
        Err(e) if e.is_validation() => progress.clear(),
        _ => progress.finish(&orchestrator.snapshot()),
    }
    result
}

fn final_artifact(outcome: &JobOutcome) -> reelforge::Result<&ArtifactReference> {
    outcome
        .result()
        .ok_or_else(|| ReelforgeError::Transfer {
            status: None,
            message: "The job finished without a result.".to_string(),
        })
}

async fn save_result(
    config: &Config,
    artifact: &ArtifactReference,
    name: &str,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let dest = output_dir.unwrap_or(config.output.dir.as_path());
    let materializer = ResultMaterializer::new(&config.service)?;
    let saved = materializer.save(&artifact.id, name, dest).await?;
    println!("Saved {} {}", artifact.kind, saved.display());
    Ok(saved)
}

/// Image files under `dir`, sorted by path.
fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| ArtifactKind::from_extension(entry.path()) == Some(ArtifactKind::Image))
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".reelforge").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "reelforge.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Notifications are printed by ConsoleNotifier; keep them out of the console log
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(is_console_event));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("reelforge.log").display());

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

fn parse_aspect_ratio(value: &str) -> Result<AspectRatio> {
    AspectRatio::parse(value).ok_or_else(|| {
        ReelforgeError::Validation(format!(
            "Invalid aspect ratio '{}'. Valid values: 16:9, 9:16, 1:1",
            value
        ))
        .into()
    })
}

fn parse_overlay_style(value: &str) -> Result<OverlayStyle> {
    OverlayStyle::parse(value).ok_or_else(|| {
        ReelforgeError::Validation(format!(
            "Invalid text style '{}'. Valid styles: Minimal, Meme Style, Dynamic, Retro",
            value
        ))
        .into()
    })
}

fn parse_text_position(value: &str) -> Result<TextPosition> {
    TextPosition::parse(value).ok_or_else(|| {
        ReelforgeError::Validation(format!(
            "Invalid text position '{}'. Valid positions: top, center, bottom",
            value
        ))
        .into()
    })
}
