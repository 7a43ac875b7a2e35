mod camera;
mod config;
mod core;
mod timelapse;

use std::{path::Path, time::Duration};

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use camera::{
    archive::ArchiveWriter,
    http_source::HttpSource,
    scheduler::{self, SchedulerOptions},
};
use config::{AppConfig, CameraRegistry};
use crate::core::errors::ConfigError;
use timelapse::{AssemblyRequest, CaptureRange, Quality};

#[derive(Parser)]
#[command(
    name = "trafficlapse",
    version,
    about = "Download traffic camera images and build timelapse videos"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Poll the configured cameras and archive their snapshots until Ctrl+C.
    Capture {
        /// Camera to poll; repeatable. Defaults to every configured camera.
        #[arg(short = 'c', long = "camera", value_name = "SLUG")]
        cameras: Vec<String>,
        /// Download interval in seconds.
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Assemble archived snapshots into a timelapse video.
    Timelapse {
        #[arg(short = 'c', long = "camera", value_name = "SLUG")]
        camera: String,
        /// Video framerate in frames per second.
        #[arg(short, long, default_value_t = 30)]
        framerate: u32,
        #[arg(short, long, value_enum, default_value_t = Quality::High)]
        quality: Quality,
        /// Earliest capture date to include.
        #[arg(long, value_name = "YYYY-MM-DD")]
        start_date: Option<String>,
        /// Latest capture date to include.
        #[arg(long, value_name = "YYYY-MM-DD")]
        end_date: Option<String>,
    },
    /// List the configured cameras and their archived frame counts.
    ListCameras,
    /// List archived frames for one camera.
    ListImages {
        #[arg(short = 'c', long = "camera", value_name = "SLUG")]
        camera: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    // Long-running captures also log to a daily file; one-shot commands go
    // to stderr only.
    let _log_guard = match &cli.command {
        CliCommand::Capture { .. } => init_tracing(Some(&config.log_dir))?,
        _ => init_tracing(None)?,
    };

    let registry = CameraRegistry::load(&config.cameras_file)?;

    match cli.command {
        CliCommand::Capture { cameras, interval } => {
            capture(&config, &registry, cameras, interval).await
        }
        CliCommand::Timelapse {
            camera,
            framerate,
            quality,
            start_date,
            end_date,
        } => {
            let range = CaptureRange {
                start: start_date.as_deref().map(parse_start_date).transpose()?,
                end: end_date.as_deref().map(parse_end_date).transpose()?,
            };
            run_timelapse(&config, &registry, camera, framerate, quality, range).await
        }
        CliCommand::ListCameras => list_cameras(&config, &registry).await,
        CliCommand::ListImages { camera } => list_images(&config, &registry, &camera).await,
    }
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).context("failed to create log directory")?;
            let file_appender = rolling::daily(dir, "trafficlapse.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

async fn capture(
    config: &AppConfig,
    registry: &CameraRegistry,
    slugs: Vec<String>,
    interval: Option<u64>,
) -> anyhow::Result<()> {
    let cameras = if slugs.is_empty() {
        registry.all()
    } else {
        registry.select(&slugs)?
    };
    if cameras.is_empty() {
        bail!("no cameras configured");
    }

    let interval = Duration::from_secs(interval.unwrap_or(config.default_interval_secs));
    for camera in &cameras {
        info!(slug = %camera.slug, name = %camera.name, url = %camera.url, "camera selected");
    }

    let source = HttpSource::new()?;
    let archive = ArchiveWriter::new(config.images_dir.clone());
    let options = SchedulerOptions {
        poll_interval: interval,
        supervise_interval: Duration::from_secs(config.supervise_interval_secs),
        shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
    };
    let handle = scheduler::start(cameras, source, archive, options);

    info!(
        interval_secs = interval.as_secs(),
        "capture running, press Ctrl+C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!(
        downloads_so_far = handle.total_downloads(),
        "shutdown signal received"
    );

    let statuses = handle.stop().await;
    let total: u64 = statuses.iter().map(|status| status.downloads).sum();
    for status in &statuses {
        info!(
            slug = %status.slug,
            downloads = status.downloads,
            state = ?status.state,
            "final camera status"
        );
    }
    info!(total_downloads = total, "capture finished");
    Ok(())
}

async fn run_timelapse(
    config: &AppConfig,
    registry: &CameraRegistry,
    slug: String,
    framerate: u32,
    quality: Quality,
    range: CaptureRange,
) -> anyhow::Result<()> {
    let camera = registry
        .get(&slug)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownCamera(slug.clone()))?;

    let request = AssemblyRequest {
        slug,
        framerate,
        quality,
        range,
    };
    let report = timelapse::assemble(&config.images_dir, &config.timelapses_dir, &request).await?;

    println!(
        "Timelapse for {} created: {} ({} frames, {:.1} MB)",
        camera.name,
        report.output_path.display(),
        report.frame_count,
        report.size_bytes as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

async fn list_cameras(config: &AppConfig, registry: &CameraRegistry) -> anyhow::Result<()> {
    println!("Available cameras:");
    for camera in registry.all() {
        let frames = timelapse::collect_frames(
            &config.images_dir,
            &camera.slug,
            &CaptureRange::default(),
        )
        .await?;
        println!(
            "  {:15} - {} ({} images)",
            camera.slug,
            camera.name,
            frames.len()
        );
    }
    Ok(())
}

async fn list_images(
    config: &AppConfig,
    registry: &CameraRegistry,
    slug: &str,
) -> anyhow::Result<()> {
    let camera = registry
        .get(slug)
        .ok_or_else(|| ConfigError::UnknownCamera(slug.to_owned()))?;

    let frames =
        timelapse::collect_frames(&config.images_dir, &camera.slug, &CaptureRange::default())
            .await?;
    if frames.is_empty() {
        println!("No images found for camera `{}` ({})", camera.slug, camera.name);
        return Ok(());
    }

    println!("Images for {} ({} total):", camera.name, frames.len());
    for frame in frames {
        println!(
            "  {:50} {} ({:6.1} KB)",
            frame.file_name,
            frame.captured_at.format("%Y-%m-%d %H:%M:%S"),
            frame.size_bytes as f64 / 1024.0
        );
    }
    Ok(())
}

fn parse_start_date(raw: &str) -> anyhow::Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid start date `{raw}`, expected YYYY-MM-DD"))?;
    Ok(date.and_time(NaiveTime::MIN))
}

fn parse_end_date(raw: &str) -> anyhow::Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid end date `{raw}`, expected YYYY-MM-DD"))?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).context("end-of-day time")?;
    Ok(date.and_time(end_of_day))
}

#[cfg(test)]
mod tests {
    use super::{parse_end_date, parse_start_date};

    #[test]
    fn start_date_parses_to_midnight() {
        let parsed = parse_start_date("2025-01-02").expect("date should parse");
        assert_eq!(parsed.format("%Y%m%d_%H%M%S").to_string(), "20250102_000000");
    }

    #[test]
    fn end_date_parses_to_end_of_day() {
        let parsed = parse_end_date("2025-01-02").expect("date should parse");
        assert_eq!(parsed.format("%Y%m%d_%H%M%S").to_string(), "20250102_235959");
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(parse_start_date("02-01-2025").is_err());
        assert!(parse_end_date("2025/01/02").is_err());
    }
}
