use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use clap::ValueEnum;
use tokio::{fs, process::Command};
use tracing::info;

use crate::{camera::archive, core::errors::TimelapseError};

/// Optional capture-time window for frame selection. Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl CaptureRange {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        if let Some(start) = self.start {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at > end {
                return false;
            }
        }
        true
    }

    fn suffix(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                format!("_{}_to_{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
            }
            (Some(start), None) => format!("_from_{}", start.format("%Y%m%d")),
            (None, Some(end)) => format!("_until_{}", end.format("%Y%m%d")),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Quality {
    Low,
    Medium,
    High,
    Highest,
}

impl Quality {
    fn crf(self) -> &'static str {
        match self {
            Quality::Low => "28",
            Quality::Medium => "23",
            Quality::High => "18",
            Quality::Highest => "15",
        }
    }
}

/// One archived snapshot selected for assembly.
#[derive(Debug, Clone)]
pub struct Frame {
    pub path: PathBuf,
    pub file_name: String,
    pub captured_at: NaiveDateTime,
    pub size_bytes: u64,
}

/// Enumerate archived snapshots for one camera, filtered by capture time and
/// sorted by filename. Filename order equals chronological order by the
/// archive naming contract. Files that do not match the snapshot naming
/// scheme are skipped.
pub async fn collect_frames(
    images_dir: &Path,
    slug: &str,
    range: &CaptureRange,
) -> Result<Vec<Frame>, TimelapseError> {
    let mut frames = Vec::new();
    let mut entries = match fs::read_dir(images_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(frames),
        Err(err) => return Err(err.into()),
    };

    let prefix = format!("{slug}_");
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.starts_with(&prefix) {
            continue;
        }
        let Some((parsed_slug, captured_at)) = archive::parse_snapshot_filename(&file_name)
        else {
            continue;
        };
        // The prefix check alone would also match cameras whose slug merely
        // starts with this slug.
        if parsed_slug != slug || !range.contains(captured_at) {
            continue;
        }
        let size_bytes = entry.metadata().await?.len();
        frames.push(Frame {
            path: entry.path(),
            file_name,
            captured_at,
            size_bytes,
        });
    }

    frames.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(frames)
}

pub async fn encoder_available() -> bool {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub slug: String,
    pub framerate: u32,
    pub quality: Quality,
    pub range: CaptureRange,
}

#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub output_path: PathBuf,
    pub frame_count: usize,
    pub size_bytes: u64,
}

fn output_filename(slug: &str, range: &CaptureRange, at: DateTime<Local>) -> String {
    format!(
        "{slug}_timelapse{}_{}.mp4",
        range.suffix(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Encode the selected frames into an mp4 via ffmpeg.
pub async fn assemble(
    images_dir: &Path,
    output_dir: &Path,
    request: &AssemblyRequest,
) -> Result<AssemblyReport, TimelapseError> {
    if !encoder_available().await {
        return Err(TimelapseError::EncoderMissing);
    }

    let frames = collect_frames(images_dir, &request.slug, &request.range).await?;
    if frames.is_empty() {
        return Err(TimelapseError::NoFrames(request.slug.clone()));
    }
    info!(
        slug = %request.slug,
        frames = frames.len(),
        framerate = request.framerate,
        quality = ?request.quality,
        "assembling timelapse"
    );

    fs::create_dir_all(output_dir).await?;
    let output_path = output_dir.join(output_filename(&request.slug, &request.range, Local::now()));

    // ffmpeg resolves relative concat entries against the list file's own
    // directory, so the list carries absolute paths.
    let mut list = String::new();
    for frame in &frames {
        let absolute = fs::canonicalize(&frame.path).await?;
        list.push_str(&format!("file '{}'\n", absolute.display()));
    }
    let list_path = output_dir.join(format!("{}_frames.txt", request.slug));
    fs::write(&list_path, list).await?;

    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-r", &request.framerate.to_string()])
        .args(["-f", "concat", "-safe", "0", "-i"])
        .arg(&list_path)
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
        .args(["-crf", request.quality.crf()])
        .args(["-movflags", "+faststart"])
        .arg(&output_path)
        .status()
        .await?;

    let _ = fs::remove_file(&list_path).await;

    if !status.success() {
        return Err(TimelapseError::EncoderFailed(status));
    }

    let size_bytes = fs::metadata(&output_path).await?.len();
    Ok(AssemblyReport {
        output_path,
        frame_count: frames.len(),
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Local, NaiveDate, TimeZone};

    use super::{CaptureRange, Quality, collect_frames, output_filename};

    fn at(date: &str, time: &str) -> chrono::NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap())
    }

    async fn seed(dir: &std::path::Path, names: &[&str]) {
        for name in names {
            tokio::fs::write(dir.join(name), b"\xFF\xD8\xFF")
                .await
                .expect("seed file should write");
        }
    }

    #[tokio::test]
    async fn collects_only_matching_frames_in_filename_order() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        seed(
            dir.path(),
            &[
                "a_20250103_000000.jpeg",
                "a_20250101_000000.jpeg",
                "a_20250102_000000.jpeg",
                "b_20250101_000000.jpeg",
                "a_b_20250101_000000.jpeg",
                "a_notatimestamp.jpeg",
                "random.txt",
            ],
        )
        .await;

        let frames = collect_frames(dir.path(), "a", &CaptureRange::default())
            .await
            .expect("collect should succeed");

        let names: Vec<_> = frames.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "a_20250101_000000.jpeg",
                "a_20250102_000000.jpeg",
                "a_20250103_000000.jpeg",
            ]
        );
        assert!(frames.iter().all(|f| f.size_bytes == 3));
    }

    #[tokio::test]
    async fn date_range_filters_by_embedded_capture_time() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        seed(
            dir.path(),
            &[
                "a_20250101_120000.jpeg",
                "a_20250102_120000.jpeg",
                "a_20250103_120000.jpeg",
            ],
        )
        .await;

        let range = CaptureRange {
            start: Some(at("2025-01-02", "00:00:00")),
            end: Some(at("2025-01-02", "23:59:59")),
        };
        let frames = collect_frames(dir.path(), "a", &range)
            .await
            .expect("collect should succeed");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].file_name, "a_20250102_120000.jpeg");
    }

    #[tokio::test]
    async fn missing_images_directory_yields_no_frames() {
        let frames = collect_frames(
            std::path::Path::new("/nonexistent/images"),
            "a",
            &CaptureRange::default(),
        )
        .await
        .expect("collect should succeed");
        assert!(frames.is_empty());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = CaptureRange {
            start: Some(at("2025-01-02", "00:00:00")),
            end: Some(at("2025-01-03", "23:59:59")),
        };
        assert!(range.contains(at("2025-01-02", "00:00:00")));
        assert!(range.contains(at("2025-01-03", "23:59:59")));
        assert!(!range.contains(at("2025-01-01", "23:59:59")));
        assert!(!range.contains(at("2025-01-04", "00:00:00")));
    }

    #[test]
    fn output_filename_reflects_the_requested_range() {
        let now = Local.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let open = CaptureRange::default();
        assert_eq!(
            output_filename("a", &open, now),
            "a_timelapse_20250601_100000.mp4"
        );

        let bounded = CaptureRange {
            start: Some(at("2025-01-02", "00:00:00")),
            end: Some(at("2025-01-03", "23:59:59")),
        };
        assert_eq!(
            output_filename("a", &bounded, now),
            "a_timelapse_20250102_to_20250103_20250601_100000.mp4"
        );

        let from_only = CaptureRange {
            start: Some(at("2025-01-02", "00:00:00")),
            end: None,
        };
        assert_eq!(
            output_filename("a", &from_only, now),
            "a_timelapse_from_20250102_20250601_100000.mp4"
        );
    }

    #[test]
    fn quality_maps_to_expected_crf() {
        assert_eq!(Quality::Low.crf(), "28");
        assert_eq!(Quality::Medium.crf(), "23");
        assert_eq!(Quality::High.crf(), "18");
        assert_eq!(Quality::Highest.crf(), "15");
    }
}
