use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime};
use tokio::fs;

use crate::core::errors::WriteError;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Archive filename for one snapshot: `{slug}_{YYYYMMDD_HHMMSS}.jpeg`.
///
/// For a fixed slug these names sort lexicographically in capture order,
/// which is what timelapse assembly relies on. Two captures for the same
/// camera within the same second produce the same name and the later one
/// wins.
pub fn snapshot_filename(slug: &str, captured_at: DateTime<Local>) -> String {
    format!("{slug}_{}.jpeg", captured_at.format(TIMESTAMP_FORMAT))
}

/// Recover `(slug, capture time)` from an archive filename. Returns `None`
/// for anything that does not match the snapshot naming scheme.
pub fn parse_snapshot_filename(file_name: &str) -> Option<(&str, NaiveDateTime)> {
    let stem = file_name.strip_suffix(".jpeg")?;
    let (rest, time_part) = stem.rsplit_once('_')?;
    let (slug, date_part) = rest.rsplit_once('_')?;
    if slug.is_empty() {
        return None;
    }
    let captured_at =
        NaiveDateTime::parse_from_str(&format!("{date_part}_{time_part}"), TIMESTAMP_FORMAT)
            .ok()?;
    Some((slug, captured_at))
}

/// Commits validated snapshots to the images directory.
///
/// Writes go through a slug-prefixed temp file and a rename, so concurrent
/// readers never observe a partially written snapshot under its final name.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    images_dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    pub async fn store(
        &self,
        slug: &str,
        image: &[u8],
        captured_at: DateTime<Local>,
    ) -> Result<PathBuf, WriteError> {
        fs::create_dir_all(&self.images_dir).await?;

        let path = self.images_dir.join(snapshot_filename(slug, captured_at));
        let tmp_path = path.with_extension("jpeg.tmp");
        fs::write(&tmp_path, image).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(path)
    }
}
