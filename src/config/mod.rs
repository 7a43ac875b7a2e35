use std::{
    collections::BTreeMap,
    env,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::core::errors::ConfigError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cameras_file: PathBuf,
    pub images_dir: PathBuf,
    pub timelapses_dir: PathBuf,
    pub log_dir: PathBuf,
    pub default_interval_secs: u64,
    pub supervise_interval_secs: u64,
    pub shutdown_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let cameras_file = env::var("CAMERAS_FILE")
            .unwrap_or_else(|_| "cameras.json".to_owned())
            .into();
        let images_dir = env::var("IMAGES_DIR")
            .unwrap_or_else(|_| "images".to_owned())
            .into();
        let timelapses_dir = env::var("TIMELAPSES_DIR")
            .unwrap_or_else(|_| "timelapses".to_owned())
            .into();
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_owned()).into();
        let default_interval_secs = env::var("DOWNLOAD_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(20);
        let supervise_interval_secs = env::var("SUPERVISE_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        let shutdown_timeout_ms = env::var("SHUTDOWN_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2000);

        Ok(Self {
            cameras_file,
            images_dir,
            timelapses_dir,
            log_dir,
            default_interval_secs,
            supervise_interval_secs,
            shutdown_timeout_ms,
        })
    }
}

/// One configured traffic camera. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Camera {
    pub slug: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct CameraEntry {
    name: String,
    url: String,
}

/// The camera registry loaded from `cameras.json`: a mapping from slug to
/// display name and source URL. Passed by value into the scheduler so tests
/// can run against synthetic camera sets.
#[derive(Debug, Clone)]
pub struct CameraRegistry {
    cameras: BTreeMap<String, Camera>,
}

impl CameraRegistry {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(err) => return Err(ConfigError::Io(err)),
        };
        let entries: BTreeMap<String, CameraEntry> = serde_json::from_str(&raw)?;
        Self::from_entries(entries)
    }

    fn from_entries(entries: BTreeMap<String, CameraEntry>) -> Result<Self, ConfigError> {
        let mut cameras = BTreeMap::new();
        for (slug, entry) in entries {
            if slug.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    slug,
                    reason: "slug must not be empty".to_owned(),
                });
            }
            if entry.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    slug,
                    reason: "display name must not be empty".to_owned(),
                });
            }
            if let Err(err) = reqwest::Url::parse(&entry.url) {
                return Err(ConfigError::Invalid {
                    slug,
                    reason: format!("source url is not valid: {err}"),
                });
            }
            cameras.insert(
                slug.clone(),
                Camera {
                    slug,
                    name: entry.name,
                    url: entry.url,
                },
            );
        }
        Ok(Self { cameras })
    }

    pub fn get(&self, slug: &str) -> Option<&Camera> {
        self.cameras.get(slug)
    }

    pub fn all(&self) -> Vec<Camera> {
        self.cameras.values().cloned().collect()
    }

    /// Resolve a user-supplied slug list, rejecting unknown slugs.
    pub fn select(&self, slugs: &[String]) -> Result<Vec<Camera>, ConfigError> {
        slugs
            .iter()
            .map(|slug| {
                self.get(slug)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownCamera(slug.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        sync::{Mutex, OnceLock},
        time::{SystemTime, UNIX_EPOCH},
    };

    use crate::core::errors::ConfigError;

    use super::{AppConfig, CameraRegistry};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("failed to lock env mutex")
    }

    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn temp_registry(contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("trafficlapse-cameras-{suffix}.json"));
        fs::write(&path, contents).expect("should write temporary registry file");
        path
    }

    #[test]
    fn from_env_uses_defaults_if_unset() {
        let _guard = lock_env();
        remove_env("IMAGES_DIR");
        remove_env("DOWNLOAD_INTERVAL_SECONDS");

        let config = AppConfig::from_env().expect("config should parse");
        assert_eq!(config.images_dir, PathBuf::from("images"));
        assert_eq!(config.default_interval_secs, 20);
    }

    #[test]
    fn from_env_reads_overrides_from_environment() {
        let _guard = lock_env();
        set_env("IMAGES_DIR", "/tmp/frames");
        set_env("DOWNLOAD_INTERVAL_SECONDS", "5");

        let config = AppConfig::from_env().expect("config should parse");
        assert_eq!(config.images_dir, PathBuf::from("/tmp/frames"));
        assert_eq!(config.default_interval_secs, 5);

        remove_env("IMAGES_DIR");
        remove_env("DOWNLOAD_INTERVAL_SECONDS");
    }

    #[test]
    fn load_parses_a_valid_registry() {
        let path = temp_registry(
            r#"{
                "anzacbr": {"name": "Anzac Bridge", "url": "https://example.com/anzac.jpg"},
                "harbour": {"name": "Harbour Bridge", "url": "https://example.com/harbour.jpg"}
            }"#,
        );

        let registry = CameraRegistry::load(&path).expect("registry should load");
        assert_eq!(registry.all().len(), 2);
        let camera = registry.get("anzacbr").expect("camera should exist");
        assert_eq!(camera.name, "Anzac Bridge");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = CameraRegistry::load(std::path::Path::new("/nonexistent/cameras.json"))
            .expect_err("load should fail");
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn load_rejects_invalid_json() {
        let path = temp_registry("{not json");
        let err = CameraRegistry::load(&path).expect_err("load should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_rejects_empty_display_name() {
        let path = temp_registry(r#"{"cam": {"name": " ", "url": "https://example.com/c.jpg"}}"#);
        let err = CameraRegistry::load(&path).expect_err("load should fail");
        assert!(matches!(err, ConfigError::Invalid { .. }));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_rejects_unparseable_url() {
        let path = temp_registry(r#"{"cam": {"name": "Cam", "url": "not a url"}}"#);
        let err = CameraRegistry::load(&path).expect_err("load should fail");
        assert!(matches!(err, ConfigError::Invalid { .. }));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn select_rejects_unknown_slug() {
        let path = temp_registry(r#"{"cam": {"name": "Cam", "url": "https://example.com/c.jpg"}}"#);
        let registry = CameraRegistry::load(&path).expect("registry should load");

        let err = registry
            .select(&["nope".to_owned()])
            .expect_err("select should fail");
        assert!(matches!(err, ConfigError::UnknownCamera(_)));

        let _ = fs::remove_file(path);
    }
}
