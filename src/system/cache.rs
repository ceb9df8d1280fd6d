use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::util::clamp_unit;

const CACHE_DIR_NAME: &str = "lumonitor";
const RECORD_EXTENSION: &str = "brightness";

/// Keeps staging files unique when several threads persist the same monitor.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Last-known brightness per monitor, one plain-text file each.
///
/// Reads never fail loudly and writes are best-effort: the in-memory view held
/// by the controller stays authoritative for the running process.
#[derive(Debug, Clone)]
pub struct BrightnessCache {
    dir: PathBuf,
}

impl BrightnessCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join(CACHE_DIR_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn read(&self, monitor_id: &str) -> Option<f64> {
        let path = self.record_path(monitor_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "failed to read cached brightness");
                return None;
            }
        };

        match contents.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(clamp_unit(value)),
            _ => {
                debug!(path = %path.display(), "ignoring malformed cached brightness");
                None
            }
        }
    }

    pub fn write(&self, monitor_id: &str, value: f64) {
        if let Err(err) = self.try_write(monitor_id, value) {
            warn!(monitor = %monitor_id, error = %err, "failed to persist brightness");
        }
    }

    fn try_write(&self, monitor_id: &str, value: f64) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let key = storage_key(monitor_id);
        let target = self.dir.join(format!("{key}.{RECORD_EXTENSION}"));
        let staging = self.dir.join(format!(
            ".{key}.{}.{}.tmp",
            process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&staging, format!("{:.2}\n", clamp_unit(value)))?;
        if let Err(err) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
        Ok(())
    }

    fn record_path(&self, monitor_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXTENSION}", storage_key(monitor_id)))
    }
}

/// Maps a monitor id onto a file-name-safe key.
pub fn storage_key(monitor_id: &str) -> String {
    let key: String = monitor_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if key.is_empty() { "_".to_string() } else { key }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn round_trips_across_instances() {
        let dir = tempdir().unwrap();
        BrightnessCache::new(dir.path()).write("display-1", 0.42);

        let fresh = BrightnessCache::new(dir.path());
        let value = fresh.read("display-1").unwrap();
        assert!((value - 0.42).abs() < 0.005);
    }

    #[test]
    fn persists_two_decimals() {
        let dir = tempdir().unwrap();
        let cache = BrightnessCache::new(dir.path());
        cache.write("display-1", 0.123456);

        let raw = fs::read_to_string(dir.path().join("display-1.brightness")).unwrap();
        assert_eq!(raw.trim(), "0.12");
    }

    #[test]
    fn missing_record_reads_none() {
        let dir = tempdir().unwrap();
        let cache = BrightnessCache::new(dir.path().join("not-created-yet"));
        assert_eq!(cache.read("display-1"), None);
    }

    #[test]
    fn malformed_record_reads_none() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("display-1.brightness"), "bright!").unwrap();
        fs::write(dir.path().join("display-2.brightness"), "NaN").unwrap();

        let cache = BrightnessCache::new(dir.path());
        assert_eq!(cache.read("display-1"), None);
        assert_eq!(cache.read("display-2"), None);
    }

    #[test]
    fn clamps_values_on_read() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("display-1.brightness"), "  7.5\n").unwrap();
        fs::write(dir.path().join("display-2.brightness"), "-0.3").unwrap();

        let cache = BrightnessCache::new(dir.path());
        assert_eq!(cache.read("display-1"), Some(1.0));
        assert_eq!(cache.read("display-2"), Some(0.0));
    }

    #[test]
    fn sanitises_path_unsafe_ids() {
        assert_eq!(storage_key("display-1"), "display-1");
        assert_eq!(storage_key("../etc/passwd"), ".._etc_passwd");
        assert_eq!(storage_key("DP 1:0"), "DP_1_0");
        assert_eq!(storage_key(""), "_");

        let dir = tempdir().unwrap();
        let cache = BrightnessCache::new(dir.path());
        cache.write("../escape", 0.5);
        assert!(dir.path().join(".._escape.brightness").exists());
        assert_eq!(cache.read("../escape"), Some(0.5));
    }

    #[test]
    fn write_failures_are_swallowed() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let cache = BrightnessCache::new(blocker.join("nested"));
        cache.write("display-1", 0.5);
        assert_eq!(cache.read("display-1"), None);
    }

    #[test]
    fn leaves_no_staging_files_behind() {
        let dir = tempdir().unwrap();
        let cache = BrightnessCache::new(dir.path());
        cache.write("display-1", 0.6);
        cache.write("display-1", 0.7);

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["display-1.brightness".to_string()]);
        assert_eq!(cache.read("display-1"), Some(0.7));
    }

    #[test]
    fn concurrent_writers_do_not_share_staging_files() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(BrightnessCache::new(dir.path()));

        for _ in 0..20 {
            let workers: Vec<_> = (0..4u32)
                .map(|worker| {
                    let cache = Arc::clone(&cache);
                    thread::spawn(move || {
                        let mut failures = 0;
                        for round in 0..20u32 {
                            let value = 0.1 + f64::from(worker * 20 + round) / 100.0;
                            if cache.try_write("display-1", value).is_err() {
                                failures += 1;
                            }
                        }
                        failures
                    })
                })
                .collect();

            let failures: u32 = workers.into_iter().map(|w| w.join().unwrap()).sum();
            assert_eq!(failures, 0);
        }

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["display-1.brightness".to_string()]);
        assert!(cache.read("display-1").is_some());
    }
}
