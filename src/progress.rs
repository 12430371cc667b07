use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use serde_json::json;

pub fn write_progress(path: &Path, current: usize, total: usize, phase: &str, status: &str) {
    let json = json!({
        "current": current,
        "total": total,
        "phase": phase,
        "status": status,
    });
    if let Err(e) = fs::write(path, json.to_string()) {
        log::debug!("Could not write progress file {}: {}", path.display(), e);
    }
}

/// Shared progress counter for one drained stage, mirrored to an optional JSON file.
pub struct ProgressReporter {
    path: Option<PathBuf>,
    phase: String,
    total: usize,
    current: AtomicUsize,
    file_lock: Mutex<()>,
}

impl ProgressReporter {
    pub fn new(path: Option<&Path>, phase: &str, total: usize) -> Self {
        let reporter = ProgressReporter {
            path: path.map(Path::to_path_buf),
            phase: phase.to_string(),
            total,
            current: AtomicUsize::new(0),
            file_lock: Mutex::new(()),
        };
        reporter.write(0, "started");
        reporter
    }

    /// Counts one finished job.
    pub fn advance(&self, status: &str) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let step = (self.total / 20).max(1);
        if current % step == 0 || current == self.total {
            log::info!("{}: {}/{}", self.phase, current, self.total);
        }
        self.write(current, status);
    }

    pub fn finish(&self) {
        self.write(self.current.load(Ordering::SeqCst), "done");
    }

    fn write(&self, current: usize, status: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = match self.file_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        write_progress(path, current, self.total, &self.phase, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn progress_file_tracks_jobs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let reporter = ProgressReporter::new(Some(&path), "conversion", 2);
        reporter.advance("hero.def");
        reporter.advance("town.def");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["current"], 2);
        assert_eq!(value["total"], 2);
        assert_eq!(value["phase"], "conversion");
        assert_eq!(value["status"], "town.def");

        reporter.finish();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "done");
    }
}
