//! Watches files referenced by the current configuration.

use super::{spawn, Scan, ScannerConfig, ScannerHandle};
use crate::service::{ReloadSource, Reloader};
use crate::store::ExternalFiles;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Reloads the whole configuration when any referenced file changes.
///
/// A file counts as changed when its mtime advances, when it appears after
/// being unreadable, or when it disappears. Watermarks are reseeded from the
/// store whenever a new snapshot is installed.
pub struct FileScanner {
    reloader: Arc<Reloader>,
    seen: ExternalFiles,
    generation: Option<u64>,
}

impl FileScanner {
    pub fn new(reloader: Arc<Reloader>) -> Self {
        Self {
            reloader,
            seen: ExternalFiles::new(),
            generation: None,
        }
    }

    pub fn spawn(self, config: &ScannerConfig, token: CancellationToken) -> ScannerHandle {
        spawn(self, config, token)
    }

    fn reseed(&mut self) {
        let service = self.reloader.service();
        let generation = service.snapshot().generation;
        if self.generation != Some(generation) {
            self.generation = Some(generation);
            self.seen = service.current_external_file_watermarks();
        }
    }
}

fn changed(last: Option<SystemTime>, current: Option<SystemTime>) -> bool {
    match (last, current) {
        (Some(last), Some(current)) => current > last,
        (None, Some(_)) | (Some(_), None) => true,
        (None, None) => false,
    }
}

impl Scan for FileScanner {
    const NAME: &'static str = "external-file";

    fn source(&self) -> ReloadSource {
        ReloadSource::ExternalFile
    }

    fn reloader(&self) -> &Arc<Reloader> {
        &self.reloader
    }

    fn detect(&mut self) -> bool {
        self.reseed();

        let fs = Arc::clone(self.reloader.fs());
        let mut any_changed = false;
        for (path, last) in self.seen.iter_mut() {
            let current = fs.mtime(path).ok();
            if changed(*last, current) {
                info!("Referenced file {} changed, reloading", path.display());
                *last = current;
                any_changed = true;
            }
        }
        any_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::IncomingRequest;
    use crate::scanner::test_support::{eventually, reloader, rewrite};
    use std::time::Duration;
    use tempfile::TempDir;

    const CONFIG: &str = "- request: { url: /f }\n  response: { file: body.txt }\n";

    #[test]
    fn test_changed_rules() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(1);
        assert!(changed(Some(t0), Some(t1)));
        assert!(!changed(Some(t1), Some(t0)));
        assert!(!changed(Some(t0), Some(t0)));
        assert!(changed(None, Some(t0)));
        assert!(changed(Some(t0), None));
        assert!(!changed(None, None));
    }

    #[test]
    fn test_detects_edit_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("body.txt"), "v1").unwrap();
        let reloader = reloader(&dir, CONFIG);
        let mut scanner = FileScanner::new(Arc::clone(&reloader));
        assert!(!scanner.detect());

        rewrite(&dir.path().join("body.txt"), "v2", 5);
        assert!(scanner.detect());
        assert!(!scanner.detect());
    }

    #[test]
    fn test_detects_missing_file_appearing() {
        let dir = TempDir::new().unwrap();
        let reloader = reloader(&dir, CONFIG);
        let mut scanner = FileScanner::new(Arc::clone(&reloader));
        assert!(!scanner.detect());

        std::fs::write(dir.path().join("body.txt"), "now here").unwrap();
        assert!(scanner.detect());
    }

    #[tokio::test]
    async fn test_edit_reloads_file_backed_body() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("body.txt"), "v1").unwrap();
        let reloader = reloader(&dir, CONFIG);
        let service = Arc::clone(reloader.service());
        let handle = FileScanner::new(Arc::clone(&reloader)).spawn(
            &ScannerConfig {
                interval: Duration::from_millis(10),
            },
            CancellationToken::new(),
        );

        let before = service.resolve(IncomingRequest::new("GET", "/f")).await;
        assert_eq!(before.body_text(), "v1");

        let generation = service.snapshot().generation;
        rewrite(&dir.path().join("body.txt"), "v2", 5);
        assert!(eventually(|| service.snapshot().generation != generation).await);

        let after = service.resolve(IncomingRequest::new("GET", "/f")).await;
        assert_eq!(after.body_text(), "v2");

        handle.stop().await;
    }
}
