//! Watches the main configuration file.

use super::{spawn, Scan, ScannerConfig, ScannerHandle};
use crate::service::{ReloadSource, Reloader};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reloads when the configuration file's mtime moves past the watermark.
///
/// The watermark advances to every examined mtime, including ones whose
/// content failed to parse, so a broken file is retried only after another
/// edit.
pub struct ConfigScanner {
    reloader: Arc<Reloader>,
    watermark: Option<SystemTime>,
}

impl ConfigScanner {
    /// Scanner whose watermark is the mtime of the configuration text the
    /// reloader last read. Edits made since then are picked up on the first
    /// tick.
    pub fn new(reloader: Arc<Reloader>) -> Self {
        let watermark = reloader.loaded_config_mtime();
        Self {
            reloader,
            watermark,
        }
    }

    pub fn spawn(self, config: &ScannerConfig, token: CancellationToken) -> ScannerHandle {
        spawn(self, config, token)
    }
}

impl Scan for ConfigScanner {
    const NAME: &'static str = "config";

    fn source(&self) -> ReloadSource {
        ReloadSource::Config
    }

    fn reloader(&self) -> &Arc<Reloader> {
        &self.reloader
    }

    fn detect(&mut self) -> bool {
        let mtime = match self.reloader.config_mtime() {
            Ok(mtime) => mtime,
            Err(e) => {
                debug!(
                    "Cannot stat {}: {}",
                    self.reloader.config_path().display(),
                    e
                );
                return false;
            }
        };
        if self.watermark.is_some_and(|seen| mtime <= seen) {
            return false;
        }
        info!(
            "Configuration {} changed, reloading",
            self.reloader.config_path().display()
        );
        self.watermark = Some(mtime);
        true
    }
}
