//! Polling reload scanners.
//!
//! Each scanner is a background task cycling through
//! [`ScanState::Idle`] → [`ScanState::Scanning`] → (maybe)
//! [`ScanState::Reloading`] → [`ScanState::Idle`] once per tick. Cancellation
//! is only observed between ticks, so a reload in progress always finishes.
//! A failed reload is logged by the [`Reloader`] and scanning carries on.

mod config_scanner;
mod file_scanner;

pub use config_scanner::ConfigScanner;
pub use file_scanner::FileScanner;

use crate::error::ReloadError;
use crate::service::{ReloadSource, Reloader};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Scanner tick configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Scanning = 1,
    Reloading = 2,
}

#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> ScanState {
        match self.0.load(Ordering::Acquire) {
            1 => ScanState::Scanning,
            2 => ScanState::Reloading,
            _ => ScanState::Idle,
        }
    }

    fn set(&self, state: ScanState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Change detection behind a scanner task.
trait Scan: Send + 'static {
    const NAME: &'static str;

    fn source(&self) -> ReloadSource;

    fn reloader(&self) -> &Arc<Reloader>;

    /// One examination; `true` when a reload is due.
    fn detect(&mut self) -> bool;
}

/// Handle to a running scanner.
pub struct ScannerHandle {
    name: &'static str,
    token: CancellationToken,
    state: Arc<StateCell>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    pub fn state(&self) -> ScanState {
        self.state.get()
    }

    /// Ask the scanner to exit after its current tick.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!("Scanner {} ended abnormally: {}", self.name, e);
        }
    }
}

fn spawn<S: Scan>(mut scan: S, config: &ScannerConfig, token: CancellationToken) -> ScannerHandle {
    let state = Arc::new(StateCell::default());
    let interval = config.interval;
    let task_state = Arc::clone(&state);
    let task_token = token.clone();

    let task = tokio::spawn(async move {
        info!("Started {} scanner (interval {:?})", S::NAME, interval);
        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            task_state.set(ScanState::Scanning);
            if scan.detect() {
                task_state.set(ScanState::Reloading);
                let reloader = Arc::clone(scan.reloader());
                let source = scan.source();
                let result: Result<Result<usize, ReloadError>, _> =
                    tokio::task::spawn_blocking(move || reloader.reload(source)).await;
                match result {
                    Ok(Ok(stubs)) => debug!("{} scanner applied {} stubs", S::NAME, stubs),
                    Ok(Err(_)) => {}
                    Err(e) => error!("{} scanner reload task failed: {}", S::NAME, e),
                }
            }
            task_state.set(ScanState::Idle);
        }
        info!("Stopped {} scanner", S::NAME);
    });

    ScannerHandle {
        name: S::NAME,
        token,
        state,
        task,
    }
}
