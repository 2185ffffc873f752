//! Start/stop plumbing shared by the processor and cron loops.

use conveyor_core::error::{ConveyorError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info_span, Instrument};

/// Shutdown flag and wake-up shared with a running loop.
#[derive(Clone, Default)]
pub(crate) struct LoopSignal {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl LoopSignal {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Sleep for `interval`, returning early on `wake()`.
    pub(crate) async fn sleep(&self, interval: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.wake.notified() => {}
        }
    }

    /// Wake the loop. A wake with no sleeper is kept for the next sleep.
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }
}

enum LoopState {
    Idle,
    Running(JoinHandle<()>),
    /// `stop()` holds the handle and is waiting for the drain.
    Stopping,
}

/// Owns at most one background loop.
pub(crate) struct LoopControl {
    name: &'static str,
    signal: LoopSignal,
    state: Mutex<LoopState>,
}

/// Returns the handle to `state` if `stop()` is dropped before the loop ends.
struct StopGuard<'a> {
    state: &'a Mutex<LoopState>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        *state = match self.handle.take() {
            Some(handle) if !handle.is_finished() => LoopState::Running(handle),
            _ => LoopState::Idle,
        };
    }
}

impl LoopControl {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            signal: LoopSignal::default(),
            state: Mutex::new(LoopState::Idle),
        }
    }

    pub(crate) fn signal(&self) -> &LoopSignal {
        &self.signal
    }

    /// True from `start()` until the loop has returned, including the drain.
    pub(crate) fn is_running(&self) -> bool {
        match &*self.state.lock() {
            LoopState::Idle => false,
            LoopState::Running(handle) => !handle.is_finished(),
            LoopState::Stopping => true,
        }
    }

    /// Run `prepare`, then spawn the loop built by `run`.
    ///
    /// Fails with `AlreadyRunning` while a previous loop is alive or still
    /// draining, before `prepare` is called. Requires a Tokio runtime.
    pub(crate) fn start<F, Fut>(&self, prepare: impl FnOnce() -> Result<()>, run: F) -> Result<()>
    where
        F: FnOnce(LoopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConveyorError::Other(e.into()))?;

        let mut state = self.state.lock();
        match &*state {
            LoopState::Running(handle) if !handle.is_finished() => {
                return Err(ConveyorError::AlreadyRunning)
            }
            LoopState::Stopping => return Err(ConveyorError::AlreadyRunning),
            _ => {}
        }

        prepare()?;

        self.signal.shutdown.store(false, Ordering::SeqCst);
        let span = info_span!("loop", component = self.name);
        *state = LoopState::Running(runtime.spawn(run(self.signal.clone()).instrument(span)));
        Ok(())
    }

    /// Signal shutdown and wait for the loop to return.
    ///
    /// No-op when idle. A second concurrent call returns without waiting.
    pub(crate) async fn stop(&self) {
        let handle = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, LoopState::Stopping) {
                LoopState::Running(handle) => handle,
                other => {
                    *state = other;
                    return;
                }
            }
        };
        let mut guard = StopGuard {
            state: &self.state,
            handle: Some(handle),
        };

        self.signal.shutdown.store(true, Ordering::SeqCst);
        self.signal.wake();

        if let Some(handle) = guard.handle.as_mut() {
            if let Err(e) = handle.await {
                error!(component = self.name, error = %e, "Background loop ended abnormally");
            }
        }
    }
}

impl Drop for LoopControl {
    fn drop(&mut self) {
        self.signal.shutdown.store(true, Ordering::SeqCst);
        self.signal.wake();
    }
}
