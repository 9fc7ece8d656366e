use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ReelError;
use crate::reel::{ReelSpinMachine, ReelState, Step};
use crate::symbols::Column;

/// Completion signal, sent exactly once per accepted `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReelStop {
    pub reel: usize,
    pub symbols: Column,
}

pub type StopSender = mpsc::UnboundedSender<ReelStop>;

/// A reel the round orchestrator can launch and wait on.
pub trait SpinReel: Send + Sync + 'static {
    fn index(&self) -> usize;

    fn state(&self) -> ReelState;

    /// Begin a session after `delay`. `done` receives one [`ReelStop`] when the
    /// reel stops, whether it settled or was cancelled. A reel that is already
    /// spinning returns `Busy` and keeps its current session.
    fn start(&self, delay: Duration, done: StopSender) -> Result<(), ReelError>;

    fn final_symbols(&self) -> Result<Column, ReelError>;

    fn cancel(&self);
}

struct Shared {
    machine: ReelSpinMachine,
    done: Option<StopSender>,
}

impl Shared {
    fn notify(&mut self) {
        let Some(done) = self.done.take() else {
            return;
        };
        if let Ok(symbols) = self.machine.final_symbols() {
            let _ = done.send(ReelStop {
                reel: self.machine.index(),
                symbols,
            });
        }
    }
}

/// Runs a [`ReelSpinMachine`] on the tokio clock. Cheap to clone.
#[derive(Clone)]
pub struct ReelHandle {
    inner: Arc<Mutex<Shared>>,
}

impl ReelHandle {
    pub fn new(machine: ReelSpinMachine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Shared {
                machine,
                done: None,
            })),
        }
    }

    /// Read the machine under the lock.
    pub fn inspect<T>(&self, f: impl FnOnce(&ReelSpinMachine) -> T) -> T {
        f(&self.inner.lock().machine)
    }
}

impl SpinReel for ReelHandle {
    fn index(&self) -> usize {
        self.inner.lock().machine.index()
    }

    fn state(&self) -> ReelState {
        self.inner.lock().machine.state()
    }

    fn start(&self, delay: Duration, done: StopSender) -> Result<(), ReelError> {
        let generation = {
            let mut shared = self.inner.lock();
            let generation = shared.machine.start(delay)?;
            shared.done = Some(done);
            generation
        };
        tokio::spawn(drive(self.inner.clone(), generation, delay));
        Ok(())
    }

    fn final_symbols(&self) -> Result<Column, ReelError> {
        self.inner.lock().machine.final_symbols()
    }

    fn cancel(&self) {
        let mut shared = self.inner.lock();
        if shared.machine.cancel() {
            shared.notify();
        }
    }
}

impl std::fmt::Debug for ReelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReelHandle").field(&self.inner.lock().machine).finish()
    }
}

async fn pause(d: Duration) {
    if d.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(d).await;
    }
}

async fn drive(shared: Arc<Mutex<Shared>>, generation: u64, delay: Duration) {
    pause(delay).await;
    loop {
        let step = {
            let mut guard = shared.lock();
            // cancelled, or superseded by a later session
            if guard.machine.generation() != generation || !guard.machine.state().is_spinning() {
                debug!(reel = guard.machine.index(), generation, "stale reel session dropped");
                return;
            }
            let step = guard.machine.advance();
            if step == Step::Stopped {
                guard.notify();
            }
            step
        };
        match step {
            Step::Wait(d) => pause(d).await,
            Step::Stopped => return,
        }
    }
}
