use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared between a submission and the request it issued. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Stop flag plus abort signal for exactly one submission, identified by its
/// generation number.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: u64,
    stopped: Arc<AtomicBool>,
    abort: AbortSignal,
}

impl CancellationToken {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            stopped: Arc::new(AtomicBool::new(false)),
            abort: AbortSignal::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Raises the stop flag before aborting, so a reveal loop sees the stop on
    /// its next check even if the request already completed.
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.abort.abort();
    }
}
