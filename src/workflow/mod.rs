pub mod orchestrator;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use orchestrator::Orchestrator;

/// Shared flag a caller raises to stop runs at the next stage boundary.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let signal = AbortSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_aborted());

        handle.abort();
        assert!(signal.is_aborted());
    }
}
