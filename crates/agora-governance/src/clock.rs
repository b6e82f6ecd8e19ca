//! Height source.
//!
//! Block production lives outside the engine; every time-sensitive operation
//! asks a [`HeightSource`] for the current height.

use agora_types::Height;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::error::GovernanceError;

/// Externally supplied, monotonically increasing height counter.
pub trait HeightSource: Send + Sync {
    fn current_height(&self) -> Height;
}

/// A height counter that only moves when told to.
///
/// Clones share the same counter, so a test or driver can keep one handle
/// and give another to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualHeight {
    current: Arc<AtomicU64>,
}

impl ManualHeight {
    pub fn new(initial: Height) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(initial)),
        }
    }

    /// Advance by `blocks` and return the new height.
    pub fn advance(&self, blocks: Height) -> Result<Height, GovernanceError> {
        self.current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(blocks))
            .map(|last| last + blocks)
            .map_err(|_| GovernanceError::Overflow)
    }

    /// Jump to `height`. Moving backwards is rejected.
    pub fn set(&self, height: Height) -> Result<(), GovernanceError> {
        self.current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                (height >= last).then_some(height)
            })
            .map(|_| ())
            .map_err(|last| GovernanceError::HeightRegression { last, now: height })
    }
}

impl HeightSource for ManualHeight {
    fn current_height(&self) -> Height {
        self.current.load(Ordering::SeqCst)
    }
}
