//! "Bring this turn into view" coordination.
//!
//! The coordinator separates recording a scroll intent from performing it:
//! an orchestrator records the intent when it appends a turn, and the
//! rendering layer flushes it once the new sequence has been drawn.

use crate::conversation::TurnId;
use std::sync::{Mutex, PoisonError};

/// The rendering layer's view of the conversation.
///
/// Anchors are a lookup keyed by turn id, not ownership: a turn with no
/// anchor (not yet drawn, or gone after a reset) is simply skipped.
pub trait ScrollViewport {
    /// Offset of the top of the turn relative to the top of the container.
    fn anchor_top(&self, id: TurnId) -> Option<f32>;

    fn scroll_to(&mut self, top: f32);
}

/// Records at most one pending scroll target and applies it once.
#[derive(Debug, Default)]
pub struct ScrollCoordinator {
    pending: Mutex<Option<TurnId>>,
}

impl ScrollCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `id` should be brought into view on the next flush.
    ///
    /// A later request replaces an earlier one that was never flushed.
    pub fn request_scroll_to(&self, id: TurnId) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Scrolls the viewport so the top of the requested turn is visible.
    ///
    /// The intent is consumed whether or not the turn has an anchor. Returns
    /// `true` only if the viewport was actually scrolled.
    pub fn flush(&self, viewport: &mut dyn ScrollViewport) -> bool {
        let Some(target) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };

        match viewport.anchor_top(target) {
            Some(top) => {
                viewport.scroll_to(top);
                true
            }
            None => {
                tracing::debug!("[ScrollCoordinator] No anchor for turn {}, skipping", target);
                false
            }
        }
    }
}
