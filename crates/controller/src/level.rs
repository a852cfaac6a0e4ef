use std::fmt;

use serde::{Deserialize, Serialize};

/// Drill-down granularity of the displayed map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Province,
    City,
    District,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Province => "province",
            Level::City => "city",
            Level::District => "district",
        }
    }

    /// Levels whose meshes react to hover and click.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Level::Province | Level::City)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    /// Waiting on geography for the target level.
    Loading(Level),
    /// Tearing down and rebuilding the scene for the target level.
    Transitioning(Level),
}

impl TransitionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TransitionState::Idle)
    }
}

/// Single-flight guard over level transitions.
///
/// Every transition starts from `Idle`; a second attempt while one is in
/// flight is rejected, never queued.
#[derive(Debug, Clone, Default)]
pub struct TransitionGuard {
    state: TransitionState,
}

impl TransitionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn try_begin_loading(&mut self, target: Level) -> bool {
        self.enter(TransitionState::Loading(target))
    }

    /// Synchronous transitions skip the loading phase.
    pub fn try_begin(&mut self, target: Level) -> bool {
        self.enter(TransitionState::Transitioning(target))
    }

    /// `Loading(target)` to `Transitioning(target)`.
    pub fn promote(&mut self, target: Level) -> bool {
        if self.state != TransitionState::Loading(target) {
            return false;
        }
        self.state = TransitionState::Transitioning(target);
        true
    }

    pub fn release(&mut self) {
        self.state = TransitionState::Idle;
    }

    fn enter(&mut self, next: TransitionState) -> bool {
        if !self.is_idle() {
            tracing::debug!(state = ?self.state, requested = ?next, "transition already in flight");
            return false;
        }
        self.state = next;
        true
    }
}
