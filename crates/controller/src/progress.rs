/// Highest value reported before loading completes.
pub const PENDING_PROGRESS_CAP: u8 = 95;
/// Asset progress may run at most this far ahead of the manual milestones.
const ASSET_LEAD: u8 = 25;

pub const PROGRESS_SURFACE_READY: u8 = 10;
pub const PROGRESS_CAMERA_READY: u8 = 18;
pub const PROGRESS_MAP_INIT: u8 = 28;
pub const PROGRESS_LOOP_START: u8 = 72;
pub const PROGRESS_FIRST_FRAME: u8 = 85;

/// Mount progress merged from manual milestones and texture loading.
///
/// Emitted values are strictly increasing and stay at or below 95 until
/// `complete`, which reports 100 exactly once.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    manual: u8,
    asset: u8,
    last_emitted: Option<u8>,
    completed: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over; the returned 0 is always reported.
    pub fn reset(&mut self) -> u8 {
        *self = Self {
            last_emitted: Some(0),
            ..Self::default()
        };
        0
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn last_emitted(&self) -> Option<u8> {
        self.last_emitted
    }

    /// Record a milestone; returns the value to report, if any.
    pub fn set_manual(&mut self, value: u8) -> Option<u8> {
        if self.completed {
            return None;
        }
        let clamped = value.min(PENDING_PROGRESS_CAP);
        if clamped <= self.manual {
            return None;
        }
        self.manual = clamped;
        self.emit()
    }

    /// Record texture loading as `settled` of `total`.
    pub fn set_assets(&mut self, settled: usize, total: usize) -> Option<u8> {
        if self.completed || total == 0 {
            return None;
        }
        let percent = (settled.min(total) * 100 / total) as u8;
        let clamped = percent.min(PENDING_PROGRESS_CAP);
        if clamped <= self.asset {
            return None;
        }
        self.asset = clamped;
        self.emit()
    }

    /// Returns `true` the first time only.
    pub fn complete(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.manual = 100;
        self.asset = 100;
        self.last_emitted = Some(100);
        true
    }

    fn combined(&self) -> u8 {
        let eased_asset = self.asset.min(self.manual.saturating_add(ASSET_LEAD));
        self.manual.max(eased_asset).min(PENDING_PROGRESS_CAP)
    }

    fn emit(&mut self) -> Option<u8> {
        let combined = self.combined();
        if self.last_emitted.is_some_and(|last| combined <= last) {
            return None;
        }
        self.last_emitted = Some(combined);
        Some(combined)
    }
}
