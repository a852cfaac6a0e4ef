/// Leading + trailing throttle over a millisecond clock.
///
/// The first offer inside an idle window fires immediately. Offers inside
/// the window replace the pending value, which fires on the first `poll` at
/// or after the window ends.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    wait_ms: f64,
    last_fire_ms: Option<f64>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(wait_ms: f64) -> Self {
        Self {
            wait_ms: wait_ms.max(0.0),
            last_fire_ms: None,
            pending: None,
        }
    }

    fn window_open(&self, now_ms: f64) -> bool {
        self.last_fire_ms
            .is_none_or(|last| now_ms - last >= self.wait_ms)
    }

    /// Returns the value when it should be handled right away.
    pub fn offer(&mut self, now_ms: f64, value: T) -> Option<T> {
        if self.window_open(now_ms) {
            self.last_fire_ms = Some(now_ms);
            self.pending = None;
            return Some(value);
        }
        self.pending = Some(value);
        None
    }

    /// Trailing edge: yields the pending value once the window has elapsed.
    pub fn poll(&mut self, now_ms: f64) -> Option<T> {
        if self.pending.is_some() && self.window_open(now_ms) {
            self.last_fire_ms = Some(now_ms);
            return self.pending.take();
        }
        None
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_fire_ms = None;
    }
}
