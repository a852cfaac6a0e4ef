use foundation::time::Time;

/// Frame metadata.
///
/// This is the primary timebase for the per-frame update. Fixed-step frames
/// (`new`/`next`) replay deterministically; `advance` accepts the measured
/// delta from a display-driven loop.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Delta time since the previous frame (seconds).
    pub dt_s: f64,
    /// Time at the start of the frame (seconds).
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_s)
    }

    /// Next frame with a measured delta; negative or non-finite deltas clamp to 0.
    pub fn advance(self, dt_s: f64) -> Self {
        let dt_s = if dt_s.is_finite() { dt_s.max(0.0) } else { 0.0 };
        Self {
            index: self.index + 1,
            dt_s,
            time: self.time.add_seconds(dt_s),
        }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, 1.0 / 60.0);
        let b = Frame::new(10, 1.0 / 60.0);
        assert_eq!(a, b);
        assert_eq!(a.time, Time(10.0 / 60.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::new(0, 0.5);
        let f1 = f0.next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(0.5));
    }

    #[test]
    fn advance_uses_measured_delta() {
        let f = Frame::new(0, 1.0 / 60.0).advance(0.25).advance(f64::NAN);
        assert_eq!(f.index, 2);
        assert_eq!(f.time, Time(0.25));
        assert_eq!(f.dt_s, 0.0);
        assert!(!f.is_first());
    }
}
