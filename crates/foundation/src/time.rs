/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }

    /// Elapsed seconds since `earlier`, never negative.
    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    pub fn add_seconds(self, s: f64) -> Self {
        Time(self.0 + s)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn millis_conversions() {
        assert_eq!(Time::from_millis(250.0), Time(0.25));
        assert_eq!(Time(1.5).as_millis(), 1500.0);
        assert_eq!(Time(1.0).since(Time(2.0)), 0.0);
    }
}
