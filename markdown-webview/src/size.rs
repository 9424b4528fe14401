//! Last-known content height; reports only real changes so layout passes can be skipped.

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SizeObserver {
    last: Option<f64>,
}

impl SizeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `height` and returns true when the host should invalidate its layout.
    ///
    /// True on the first valid observation and whenever the value differs from the
    /// previous one. Negative or non-finite heights are ignored.
    pub fn observe(&mut self, height: f64) -> bool {
        if !height.is_finite() || height < 0.0 {
            return false;
        }
        if self.last == Some(height) {
            return false;
        }
        self.last = Some(height);
        true
    }

    /// Current content height, 0 before anything was observed.
    pub fn height(&self) -> f64 {
        self.last.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_invalidates() {
        let mut observer = SizeObserver::new();
        assert!(observer.observe(0.0));
        assert_eq!(observer.height(), 0.0);
    }

    #[test]
    fn test_repeats_are_ignored() {
        let mut observer = SizeObserver::new();
        let signals: Vec<bool> = [120.0, 120.0, 150.0, 150.0, 120.0]
            .into_iter()
            .map(|h| observer.observe(h))
            .collect();
        assert_eq!(signals, vec![true, false, true, false, true]);
        assert_eq!(observer.height(), 120.0);
    }

    #[test]
    fn test_invalid_heights_are_ignored() {
        let mut observer = SizeObserver::new();
        observer.observe(42.0);
        assert!(!observer.observe(-1.0));
        assert!(!observer.observe(f64::NAN));
        assert!(!observer.observe(f64::INFINITY));
        assert_eq!(observer.height(), 42.0);
    }
}
