use std::time::Duration;

/// Adaptive pause that starts short and relaxes geometrically up to a ceiling.
///
/// Each `next` returns the current interval, then grows an internal step by
/// `step * growth_rate` and adds that increment to the interval.
#[derive(Debug, Clone)]
pub struct GrowableTicker {
    current: f64,
    max: f64,
    growth_rate: f64,
    step: f64,
}

impl GrowableTicker {
    /// `initial` and `max` in seconds. A `max` below `initial` is raised to it.
    /// A non-positive `growth_rate` keeps the ticker at `initial`.
    pub fn new(initial: f64, max: f64, growth_rate: f64) -> Self {
        let initial = initial.max(0.0);
        let max = if growth_rate <= 0.0 { initial } else { max.max(initial) };
        Self {
            current: initial,
            max,
            growth_rate,
            step: 1.0,
        }
    }

    pub fn next_secs(&mut self) -> f64 {
        let out = self.current;
        if self.current < self.max {
            let delta = self.step * self.growth_rate;
            self.step += delta;
            self.current = (self.current + delta).min(self.max);
        }
        out
    }

    pub fn next(&mut self) -> Duration {
        Duration::from_secs_f64(self.next_secs())
    }
}

impl From<&crate::config::PacingConfig> for GrowableTicker {
    fn from(cfg: &crate::config::PacingConfig) -> Self {
        Self::new(cfg.initial_secs, cfg.max_secs, cfg.growth_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_decreasing_and_converges() {
        let mut t = GrowableTicker::new(10.0, 300.0, 0.2);
        let mut prev = t.next_secs();
        assert_eq!(prev, 10.0);
        let mut reached = None;
        for i in 0..200 {
            let v = t.next_secs();
            assert!(v >= prev, "decreased at step {}", i);
            assert!(v <= 300.0);
            if v == 300.0 && reached.is_none() {
                reached = Some(i);
            }
            prev = v;
        }
        assert!(reached.is_some(), "never reached the ceiling");
        for _ in 0..10 {
            assert_eq!(t.next_secs(), 300.0);
        }
    }

    #[test]
    fn first_steps() {
        let mut t = GrowableTicker::new(10.0, 300.0, 0.5);
        assert_eq!(t.next_secs(), 10.0);
        // step 1 -> delta 0.5
        assert_eq!(t.next_secs(), 10.5);
        // step 1.5 -> delta 0.75
        assert_eq!(t.next_secs(), 11.25);
    }

    #[test]
    fn non_positive_growth_stays_at_initial() {
        for rate in [0.0, -0.5] {
            let mut t = GrowableTicker::new(1.0, 5.0, rate);
            assert_eq!(t.next(), Duration::from_secs(1));
            assert_eq!(t.next(), Duration::from_secs(1));
        }
    }

    #[test]
    fn max_below_initial_is_raised() {
        let mut t = GrowableTicker::new(50.0, 5.0, 0.2);
        assert_eq!(t.next_secs(), 50.0);
        assert_eq!(t.next_secs(), 50.0);
    }
}
