use crate::core::components::spec::ComponentKind;

/// Tolerance for floating point tick arithmetic
const EPS: f64 = 1e-9;

/// Scheduler clock. Time is derived from the tick count so it does not
/// drift with repeated additions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickClock {
    time_step: f64,
    tick: u64,
}

impl TickClock {
    pub fn new(time_step: f64) -> Self {
        Self { time_step, tick: 0 }
    }

    pub fn time(&self) -> f64 {
        self.tick as f64 * self.time_step
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    pub fn rewind(&mut self) {
        self.tick = 0;
    }
}

/// Decides whether a component is due at a given time
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    period: Option<f64>,
    last_sample: Option<i64>,
}

impl Sampler {
    pub fn new(kind: &ComponentKind) -> Self {
        Self {
            period: kind.period(),
            last_sample: None,
        }
    }

    /// Continuous samplers are always due. Discrete ones are due once per
    /// multiple of the period, the first time the clock reaches it.
    pub fn is_due(&mut self, time: f64) -> bool {
        let Some(period) = self.period else {
            return true;
        };
        let sample = ((time + EPS) / period).floor() as i64;
        if self.last_sample == Some(sample) {
            return false;
        }
        self.last_sample = Some(sample);
        true
    }

    pub fn reset(&mut self) {
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_from_ticks() {
        let mut clock = TickClock::new(0.1);
        for _ in 0..10 {
            clock.advance();
        }
        assert_eq!(clock.tick(), 10);
        assert!((clock.time() - 1.0).abs() < 1e-12);
        clock.rewind();
        assert_eq!(clock.time(), 0.0);
    }

    #[test]
    fn test_continuous_always_due() {
        let mut sampler = Sampler::new(&ComponentKind::Continuous);
        assert!(sampler.is_due(0.0));
        assert!(sampler.is_due(0.0));
    }

    #[test]
    fn test_discrete_runs_once_per_period() {
        // 10 Hz component on a 10 ms clock
        let mut sampler = Sampler::new(&ComponentKind::discrete(10.0));
        let clock = TickClock::new(0.01);
        let due: Vec<u64> = (0..35u64)
            .filter(|tick| {
                let mut c = clock;
                for _ in 0..*tick {
                    c.advance();
                }
                sampler.is_due(c.time())
            })
            .collect();
        assert_eq!(due, vec![0, 10, 20, 30]);

        sampler.reset();
        assert!(sampler.is_due(0.3));
    }

    #[test]
    fn test_discrete_slower_clock_than_rate() {
        // Clock coarser than the period: due on every tick
        let mut sampler = Sampler::new(&ComponentKind::discrete(100.0));
        assert!(sampler.is_due(0.0));
        assert!(sampler.is_due(0.05));
        assert!(sampler.is_due(0.1));
    }
}
