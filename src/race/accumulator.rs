/// Running sum with a Neumaier error term. Skill modifiers are added and removed thousands of times
/// per trial; the net modifier must return to zero once every skill has expired.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompensatedAccumulator {
    acc: f64,
    err: f64,
}

impl CompensatedAccumulator {
    pub fn new(initial: f64) -> Self {
        Self {
            acc: initial,
            err: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        let t = self.acc + value;
        if self.acc.abs() >= value.abs() {
            self.err += (self.acc - t) + value;
        } else {
            self.err += (value - t) + self.acc;
        }
        self.acc = t;
    }

    pub fn value(&self) -> f64 {
        self.acc + self.err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_returns_to_zero() {
        let mut acc = CompensatedAccumulator::new(0.0);
        let values = [0.35, 0.15, 0.000_1, 24.0, 0.45];
        for _ in 0..1000 {
            for v in values {
                acc.add(v);
            }
            for v in values {
                acc.add(-v);
            }
        }
        assert!(acc.value().abs() < 1e-15, "{}", acc.value());
    }

    #[test]
    fn beats_naive_summation() {
        let mut acc = CompensatedAccumulator::new(1.0e16);
        let mut naive = 1.0e16_f64;
        for _ in 0..10 {
            acc.add(1.0);
            naive += 1.0;
        }
        acc.add(-1.0e16);
        naive -= 1.0e16;
        assert_eq!(acc.value(), 10.0);
        assert_ne!(naive, 10.0);
    }
}
