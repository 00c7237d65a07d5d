use burn::LearningRate;

/// Linear warmup from 0 to the base learning rate, then linear decay to 0 at the last step
#[derive(Clone, Debug)]
pub struct LinearWarmup {
    base_lr: LearningRate,
    warmup_steps: usize,
    total_steps: usize,
}

impl LinearWarmup {
    /// Create a new schedule
    pub fn new(base_lr: LearningRate, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
        }
    }

    /// The learning rate for the optimizer step with the given 0-based index
    pub fn lr(&self, step: usize) -> LearningRate {
        if step < self.warmup_steps {
            return self.base_lr * step as f64 / self.warmup_steps.max(1) as f64;
        }

        let remaining = self.total_steps.saturating_sub(step) as f64;
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;

        self.base_lr * (remaining / decay_steps).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_warmup_then_decay() {
        let schedule = LinearWarmup::new(1e-3, 10, 110);

        assert!(close(schedule.lr(0), 0.0));
        assert!(close(schedule.lr(5), 5e-4));
        assert!(close(schedule.lr(10), 1e-3));
        assert!(close(schedule.lr(60), 5e-4));
        assert!(close(schedule.lr(110), 0.0));
        assert!(close(schedule.lr(500), 0.0));
    }

    #[test]
    fn test_no_warmup() {
        let schedule = LinearWarmup::new(5e-5, 0, 4);

        assert!(close(schedule.lr(0), 5e-5));
        assert!(close(schedule.lr(2), 2.5e-5));
        assert!(close(schedule.lr(4), 0.0));
    }
}
