//! Learning-rate schedules for fine-tuning runs.

pub trait LrSchedule {
    fn learning_rate(&self, step: usize) -> f32;
}

pub struct ConstantSchedule {
    pub lr: f32,
}

impl LrSchedule for ConstantSchedule {
    fn learning_rate(&self, _step: usize) -> f32 {
        self.lr
    }
}

/// Linear warmup followed by a staircase decay: the base rate is divided by
/// ten after 30%, 60%, and 90% of the total step budget.
pub struct WarmupStaircaseSchedule {
    pub base_lr: f32,
    pub warmup_steps: usize,
    pub total_steps: usize,
}

impl LrSchedule for WarmupStaircaseSchedule {
    fn learning_rate(&self, step: usize) -> f32 {
        if self.warmup_steps > 0 && step < self.warmup_steps {
            return self.base_lr * (step + 1) as f32 / self.warmup_steps as f32;
        }
        let progress = step as f32 / self.total_steps.max(1) as f32;
        let factor = if progress < 0.3 {
            1.0
        } else if progress < 0.6 {
            0.1
        } else if progress < 0.9 {
            0.01
        } else {
            0.001
        };
        self.base_lr * factor
    }
}
