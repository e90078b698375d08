//! Thin fine-tuning orchestration: schedules, loss, and evaluation policy.
//!
//! Gradient computation is deliberately out of scope; the helpers here drive
//! forward passes and bookkeeping around them.

pub mod eval;
pub mod schedule;

pub use eval::{cross_entropy, evaluate, top1_accuracy, EvalPolicy, EvalReport};
pub use schedule::{ConstantSchedule, LrSchedule, WarmupStaircaseSchedule};
