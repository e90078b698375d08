//! Loss and evaluation helpers driven by the external training loop.

use anyhow::{bail, ensure, Result};

use crate::model::BitResNet;
use crate::tensor::Tensor;

/// Mean softmax cross-entropy over a `[N, C]` logit batch.
pub fn cross_entropy(logits: &Tensor, targets: &[usize]) -> Result<f32> {
    ensure!(
        logits.shape().rank() == 2,
        "cross_entropy expects [N, C] logits, got {:?}",
        logits.shape().dims()
    );
    let dims = logits.shape().dims();
    let (n, classes) = (dims[0], dims[1]);
    ensure!(
        targets.len() == n,
        "cross_entropy got {} targets for batch of {}",
        targets.len(),
        n
    );

    let mut loss = 0.0f32;
    for (row_idx, &target) in targets.iter().enumerate() {
        if target >= classes {
            bail!("target {} out of range {}", target, classes);
        }
        let row = &logits.data()[row_idx * classes..(row_idx + 1) * classes];
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mut exp_sum = 0.0f32;
        for &logit in row {
            exp_sum += (logit - max).exp();
        }
        let log_prob = row[target] - max - exp_sum.max(1e-9).ln();
        loss -= log_prob;
    }
    Ok(loss / n as f32)
}

/// Fraction of rows whose arg-max matches the target label.
pub fn top1_accuracy(logits: &Tensor, targets: &[usize]) -> Result<f32> {
    ensure!(
        logits.shape().rank() == 2,
        "top1_accuracy expects [N, C] logits, got {:?}",
        logits.shape().dims()
    );
    let dims = logits.shape().dims();
    let (n, classes) = (dims[0], dims[1]);
    ensure!(
        targets.len() == n,
        "top1_accuracy got {} targets for batch of {}",
        targets.len(),
        n
    );

    let mut correct = 0usize;
    for (row_idx, &target) in targets.iter().enumerate() {
        let row = &logits.data()[row_idx * classes..(row_idx + 1) * classes];
        let mut best = 0usize;
        for (class, &value) in row.iter().enumerate() {
            if value > row[best] {
                best = class;
            }
        }
        if best == target {
            correct += 1;
        }
    }
    Ok(correct as f32 / n as f32)
}

/// Evaluation-pass policy.
///
/// `sample_cap` bounds the cumulative number of samples scored during
/// intermediate-epoch monitoring; the final evaluation should run with no
/// cap. This is an orchestration-level speed/accuracy trade-off, not a core
/// model semantic.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalPolicy {
    pub sample_cap: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct EvalReport {
    pub samples: usize,
    pub loss: f32,
    pub accuracy: f32,
}

/// Runs forward passes over labelled batches, accumulating loss and top-1
/// accuracy until the batches are exhausted or the sample cap is exceeded.
pub fn evaluate<I>(model: &BitResNet, batches: I, policy: EvalPolicy) -> Result<EvalReport>
where
    I: IntoIterator<Item = (Tensor, Vec<usize>)>,
{
    let mut samples = 0usize;
    let mut loss_sum = 0.0f32;
    let mut correct_sum = 0.0f32;

    for (batch, targets) in batches {
        let logits = model.forward(&batch)?;
        let n = targets.len();
        loss_sum += cross_entropy(&logits, &targets)? * n as f32;
        correct_sum += top1_accuracy(&logits, &targets)? * n as f32;
        samples += n;

        if policy.sample_cap.is_some_and(|cap| samples >= cap) {
            break;
        }
    }

    ensure!(samples > 0, "evaluate requires at least one sample");
    Ok(EvalReport {
        samples,
        loss: loss_sum / samples as f32,
        accuracy: correct_sum / samples as f32,
    })
}
