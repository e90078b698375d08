//! Normalization primitives.

use anyhow::{ensure, Result};

use crate::tensor::Tensor;

/// Grouped channel normalization over NCHW activations.
///
/// Channels are split into `num_groups` contiguous groups; each `(sample,
/// group)` slice is centred and scaled by its own mean and biased variance,
/// then the per-channel affine parameters are applied.
pub fn group_norm(
    x: &Tensor,
    gamma: &Tensor,
    beta: &Tensor,
    num_groups: usize,
    eps: f32,
) -> Result<Tensor> {
    ensure!(
        x.shape().rank() == 4,
        "group_norm expects rank-4 NCHW input, got {:?}",
        x.shape().dims()
    );
    ensure!(num_groups > 0, "group_norm groups must be > 0");

    let dims = x.shape().dims();
    let (n, c, h, w) = (dims[0], dims[1], dims[2], dims[3]);
    ensure!(
        c % num_groups == 0,
        "group_norm channels {} must be divisible by groups {}",
        c,
        num_groups
    );
    ensure!(
        gamma.shape().rank() == 1 && gamma.shape().dims()[0] == c,
        "group_norm gamma must have shape [{}], got {:?}",
        c,
        gamma.shape().dims()
    );
    ensure!(
        beta.shape().rank() == 1 && beta.shape().dims()[0] == c,
        "group_norm beta must have shape [{}], got {:?}",
        c,
        beta.shape().dims()
    );

    let channels_per_group = c / num_groups;
    let spatial = h * w;
    let group_len = channels_per_group * spatial;
    let inv_count = 1.0f32 / group_len as f32;

    let values = x.data();
    let gamma = gamma.data();
    let beta = beta.data();
    let mut out = x.clone();
    let result = out.data_mut();

    for sample in 0..n {
        for group in 0..num_groups {
            let start = sample * c * spatial + group * group_len;
            let slice = &values[start..start + group_len];

            let mut sum = 0.0f32;
            for &v in slice {
                sum += v;
            }
            let mean = sum * inv_count;

            let mut var_sum = 0.0f32;
            for &v in slice {
                let d = v - mean;
                var_sum += d * d;
            }
            let inv_std = 1.0f32 / (var_sum * inv_count + eps).sqrt();

            for cg in 0..channels_per_group {
                let channel = group * channels_per_group + cg;
                let scale = gamma[channel] * inv_std;
                let shift = beta[channel] - mean * scale;
                let row = start + cg * spatial;
                for slot in &mut result[row..row + spatial] {
                    *slot = *slot * scale + shift;
                }
            }
        }
    }

    Ok(out)
}
