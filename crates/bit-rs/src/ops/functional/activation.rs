//! Elementwise activation kernels.

use crate::tensor::Tensor;

/// Rectified linear unit: clamps every element to a zero floor.
pub fn relu(x: &Tensor) -> Tensor {
    let mut out = x.clone();
    out.map_inplace(|v| v.max(0.0));
    out
}
