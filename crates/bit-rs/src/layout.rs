//! Tensor layout helpers.
//!
//! Checkpoints produced by the upstream training pipeline store convolution
//! kernels channel-last (HWIO: height, width, in-channel, out-channel) while
//! every kernel in this crate consumes channel-first (OIHW) weights. The
//! conversion is a fixed axis permutation applied to rank-4 tensors only;
//! vectors (biases, norm scale/shift) pass through untouched.

use anyhow::Result;

use crate::error::ModelError;
use crate::tensor::shape::compute_strides;
use crate::tensor::{Shape, Tensor};

/// Axis permutation taking HWIO dimensions to OIHW.
pub const PERM_HWIO_TO_OIHW: [usize; 4] = [3, 2, 0, 1];

/// Inverse permutation taking OIHW dimensions back to HWIO.
pub const PERM_OIHW_TO_HWIO: [usize; 4] = [2, 3, 1, 0];

/// Converts a stored checkpoint tensor to the in-memory parameter layout.
///
/// Rank-4 tensors are permuted HWIO -> OIHW, rank-1 tensors are returned
/// unchanged, and any other rank is a [`ModelError::Layout`].
pub fn to_channel_first(name: &str, tensor: &Tensor) -> Result<Tensor> {
    match tensor.shape().rank() {
        4 => permute4(tensor, PERM_HWIO_TO_OIHW),
        1 => Ok(tensor.clone()),
        rank => Err(ModelError::Layout {
            name: name.to_string(),
            rank,
        }
        .into()),
    }
}

/// Converts an in-memory kernel back to the checkpoint layout.
pub fn to_channel_last(name: &str, tensor: &Tensor) -> Result<Tensor> {
    match tensor.shape().rank() {
        4 => permute4(tensor, PERM_OIHW_TO_HWIO),
        1 => Ok(tensor.clone()),
        rank => Err(ModelError::Layout {
            name: name.to_string(),
            rank,
        }
        .into()),
    }
}

fn permute4(tensor: &Tensor, perm: [usize; 4]) -> Result<Tensor> {
    let in_dims = tensor.shape().dims();
    let out_dims: Vec<usize> = perm.iter().map(|&axis| in_dims[axis]).collect();
    let in_strides = compute_strides(in_dims);
    let out_len = tensor.len();

    let values = tensor.data();
    let mut result = vec![0.0f32; out_len];
    let mut out_coord = [0usize; 4];
    for (idx, slot) in result.iter_mut().enumerate() {
        let mut rem = idx;
        for axis in (0..4).rev() {
            out_coord[axis] = rem % out_dims[axis];
            rem /= out_dims[axis];
        }
        let mut in_index = 0usize;
        for (out_axis, &out_c) in out_coord.iter().enumerate() {
            in_index += out_c * in_strides[perm[out_axis]];
        }
        *slot = values[in_index];
    }
    Tensor::from_vec(Shape::new(out_dims), result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact() {
        let dims = [3usize, 3, 2, 4];
        let data: Vec<f32> = (0..dims.iter().product::<usize>())
            .map(|i| i as f32)
            .collect();
        let hwio = Tensor::from_vec(Shape::new(dims.to_vec()), data).unwrap();
        let oihw = to_channel_first("kernel", &hwio).unwrap();
        assert_eq!(oihw.shape().dims(), &[4, 2, 3, 3]);
        let back = to_channel_last("kernel", &oihw).unwrap();
        assert_eq!(back, hwio);
    }

    #[test]
    fn vectors_pass_through() {
        let gamma = Tensor::ones(Shape::new([64]));
        let out = to_channel_first("gamma", &gamma).unwrap();
        assert_eq!(out, gamma);
    }

    #[test]
    fn unsupported_rank_is_rejected() {
        let bad = Tensor::zeros(Shape::new([2, 2]));
        let err = to_channel_first("weird", &bad).unwrap_err();
        let model_err = err.downcast_ref::<crate::ModelError>().unwrap();
        assert!(matches!(model_err, crate::ModelError::Layout { rank: 2, .. }));
    }
}
