//! Shape-manipulating kernels.

use anyhow::{ensure, Result};

use crate::ops::functional::Padding2d;
use crate::tensor::shape::compute_strides;
use crate::tensor::{Shape, Tensor};

/// Constant padding of the two spatial axes of an NCHW tensor.
///
/// Distinct from the implicit `-inf` padding inside `max_pool2d`: the stem
/// zero-pads its feature map before pooling, so padded positions must carry
/// the constant, not the reduction identity.
pub fn pad2d(x: &Tensor, padding: Padding2d, value: f32) -> Result<Tensor> {
    ensure!(
        x.shape().rank() == 4,
        "pad2d expects rank-4 NCHW input, got {:?}",
        x.shape().dims()
    );
    let dims = x.shape().dims();
    let (n, c, h, w) = (dims[0], dims[1], dims[2], dims[3]);
    let out_h = h + padding.top + padding.bottom;
    let out_w = w + padding.left + padding.right;

    let in_strides = compute_strides(dims);
    let out_dims = [n, c, out_h, out_w];
    let out_strides = compute_strides(&out_dims);

    let values = x.data();
    let mut result = vec![value; n * c * out_h * out_w];
    for sample in 0..n {
        for channel in 0..c {
            let in_plane = sample * in_strides[0] + channel * in_strides[1];
            let out_plane = sample * out_strides[0] + channel * out_strides[1];
            for row in 0..h {
                let src = in_plane + row * in_strides[2];
                let dst = out_plane + (row + padding.top) * out_strides[2] + padding.left;
                result[dst..dst + w].copy_from_slice(&values[src..src + w]);
            }
        }
    }

    Tensor::from_vec(Shape::new(out_dims.to_vec()), result)
}
