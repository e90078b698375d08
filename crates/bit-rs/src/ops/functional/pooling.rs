//! Pooling kernels over NCHW activations.

use anyhow::{ensure, Result};

use crate::ops::functional::Padding2d;
use crate::tensor::shape::compute_strides;
use crate::tensor::{Shape, Tensor};

/// Windowed max-pooling; positions outside the input contribute `-inf`.
pub fn max_pool2d(
    x: &Tensor,
    window: [usize; 2],
    stride: [usize; 2],
    padding: Padding2d,
) -> Result<Tensor> {
    ensure!(
        x.shape().rank() == 4,
        "max_pool2d expects rank-4 NCHW input, got {:?}",
        x.shape().dims()
    );
    ensure!(window[0] > 0 && window[1] > 0, "max_pool2d window must be > 0");
    ensure!(stride[0] > 0 && stride[1] > 0, "max_pool2d stride must be > 0");

    let dims = x.shape().dims();
    let (n, c, h_in, w_in) = (dims[0], dims[1], dims[2], dims[3]);
    let padded_h = h_in + padding.top + padding.bottom;
    let padded_w = w_in + padding.left + padding.right;
    ensure!(
        padded_h >= window[0] && padded_w >= window[1],
        "max_pool2d window {:?} exceeds padded input [{}, {}]",
        window,
        padded_h,
        padded_w
    );
    let out_h = (padded_h - window[0]) / stride[0] + 1;
    let out_w = (padded_w - window[1]) / stride[1] + 1;

    let in_strides = compute_strides(dims);
    let values = x.data();
    let mut result = vec![f32::NEG_INFINITY; n * c * out_h * out_w];
    let mut idx = 0usize;

    for sample in 0..n {
        for channel in 0..c {
            let plane = sample * in_strides[0] + channel * in_strides[1];
            for oh in 0..out_h {
                let start_h = oh as isize * stride[0] as isize - padding.top as isize;
                for ow in 0..out_w {
                    let start_w = ow as isize * stride[1] as isize - padding.left as isize;
                    let mut acc = f32::NEG_INFINITY;
                    for wh in 0..window[0] {
                        let ih = start_h + wh as isize;
                        if ih < 0 || ih >= h_in as isize {
                            continue;
                        }
                        let row = plane + ih as usize * in_strides[2];
                        for ww in 0..window[1] {
                            let iw = start_w + ww as isize;
                            if iw < 0 || iw >= w_in as isize {
                                continue;
                            }
                            acc = acc.max(values[row + iw as usize]);
                        }
                    }
                    result[idx] = acc;
                    idx += 1;
                }
            }
        }
    }

    Tensor::from_vec(Shape::new([n, c, out_h, out_w].to_vec()), result)
}

/// Adaptive average pool collapsing the full spatial extent to 1x1.
pub fn global_avg_pool2d(x: &Tensor) -> Result<Tensor> {
    ensure!(
        x.shape().rank() == 4,
        "global_avg_pool2d expects rank-4 NCHW input, got {:?}",
        x.shape().dims()
    );
    let dims = x.shape().dims();
    let (n, c, h, w) = (dims[0], dims[1], dims[2], dims[3]);
    let spatial = h * w;
    ensure!(spatial > 0, "global_avg_pool2d input has no spatial extent");
    let inv = 1.0f32 / spatial as f32;

    let values = x.data();
    let mut result = vec![0.0f32; n * c];
    for (plane, slot) in result.iter_mut().enumerate() {
        let start = plane * spatial;
        let mut sum = 0.0f32;
        for &v in &values[start..start + spatial] {
            sum += v;
        }
        *slot = sum * inv;
    }

    Tensor::from_vec(Shape::new([n, c, 1, 1].to_vec()), result)
}
