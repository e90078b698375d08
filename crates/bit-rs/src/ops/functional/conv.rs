//! Direct 2D convolution over NCHW activations.
//!
//! Activations are expected in NCHW (`[N, C, H, W]`) layout and weights in
//! canonical OIHW (`[C_out, C_in/groups, KH, KW]`) layout.

use anyhow::{bail, ensure, Result};

use crate::tensor::shape::compute_strides;
use crate::tensor::{Shape, Tensor};

#[derive(Debug, Clone, Copy)]
pub struct Padding2d {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding2d {
    pub fn zero() -> Self {
        Self {
            top: 0,
            bottom: 0,
            left: 0,
            right: 0,
        }
    }

    pub fn uniform(pad: usize) -> Self {
        Self {
            top: pad,
            bottom: pad,
            left: pad,
            right: pad,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Conv2dParams2d {
    pub kernel: [usize; 2],
    pub stride: [usize; 2],
    pub dilation: [usize; 2],
    pub padding: Padding2d,
    pub groups: usize,
}

/// Semantic 2D convolution with stride, zero padding, dilation, and groups.
pub fn conv2d(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    params: Conv2dParams2d,
) -> Result<Tensor> {
    let v = validate_conv2d_inputs(x, weight, bias, params)?;

    let in_dims = x.shape().dims();
    let in_strides = compute_strides(in_dims);
    let w_strides = compute_strides(weight.shape().dims());
    let (h_in, w_in) = (in_dims[2], in_dims[3]);

    let values = x.data();
    let kernel = weight.data();
    let mut result = vec![0.0f32; v.n * v.c_out * v.out_h * v.out_w];
    let out_strides = compute_strides(&[v.n, v.c_out, v.out_h, v.out_w]);

    for n in 0..v.n {
        for g in 0..v.groups {
            for oc_g in 0..v.c_out_per_group {
                let oc = g * v.c_out_per_group + oc_g;
                let base = bias.map(|b| b.data()[oc]).unwrap_or(0.0);
                for oh in 0..v.out_h {
                    let start_h =
                        oh as isize * params.stride[0] as isize - params.padding.top as isize;
                    for ow in 0..v.out_w {
                        let start_w =
                            ow as isize * params.stride[1] as isize - params.padding.left as isize;
                        let mut acc = base;
                        for ic_g in 0..v.c_in_per_group {
                            let ic = g * v.c_in_per_group + ic_g;
                            let in_plane = n * in_strides[0] + ic * in_strides[1];
                            let w_plane = oc * w_strides[0] + ic_g * w_strides[1];
                            for kh in 0..v.kernel_h {
                                let ih = start_h + (kh * params.dilation[0]) as isize;
                                if ih < 0 || ih >= h_in as isize {
                                    continue;
                                }
                                let in_row = in_plane + ih as usize * in_strides[2];
                                let w_row = w_plane + kh * w_strides[2];
                                for kw in 0..v.kernel_w {
                                    let iw = start_w + (kw * params.dilation[1]) as isize;
                                    if iw < 0 || iw >= w_in as isize {
                                        continue;
                                    }
                                    acc += values[in_row + iw as usize] * kernel[w_row + kw];
                                }
                            }
                        }
                        result[n * out_strides[0]
                            + oc * out_strides[1]
                            + oh * out_strides[2]
                            + ow] = acc;
                    }
                }
            }
        }
    }

    Tensor::from_vec(Shape::new([v.n, v.c_out, v.out_h, v.out_w].to_vec()), result)
}

fn conv2d_out_dim(
    input: usize,
    window: usize,
    stride: usize,
    dilation: usize,
    pad_before: usize,
    pad_after: usize,
) -> Result<usize> {
    ensure!(window > 0, "conv2d window must be > 0");
    ensure!(stride > 0, "conv2d stride must be > 0");
    ensure!(dilation > 0, "conv2d dilation must be > 0");
    let effective = (window - 1)
        .checked_mul(dilation)
        .and_then(|v| v.checked_add(1))
        .ok_or_else(|| anyhow::anyhow!("conv2d effective window overflow"))?;
    let padded = input
        .checked_add(pad_before)
        .and_then(|v| v.checked_add(pad_after))
        .ok_or_else(|| anyhow::anyhow!("conv2d padded dimension overflow"))?;
    ensure!(
        padded >= effective,
        "conv2d window ({}) exceeds padded input ({})",
        effective,
        padded
    );
    Ok((padded - effective) / stride + 1)
}

fn validate_conv2d_inputs(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    params: Conv2dParams2d,
) -> Result<ValidatedConv2d> {
    ensure!(
        x.shape().rank() == 4,
        "conv2d expects rank-4 NCHW input, got {:?}",
        x.shape().dims()
    );
    if let Some(bias) = bias {
        ensure!(
            bias.shape().rank() == 1,
            "conv2d expects rank-1 bias [C_out], got {:?}",
            bias.shape().dims()
        );
    }

    let dims = x.shape().dims();
    let (n, c_in, h, w) = (dims[0], dims[1], dims[2], dims[3]);

    let kernel_h = params.kernel[0];
    let kernel_w = params.kernel[1];
    let groups = params.groups;
    ensure!(groups > 0, "conv2d groups must be > 0");
    ensure!(
        c_in % groups == 0,
        "conv2d input channels {} must be divisible by groups {}",
        c_in,
        groups
    );
    let c_in_per_group = c_in / groups;

    let weight_dims = weight.shape().dims();
    if weight.shape().rank() != 4 {
        bail!(
            "conv2d weight must be canonical OIHW [C_out, C_in/groups, KH, KW], got rank {} ({:?})",
            weight.shape().rank(),
            weight_dims
        );
    }

    ensure!(
        weight_dims[1] == c_in_per_group,
        "conv2d weight expects C_in/groups={}, got {:?}",
        c_in_per_group,
        weight_dims
    );
    ensure!(
        weight_dims[2] == kernel_h && weight_dims[3] == kernel_w,
        "conv2d weight kernel [{}, {}] must match params [{}, {}]",
        weight_dims[2],
        weight_dims[3],
        kernel_h,
        kernel_w
    );
    let c_out = weight_dims[0];
    ensure!(
        c_out % groups == 0,
        "conv2d weight expects C_out divisible by groups={}, got {:?}",
        groups,
        weight_dims
    );
    let c_out_per_group = c_out / groups;

    if let Some(bias) = bias {
        ensure!(
            bias.shape().dims()[0] == c_out,
            "conv2d bias length {} must match weight output channels {}",
            bias.shape().dims()[0],
            c_out
        );
    }

    let out_h = conv2d_out_dim(
        h,
        params.kernel[0],
        params.stride[0],
        params.dilation[0],
        params.padding.top,
        params.padding.bottom,
    )?;
    let out_w = conv2d_out_dim(
        w,
        params.kernel[1],
        params.stride[1],
        params.dilation[1],
        params.padding.left,
        params.padding.right,
    )?;

    Ok(ValidatedConv2d {
        n,
        out_h,
        out_w,
        c_out,
        c_out_per_group,
        kernel_h,
        kernel_w,
        groups,
        c_in_per_group,
    })
}

#[derive(Debug, Clone, Copy)]
struct ValidatedConv2d {
    n: usize,
    out_h: usize,
    out_w: usize,
    c_out: usize,
    c_out_per_group: usize,
    kernel_h: usize,
    kernel_w: usize,
    groups: usize,
    c_in_per_group: usize,
}
