//! Convolution layers (NCHW): plain and weight-standardized.

use anyhow::{ensure, Result};

use crate::module::{Module, ParamVisitor, ParamVisitorMut};
use crate::ops::functional::{conv2d, Conv2dParams2d, Padding2d};
use crate::tensor::{Shape, Tensor};

/// Epsilon added to the per-filter variance before the rsqrt.
pub const WS_EPS: f32 = 1e-10;

fn check_conv_geometry(
    weight: &Tensor,
    bias: Option<&Tensor>,
    params: &Conv2dParams2d,
) -> Result<()> {
    ensure!(
        weight.shape().rank() == 4,
        "conv layer weight must be OIHW, got {:?}",
        weight.shape().dims()
    );
    ensure!(params.groups > 0, "conv layer groups must be > 0");
    let dims = weight.shape().dims();
    ensure!(
        dims[2] == params.kernel[0] && dims[3] == params.kernel[1],
        "conv layer weight kernel {:?} must match params {:?}",
        &dims[2..],
        params.kernel
    );
    if let Some(bias) = bias {
        ensure!(
            bias.shape().rank() == 1 && bias.shape().dims()[0] == dims[0],
            "conv layer bias must have shape [{}], got {:?}",
            dims[0],
            bias.shape().dims()
        );
    }
    Ok(())
}

/// Plain 2D convolution that applies its kernel exactly as stored.
///
/// Used where the trained kernel must pass through untouched, e.g. the
/// classification head; the stem and body use [`StdConv2d`].
#[derive(Debug, Clone)]
pub struct Conv2d {
    weight: Tensor,
    bias: Option<Tensor>,
    params: Conv2dParams2d,
}

impl Conv2d {
    pub fn new(weight: Tensor, bias: Option<Tensor>, params: Conv2dParams2d) -> Result<Self> {
        check_conv_geometry(&weight, bias.as_ref(), &params)?;
        Ok(Self {
            weight,
            bias,
            params,
        })
    }

    /// Zero-filled 1x1 convolution with no padding; bias off unless requested.
    pub fn conv1x1(cin: usize, cout: usize, stride: usize, bias: bool) -> Result<Self> {
        let weight = Tensor::zeros(Shape::new([cout, cin, 1, 1].to_vec()));
        let bias = bias.then(|| Tensor::zeros(Shape::new([cout])));
        Self::new(
            weight,
            bias,
            Conv2dParams2d {
                kernel: [1, 1],
                stride: [stride, stride],
                dilation: [1, 1],
                padding: Padding2d::zero(),
                groups: 1,
            },
        )
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape().dims()[0]
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    pub(crate) fn weight_mut(&mut self) -> &mut Tensor {
        &mut self.weight
    }

    pub(crate) fn bias_mut(&mut self) -> Option<&mut Tensor> {
        self.bias.as_mut()
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let _scope = crate::profiling::layer_scope("Conv2d::forward");
        conv2d(x, &self.weight, self.bias.as_ref(), self.params)
    }
}

impl Module for Conv2d {
    fn visit_params(&self, v: &mut ParamVisitor<'_>) -> Result<()> {
        v.param("weight", &self.weight)?;
        if let Some(bias) = &self.bias {
            v.param("bias", bias)?;
        }
        Ok(())
    }

    fn visit_params_mut(&mut self, v: &mut ParamVisitorMut<'_>) -> Result<()> {
        v.param("weight", &mut self.weight)?;
        if let Some(bias) = &mut self.bias {
            v.param("bias", bias)?;
        }
        Ok(())
    }
}

/// 2D convolution whose kernel is standardized to zero mean and unit
/// variance per output filter immediately before every application.
///
/// The learnable weight itself is never overwritten; standardization is
/// re-derived on each forward call because the raw weight keeps changing
/// during training.
#[derive(Debug, Clone)]
pub struct StdConv2d {
    weight: Tensor,
    bias: Option<Tensor>,
    params: Conv2dParams2d,
}

impl StdConv2d {
    /// Builds a layer around an existing OIHW weight tensor.
    pub fn new(weight: Tensor, bias: Option<Tensor>, params: Conv2dParams2d) -> Result<Self> {
        check_conv_geometry(&weight, bias.as_ref(), &params)?;
        Ok(Self {
            weight,
            bias,
            params,
        })
    }

    /// Allocates a zero-filled layer with the given geometry.
    pub fn with_shape(
        cin: usize,
        cout: usize,
        kernel: [usize; 2],
        stride: [usize; 2],
        padding: Padding2d,
        groups: usize,
        bias: bool,
    ) -> Result<Self> {
        ensure!(groups > 0, "StdConv2d groups must be > 0");
        ensure!(
            cin % groups == 0,
            "StdConv2d input channels {} must be divisible by groups {}",
            cin,
            groups
        );
        let weight = Tensor::zeros(Shape::new([cout, cin / groups, kernel[0], kernel[1]].to_vec()));
        let bias = bias.then(|| Tensor::zeros(Shape::new([cout])));
        Self::new(
            weight,
            bias,
            Conv2dParams2d {
                kernel,
                stride,
                dilation: [1, 1],
                padding,
                groups,
            },
        )
    }

    /// 3x3 convolution with padding 1; bias off unless requested.
    pub fn conv3x3(cin: usize, cout: usize, stride: usize, groups: usize, bias: bool) -> Result<Self> {
        Self::with_shape(
            cin,
            cout,
            [3, 3],
            [stride, stride],
            Padding2d::uniform(1),
            groups,
            bias,
        )
    }

    /// 1x1 convolution with no padding; bias off unless requested.
    pub fn conv1x1(cin: usize, cout: usize, stride: usize, bias: bool) -> Result<Self> {
        Self::with_shape(
            cin,
            cout,
            [1, 1],
            [stride, stride],
            Padding2d::zero(),
            1,
            bias,
        )
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape().dims()[0]
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    pub(crate) fn weight_mut(&mut self) -> &mut Tensor {
        &mut self.weight
    }

    pub(crate) fn bias_mut(&mut self) -> Option<&mut Tensor> {
        self.bias.as_mut()
    }

    /// Derives the standardized kernel: per output filter, zero mean and
    /// unit variance (biased estimate) over input-channel and spatial axes.
    pub fn standardized_weight(&self) -> Tensor {
        let dims = self.weight.shape().dims();
        let filter_len: usize = dims[1] * dims[2] * dims[3];
        let inv_count = 1.0f32 / filter_len as f32;

        let raw = self.weight.data();
        let mut out = self.weight.clone();
        let result = out.data_mut();
        for o in 0..dims[0] {
            let start = o * filter_len;
            let filter = &raw[start..start + filter_len];

            let mut sum = 0.0f32;
            for &v in filter {
                sum += v;
            }
            let mean = sum * inv_count;

            let mut var_sum = 0.0f32;
            for &v in filter {
                let d = v - mean;
                var_sum += d * d;
            }
            let inv_std = 1.0f32 / (var_sum * inv_count + WS_EPS).sqrt();

            for slot in &mut result[start..start + filter_len] {
                *slot = (*slot - mean) * inv_std;
            }
        }
        out
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let _scope = crate::profiling::layer_scope("StdConv2d::forward");
        let standardized = self.standardized_weight();
        conv2d(x, &standardized, self.bias.as_ref(), self.params)
    }
}

impl Module for StdConv2d {
    fn visit_params(&self, v: &mut ParamVisitor<'_>) -> Result<()> {
        v.param("weight", &self.weight)?;
        if let Some(bias) = &self.bias {
            v.param("bias", bias)?;
        }
        Ok(())
    }

    fn visit_params_mut(&mut self, v: &mut ParamVisitorMut<'_>) -> Result<()> {
        v.param("weight", &mut self.weight)?;
        if let Some(bias) = &mut self.bias {
            v.param("bias", bias)?;
        }
        Ok(())
    }
}
