//! Grouped channel normalization layer.

use anyhow::{ensure, Result};

use crate::module::{Module, ParamVisitor, ParamVisitorMut};
use crate::ops::functional::group_norm;
use crate::tensor::{Shape, Tensor};

/// Affine group normalization with scale initialized to one and shift to zero.
#[derive(Debug, Clone)]
pub struct GroupNorm {
    weight: Tensor,
    bias: Tensor,
    num_groups: usize,
    eps: f32,
}

impl GroupNorm {
    pub fn new(num_groups: usize, channels: usize) -> Result<Self> {
        ensure!(num_groups > 0, "GroupNorm groups must be > 0");
        ensure!(
            channels % num_groups == 0,
            "GroupNorm channels {} must be divisible by groups {}",
            channels,
            num_groups
        );
        Ok(Self {
            weight: Tensor::ones(Shape::new([channels])),
            bias: Tensor::zeros(Shape::new([channels])),
            num_groups,
            eps: 1e-5,
        })
    }

    pub fn channels(&self) -> usize {
        self.weight.shape().dims()[0]
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub(crate) fn weight_mut(&mut self) -> &mut Tensor {
        &mut self.weight
    }

    pub(crate) fn bias_mut(&mut self) -> &mut Tensor {
        &mut self.bias
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        group_norm(x, &self.weight, &self.bias, self.num_groups, self.eps)
    }
}

impl Module for GroupNorm {
    fn visit_params(&self, v: &mut ParamVisitor<'_>) -> Result<()> {
        v.param("weight", &self.weight)?;
        v.param("bias", &self.bias)
    }

    fn visit_params_mut(&mut self, v: &mut ParamVisitorMut<'_>) -> Result<()> {
        v.param("weight", &mut self.weight)?;
        v.param("bias", &mut self.bias)
    }
}
