//! Host-backed `f32` tensor used by every kernel and layer in the crate.

use anyhow::{bail, ensure, Result};
use rand::Rng;

use super::shape::Shape;

/// Dense row-major tensor owning its `f32` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Constructs a tensor from raw values, validating the length against the shape.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.num_elements() {
            bail!(
                "tensor data length ({}) does not match shape {:?}",
                data.len(),
                shape.dims()
            );
        }
        Ok(Tensor { shape, data })
    }

    /// Returns a zero-initialized tensor of the requested shape.
    pub fn zeros(shape: Shape) -> Self {
        let len = shape.num_elements();
        Tensor {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Returns a one-initialized tensor of the requested shape.
    pub fn ones(shape: Shape) -> Self {
        let len = shape.num_elements();
        Tensor {
            shape,
            data: vec![1.0; len],
        }
    }

    /// Returns a tensor filled with a constant value.
    pub fn full(shape: Shape, value: f32) -> Self {
        let len = shape.num_elements();
        Tensor {
            shape,
            data: vec![value; len],
        }
    }

    /// Samples from a normal distribution (`N(0, std^2)`) using the Box-Muller transform.
    pub fn randn(shape: Shape, std: f32, rng: &mut impl Rng) -> Self {
        let len = shape.num_elements();
        let mut values = Vec::with_capacity(len);
        while values.len() < len {
            let u1: f32 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
            let u2: f32 = rng.gen::<f32>();
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            let z0 = r * theta.cos() * std;
            let z1 = r * theta.sin() * std;
            values.push(z0);
            if values.len() < len {
                values.push(z1);
            }
        }
        Tensor {
            shape,
            data: values,
        }
    }

    /// Returns the total number of elements stored in the tensor.
    pub fn len(&self) -> usize {
        self.shape.num_elements()
    }

    /// Reports whether the tensor contains zero elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Provides access to the tensor shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Borrows the underlying data slice.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutably borrows the underlying data slice.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Fills the tensor with a constant value.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Applies a unary function in place over every scalar element.
    pub fn map_inplace<F>(&mut self, mut f: F)
    where
        F: FnMut(f32) -> f32,
    {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Element-wise addition; the shapes must match exactly.
    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        ensure!(
            self.shape == rhs.shape,
            "tensor add shape mismatch: {:?} vs {:?}",
            self.shape.dims(),
            rhs.shape.dims()
        );
        let data = self
            .data
            .iter()
            .zip(rhs.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ok(Tensor {
            shape: self.shape.clone(),
            data,
        })
    }

    /// Reinterprets the payload under a new shape with the same element count.
    pub fn reshape<D: Into<Vec<usize>>>(&self, dims: D) -> Result<Tensor> {
        let shape = Shape::new(dims);
        ensure!(
            shape.num_elements() == self.len(),
            "reshape from {:?} to {:?} changes element count",
            self.shape.dims(),
            shape.dims()
        );
        Ok(Tensor {
            shape,
            data: self.data.clone(),
        })
    }
}
