//! Pre-activation ResNet-v2 with weight standardization and group norm.
//!
//! The assembly is built once from integer configuration and is structurally
//! immutable afterwards; only parameter values change, either through the
//! checkpoint importer or an external training loop.

use anyhow::{ensure, Result};
use rand::Rng;

use super::config::BitResNetConfig;
use crate::error::ModelError;
use crate::module::{Module, ParamVisitor, ParamVisitorMut};
use crate::nn::{Conv2d, GroupNorm, StdConv2d};
use crate::ops::functional::{global_avg_pool2d, max_pool2d, pad2d, relu, Padding2d};
use crate::tensor::Tensor;

/// Fixed group count used by every normalization stage.
pub const NORM_GROUPS: usize = 32;

/// Bottleneck widths of the three inner convolutions, per stage, before
/// width-factor scaling.
const STAGE_MID_WIDTHS: [usize; 4] = [64, 128, 256, 512];

/// Output channel widths per stage before width-factor scaling.
const STAGE_OUT_WIDTHS: [usize; 4] = [256, 512, 1024, 2048];

/// Pre-activation bottleneck unit: three standardized convolutions wrapped
/// in norm+relu stages, plus an optional projection shortcut.
#[derive(Debug, Clone)]
pub struct PreActBottleneck {
    pub(crate) gn1: GroupNorm,
    pub(crate) conv1: StdConv2d,
    pub(crate) gn2: GroupNorm,
    pub(crate) conv2: StdConv2d,
    pub(crate) gn3: GroupNorm,
    pub(crate) conv3: StdConv2d,
    pub(crate) downsample: Option<StdConv2d>,
}

impl PreActBottleneck {
    /// Builds a unit from channel geometry.
    ///
    /// `cout` defaults to `cin` and `cmid` to `cout / 4`. A projection
    /// shortcut exists iff the unit changes channel count or stride.
    pub fn new(
        cin: usize,
        cout: Option<usize>,
        cmid: Option<usize>,
        stride: usize,
    ) -> Result<Self> {
        let cout = cout.unwrap_or(cin);
        let cmid = cmid.unwrap_or(cout / 4);

        let downsample = if stride != 1 || cin != cout {
            Some(StdConv2d::conv1x1(cin, cout, stride, false)?)
        } else {
            None
        };

        Ok(Self {
            gn1: GroupNorm::new(NORM_GROUPS, cin)?,
            conv1: StdConv2d::conv1x1(cin, cmid, 1, false)?,
            gn2: GroupNorm::new(NORM_GROUPS, cmid)?,
            conv2: StdConv2d::conv3x3(cmid, cmid, stride, 1, false)?,
            gn3: GroupNorm::new(NORM_GROUPS, cmid)?,
            conv3: StdConv2d::conv1x1(cmid, cout, 1, false)?,
            downsample,
        })
    }

    pub fn has_projection(&self) -> bool {
        self.downsample.is_some()
    }

    pub fn in_channels(&self) -> usize {
        self.gn1.channels()
    }

    pub fn mid_channels(&self) -> usize {
        self.gn2.channels()
    }

    pub fn out_channels(&self) -> usize {
        self.conv3.out_channels()
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let _scope = crate::profiling::layer_scope("PreActBottleneck::forward");
        let pre = relu(&self.gn1.forward(x)?);
        let residual = if let Some(proj) = &self.downsample {
            proj.forward(&pre)?
        } else {
            x.clone()
        };

        let mut h = self.conv1.forward(&pre)?;
        h = self.conv2.forward(&relu(&self.gn2.forward(&h)?))?;
        h = self.conv3.forward(&relu(&self.gn3.forward(&h)?))?;

        if h.shape() != residual.shape() {
            return Err(ModelError::structural(format!(
                "residual branch {:?} does not match shortcut {:?}",
                h.shape().dims(),
                residual.shape().dims()
            ))
            .into());
        }
        h.add(&residual)
    }
}

impl Module for PreActBottleneck {
    fn visit_params(&self, v: &mut ParamVisitor<'_>) -> Result<()> {
        v.scoped("gn1", |v| self.gn1.visit_params(v))?;
        v.scoped("conv1", |v| self.conv1.visit_params(v))?;
        v.scoped("gn2", |v| self.gn2.visit_params(v))?;
        v.scoped("conv2", |v| self.conv2.visit_params(v))?;
        v.scoped("gn3", |v| self.gn3.visit_params(v))?;
        v.scoped("conv3", |v| self.conv3.visit_params(v))?;
        if let Some(proj) = &self.downsample {
            v.scoped("downsample", |v| proj.visit_params(v))?;
        }
        Ok(())
    }

    fn visit_params_mut(&mut self, v: &mut ParamVisitorMut<'_>) -> Result<()> {
        v.scoped("gn1", |v| self.gn1.visit_params_mut(v))?;
        v.scoped("conv1", |v| self.conv1.visit_params_mut(v))?;
        v.scoped("gn2", |v| self.gn2.visit_params_mut(v))?;
        v.scoped("conv2", |v| self.conv2.visit_params_mut(v))?;
        v.scoped("gn3", |v| self.gn3.visit_params_mut(v))?;
        v.scoped("conv3", |v| self.conv3.visit_params_mut(v))?;
        if let Some(proj) = &mut self.downsample {
            v.scoped("downsample", |v| proj.visit_params_mut(v))?;
        }
        Ok(())
    }
}

/// Full network assembly: stem, four stages of bottleneck units, head.
///
/// The head classifier is a plain [`Conv2d`]: its trained kernel is applied
/// as imported, with no standardization.
#[derive(Debug)]
pub struct BitResNet {
    config: BitResNetConfig,
    pub(crate) root: StdConv2d,
    pub(crate) block1: Vec<PreActBottleneck>,
    pub(crate) block2: Vec<PreActBottleneck>,
    pub(crate) block3: Vec<PreActBottleneck>,
    pub(crate) block4: Vec<PreActBottleneck>,
    pub(crate) head_gn: GroupNorm,
    pub(crate) head_conv: Conv2d,
}

impl BitResNet {
    /// Assembles the network with zero-filled parameters, ready for import.
    pub fn new(config: &BitResNetConfig) -> Result<Self> {
        config.validate()?;
        let wf = config.width_factor;

        let root = StdConv2d::with_shape(
            3,
            64 * wf,
            [7, 7],
            [2, 2],
            Padding2d::uniform(3),
            1,
            false,
        )?;

        let units = config.depth.unit_counts();
        let mut blocks: [Vec<PreActBottleneck>; 4] =
            [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
        let mut cin = 64 * wf;

        for stage_idx in 0..4 {
            let cmid = STAGE_MID_WIDTHS[stage_idx] * wf;
            let cout = STAGE_OUT_WIDTHS[stage_idx] * wf;
            // Only the first unit of stages 2-4 halves spatial resolution.
            let stage_stride = if stage_idx == 0 { 1 } else { 2 };
            for unit_idx in 0..units[stage_idx] {
                let (unit_cin, stride) = if unit_idx == 0 {
                    (cin, stage_stride)
                } else {
                    (cout, 1)
                };
                blocks[stage_idx].push(PreActBottleneck::new(
                    unit_cin,
                    Some(cout),
                    Some(cmid),
                    stride,
                )?);
            }
            cin = cout;
        }

        let head_gn = GroupNorm::new(NORM_GROUPS, 2048 * wf)?;
        let head_conv = Conv2d::conv1x1(2048 * wf, config.num_classes, 1, true)?;

        let [block1, block2, block3, block4] = blocks;
        Ok(Self {
            config: config.clone(),
            root,
            block1,
            block2,
            block3,
            block4,
            head_gn,
            head_conv,
        })
    }

    /// Assembles the network with He-initialized convolution kernels, for
    /// training from scratch or tests.
    pub fn random(config: &BitResNetConfig, rng: &mut impl Rng) -> Result<Self> {
        let mut model = Self::new(config)?;
        let mut init = |name: &str, tensor: &mut Tensor| -> Result<()> {
            match tensor.shape().rank() {
                4 => {
                    let dims = tensor.shape().dims();
                    let fan_in = (dims[1] * dims[2] * dims[3]) as f32;
                    *tensor = Tensor::randn(
                        tensor.shape().clone(),
                        (2.0 / fan_in).sqrt(),
                        rng,
                    );
                }
                1 => {
                    // Norm scales start at one, every bias at zero.
                    let value = if name.ends_with("/weight") { 1.0 } else { 0.0 };
                    tensor.fill(value);
                }
                _ => {}
            }
            Ok(())
        };
        let mut v = ParamVisitorMut::new(&mut init);
        model.visit_params_mut(&mut v)?;
        Ok(model)
    }

    pub fn config(&self) -> &BitResNetConfig {
        &self.config
    }

    /// The four stages in execution order.
    pub fn stages(&self) -> [&[PreActBottleneck]; 4] {
        [&self.block1, &self.block2, &self.block3, &self.block4]
    }

    /// Forward pass: `[N, 3, H, W]` batch to `[N, num_classes]` logits.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let _scope = crate::profiling::layer_scope("BitResNet::forward");
        ensure!(
            x.shape().rank() == 4,
            "BitResNet expects rank-4 NCHW input, got {:?}",
            x.shape().dims()
        );

        let mut h = self.root.forward(x)?;
        h = pad2d(&h, Padding2d::uniform(1), 0.0)?;
        h = max_pool2d(&h, [3, 3], [2, 2], Padding2d::zero())?;

        for stage in self.stages() {
            for unit in stage {
                h = unit.forward(&h)?;
            }
        }

        h = relu(&self.head_gn.forward(&h)?);
        h = global_avg_pool2d(&h)?;

        let dims = h.shape().dims();
        if dims[2] != 1 || dims[3] != 1 {
            return Err(ModelError::structural(format!(
                "head pool produced spatial shape {}x{}, expected 1x1",
                dims[2], dims[3]
            ))
            .into());
        }

        let logits = self.head_conv.forward(&h)?;
        let n = logits.shape().dims()[0];
        let classes = logits.shape().dims()[1];
        logits.reshape([n, classes])
    }

    /// Visits every parameter once under its '/'-delimited path.
    pub fn for_each_parameter(
        &self,
        mut f: impl FnMut(&str, &Tensor) -> Result<()>,
    ) -> Result<()> {
        let mut callback = |name: &str, tensor: &Tensor| f(name, tensor);
        let mut v = ParamVisitor::new(&mut callback);
        self.visit_params(&mut v)
    }

    /// Total scalar parameter count.
    pub fn num_parameters(&self) -> usize {
        let mut total = 0usize;
        let _ = self.for_each_parameter(|_, tensor| {
            total += tensor.len();
            Ok(())
        });
        total
    }
}

impl Module for BitResNet {
    fn visit_params(&self, v: &mut ParamVisitor<'_>) -> Result<()> {
        v.scoped("root", |v| self.root.visit_params(v))?;

        for (stage_idx, stage) in self.stages().into_iter().enumerate() {
            let stage_name = format!("block{}", stage_idx + 1);
            v.scoped(&stage_name, |v| {
                for (unit_idx, unit) in stage.iter().enumerate() {
                    let unit_name = format!("unit{:02}", unit_idx + 1);
                    v.scoped(&unit_name, |v| unit.visit_params(v))?;
                }
                Ok(())
            })?;
        }

        v.scoped("head", |v| {
            v.scoped("gn", |v| self.head_gn.visit_params(v))?;
            v.scoped("conv", |v| self.head_conv.visit_params(v))
        })
    }

    fn visit_params_mut(&mut self, v: &mut ParamVisitorMut<'_>) -> Result<()> {
        v.scoped("root", |v| self.root.visit_params_mut(v))?;

        for (stage_idx, stage) in [
            &mut self.block1,
            &mut self.block2,
            &mut self.block3,
            &mut self.block4,
        ]
        .into_iter()
        .enumerate()
        {
            let stage_name = format!("block{}", stage_idx + 1);
            v.scoped(&stage_name, |v| {
                for (unit_idx, unit) in stage.iter_mut().enumerate() {
                    let unit_name = format!("unit{:02}", unit_idx + 1);
                    v.scoped(&unit_name, |v| unit.visit_params_mut(v))?;
                }
                Ok(())
            })?;
        }

        v.scoped("head", |v| {
            v.scoped("gn", |v| self.head_gn.visit_params_mut(v))?;
            v.scoped("conv", |v| self.head_conv.visit_params_mut(v))
        })
    }
}
