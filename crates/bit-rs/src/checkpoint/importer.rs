//! Maps a flat checkpoint namespace onto the assembled network.
//!
//! The stored namespace mirrors the model hierarchy through string keys
//! rather than a schema, so every key is produced by an explicit
//! path-building function here and looked up with a loud failure on a miss.
//! Rank-4 kernels are stored channel-last and pass through the HWIO -> OIHW
//! permutation on the way in; vectors are copied as-is.

use anyhow::Result;

use crate::checkpoint::store::WeightStore;
use crate::error::ModelError;
use crate::layout;
use crate::model::{BitResNet, PreActBottleneck};
use crate::tensor::Tensor;

/// Key prefix used by checkpoints from the upstream training pipeline.
pub const DEFAULT_PREFIX: &str = "resnet/";

/// Key of the stem convolution kernel.
pub fn root_kernel_key(prefix: &str) -> String {
    format!("{prefix}root_block/standardized_conv2d/kernel")
}

/// Key of the head normalization scale (`gamma`) or shift (`beta`).
pub fn head_norm_key(prefix: &str, leaf: &str) -> String {
    format!("{prefix}group_norm/{leaf}")
}

/// Prefix of one residual unit, e.g. `resnet/block1/unit01/`.
///
/// `stage` and `unit` are 1-based to match the stored naming.
pub fn unit_prefix(prefix: &str, stage: usize, unit: usize) -> String {
    format!("{prefix}block{stage}/unit{unit:02}/")
}

/// Key of one of the unit's convolution kernels (`a`, `b`, or `c`).
pub fn unit_kernel_key(unit_prefix: &str, conv: &str) -> String {
    format!("{unit_prefix}{conv}/standardized_conv2d/kernel")
}

/// Key of one of the unit's normalization vectors.
pub fn unit_norm_key(unit_prefix: &str, conv: &str, leaf: &str) -> String {
    format!("{unit_prefix}{conv}/group_norm/{leaf}")
}

/// Key of the unit's projection kernel; only present when the unit owns a
/// projection shortcut.
pub fn unit_projection_key(unit_prefix: &str) -> String {
    format!("{unit_prefix}a/proj/standardized_conv2d/kernel")
}

/// Key of the head convolution kernel or bias.
pub fn head_conv_key(prefix: &str, leaf: &str) -> String {
    format!("{prefix}head/conv2d/{leaf}")
}

fn fetch(store: &WeightStore, key: &str) -> Result<Tensor> {
    let stored = store.get(key)?;
    layout::to_channel_first(key, stored)
}

fn assign(key: &str, param: &mut Tensor, value: Tensor) -> Result<()> {
    if param.shape() != value.shape() {
        return Err(ModelError::structural(format!(
            "checkpoint tensor '{}' has shape {:?}, parameter expects {:?}",
            key,
            value.shape().dims(),
            param.shape().dims()
        ))
        .into());
    }
    *param = value;
    Ok(())
}

fn import_unit(unit: &mut PreActBottleneck, store: &WeightStore, up: &str) -> Result<()> {
    for (conv_name, conv, gn) in [
        ("a", &mut unit.conv1, &mut unit.gn1),
        ("b", &mut unit.conv2, &mut unit.gn2),
        ("c", &mut unit.conv3, &mut unit.gn3),
    ] {
        let kernel_key = unit_kernel_key(up, conv_name);
        assign(&kernel_key, conv.weight_mut(), fetch(store, &kernel_key)?)?;

        let gamma_key = unit_norm_key(up, conv_name, "gamma");
        assign(&gamma_key, gn.weight_mut(), fetch(store, &gamma_key)?)?;
        let beta_key = unit_norm_key(up, conv_name, "beta");
        assign(&beta_key, gn.bias_mut(), fetch(store, &beta_key)?)?;
    }

    if let Some(proj) = unit.downsample.as_mut() {
        let proj_key = unit_projection_key(up);
        assign(&proj_key, proj.weight_mut(), fetch(store, &proj_key)?)?;
    }
    Ok(())
}

/// Populates every parameter of `model` from `store`, mutating in place and
/// returning the same handle for chaining.
///
/// Any missing required key aborts the import; the checkpoint is assumed
/// complete and there is no partial-import recovery.
pub fn load_weights<'a>(
    model: &'a mut BitResNet,
    store: &WeightStore,
    prefix: &str,
) -> Result<&'a mut BitResNet> {
    let root_key = root_kernel_key(prefix);
    assign(&root_key, model.root.weight_mut(), fetch(store, &root_key)?)?;

    let gamma_key = head_norm_key(prefix, "gamma");
    assign(&gamma_key, model.head_gn.weight_mut(), fetch(store, &gamma_key)?)?;
    let beta_key = head_norm_key(prefix, "beta");
    assign(&beta_key, model.head_gn.bias_mut(), fetch(store, &beta_key)?)?;

    for (stage_idx, stage) in [
        &mut model.block1,
        &mut model.block2,
        &mut model.block3,
        &mut model.block4,
    ]
    .into_iter()
    .enumerate()
    {
        for (unit_idx, unit) in stage.iter_mut().enumerate() {
            let up = unit_prefix(prefix, stage_idx + 1, unit_idx + 1);
            import_unit(unit, store, &up)?;
        }
    }

    if model.config().zero_head {
        // A class count differing from the checkpoint's makes the stored
        // head structurally incompatible; start the new head from zero.
        model.head_conv.weight_mut().fill(0.0);
        if let Some(bias) = model.head_conv.bias_mut() {
            bias.fill(0.0);
        }
    } else {
        let kernel_key = head_conv_key(prefix, "kernel");
        assign(
            &kernel_key,
            model.head_conv.weight_mut(),
            fetch(store, &kernel_key)?,
        )?;
        let bias_key = head_conv_key(prefix, "bias");
        let bias_value = fetch(store, &bias_key)?;
        match model.head_conv.bias_mut() {
            Some(bias) => assign(&bias_key, bias, bias_value)?,
            None => {
                return Err(ModelError::structural(
                    "head convolution has no bias parameter to import into",
                )
                .into())
            }
        }
    }

    Ok(model)
}

impl BitResNet {
    /// See [`load_weights`].
    pub fn load_weights(&mut self, store: &WeightStore, prefix: &str) -> Result<&mut Self> {
        load_weights(self, store, prefix)?;
        Ok(self)
    }
}
