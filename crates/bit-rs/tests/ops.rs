use bit_rs::nn::{Conv2d, StdConv2d};
use bit_rs::ops::functional::{
    conv2d, global_avg_pool2d, group_norm, max_pool2d, pad2d, relu, Conv2dParams2d, Padding2d,
};
use bit_rs::tensor::{Shape, Tensor};
use bit_rs::train::{cross_entropy, top1_accuracy};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn params(kernel: usize, stride: usize, padding: usize) -> Conv2dParams2d {
    Conv2dParams2d {
        kernel: [kernel, kernel],
        stride: [stride, stride],
        dilation: [1, 1],
        padding: Padding2d::uniform(padding),
        groups: 1,
    }
}

#[test]
fn conv2d_matches_hand_computed_case() {
    let x = Tensor::from_vec(
        Shape::new([1, 1, 3, 3]),
        (1..=9).map(|v| v as f32).collect(),
    )
    .unwrap();
    let weight = Tensor::ones(Shape::new([1, 1, 2, 2]));
    let out = conv2d(&x, &weight, None, params(2, 1, 0)).unwrap();
    assert_eq!(out.shape().dims(), &[1, 1, 2, 2]);
    assert_eq!(out.data(), &[12.0, 16.0, 24.0, 28.0]);
}

#[test]
fn conv2d_applies_bias_and_padding() {
    let x = Tensor::ones(Shape::new([1, 1, 2, 2]));
    let weight = Tensor::ones(Shape::new([1, 1, 3, 3]));
    let bias = Tensor::from_vec(Shape::new([1]), vec![0.5]).unwrap();
    let out = conv2d(&x, &weight, Some(&bias), params(3, 1, 1)).unwrap();
    assert_eq!(out.shape().dims(), &[1, 1, 2, 2]);
    // Every output position sees the full 2x2 input plus the bias.
    assert_eq!(out.data(), &[4.5, 4.5, 4.5, 4.5]);
}

#[test]
fn conv2d_rejects_mismatched_weight() {
    let x = Tensor::ones(Shape::new([1, 4, 4, 4]));
    let weight = Tensor::ones(Shape::new([2, 3, 3, 3]));
    assert!(conv2d(&x, &weight, None, params(3, 1, 1)).is_err());
}

#[test]
fn group_norm_normalizes_each_group() {
    let x = Tensor::from_vec(
        Shape::new([1, 4, 1, 2]),
        vec![1.0, 3.0, 5.0, 7.0, -2.0, 0.0, 2.0, 4.0],
    )
    .unwrap();
    let gamma = Tensor::ones(Shape::new([4]));
    let beta = Tensor::zeros(Shape::new([4]));
    let out = group_norm(&x, &gamma, &beta, 2, 1e-5).unwrap();

    // Each group of 2 channels x 2 spatial positions is centred and scaled.
    for group in 0..2 {
        let slice = &out.data()[group * 4..(group + 1) * 4];
        let mean: f32 = slice.iter().sum::<f32>() / 4.0;
        let var: f32 = slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5, "group {group} mean {mean}");
        assert!((var - 1.0).abs() < 1e-3, "group {group} var {var}");
    }
}

#[test]
fn group_norm_applies_affine() {
    let x = Tensor::from_vec(Shape::new([1, 2, 1, 2]), vec![1.0, -1.0, 2.0, -2.0]).unwrap();
    let gamma = Tensor::from_vec(Shape::new([2]), vec![2.0, 0.0]).unwrap();
    let beta = Tensor::from_vec(Shape::new([2]), vec![0.0, 3.0]).unwrap();
    let out = group_norm(&x, &gamma, &beta, 2, 1e-5).unwrap();
    // Second channel's scale is zero, so only the shift survives.
    assert!((out.data()[2] - 3.0).abs() < 1e-5);
    assert!((out.data()[3] - 3.0).abs() < 1e-5);
}

#[test]
fn max_pool_takes_window_maximum() {
    let x = Tensor::from_vec(
        Shape::new([1, 1, 4, 4]),
        (0..16).map(|v| v as f32).collect(),
    )
    .unwrap();
    let out = max_pool2d(&x, [2, 2], [2, 2], Padding2d::zero()).unwrap();
    assert_eq!(out.shape().dims(), &[1, 1, 2, 2]);
    assert_eq!(out.data(), &[5.0, 7.0, 13.0, 15.0]);
}

#[test]
fn pad2d_writes_constant_border() {
    let x = Tensor::ones(Shape::new([1, 1, 2, 2]));
    let out = pad2d(&x, Padding2d::uniform(1), 0.0).unwrap();
    assert_eq!(out.shape().dims(), &[1, 1, 4, 4]);
    assert_eq!(out.data()[0], 0.0);
    assert_eq!(out.data()[5], 1.0);
    assert_eq!(out.data()[15], 0.0);
}

#[test]
fn pad_then_pool_differs_from_pool_with_negative_inputs() {
    // A zero pad admits zero into the window; the pool's own padding never
    // beats interior values. With all-negative inputs the two disagree.
    let x = Tensor::full(Shape::new([1, 1, 3, 3]), -5.0);
    let padded = pad2d(&x, Padding2d::uniform(1), 0.0).unwrap();
    let pooled_after_pad = max_pool2d(&padded, [3, 3], [2, 2], Padding2d::zero()).unwrap();
    let pooled_direct = max_pool2d(&x, [3, 3], [2, 2], Padding2d::uniform(1)).unwrap();
    assert_eq!(pooled_after_pad.data()[0], 0.0);
    assert_eq!(pooled_direct.data()[0], -5.0);
}

#[test]
fn relu_clamps_to_zero_floor() {
    let x = Tensor::from_vec(Shape::new([4]), vec![-1.0, 0.0, 0.5, 2.0]).unwrap();
    assert_eq!(relu(&x).data(), &[0.0, 0.0, 0.5, 2.0]);
}

#[test]
fn global_avg_pool_collapses_spatial_axes() {
    let x = Tensor::from_vec(
        Shape::new([1, 2, 2, 2]),
        vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0],
    )
    .unwrap();
    let out = global_avg_pool2d(&x).unwrap();
    assert_eq!(out.shape().dims(), &[1, 2, 1, 1]);
    assert_eq!(out.data(), &[2.5, 25.0]);
}

#[test]
fn standardized_weight_has_zero_mean_unit_variance() {
    let mut rng = StdRng::seed_from_u64(5);
    let weight = Tensor::randn(Shape::new([8, 4, 3, 3]), 0.7, &mut rng);
    let conv = StdConv2d::new(
        weight,
        None,
        Conv2dParams2d {
            kernel: [3, 3],
            stride: [1, 1],
            dilation: [1, 1],
            padding: Padding2d::uniform(1),
            groups: 1,
        },
    )
    .unwrap();

    let standardized = conv.standardized_weight();
    let filter_len = 4 * 3 * 3;
    for o in 0..8 {
        let filter = &standardized.data()[o * filter_len..(o + 1) * filter_len];
        let mean: f32 = filter.iter().sum::<f32>() / filter_len as f32;
        let var: f32 =
            filter.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / filter_len as f32;
        assert!(mean.abs() < 1e-5, "filter {o} mean {mean}");
        assert!((var - 1.0).abs() < 1e-3, "filter {o} var {var}");
    }
}

#[test]
fn standardization_does_not_mutate_the_raw_weight() {
    let mut rng = StdRng::seed_from_u64(6);
    let weight = Tensor::randn(Shape::new([4, 4, 3, 3]), 0.3, &mut rng);
    let raw = weight.clone();
    let conv = StdConv2d::new(
        weight,
        None,
        Conv2dParams2d {
            kernel: [3, 3],
            stride: [1, 1],
            dilation: [1, 1],
            padding: Padding2d::uniform(1),
            groups: 1,
        },
    )
    .unwrap();

    let x = Tensor::randn(Shape::new([1, 4, 5, 5]), 1.0, &mut rng);
    let first = conv.forward(&x).unwrap();
    let second = conv.forward(&x).unwrap();
    assert_eq!(first, second);
    assert_eq!(conv.weight(), &raw);
}

#[test]
fn plain_conv_applies_its_kernel_as_stored() {
    // A constant kernel is the degenerate case: standardization maps it to
    // exactly zero, while a plain convolution sums the input channels.
    let x = Tensor::from_vec(
        Shape::new([1, 3, 1, 2]),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap();
    let weight = Tensor::ones(Shape::new([2, 3, 1, 1]));

    let plain = Conv2d::new(weight.clone(), None, params(1, 1, 0)).unwrap();
    let out = plain.forward(&x).unwrap();
    // Channel sums per spatial position, repeated for both output filters.
    assert_eq!(out.data(), &[9.0, 12.0, 9.0, 12.0]);

    let standardized = StdConv2d::new(weight, None, params(1, 1, 0)).unwrap();
    let out = standardized.forward(&x).unwrap();
    assert!(out.data().iter().all(|&v| v == 0.0));
}

#[test]
fn cross_entropy_and_accuracy_agree_with_hand_computation() {
    let logits = Tensor::from_vec(
        Shape::new([2, 3]),
        vec![2.0, 0.0, 0.0, 0.0, 0.0, 4.0],
    )
    .unwrap();
    let loss = cross_entropy(&logits, &[0, 2]).unwrap();
    // Both rows put most mass on the target class, so the loss is small.
    let expected_row0 = -(2.0f32.exp() / (2.0f32.exp() + 2.0)).ln();
    let expected_row1 = -(4.0f32.exp() / (4.0f32.exp() + 2.0)).ln();
    assert!((loss - (expected_row0 + expected_row1) / 2.0).abs() < 1e-5);

    assert_eq!(top1_accuracy(&logits, &[0, 2]).unwrap(), 1.0);
    assert_eq!(top1_accuracy(&logits, &[1, 2]).unwrap(), 0.5);
    assert!(cross_entropy(&logits, &[0, 3]).is_err());
}
