use std::str::FromStr;

use bit_rs::model::PreActBottleneck;
use bit_rs::tensor::{Shape, Tensor};
use bit_rs::train::{evaluate, EvalPolicy};
use bit_rs::{BitResNet, BitResNetConfig, DepthVariant, ModelError};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn config(depth: DepthVariant, width_factor: usize, num_classes: usize) -> BitResNetConfig {
    BitResNetConfig {
        depth,
        width_factor,
        num_classes,
        zero_head: false,
    }
}

#[test]
fn depth_variants_define_unit_counts() {
    assert_eq!(DepthVariant::R50.unit_counts(), [3, 4, 6, 3]);
    assert_eq!(DepthVariant::R101.unit_counts(), [3, 4, 23, 3]);
    assert_eq!(DepthVariant::R152.unit_counts(), [3, 8, 36, 3]);

    assert_eq!(DepthVariant::from_str("R101").unwrap(), DepthVariant::R101);
    assert!(matches!(
        DepthVariant::from_str("r34"),
        Err(ModelError::Config(_))
    ));
}

#[test]
fn invalid_configs_are_rejected() {
    let err = BitResNet::new(&config(DepthVariant::R50, 0, 10)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelError>(),
        Some(ModelError::Config(_))
    ));

    let err = BitResNet::new(&config(DepthVariant::R50, 1, 0)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelError>(),
        Some(ModelError::Config(_))
    ));
}

#[test]
fn projection_exists_iff_stride_or_channels_change() {
    for cin in [128usize, 256] {
        for cout in [128usize, 256] {
            for stride in [1usize, 2] {
                let unit = PreActBottleneck::new(cin, Some(cout), None, stride).unwrap();
                let expected = stride != 1 || cin != cout;
                assert_eq!(
                    unit.has_projection(),
                    expected,
                    "cin={cin} cout={cout} stride={stride}"
                );
                assert_eq!(unit.in_channels(), cin);
                assert_eq!(unit.mid_channels(), cout / 4);
                assert_eq!(unit.out_channels(), cout);
            }
        }
    }
}

#[test]
fn stages_follow_the_channel_progression() {
    let model = BitResNet::new(&config(DepthVariant::R50, 1, 10)).unwrap();
    let stages = model.stages();
    let expected_units = [3usize, 4, 6, 3];
    let expected_mid = [64usize, 128, 256, 512];
    let expected_out = [256usize, 512, 1024, 2048];

    let mut cin = 64usize;
    for (stage_idx, stage) in stages.into_iter().enumerate() {
        assert_eq!(stage.len(), expected_units[stage_idx], "stage {stage_idx}");
        for (unit_idx, unit) in stage.iter().enumerate() {
            // Only the stage entry unit changes channels or stride.
            assert_eq!(unit.has_projection(), unit_idx == 0);
            let expected_cin = if unit_idx == 0 {
                cin
            } else {
                expected_out[stage_idx]
            };
            assert_eq!(unit.in_channels(), expected_cin);
            assert_eq!(unit.mid_channels(), expected_mid[stage_idx]);
            assert_eq!(unit.out_channels(), expected_out[stage_idx]);
        }
        cin = expected_out[stage_idx];
    }
}

#[test]
fn deeper_variants_share_the_assembly_rules() {
    let model = BitResNet::new(&config(DepthVariant::R152, 1, 10)).unwrap();
    for (stage, expected) in model
        .stages()
        .into_iter()
        .zip(DepthVariant::R152.unit_counts())
    {
        assert_eq!(stage.len(), expected);
        // The entry unit projects; the rest keep the identity shortcut.
        assert!(stage[0].has_projection());
        assert!(stage[1..].iter().all(|unit| !unit.has_projection()));
    }
}

#[test]
fn width_factor_scales_every_stage() {
    let model = BitResNet::new(&config(DepthVariant::R50, 2, 10)).unwrap();
    let stages = model.stages();
    assert_eq!(stages[0][0].in_channels(), 128);
    assert_eq!(stages[0][0].mid_channels(), 128);
    assert_eq!(stages[0][0].out_channels(), 512);
    assert_eq!(stages[3][0].out_channels(), 4096);

    let narrow = BitResNet::new(&config(DepthVariant::R50, 1, 10)).unwrap();
    assert!(model.num_parameters() > 2 * narrow.num_parameters());
}

#[test]
fn parameter_paths_mirror_the_hierarchy() {
    let model = BitResNet::new(&config(DepthVariant::R50, 1, 10)).unwrap();
    let mut names = Vec::new();
    model
        .for_each_parameter(|name, _| {
            names.push(name.to_string());
            Ok(())
        })
        .unwrap();

    for expected in [
        "root/weight",
        "block1/unit01/gn1/weight",
        "block1/unit01/conv1/weight",
        "block1/unit01/downsample/weight",
        "block2/unit01/downsample/weight",
        "block3/unit06/conv3/weight",
        "block4/unit03/gn3/bias",
        "head/gn/weight",
        "head/conv/weight",
        "head/conv/bias",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    // Interior units keep the identity shortcut.
    assert!(!names.iter().any(|n| n == "block1/unit02/downsample/weight"));
}

#[test]
fn forward_produces_one_logit_row_per_sample() {
    let mut rng = StdRng::seed_from_u64(42);
    let model = BitResNet::random(&config(DepthVariant::R50, 1, 10), &mut rng).unwrap();

    let x = Tensor::randn(Shape::new([2, 3, 32, 32]), 1.0, &mut rng);
    let logits = model.forward(&x).unwrap();
    assert_eq!(logits.shape().dims(), &[2, 10]);
    assert!(logits.data().iter().all(|v| v.is_finite()));
}

#[test]
fn forward_rejects_non_nchw_input() {
    let model = BitResNet::new(&config(DepthVariant::R50, 1, 10)).unwrap();
    let x = Tensor::zeros(Shape::new([3, 32, 32]));
    assert!(model.forward(&x).is_err());
}

#[test]
fn evaluation_stops_at_the_sample_cap() {
    let mut rng = StdRng::seed_from_u64(7);
    let model = BitResNet::random(&config(DepthVariant::R50, 1, 10), &mut rng).unwrap();

    let batches: Vec<(Tensor, Vec<usize>)> = (0..4)
        .map(|i| {
            let x = Tensor::randn(Shape::new([1, 3, 16, 16]), 1.0, &mut rng);
            (x, vec![i % 10])
        })
        .collect();

    let capped = evaluate(
        &model,
        batches.clone(),
        EvalPolicy {
            sample_cap: Some(2),
        },
    )
    .unwrap();
    assert_eq!(capped.samples, 2);

    let full = evaluate(&model, batches, EvalPolicy::default()).unwrap();
    assert_eq!(full.samples, 4);
    assert!(full.loss.is_finite());
    assert!((0.0..=1.0).contains(&full.accuracy));
}
