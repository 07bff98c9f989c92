//! Tests for the layer data model and batch-norm folding.

use super::*;
use approx::assert_abs_diff_eq;

fn conv_dims() -> ConvDims {
    ConvDims {
        in_channels: 2,
        out_channels: 2,
        kernel: 1,
        groups: 1,
    }
}

#[test]
fn test_fold_weights() {
    // factor = scale / sqrt(variance + eps)
    let mut weights = vec![1.0, 2.0, 3.0, 4.0];
    let variance = vec![3.0, 0.0];
    let scales = vec![2.0, 5.0];

    fold_weights(&mut weights, &variance, &scales, 2);

    let f0 = 2.0 / (3.0f32 + BN_EPSILON).sqrt();
    let f1 = 5.0 / BN_EPSILON.sqrt();
    assert_abs_diff_eq!(weights[0], f0, epsilon = 1e-5);
    assert_abs_diff_eq!(weights[1], 2.0 * f0, epsilon = 1e-5);
    assert_abs_diff_eq!(weights[2], 3.0 * f1, epsilon = 1e-2);
    assert_abs_diff_eq!(weights[3], 4.0 * f1, epsilon = 1e-2);
}

#[test]
fn test_fold_biases() {
    let mut biases = vec![1.0, -1.0];
    let mean = vec![0.5, 2.0];
    let variance = vec![4.0, 1.0];
    let scales = vec![2.0, 3.0];

    fold_biases(&mut biases, &mean, &variance, &scales);

    assert_abs_diff_eq!(biases[0], 1.0 - 2.0 * 0.5 / (4.0f32 + BN_EPSILON).sqrt(), epsilon = 1e-5);
    assert_abs_diff_eq!(biases[1], -1.0 - 3.0 * 2.0 / (1.0f32 + BN_EPSILON).sqrt(), epsilon = 1e-5);
}

#[test]
fn test_layer_kind_capabilities() {
    assert!(LayerKind::Convolutional.transforms_weights());
    assert!(!LayerKind::MaxPool.transforms_weights());
    assert!(!LayerKind::Route.transforms_weights());

    assert!(!LayerKind::Convolutional.inherits_encoding());
    assert!(LayerKind::MaxPool.inherits_encoding());
    assert!(LayerKind::Route.inherits_encoding());
}

#[test]
fn test_conv_layer_builder() {
    let layer = Layer::convolutional(3, conv_dims(), vec![0.0; 4], vec![0.0; 2])
        .with_quantization()
        .with_batch_norm(BatchNorm {
            scales: vec![1.0, 1.0],
            rolling_mean: vec![0.0, 0.0],
            rolling_variance: vec![1.0, 1.0],
        });

    assert_eq!(layer.kind, LayerKind::Convolutional);
    assert_eq!(layer.index, 3);
    assert!(layer.quantize);
    assert!(layer.batch_norm.is_some());
    assert_eq!(layer.dims.kernel_area(), 1);
}

#[test]
fn test_passthrough_layers_carry_no_weights() {
    let pool = Layer::max_pool(1);
    assert_eq!(pool.kind, LayerKind::MaxPool);
    assert!(pool.weights.is_empty());
    assert!(!pool.quantize);

    let route = Layer::route(2).with_quantization();
    assert_eq!(route.kind, LayerKind::Route);
    assert!(route.quantize);
}

#[test]
fn test_observe_activations_fills_params() {
    let mut layer = Layer::convolutional(0, conv_dims(), vec![0.0; 4], vec![0.0; 2]);
    let mut activations = vec![-0.5, 1.5, 0.25, 0.75];

    layer.observe_activations(&mut activations).unwrap();

    assert!(layer.quant.activ_params.is_computed());
    assert_eq!(layer.quant.activ_params.num_channels(), 1);
}

#[test]
fn test_observe_input_targets_first_layer() {
    let mut net = Network::new(vec![
        Layer::convolutional(0, conv_dims(), vec![0.0; 4], vec![0.0; 2]),
        Layer::convolutional(1, conv_dims(), vec![0.0; 4], vec![0.0; 2]),
    ]);

    let mut input = vec![-1.0, 2.0, 0.5];
    let untouched = input.clone();
    net.observe_input(&mut input).unwrap();

    assert_eq!(input, untouched);
    assert!(net.layers()[0].quant.input_params.is_computed());
    assert!(!net.layers()[1].quant.input_params.is_computed());
}

#[test]
fn test_observe_input_smooths_across_batches() {
    let mut net = Network::new(vec![Layer::convolutional(
        0,
        conv_dims(),
        vec![0.0; 4],
        vec![0.0; 2],
    )]);

    net.observe_input(&mut [-1.0, 1.0]).unwrap();
    let first = net.layers()[0].quant.input_params.clone();

    net.observe_input(&mut [-1.0, 1.0]).unwrap();
    let second = net.layers()[0].quant.input_params.clone();

    // Running range keeps growing toward the batch range, so the scale
    // grows between the first two identical batches.
    assert!(second.scales[0] > first.scales[0]);
}
