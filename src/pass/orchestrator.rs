//! Forward-ordered quantization of a layer sequence.

use log::info;

use crate::error::{QuantError, Result};
use crate::estimator::{QuantPolicy, QuantRange, RangeEstimator};
use crate::fixedpoint::quantize_multiplier_smaller_than_one;
use crate::network::{fold_biases, fold_weights, Layer, LayerKind, Network};

/// Quantize every flagged layer of the network, in forward order.
///
/// Layer `i`'s input encoding is a snapshot of layer `i - 1`'s finalized
/// activation encoding (one layer's quantized output buffer is literally
/// the next layer's input buffer, so they must share one encoding). The
/// traversal is strictly sequential; no other pass may overlap it.
///
/// Preconditions: activation parameters must already be calibrated (see
/// [`Layer::observe_activations`]) and the first quantized layer must
/// carry input parameters (see [`Network::observe_input`]). Weight
/// parameters are calibrated here from the folded weights when a
/// training pass has not produced them already.
pub fn quantize_network(net: &mut Network) -> Result<()> {
    for i in 0..net.len() {
        let (finalized, rest) = net.layers_mut().split_at_mut(i);
        let previous = finalized.last();
        let layer = &mut rest[0];
        if !layer.quantize {
            continue;
        }

        match layer.kind {
            LayerKind::Convolutional => quantize_convolutional(layer, previous)?,
            LayerKind::MaxPool | LayerKind::Route => inherit_encoding(layer, previous),
        }
    }
    Ok(())
}

/// Derive weight scale/zero-point for a layer from its current weight
/// buffer, without touching the float weights.
///
/// Training with fake quantization produces these parameters as a side
/// effect; post-training flows call this instead. Must run after
/// batch-norm folding so the statistics match what inference computes;
/// [`quantize_network`] invokes it at the right point on its own.
pub fn calibrate_weights(layer: &mut Layer) -> Result<()> {
    let mut estimator = RangeEstimator::uint8(QuantPolicy::Weight, 1, 0.0);
    let mut staging = layer.weights.clone();
    layer.quant.weight_params = estimator.estimate(&mut staging, None)?;
    Ok(())
}

fn quantize_convolutional(layer: &mut Layer, previous: Option<&Layer>) -> Result<()> {
    let dims = layer.dims;
    if dims.groups == 0 {
        return Err(malformed(layer, "groups is zero"));
    }
    if dims.in_channels == 0 || dims.out_channels == 0 {
        return Err(malformed(layer, "channel count is zero"));
    }
    if layer.weights.is_empty() {
        return Err(malformed(layer, "weight buffer is empty"));
    }
    if layer.weights.len() % dims.out_channels != 0 {
        return Err(malformed(layer, "weight buffer does not match geometry"));
    }
    if layer.biases.len() != dims.out_channels {
        return Err(malformed(layer, "bias buffer does not match output channels"));
    }
    if let Some(bn) = &layer.batch_norm {
        let spatial = dims.kernel_area() * dims.in_channels / dims.groups;
        if spatial == 0 || layer.weights.len() != dims.out_channels * spatial {
            return Err(malformed(layer, "weight buffer does not match geometry"));
        }
        if bn.scales.len() < dims.out_channels
            || bn.rolling_mean.len() < dims.out_channels
            || bn.rolling_variance.len() < dims.out_channels
        {
            return Err(malformed(
                layer,
                "batch-norm statistics shorter than output channels",
            ));
        }
    }

    // Quantization sees the weights inference will actually use. The
    // statistics are consumed by the fold, so it runs at most once.
    if let Some(bn) = layer.batch_norm.take() {
        let spatial = dims.kernel_area() * dims.in_channels / dims.groups;
        fold_weights(&mut layer.weights, &bn.rolling_variance, &bn.scales, spatial);
        fold_biases(&mut layer.biases, &bn.rolling_mean, &bn.rolling_variance, &bn.scales);
    }

    if !layer.quant.weight_params.is_computed() {
        calibrate_weights(layer)?;
    }
    let weight_scale = layer.quant.weight_params.scales[0];
    if weight_scale <= 0.0 {
        return Err(QuantError::ZeroScale { channel: 0 });
    }
    let weight_zero_point = i32::from(layer.quant.weight_params.zero_points[0]);

    // True uint8 weights, clamped into the target range.
    let range = QuantRange::uint8();
    layer.quant.weights = layer
        .weights
        .iter()
        .map(|&w| range.clamp((w / weight_scale).round() as i32 + weight_zero_point) as u8)
        .collect();

    // The previous layer's quantized output is this layer's quantized
    // input; copy its finalized activation encoding.
    if let Some(prev) = previous {
        layer.quant.input_params = prev.quant.activ_params.clone();
    }
    if !layer.quant.input_params.is_computed() {
        return Err(malformed(layer, "input quantization parameters missing"));
    }
    let input_scale = layer.quant.input_params.scales[0];
    let input_zero_point = i32::from(layer.quant.input_params.zero_points[0]);

    // Zero-point cross terms of (a - za) * (w - zw), precomputed so the
    // integer convolution can add them back per output channel.
    let kernel_stack = dims.in_channels * dims.kernel_area();
    let mult_zero_point = kernel_stack as i32 * input_zero_point * weight_zero_point;
    layer.quant.mult_zero_point = mult_zero_point;

    let per_filter = layer.quant.weights.len() / dims.out_channels;
    layer.quant.weight_sums = layer
        .quant
        .weights
        .chunks(per_filter)
        .map(|filter| {
            let sum: i32 = filter.iter().map(|&w| i32::from(w)).sum();
            mult_zero_point - sum * input_zero_point
        })
        .collect();

    if !layer.quant.activ_params.is_computed() {
        return Err(malformed(layer, "activation parameters not calibrated"));
    }
    let activ_scale = layer.quant.activ_params.scales[0];
    let activ_zero_point = i32::from(layer.quant.activ_params.zero_points[0]);

    // Combined rescaling ratio mapping the int32 accumulator back to the
    // uint8 activation range.
    let m = input_scale * weight_scale / activ_scale;
    if m <= 0.0 || m >= 1.0 {
        return Err(QuantError::MultiplierOutOfRange(m));
    }
    layer.quant.m = m;
    layer.quant.requant = quantize_multiplier_smaller_than_one(m);

    let bias_scale = input_scale * weight_scale;
    layer.quant.biases = layer
        .biases
        .iter()
        .map(|&b| (b / bias_scale).round() as i32)
        .collect();

    info!(
        "layer {:3} [conv] input  scale {:.6} zero {:3}",
        layer.index, input_scale, input_zero_point
    );
    info!(
        "layer {:3} [conv] weight scale {:.6} zero {:3}",
        layer.index, weight_scale, weight_zero_point
    );
    info!(
        "layer {:3} [conv] activ  scale {:.6} zero {:3} M {:.6}",
        layer.index, activ_scale, activ_zero_point, m
    );
    Ok(())
}

/// Pooling and route layers reshuffle values without changing them, so
/// they adopt their predecessor's activation encoding wholesale.
fn inherit_encoding(layer: &mut Layer, previous: Option<&Layer>) {
    if let Some(prev) = previous {
        layer.quant.input_params = prev.quant.activ_params.clone();
        layer.quant.activ_params = prev.quant.activ_params.clone();
    }
    if let (Some(scale), Some(zero)) = (
        layer.quant.activ_params.scales.first(),
        layer.quant.activ_params.zero_points.first(),
    ) {
        info!(
            "layer {:3} [pass] activ  scale {:.6} zero {:3}",
            layer.index, scale, zero
        );
    }
}

fn malformed(layer: &Layer, reason: &str) -> QuantError {
    QuantError::MalformedLayer {
        index: layer.index,
        reason: reason.to_string(),
    }
}
