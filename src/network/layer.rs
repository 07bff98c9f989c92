//! Layer records and the ordered network they form.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::estimator::{ChannelParams, QuantPolicy, RangeEstimator};
use crate::fixedpoint::FixedPointMultiplier;

/// EMA decay used for activation and input range smoothing unless the
/// host configures its own.
pub(crate) const DEFAULT_DECAY: f32 = 0.99;

/// Layer kinds the quantization pass recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Convolutional,
    MaxPool,
    Route,
}

impl LayerKind {
    /// Whether the pass transforms this layer's weights and derives a
    /// requantization multiplier for it.
    pub fn transforms_weights(self) -> bool {
        matches!(self, LayerKind::Convolutional)
    }

    /// Whether the layer passes its predecessor's activation encoding
    /// through unchanged.
    pub fn inherits_encoding(self) -> bool {
        matches!(self, LayerKind::MaxPool | LayerKind::Route)
    }
}

/// Convolution geometry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConvDims {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Square kernel side length.
    pub kernel: usize,
    pub groups: usize,
}

impl ConvDims {
    pub fn kernel_area(&self) -> usize {
        self.kernel * self.kernel
    }
}

impl Default for ConvDims {
    fn default() -> Self {
        Self {
            in_channels: 0,
            out_channels: 0,
            kernel: 0,
            groups: 1,
        }
    }
}

/// Batch-normalization statistics carried by a convolutional layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchNorm {
    pub scales: Vec<f32>,
    pub rolling_mean: Vec<f32>,
    pub rolling_variance: Vec<f32>,
}

/// Per-layer quantization record, filled in by the quantization pass.
///
/// Input parameters are a snapshot copy of the preceding layer's
/// activation parameters, never a shared reference; finalizing layer `i`
/// cannot retroactively change layer `i + 1`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerQuant {
    /// Weight scale/zero-point, from static weight statistics.
    pub weight_params: ChannelParams,
    /// Input scale/zero-point; equals the previous layer's activation
    /// parameters for every layer but the first.
    pub input_params: ChannelParams,
    /// Activation (output) scale/zero-point from calibration.
    pub activ_params: ChannelParams,
    /// Weights quantized to uint8.
    pub weights: Vec<u8>,
    /// Biases converted to the int32 accumulator domain.
    pub biases: Vec<i32>,
    /// Per-output-channel zero-point cross-term correction.
    pub weight_sums: Vec<i32>,
    /// Constant part of the cross-term correction.
    pub mult_zero_point: i32,
    /// Combined rescaling ratio `input_scale * weight_scale / activ_scale`.
    pub m: f32,
    /// Fixed-point decomposition of `m`.
    pub requant: FixedPointMultiplier,
}

/// One layer of the network, as seen by the quantization pass.
#[derive(Clone, Debug)]
pub struct Layer {
    pub kind: LayerKind,
    /// Position in the network, used in diagnostics.
    pub index: usize,
    /// Whether this layer participates in quantization.
    pub quantize: bool,
    pub dims: ConvDims,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
    pub batch_norm: Option<BatchNorm>,
    /// Running range state for this layer's output activations.
    pub activ_estimator: RangeEstimator,
    pub quant: LayerQuant,
}

impl Layer {
    /// Convolutional layer over caller-provided weight and bias buffers.
    pub fn convolutional(index: usize, dims: ConvDims, weights: Vec<f32>, biases: Vec<f32>) -> Self {
        Self {
            kind: LayerKind::Convolutional,
            index,
            quantize: false,
            dims,
            weights,
            biases,
            batch_norm: None,
            activ_estimator: RangeEstimator::uint8(QuantPolicy::Activation, 1, DEFAULT_DECAY),
            quant: LayerQuant::default(),
        }
    }

    /// Max-pooling layer; carries no weights of its own.
    pub fn max_pool(index: usize) -> Self {
        Self::passthrough(LayerKind::MaxPool, index)
    }

    /// Route/concatenation layer; carries no weights of its own.
    pub fn route(index: usize) -> Self {
        Self::passthrough(LayerKind::Route, index)
    }

    fn passthrough(kind: LayerKind, index: usize) -> Self {
        Self {
            kind,
            index,
            quantize: false,
            dims: ConvDims::default(),
            weights: Vec::new(),
            biases: Vec::new(),
            batch_norm: None,
            activ_estimator: RangeEstimator::uint8(QuantPolicy::Activation, 1, DEFAULT_DECAY),
            quant: LayerQuant::default(),
        }
    }

    /// Attach batch-normalization statistics.
    pub fn with_batch_norm(mut self, batch_norm: BatchNorm) -> Self {
        self.batch_norm = Some(batch_norm);
        self
    }

    /// Flag the layer for quantization.
    pub fn with_quantization(mut self) -> Self {
        self.quantize = true;
        self
    }

    /// Feed one calibration batch of this layer's output activations
    /// through the running range estimator and refresh the activation
    /// parameters.
    ///
    /// The batch is rewritten with its fake-quantized reconstruction, the
    /// same values a quantization-aware forward pass would produce.
    pub fn observe_activations(&mut self, activations: &mut [f32]) -> Result<()> {
        self.quant.activ_params = self.activ_estimator.estimate(activations, None)?;
        Ok(())
    }
}

/// Ordered layer sequence.
///
/// The quantization pass holds exclusive access while it runs and reads
/// each layer's predecessor only after that predecessor is finalized, so
/// cross-layer parameter transfer is always a copy of completed state.
#[derive(Clone, Debug, Default)]
pub struct Network {
    layers: Vec<Layer>,
    input_estimator: Option<RangeEstimator>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            input_estimator: None,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Feed one calibration batch of network input and store the derived
    /// parameters as the first layer's input encoding.
    ///
    /// Uses the input policy: the running range is smoothed, the tensor is
    /// left untouched, and the integer cast happens at inference time.
    pub fn observe_input(&mut self, data: &mut [f32]) -> Result<()> {
        let estimator = self
            .input_estimator
            .get_or_insert_with(|| RangeEstimator::uint8(QuantPolicy::Input, 1, DEFAULT_DECAY));
        let params = estimator.estimate(data, None)?;
        if let Some(first) = self.layers.first_mut() {
            first.quant.input_params = params;
        }
        Ok(())
    }

    /// Override the default input estimator, e.g. to change range or decay.
    pub fn set_input_estimator(&mut self, estimator: RangeEstimator) {
        self.input_estimator = Some(estimator);
    }
}
