//! Whole-network quantization pass
//!
//! Walks the layer sequence in forward order and fills each quant-flagged
//! layer's [`crate::network::LayerQuant`] record: batch-norm folding,
//! uint8 weight quantization, cross-layer propagation of the activation
//! encoding, zero-point cross-term corrections, the combined rescaling
//! multiplier and its fixed-point decomposition, and integer biases.

mod orchestrator;

pub use orchestrator::{calibrate_weights, quantize_network};
