//! 8-bit quantization support for CNN inference.
//!
//! Converts floating-point weights and activations into 8-bit fixed-point
//! representations and derives the integer-arithmetic parameters needed to
//! run inference with integer operations only:
//!
//! - **Fixed-point multiplier derivation**: turn a sub-unity rescaling ratio
//!   into an `i32` multiplier plus right-shift usable in place of a float
//!   multiply.
//! - **Range estimation**: per-channel min/max (optionally EMA-smoothed),
//!   scale and zero-point derivation, fake quantization for
//!   quantization-aware training, and true uint8 quantization for weights.
//! - **Network quantization pass**: a forward-ordered walk over a layer
//!   sequence that folds batch normalization, quantizes weights, threads
//!   activation encodings from layer to layer, and stores the per-layer
//!   requantization parameters.
//!
//! The crate is a library invoked by a host inference/training engine. It
//! operates on buffers the host owns and mutates them in place; it performs
//! no I/O of its own.

pub mod error;
pub mod estimator;
pub mod fixedpoint;
pub mod network;
pub mod pass;

pub use error::{QuantError, Result};
pub use estimator::{
    quantization_mse, ChannelParams, QuantPolicy, QuantRange, RangeEstimator,
};
pub use fixedpoint::{quantize_multiplier_smaller_than_one, FixedPointMultiplier};
pub use network::{BatchNorm, ConvDims, Layer, LayerKind, LayerQuant, Network};
pub use pass::{calibrate_weights, quantize_network};
