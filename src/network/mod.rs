//! Layer and network data model
//!
//! The minimal layer representation the quantization pass needs: layer
//! kind, geometry, float weight/bias buffers, batch-normalization
//! statistics, and the mutable per-layer quantization record. The host
//! engine owns construction and inference; this crate only reads and
//! mutates the slots listed here.

mod batchnorm;
mod layer;
#[cfg(test)]
mod tests;

pub use batchnorm::{fold_biases, fold_weights, BN_EPSILON};
pub use layer::{BatchNorm, ConvDims, Layer, LayerKind, LayerQuant, Network};
