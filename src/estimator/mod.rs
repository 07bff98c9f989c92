//! Range estimation and quantization parameter derivation
//!
//! Given a tensor viewed as `channels x features`, derives per-channel
//! scale and zero-point for a target integer range and, depending on the
//! [`QuantPolicy`], rewrites the tensor with its fake-quantized
//! reconstruction and/or emits a true uint8 copy:
//!
//! - **Weight**: static statistics, uint8 output plus fake-quant writeback.
//! - **Activation**: EMA-smoothed running range, fake-quant writeback
//!   (quantization-aware training keeps storage in floating point).
//! - **Input**: EMA-smoothed running range, parameters only; the integer
//!   cast happens elsewhere at inference time.

mod estimator;
mod metrics;
mod types;

pub use estimator::RangeEstimator;
pub use metrics::quantization_mse;
pub use types::{ChannelParams, QuantPolicy, QuantRange};
