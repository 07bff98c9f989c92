//! Quantization error types

use thiserror::Error;

/// Errors raised while deriving quantization parameters.
///
/// Every variant is a violated precondition of the quantization scheme, a
/// static property of the model and its calibration data. There is nothing
/// to retry; the host decides whether to abort the run or skip the layer.
#[derive(Debug, Error)]
pub enum QuantError {
    #[error("degenerate range for channel {channel}: min and max are both zero")]
    DegenerateRange { channel: usize },

    #[error("quantization scale is not positive for channel {channel}")]
    ZeroScale { channel: usize },

    #[error("collapsed quantization range: quant_min {quant_min} >= quant_max {quant_max}")]
    EmptyRange { quant_min: i32, quant_max: i32 },

    #[error("quantization range [{quant_min}, {quant_max}] does not fit uint8 storage")]
    RangeBeyondByte { quant_min: i32, quant_max: i32 },

    #[error("combined multiplier {0} outside (0, 1); unsupported rescaling ratio")]
    MultiplierOutOfRange(f32),

    #[error("malformed layer {index}: {reason}")]
    MalformedLayer { index: usize, reason: String },
}

/// Result type for quantization operations
pub type Result<T> = std::result::Result<T, QuantError>;
