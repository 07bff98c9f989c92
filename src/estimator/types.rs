//! Quantization policy, range, and parameter types

use serde::{Deserialize, Serialize};

use crate::error::{QuantError, Result};

/// What a tensor is being quantized as, and therefore which side effects
/// the estimator applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantPolicy {
    /// Static weight statistics: true uint8 output plus fake-quant writeback.
    Weight,
    /// Activations during training/calibration: smoothed range, fake-quant
    /// writeback.
    Activation,
    /// Network input: smoothed range, parameters only, tensor untouched.
    Input,
}

impl QuantPolicy {
    /// Whether fresh min/max are blended into the running estimate.
    pub fn smooths_range(self) -> bool {
        matches!(self, QuantPolicy::Activation | QuantPolicy::Input)
    }

    /// Whether elements are rewritten with their fake-quantized
    /// reconstruction.
    pub fn rewrites_tensor(self) -> bool {
        !matches!(self, QuantPolicy::Input)
    }

    /// Whether a true uint8 copy is emitted.
    pub fn emits_integers(self) -> bool {
        matches!(self, QuantPolicy::Weight)
    }
}

/// Target integer range for quantization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantRange {
    pub quant_min: i32,
    pub quant_max: i32,
}

impl QuantRange {
    /// Full unsigned 8-bit range `[0, 255]`.
    pub fn uint8() -> Self {
        Self {
            quant_min: 0,
            quant_max: 255,
        }
    }

    /// Number of integer steps spanned by the range.
    pub fn width(&self) -> i32 {
        self.quant_max - self.quant_min
    }

    /// A collapsed or inverted range has no valid encoding, and zero
    /// points are stored as `u8`, so the range must also fit one.
    pub fn validate(&self) -> Result<()> {
        if self.quant_min >= self.quant_max {
            return Err(QuantError::EmptyRange {
                quant_min: self.quant_min,
                quant_max: self.quant_max,
            });
        }
        if self.quant_min < 0 || self.quant_max > 255 {
            return Err(QuantError::RangeBeyondByte {
                quant_min: self.quant_min,
                quant_max: self.quant_max,
            });
        }
        Ok(())
    }

    /// Clamp an integer code into the range.
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.quant_min, self.quant_max)
    }
}

impl Default for QuantRange {
    fn default() -> Self {
        Self::uint8()
    }
}

/// Per-channel scale and zero-point for one tensor.
///
/// Invariants once computed: every scale is nonzero and every zero-point
/// already lies inside the target range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Real value represented by one integer step, per channel.
    pub scales: Vec<f32>,
    /// Integer code representing real zero, per channel.
    pub zero_points: Vec<u8>,
}

impl ChannelParams {
    /// Zero-filled parameters for `channels` channels.
    pub fn with_channels(channels: usize) -> Self {
        Self {
            scales: vec![0.0; channels],
            zero_points: vec![0; channels],
        }
    }

    pub fn num_channels(&self) -> usize {
        self.scales.len()
    }

    /// Whether a real estimation pass has filled these parameters in.
    pub fn is_computed(&self) -> bool {
        !self.scales.is_empty() && self.scales.iter().all(|s| *s != 0.0)
    }
}
