//! Per-channel range estimator.

use log::debug;

use crate::error::{QuantError, Result};

use super::types::{ChannelParams, QuantPolicy, QuantRange};

/// Per-channel range estimator and quantization parameter computer.
///
/// Owns the running min/max state for its channels. The running state is
/// path-dependent across calibration batches; everything else is
/// deterministic given the input tensor.
#[derive(Clone, Debug)]
pub struct RangeEstimator {
    policy: QuantPolicy,
    range: QuantRange,
    decay: f32,
    running_min: Vec<f32>,
    running_max: Vec<f32>,
}

impl RangeEstimator {
    /// Create an estimator for `channels` channels.
    ///
    /// `decay` is the EMA weight kept by the running estimate on each
    /// observation; it only matters for policies that smooth their range.
    pub fn new(policy: QuantPolicy, channels: usize, range: QuantRange, decay: f32) -> Self {
        Self {
            policy,
            range,
            decay,
            running_min: vec![0.0; channels],
            running_max: vec![0.0; channels],
        }
    }

    /// Estimator targeting the full uint8 range.
    pub fn uint8(policy: QuantPolicy, channels: usize, decay: f32) -> Self {
        Self::new(policy, channels, QuantRange::uint8(), decay)
    }

    pub fn policy(&self) -> QuantPolicy {
        self.policy
    }

    pub fn num_channels(&self) -> usize {
        self.running_min.len()
    }

    /// Current running (min, max) estimate for a channel.
    pub fn running_range(&self, channel: usize) -> (f32, f32) {
        (self.running_min[channel], self.running_max[channel])
    }

    /// Estimate per-channel quantization parameters for `data`, applying
    /// the policy's side effects.
    ///
    /// `data` is viewed as `channels` contiguous runs of equal length. For
    /// tensor-rewriting policies every element is clamped into the
    /// effective range, snapped to the quantization grid, and written back
    /// as its dequantized reconstruction; the weight policy additionally
    /// stores the integer codes into `quantized` when a buffer is given.
    ///
    /// Fails when the target range is invalid, the effective range
    /// degenerates to zero, or the derived scale is not positive; each
    /// leaves the encoding undefined.
    pub fn estimate(
        &mut self,
        data: &mut [f32],
        mut quantized: Option<&mut [u8]>,
    ) -> Result<ChannelParams> {
        self.range.validate()?;

        let channels = self.running_min.len();
        assert!(channels > 0, "estimator has no channels");
        assert_eq!(
            data.len() % channels,
            0,
            "tensor length {} not divisible into {} channels",
            data.len(),
            channels
        );
        if let Some(out) = quantized.as_deref() {
            assert_eq!(out.len(), data.len(), "quantized buffer length mismatch");
        }
        let features = data.len() / channels;

        let mut params = ChannelParams::with_channels(channels);

        for ch in 0..channels {
            let span = ch * features..(ch + 1) * features;

            // Min/max seeded at zero so the zero point is always
            // representable.
            let mut min_value = 0.0f32;
            let mut max_value = 0.0f32;
            for &v in &data[span.clone()] {
                min_value = min_value.min(v);
                max_value = max_value.max(v);
            }

            if self.policy.smooths_range() {
                debug!(
                    "{:?} channel {ch}: fresh range [{min_value:.3}, {max_value:.3}]",
                    self.policy
                );
                self.running_min[ch] -= (self.running_min[ch] - min_value) * (1.0 - self.decay);
                self.running_max[ch] -= (self.running_max[ch] - max_value) * (1.0 - self.decay);
                min_value = self.running_min[ch];
                max_value = self.running_max[ch];
            }

            if min_value == 0.0 && max_value == 0.0 {
                return Err(QuantError::DegenerateRange { channel: ch });
            }

            let scale = (max_value - min_value) / self.range.width() as f32;
            if scale <= 0.0 {
                return Err(QuantError::ZeroScale { channel: ch });
            }

            // Candidate zero point in extended precision, clamped into the
            // range before rounding.
            let initial_zero_point =
                f64::from(self.range.quant_min) - f64::from(min_value) / f64::from(scale);
            let zero_point = if initial_zero_point < f64::from(self.range.quant_min) {
                self.range.quant_min
            } else if initial_zero_point > f64::from(self.range.quant_max) {
                self.range.quant_max
            } else {
                initial_zero_point.round() as i32
            };

            params.scales[ch] = scale;
            params.zero_points[ch] = zero_point as u8;

            if self.policy.rewrites_tensor() {
                for k in 0..features {
                    let index = ch * features + k;
                    let clamped = data[index].clamp(min_value, max_value);
                    let steps = ((clamped - min_value) / scale).round();
                    if self.policy.emits_integers() {
                        if let Some(out) = quantized.as_deref_mut() {
                            out[index] = steps as u8;
                        }
                    }
                    data[index] = steps * scale + min_value;
                }
            }
        }

        Ok(params)
    }
}
