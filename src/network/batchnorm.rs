//! Batch-normalization folding.
//!
//! Inference computes with batch norm folded into the convolution, so
//! quantization must operate on the post-fold effective weights and
//! biases.

/// Variance stabilizer used when folding.
pub const BN_EPSILON: f32 = 1e-6;

/// Fold batch-norm scaling into convolution weights in place.
///
/// Each output filter's weights are scaled by
/// `scale / sqrt(variance + epsilon)`; `spatial` is the number of weights
/// per filter.
pub fn fold_weights(weights: &mut [f32], variance: &[f32], scales: &[f32], spatial: usize) {
    for (f, chunk) in weights.chunks_mut(spatial).enumerate() {
        let factor = scales[f] / (variance[f] + BN_EPSILON).sqrt();
        for w in chunk {
            *w *= factor;
        }
    }
}

/// Fold batch-norm mean subtraction into convolution biases in place.
pub fn fold_biases(
    biases: &mut [f32],
    rolling_mean: &[f32],
    rolling_variance: &[f32],
    scales: &[f32],
) {
    for (f, bias) in biases.iter_mut().enumerate() {
        *bias -= scales[f] * rolling_mean[f] / (rolling_variance[f] + BN_EPSILON).sqrt();
    }
}
