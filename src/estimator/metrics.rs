//! Quantization error metrics

/// Mean squared error between a tensor and its quantized reconstruction.
///
/// Useful for judging per-layer accuracy loss after fake quantization.
/// Mismatched or empty inputs yield `f32::MAX` rather than a misleading
/// zero.
pub fn quantization_mse(original: &[f32], reconstructed: &[f32]) -> f32 {
    if original.len() != reconstructed.len() || original.is_empty() {
        return f32::MAX;
    }

    let sum_sq: f32 = original
        .iter()
        .zip(reconstructed.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();

    sum_sq / original.len() as f32
}
