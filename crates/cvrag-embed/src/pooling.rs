use anyhow::Result;
use candle_core::Tensor;

/// Attention-masked mean pooling over the token axis followed by L2
/// normalization. `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]`;
/// the result is `[B, H]` with unit norm per row.
///
/// Padding positions are zeroed before the mean so they contribute
/// nothing; the norm is floored to keep the division finite.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    assert_eq!(dims.len(), 3, "hidden shape must be [B,T,H]");
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask
        .to_device(hidden.device())?
        .to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let masked = hidden.broadcast_mul(&mask_3d)?;

    let summed = masked.sum(1)?;
    let token_counts = mask.sum(1)?.unsqueeze(1)?.to_dtype(summed.dtype())?;
    let mean = summed.broadcast_div(&token_counts)?;

    let eps = Tensor::new(&[1e-12f32], hidden.device())?
        .to_dtype(hidden.dtype())?
        .unsqueeze(0)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    let normalized = mean.broadcast_div(&norm)?;

    assert_eq!(normalized.dims(), &[batch, hidden_dim]);
    Ok(normalized)
}
