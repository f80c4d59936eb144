//! Trade Size Opacity
//!
//! Maps a trade size onto a marker opacity so block prints stand out
//! against odd lots. The scale is logarithmic: one share renders at the
//! floor, ten thousand shares and above at full opacity.

/// Opacity given to the smallest trades.
pub const MIN_ALPHA: f64 = 0.2;

/// Opacity ceiling.
pub const MAX_ALPHA: f64 = 1.0;

/// Trade size that reaches [`MAX_ALPHA`].
pub const SATURATION_SIZE: f64 = 10_000.0;

/// Encode a trade size as an opacity in `[MIN_ALPHA, MAX_ALPHA]`.
///
/// `0.2 + 0.8 * ln(size) / ln(10000)`, clamped. Sizes below one share map
/// to the floor. Non-decreasing in `size`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn encode(size: u64) -> f64 {
    if size < 1 {
        return MIN_ALPHA;
    }

    let scaled = (size as f64).ln() / SATURATION_SIZE.ln();
    (MIN_ALPHA + (MAX_ALPHA - MIN_ALPHA) * scaled).clamp(MIN_ALPHA, MAX_ALPHA)
}
