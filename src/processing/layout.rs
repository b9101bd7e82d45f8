/// Size for a width-driven decode: at most `max_w` wide, aspect preserved,
/// never upscaled. The height bound is not part of the scaling math.
pub fn fit_width(src_w: u32, src_h: u32, max_w: u32) -> (u32, u32) {
    let src_w = src_w.max(1);
    let src_h = src_h.max(1);
    let max_w = max_w.max(1);
    if src_w <= max_w {
        return (src_w, src_h);
    }
    let h = (f64::from(src_h) * f64::from(max_w) / f64::from(src_w)).round();
    (max_w, (h as u32).max(1))
}

/// Largest size with the source aspect that fits inside the canvas. Small
/// sources are scaled up.
pub fn contain_size(src_w: u32, src_h: u32, canvas_w: u32, canvas_h: u32) -> (u32, u32) {
    let (sw, sh) = (u64::from(src_w.max(1)), u64::from(src_h.max(1)));
    let (cw, ch) = (u64::from(canvas_w.max(1)), u64::from(canvas_h.max(1)));
    // Width-bound when the source is at least as wide as the canvas, by aspect.
    let (w, h) = if sw * ch >= cw * sh {
        (cw, div_round(sh * cw, sw).clamp(1, ch))
    } else {
        (div_round(sw * ch, sh).clamp(1, cw), ch)
    };
    (w as u32, h as u32)
}

/// Top-left corner that centers an `inner` rectangle in `outer`.
pub fn centered_origin(inner: (u32, u32), outer: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}

fn div_round(num: u64, den: u64) -> u64 {
    (num + den / 2) / den
}

/// Canvas size for a monitor of `width`×`height` at the given oversample.
pub fn canvas_size(width: u32, height: u32, oversample: f32) -> (u32, u32) {
    let scale = if oversample.is_finite() && oversample > 0.0 {
        oversample
    } else {
        1.0
    };
    let w = (width.max(1) as f32 * scale).round().max(1.0);
    let h = (height.max(1) as f32 * scale).round().max(1.0);
    (w as u32, h as u32)
}
