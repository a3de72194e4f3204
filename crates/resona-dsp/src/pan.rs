use std::f32::consts::FRAC_PI_4;

/// Equal-power pan gains for `pan` in `[-1, 1]`: `(left, right)`.
#[inline]
pub fn constant_power(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}
