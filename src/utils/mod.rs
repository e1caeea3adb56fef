//! Scalar math helpers shared by the activation and loss libraries.

/// Pre-activations are clamped into `[-SIGMOID_CLAMP, SIGMOID_CLAMP]` before
/// exponentiation; `exp(709)` is the largest power of e representable in f64.
pub const SIGMOID_CLAMP: f64 = 709.0;

/// Predictions are clipped into `[CLIP_VALUE, 1 - CLIP_VALUE]` before taking
/// logarithms or dividing by them.
pub const CLIP_VALUE: f64 = 1e-15;

/// Map a pre-activation onto the finite range: NaN becomes `0` and
/// infinities become `±f64::MAX`.
#[inline]
pub fn saturate(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-f64::MAX, f64::MAX)
    }
}

/// Logistic sigmoid with clamped input.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let x = x.clamp(-SIGMOID_CLAMP, SIGMOID_CLAMP);
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the sigmoid: f'(x) = f(x) (1 - f(x)).
#[inline]
pub fn d_sigmoid(x: f64) -> f64 {
    let s = sigmoid(x);
    s * (1.0 - s)
}

/// Clip a probability away from exact 0 and 1.
#[inline]
pub fn clip_probability(p: f64) -> f64 {
    p.clamp(CLIP_VALUE, 1.0 - CLIP_VALUE)
}
