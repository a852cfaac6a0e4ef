//! Scalar helpers shared by ranking, picking and material ramps.

use core::cmp::Ordering;

/// Total order on `f64` where `-0.0 == 0.0` and every NaN compares equal.
///
/// Ranking display values and breaking ties between equidistant hits both
/// rely on this being reproducible across platforms.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    fold(a).total_cmp(&fold(b))
}

fn fold(v: f64) -> f64 {
    match v {
        v if v.is_nan() => f64::NAN,
        v if v == 0.0 => 0.0,
        v => v,
    }
}

/// Hermite ramp of `x` between two edges, clamped to `[0, 1]`.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
