//! Spherical Mercator projection, parameterized like a map-projection
//! builder: a geographic `center` that lands on `translate`, and a `scale`
//! in output units per radian.

use super::Vec2;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MercatorProjection {
    /// `[lon, lat]` in degrees.
    pub center: [f64; 2],
    pub scale: f64,
    pub translate: [f64; 2],
}

impl MercatorProjection {
    pub fn new(center: [f64; 2], scale: f64) -> Self {
        Self {
            center,
            scale,
            translate: [0.0, 0.0],
        }
    }

    pub fn with_translate(mut self, translate: [f64; 2]) -> Self {
        self.translate = translate;
        self
    }

    /// Project `[lon, lat]` (degrees) to planar `[x, y]`, y pointing down.
    ///
    /// Returns `None` when the result is not finite (e.g. at the poles).
    pub fn project(&self, lon_lat: [f64; 2]) -> Option<Vec2> {
        let (x, y) = mercator_raw(lon_lat[0].to_radians(), lon_lat[1].to_radians());
        let (cx, cy) = mercator_raw(self.center[0].to_radians(), self.center[1].to_radians());
        let out = Vec2::new(
            self.translate[0] + self.scale * (x - cx),
            self.translate[1] - self.scale * (y - cy),
        );
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }

    /// Inverse of `project`, returning `[lon, lat]` in degrees.
    pub fn invert(&self, p: Vec2) -> Option<[f64; 2]> {
        if self.scale == 0.0 {
            return None;
        }
        let (cx, cy) = mercator_raw(self.center[0].to_radians(), self.center[1].to_radians());
        let x = (p.x - self.translate[0]) / self.scale + cx;
        let y = (self.translate[1] - p.y) / self.scale + cy;
        let lat = 2.0 * y.exp().atan() - std::f64::consts::FRAC_PI_2;
        let out = [x.to_degrees(), lat.to_degrees()];
        (out[0].is_finite() && out[1].is_finite()).then_some(out)
    }
}

fn mercator_raw(lambda: f64, phi: f64) -> (f64, f64) {
    (
        lambda,
        (std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln(),
    )
}
