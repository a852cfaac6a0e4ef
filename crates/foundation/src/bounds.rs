use crate::math::Vec3;

/// Axis-aligned bounding boxes
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Inverted box: the identity for `extend`.
    pub fn empty() -> Self {
        Aabb2 {
            min: [f64::INFINITY; 2],
            max: [f64::NEG_INFINITY; 2],
        }
    }

    pub fn extend(&mut self, p: [f64; 2]) {
        for axis in 0..2 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }
}

impl Aabb3 {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Aabb3 { min, max }
    }

    pub fn empty() -> Self {
        Aabb3 {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn extend(&mut self, p: Vec3) {
        let p = [p.x, p.y, p.z];
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }
}

/// Planar map bounds in scene space (Y already flipped).
///
/// `width`/`height` are floored at 1 so downstream divisions are always
/// defined, even for a single point or an empty input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub width: f64,
    pub height: f64,
}

impl MapBounds {
    pub fn from_extent(extent: Aabb2) -> Self {
        Self {
            min_x: extent.min[0],
            max_x: extent.max[0],
            min_y: extent.min[1],
            max_y: extent.max[1],
            width: (extent.max[0] - extent.min[0]).max(1.0),
            height: (extent.max[1] - extent.min[1]).max(1.0),
        }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let mut extent = Aabb2::empty();
        for p in points {
            extent.extend(p);
        }
        Self::from_extent(extent)
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        ]
    }

    pub fn max_dimension(&self) -> f64 {
        self.width.max(self.height)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite()
    }
}
