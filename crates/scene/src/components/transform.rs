use foundation::math::{Mat4, Vec3};

/// Local transform: translation, Euler rotation (XYZ order, radians), scale.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    pub fn translate(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    pub fn with_rotation_x(mut self, angle: f64) -> Self {
        self.rotation.x = angle;
        self
    }

    pub fn with_uniform_scale(mut self, s: f64) -> Self {
        self.scale = Vec3::splat(s);
        self
    }

    /// Planar geometry authored in XY, laid onto the XZ ground plane.
    pub fn lay_flat(position: Vec3) -> Self {
        Self::translate(position).with_rotation_x(-std::f64::consts::FRAC_PI_2)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_trs(self.position, self.rotation, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::Transform;
    use foundation::math::Vec3;

    #[test]
    fn identity_is_origin() {
        let transform = Transform::identity();
        assert_eq!(transform.position, Vec3::ZERO);
        assert_eq!(transform.scale, Vec3::ONE);
    }

    #[test]
    fn lay_flat_maps_local_y_to_negative_world_z() {
        let m = Transform::lay_flat(Vec3::new(0.0, 2.0, 0.0)).matrix();
        let p = m.transform_point(Vec3::new(1.0, 3.0, 0.0));
        assert!((p - Vec3::new(1.0, 2.0, -3.0)).length() < 1e-9);
    }
}
