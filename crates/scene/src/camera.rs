use serde::{Deserialize, Serialize};

use foundation::math::{Mat4, Vec3};

use crate::picking::Ray;

const POLAR_EPS: f64 = 1e-6;
const ROTATE_SPEED: f64 = 1.0;
const ZOOM_STEP: f64 = 0.95;

/// Orbit constraints applied after every camera move.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlLimits {
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_polar_angle: f64,
    pub max_polar_angle: f64,
}

impl Default for ControlLimits {
    fn default() -> Self {
        Self {
            min_distance: 68.0,
            max_distance: 250.0,
            min_polar_angle: std::f64::consts::PI / 6.0,
            max_polar_angle: std::f64::consts::PI / 2.05,
        }
    }
}

impl ControlLimits {
    pub fn new(min_distance: f64, max_distance: f64, min_polar: f64, max_polar: f64) -> Self {
        Self {
            min_distance,
            max_distance,
            min_polar_angle: min_polar,
            max_polar_angle: max_polar,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_distance.is_finite()
            && self.max_distance.is_finite()
            && self.min_distance >= 0.0
            && self.min_distance <= self.max_distance
            && self.min_polar_angle.is_finite()
            && self.max_polar_angle.is_finite()
            && self.min_polar_angle <= self.max_polar_angle
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DragMode {
    None,
    Rotate,
    Pan,
}

/// A point projected into viewport pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    /// NDC depth in `[0, 1]` when inside the clip volume.
    pub depth: f64,
    pub in_view: bool,
}

/// Perspective camera orbiting a target point, Y up.
///
/// Position and target are free to be written directly (tweens do this);
/// `update` then re-applies the limits the way orbit controls do on every
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_deg: f64,
    pub near: f64,
    pub far: f64,
    pub aspect: f64,
    pub limits: ControlLimits,
    drag: DragMode,
    last_px: [f64; 2],
}

impl OrbitCamera {
    pub fn new(position: Vec3, target: Vec3, aspect: f64) -> Self {
        Self {
            position,
            target,
            fov_y_deg: 50.0,
            near: 0.1,
            far: 1200.0,
            aspect: if aspect.is_finite() && aspect > 0.0 {
                aspect
            } else {
                1.0
            },
            limits: ControlLimits::default(),
            drag: DragMode::None,
            last_px: [0.0, 0.0],
        }
    }

    pub fn set_aspect(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn distance(&self) -> f64 {
        self.position.distance(self.target)
    }

    /// Angle from +Y to the eye offset.
    pub fn polar_angle(&self) -> f64 {
        let (_, _, phi) = self.spherical();
        phi
    }

    fn spherical(&self) -> (f64, f64, f64) {
        let offset = self.position - self.target;
        let radius = offset.length();
        if radius <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let theta = offset.x.atan2(offset.z);
        let phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
        (radius, theta, phi)
    }

    fn set_spherical(&mut self, radius: f64, theta: f64, phi: f64) {
        let sin_phi = phi.sin();
        self.position = self.target
            + Vec3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );
    }

    /// Clamp distance and polar angle; returns whether the eye moved.
    pub fn update(&mut self) -> bool {
        let before = self.position;
        let (radius, theta, phi) = self.spherical();
        if radius <= 0.0 {
            return false;
        }
        let l = self.limits;
        let phi = phi
            .clamp(l.min_polar_angle, l.max_polar_angle)
            .clamp(POLAR_EPS, std::f64::consts::PI - POLAR_EPS);
        let radius = radius.clamp(l.min_distance, l.max_distance);
        self.set_spherical(radius, theta, phi);
        self.position.distance_squared(before) > 1e-12
    }

    /// Orbit by a pixel delta relative to the viewport height.
    pub fn rotate(&mut self, dx_px: f64, dy_px: f64, viewport_height: f64) {
        if viewport_height <= 0.0 {
            return;
        }
        let (radius, theta, phi) = self.spherical();
        let k = std::f64::consts::TAU * ROTATE_SPEED / viewport_height;
        self.set_spherical(radius, theta - dx_px * k, phi - dy_px * k);
        self.update();
    }

    /// Scale the orbit radius; positive steps move away from the target.
    pub fn dolly(&mut self, steps: f64) {
        let (radius, theta, phi) = self.spherical();
        let factor = ZOOM_STEP.powf(-steps);
        self.set_spherical(radius * factor, theta, phi);
        self.update();
    }

    /// Screen-space pan moving eye and target together.
    pub fn pan(&mut self, dx_px: f64, dy_px: f64, viewport_height: f64) {
        if viewport_height <= 0.0 {
            return;
        }
        let forward = (self.target - self.position)
            .normalize()
            .unwrap_or(Vec3::new(0.0, 0.0, -1.0));
        let right = forward.cross(Vec3::Y).normalize().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
        let up = right.cross(forward);
        let half_h = self.distance() * (0.5 * self.fov_y_deg.to_radians()).tan();
        let per_px = 2.0 * half_h / viewport_height;
        let shift = right * (-dx_px * per_px) + up * (dy_px * per_px);
        self.position = self.position + shift;
        self.target = self.target + shift;
    }

    pub fn on_pointer_down(&mut self, pos_px: [f64; 2], button: i16) {
        self.drag = match button {
            0 => DragMode::Rotate,
            2 => DragMode::Pan,
            _ => DragMode::None,
        };
        self.last_px = pos_px;
    }

    /// Returns whether the camera moved.
    pub fn on_pointer_move(&mut self, pos_px: [f64; 2], viewport_height: f64) -> bool {
        let dx = pos_px[0] - self.last_px[0];
        let dy = pos_px[1] - self.last_px[1];
        self.last_px = pos_px;
        match self.drag {
            DragMode::None => false,
            DragMode::Rotate => {
                self.rotate(dx, dy, viewport_height);
                true
            }
            DragMode::Pan => {
                self.pan(dx, dy, viewport_height);
                true
            }
        }
    }

    pub fn on_pointer_up(&mut self) {
        self.drag = DragMode::None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag != DragMode::None
    }

    pub fn on_wheel(&mut self, delta_y: f64) {
        if delta_y != 0.0 {
            self.dolly(delta_y.signum());
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_z0(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection().mul(&self.view())
    }

    /// World-space ray through normalized device coordinates (`[-1, 1]`, +y up).
    pub fn screen_ray(&self, ndc_x: f64, ndc_y: f64) -> Option<Ray> {
        let inv = self.view_proj().inverse()?;
        let far = inv.transform_point(Vec3::new(ndc_x, ndc_y, 1.0));
        let dir = (far - self.position).normalize()?;
        Some(Ray::new(self.position, dir))
    }

    /// Project a world point into viewport pixels (origin top-left).
    pub fn project_to_screen(&self, world: Vec3, width: f64, height: f64) -> Option<ScreenPoint> {
        let clip = self.view_proj().transform_point4(world);
        let w = clip[3];
        if !w.is_finite() || w.abs() < 1e-12 {
            return None;
        }
        let ndc = [clip[0] / w, clip[1] / w, clip[2] / w];
        let in_view = w > 0.0 && (0.0..=1.0).contains(&ndc[2]);
        Some(ScreenPoint {
            x: (ndc[0] * 0.5 + 0.5) * width,
            y: (-ndc[1] * 0.5 + 0.5) * height,
            depth: ndc[2],
            in_view,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlLimits, OrbitCamera};
    use foundation::math::Vec3;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "{a} != {b}");
    }

    #[test]
    fn update_clamps_polar_angle_and_keeps_distance() {
        let mut cam = OrbitCamera::new(
            Vec3::new(0.0, 100.0, 170.0),
            Vec3::new(0.0, -35.0, 110.0),
            1.5,
        );
        let d = cam.distance();
        assert!(cam.polar_angle() < std::f64::consts::PI / 6.0);
        assert!(cam.update());
        assert_close(cam.polar_angle(), std::f64::consts::PI / 6.0, 1e-9);
        assert_close(cam.distance(), d, 1e-9);
        assert!(!cam.update());
    }

    #[test]
    fn distance_is_clamped_to_limits() {
        let mut cam = OrbitCamera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 1.0);
        cam.limits = ControlLimits::new(20.0, 30.0, 0.0, std::f64::consts::PI);
        cam.update();
        assert_close(cam.distance(), 20.0, 1e-9);
        for _ in 0..50 {
            cam.dolly(1.0);
        }
        assert_close(cam.distance(), 30.0, 1e-9);
    }

    #[test]
    fn center_ray_points_at_target_and_target_projects_to_center() {
        let cam = OrbitCamera::new(Vec3::new(0.0, 50.0, 50.0), Vec3::ZERO, 2.0);
        let ray = cam.screen_ray(0.0, 0.0).expect("ray");
        let to_target = (cam.target - cam.position).normalize().expect("dir");
        assert_close(ray.dir.dot(to_target), 1.0, 1e-9);

        let p = cam
            .project_to_screen(Vec3::ZERO, 800.0, 400.0)
            .expect("projected");
        assert!(p.in_view);
        assert_close(p.x, 400.0, 1e-6);
        assert_close(p.y, 200.0, 1e-6);

        let behind = cam
            .project_to_screen(Vec3::new(0.0, 100.0, 100.0), 800.0, 400.0)
            .expect("projected");
        assert!(!behind.in_view);
    }

    #[test]
    fn pan_moves_eye_and_target_together() {
        let mut cam = OrbitCamera::new(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO, 1.0);
        let offset = cam.position - cam.target;
        cam.pan(40.0, 0.0, 400.0);
        assert!(cam.target.x < 0.0);
        let after = cam.position - cam.target;
        assert_close(after.distance(offset), 0.0, 1e-9);
    }

    #[test]
    fn limits_validation() {
        assert!(ControlLimits::default().is_valid());
        assert!(!ControlLimits::new(10.0, 5.0, 0.0, 1.0).is_valid());
    }
}
