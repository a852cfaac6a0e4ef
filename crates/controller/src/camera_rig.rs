use foundation::math::Vec3;
use runtime::{Ease, TweenSet};
use scene::{ControlLimits, NodeId, OrbitCamera};

/// Below this squared travel the camera counts as still.
const MOVE_EPS_SQ: f64 = 1e-4;

/// What a running tween writes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TweenTarget {
    CameraPosition,
    CameraTarget,
    /// Local position of a scene node (hover lifts).
    Node(NodeId),
}

/// Orbit camera plus the bookkeeping that decides when labels must be
/// re-placed.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub camera: OrbitCamera,
    last_position: Vec3,
    last_target: Vec3,
}

impl CameraRig {
    pub fn new(position: Vec3, target: Vec3, aspect: f64, limits: ControlLimits) -> Self {
        let mut camera = OrbitCamera::new(position, target, aspect);
        camera.limits = limits;
        Self {
            last_position: camera.position,
            last_target: camera.target,
            camera,
        }
    }

    pub fn apply_limits(&mut self, limits: ControlLimits) {
        self.camera.limits = limits;
        self.camera.update();
    }

    /// Animate eye and target, replacing any camera tween in flight.
    pub fn transition(
        &self,
        tweens: &mut TweenSet<TweenTarget>,
        position: Vec3,
        target: Vec3,
        duration_s: f64,
    ) {
        tweens.start(
            TweenTarget::CameraPosition,
            self.camera.position,
            position,
            duration_s,
            Ease::Power2InOut,
        );
        tweens.start(
            TweenTarget::CameraTarget,
            self.camera.target,
            target,
            duration_s,
            Ease::Power2InOut,
        );
    }

    /// Jump straight to a pose, cancelling camera tweens.
    pub fn snap(&mut self, tweens: &mut TweenSet<TweenTarget>, position: Vec3, target: Vec3) {
        tweens.kill(TweenTarget::CameraPosition);
        tweens.kill(TweenTarget::CameraTarget);
        self.camera.position = position;
        self.camera.target = target;
        self.camera.update();
    }

    /// Whether eye or target moved since the last call.
    pub fn take_moved(&mut self) -> bool {
        let moved = self.camera.position.distance_squared(self.last_position) > MOVE_EPS_SQ
            || self.camera.target.distance_squared(self.last_target) > MOVE_EPS_SQ;
        if moved {
            self.last_position = self.camera.position;
            self.last_target = self.camera.target;
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraRig, TweenTarget};
    use foundation::math::Vec3;
    use runtime::TweenSet;
    use scene::ControlLimits;

    fn rig() -> CameraRig {
        CameraRig::new(
            Vec3::new(0.0, 100.0, 170.0),
            Vec3::new(0.0, -35.0, 110.0),
            1.5,
            ControlLimits::new(10.0, 500.0, 0.0, std::f64::consts::PI),
        )
    }

    #[test]
    fn transition_replaces_running_tweens() {
        let rig = rig();
        let mut tweens = TweenSet::new();
        rig.transition(&mut tweens, Vec3::new(0.0, 50.0, 50.0), Vec3::ZERO, 1.0);
        rig.transition(&mut tweens, Vec3::new(0.0, 80.0, 80.0), Vec3::ZERO, 1.0);
        assert_eq!(tweens.len(), 2);
        let to = tweens.get(TweenTarget::CameraPosition).map(|t| t.to);
        assert_eq!(to, Some(Vec3::new(0.0, 80.0, 80.0)));
    }

    #[test]
    fn snap_kills_tweens_and_reports_motion_once() {
        let mut rig = rig();
        let mut tweens = TweenSet::new();
        assert!(!rig.take_moved());
        rig.transition(&mut tweens, Vec3::new(0.0, 50.0, 50.0), Vec3::ZERO, 1.0);
        rig.snap(&mut tweens, Vec3::new(0.0, 60.0, 60.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(tweens.is_empty());
        assert!(rig.take_moved());
        assert!(!rig.take_moved());
    }
}
