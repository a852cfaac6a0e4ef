use std::collections::BTreeMap;

use foundation::math::Vec3;

/// Easing curves (the "power2" family is cubic).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ease {
    Linear,
    Power2In,
    Power2Out,
    Power2InOut,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::Power2In => t * t * t,
            Ease::Power2Out => 1.0 - (1.0 - t).powi(3),
            Ease::Power2InOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tween {
    pub from: Vec3,
    pub to: Vec3,
    pub duration_s: f64,
    pub elapsed_s: f64,
    pub ease: Ease,
}

impl Tween {
    pub fn new(from: Vec3, to: Vec3, duration_s: f64, ease: Ease) -> Self {
        Self {
            from,
            to,
            duration_s: duration_s.max(0.0),
            elapsed_s: 0.0,
            ease,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (self.elapsed_s / self.duration_s).clamp(0.0, 1.0)
    }

    pub fn value(&self) -> Vec3 {
        self.from.lerp(self.to, self.ease.apply(self.progress()))
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// One sampled tween value for the current step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TweenSample<K> {
    pub key: K,
    pub value: Vec3,
    pub finished: bool,
}

/// Keyed tweens with a cancel-on-restart discipline.
///
/// Ordering contract:
/// - At most one tween runs per key; `start` replaces (kills) any tween
///   already running against that key before installing the new one.
/// - `step` samples in ascending key order and drops finished tweens after
///   reporting their final value.
#[derive(Debug)]
pub struct TweenSet<K: Ord + Copy> {
    tweens: BTreeMap<K, Tween>,
}

impl<K: Ord + Copy> Default for TweenSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy> TweenSet<K> {
    pub fn new() -> Self {
        Self {
            tweens: BTreeMap::new(),
        }
    }

    pub fn start(&mut self, key: K, from: Vec3, to: Vec3, duration_s: f64, ease: Ease) {
        self.tweens.insert(key, Tween::new(from, to, duration_s, ease));
    }

    pub fn kill(&mut self, key: K) -> bool {
        self.tweens.remove(&key).is_some()
    }

    pub fn kill_where<F: FnMut(&K) -> bool>(&mut self, mut pred: F) {
        self.tweens.retain(|k, _| !pred(k));
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    pub fn is_active(&self, key: K) -> bool {
        self.tweens.contains_key(&key)
    }

    pub fn get(&self, key: K) -> Option<&Tween> {
        self.tweens.get(&key)
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn step(&mut self, dt_s: f64) -> Vec<TweenSample<K>> {
        let mut out = Vec::with_capacity(self.tweens.len());
        for (key, tween) in self.tweens.iter_mut() {
            tween.elapsed_s += dt_s.max(0.0);
            out.push(TweenSample {
                key: *key,
                value: tween.value(),
                finished: tween.is_finished(),
            });
        }
        self.tweens.retain(|_, t| !t.is_finished());
        out
    }
}
