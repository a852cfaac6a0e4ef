use foundation::color::Rgb;
use foundation::math::Vec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Rgb,
    pub intensity: f32,
    /// Light position; it shines toward the origin.
    pub position: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HemisphereLight {
    pub sky: Rgb,
    pub ground: Rgb,
    pub intensity: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Fog {
    pub color: Rgb,
    pub near: f64,
    pub far: f64,
}

impl Fog {
    /// Linear fog amount in `[0, 1]` at a view distance.
    pub fn factor(&self, distance: f64) -> f64 {
        if self.far <= self.near {
            return if distance >= self.far { 1.0 } else { 0.0 };
        }
        ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

/// Scene-wide light rig, fog and tone mapping exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub ambient: (Rgb, f32),
    pub hemisphere: HemisphereLight,
    pub directional: Vec<DirectionalLight>,
    pub fog: Fog,
    pub clear_color: Rgb,
    pub exposure: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: (Rgb::from_hex(0x5CCAFF), 1.1),
            hemisphere: HemisphereLight {
                sky: Rgb::from_hex(0x164B8F),
                ground: Rgb::from_hex(0x010615),
                intensity: 0.68,
            },
            directional: vec![
                DirectionalLight {
                    color: Rgb::from_hex(0x7AF4FF),
                    intensity: 0.9,
                    position: Vec3::new(-160.0, 120.0, -140.0),
                },
                DirectionalLight {
                    color: Rgb::from_hex(0x4DD8FF),
                    intensity: 0.75,
                    position: Vec3::new(180.0, 140.0, 160.0),
                },
                DirectionalLight {
                    color: Rgb::from_hex(0x1EA0FF),
                    intensity: 0.6,
                    position: Vec3::new(0.0, 260.0, 0.0),
                },
            ],
            fog: Fog {
                color: Rgb::from_hex(0x000A1F),
                near: 260.0,
                far: 520.0,
            },
            clear_color: Rgb::from_hex(0x000A1F),
            exposure: 1.18,
        }
    }
}

impl Lighting {
    /// Diffuse irradiance reaching a surface with world normal `normal`.
    pub fn irradiance(&self, normal: Vec3) -> Rgb {
        let n = normal.normalize().unwrap_or(Vec3::Y);
        let (ambient, ambient_i) = self.ambient;
        let mut out = ambient.scaled(ambient_i);

        let h = &self.hemisphere;
        let up = (n.dot(Vec3::Y) * 0.5 + 0.5) as f32;
        out = add(out, h.ground.lerp(h.sky, up).scaled(h.intensity));

        for light in &self.directional {
            let Some(l) = light.position.normalize() else {
                continue;
            };
            let lambert = n.dot(l).max(0.0) as f32;
            out = add(out, light.color.scaled(light.intensity * lambert));
        }
        out
    }
}

fn add(a: Rgb, b: Rgb) -> Rgb {
    Rgb {
        r: a.r + b.r,
        g: a.g + b.g,
        b: a.b + b.b,
    }
}

#[cfg(test)]
mod tests {
    use super::Lighting;
    use foundation::math::Vec3;

    #[test]
    fn fog_is_linear_between_near_and_far() {
        let fog = Lighting::default().fog;
        assert_eq!(fog.factor(100.0), 0.0);
        assert!((fog.factor(390.0) - 0.5).abs() < 1e-12);
        assert_eq!(fog.factor(900.0), 1.0);
    }

    #[test]
    fn upward_faces_receive_more_light() {
        let lighting = Lighting::default();
        let up = lighting.irradiance(Vec3::Y);
        let down = lighting.irradiance(Vec3::new(0.0, -1.0, 0.0));
        assert!(up.r + up.g + up.b > down.r + down.g + down.b);
    }
}
