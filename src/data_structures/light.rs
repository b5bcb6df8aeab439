//! Light sources accumulated by the lighting pass.

use cgmath::{Deg, InnerSpace, Vector3};

/// Linear RGB in `0..=1` per channel, scaled by a light's intensity.
pub type Colour = Vector3<f32>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientSettings {
    pub colour: Colour,
    pub intensity: f32,
}

impl Default for AmbientSettings {
    fn default() -> Self {
        Self {
            colour: Vector3::new(1.0, 1.0, 1.0),
            intensity: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in, normalized on construction.
    pub direction: Vector3<f32>,
    pub colour: Colour,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(direction: Vector3<f32>, colour: Colour, intensity: f32) -> Self {
        Self {
            direction: direction.normalize(),
            colour,
            intensity,
        }
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vector3::new(-0.5, -1.0, -0.3), Vector3::new(1.0, 1.0, 1.0), 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub colour: Colour,
    pub intensity: f32,
    pub attenuation_rate: f32,
    /// Distance past which the light contributes nothing.
    pub radius: f32,
}

impl PointLight {
    pub fn new(position: Vector3<f32>, colour: Colour) -> Self {
        Self {
            position,
            colour,
            ..Self::default()
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            colour: Vector3::new(1.0, 1.0, 1.0),
            intensity: 100.0,
            attenuation_rate: 0.5,
            radius: 100.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLightParams {
    /// Constant, linear and quadratic attenuation terms.
    pub falloff: Vector3<f32>,
    pub direction: Vector3<f32>,
    /// Full intensity inside this angle from the axis.
    pub inner_cutoff: Deg<f32>,
    /// No light outside this angle.
    pub outer_cutoff: Deg<f32>,
}

impl Default for SpotLightParams {
    fn default() -> Self {
        Self {
            falloff: Vector3::new(1.0, 0.09, 0.032),
            direction: Vector3::new(0.0, -1.0, 0.0),
            inner_cutoff: Deg(12.5),
            outer_cutoff: Deg(17.5),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub position: Vector3<f32>,
    pub colour: Colour,
    pub intensity: f32,
    pub params: SpotLightParams,
}

impl SpotLight {
    pub fn new(position: Vector3<f32>, params: SpotLightParams, colour: Colour, intensity: f32) -> Self {
        Self {
            position,
            colour,
            intensity,
            params,
        }
    }

    /// Cosines of the inner and outer cutoff, as the spot shader compares them.
    pub fn cutoff_cosines(&self) -> (f32, f32) {
        use cgmath::Angle;
        (self.params.inner_cutoff.cos(), self.params.outer_cutoff.cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_lights_are_normalized() {
        let light = DirectionalLight::new(Vector3::new(0.0, -10.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 2.0);
        assert_eq!(light.direction, Vector3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn inner_cone_has_the_larger_cosine() {
        let spot = SpotLight::new(
            Vector3::new(0.0, 5.0, 0.0),
            SpotLightParams::default(),
            Vector3::new(1.0, 1.0, 1.0),
            1.0,
        );
        let (inner, outer) = spot.cutoff_cosines();
        assert!(inner > outer);
    }
}
