//! Per-frame tunables of the post-processing chain.
//!
//! All settings are plain data owned by the [`crate::context::Context`]. Flows
//! change them through `Out::Configure` closures or the console variables in
//! [`crate::cvars`]; the renderer reads them once per frame.

use crate::{gaussian, targets::GBufferChannel};

/// Highest blur iteration count a cascade accepts.
pub const MAX_BLUR_ITERATIONS: u32 = 30;

/// One of the three bloom blur cascades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cascade {
    Small,
    Medium,
    Large,
}

impl Cascade {
    pub const ALL: [Cascade; 3] = [Cascade::Small, Cascade::Medium, Cascade::Large];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Viewport divisor of the cascade's blur targets.
    pub fn divisor(self) -> u32 {
        match self {
            Cascade::Small => 4,
            Cascade::Medium => 8,
            Cascade::Large => 16,
        }
    }

    /// Standard deviation of the cascade's Gaussian curve.
    pub fn sigma(self) -> f32 {
        match self {
            Cascade::Small => 0.23,
            Cascade::Medium => 0.775,
            Cascade::Large => 1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Cascade::Small => "small",
            Cascade::Medium => "medium",
            Cascade::Large => "large",
        }
    }

    /// The cascade whose output seeds this one; `None` means the luminance target.
    pub fn seed(self) -> Option<Cascade> {
        match self {
            Cascade::Small => None,
            Cascade::Medium => Some(Cascade::Small),
            Cascade::Large => Some(Cascade::Medium),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeSettings {
    /// Horizontal + vertical blur pairs. Zero passes the seed through.
    pub iterations: u32,
    /// Distance between taps in UV units.
    pub radius: f32,
    /// Contribution of the cascade to the composite.
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BloomSettings {
    pub cascades: [CascadeSettings; 3],
    curves: [[f32; gaussian::TAPS]; 3],
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            cascades: [
                CascadeSettings {
                    iterations: 2,
                    radius: 0.004,
                    weight: 0.3,
                },
                CascadeSettings {
                    iterations: 2,
                    radius: 0.008,
                    weight: 0.2,
                },
                CascadeSettings {
                    iterations: 3,
                    radius: 0.012,
                    weight: 0.1,
                },
            ],
            curves: Cascade::ALL.map(|c| gaussian::blur_weights(c.sigma())),
        }
    }
}

impl BloomSettings {
    pub fn cascade(&self, cascade: Cascade) -> &CascadeSettings {
        &self.cascades[cascade.index()]
    }

    pub fn cascade_mut(&mut self, cascade: Cascade) -> &mut CascadeSettings {
        &mut self.cascades[cascade.index()]
    }

    /// Iteration count as the frame uses it, clamped to `0..=MAX_BLUR_ITERATIONS`.
    pub fn iterations(&self, cascade: Cascade) -> u32 {
        self.cascade(cascade).iterations.min(MAX_BLUR_ITERATIONS)
    }

    /// Precomputed blur weights; fixed for the lifetime of the settings.
    pub fn curve(&self, cascade: Cascade) -> &[f32; gaussian::TAPS] {
        &self.curves[cascade.index()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneMapSettings {
    pub exposure: f32,
    pub gamma: f32,
    pub bloom_scalar: f32,
    pub saturation: f32,
    /// Luminance above which lit pixels feed the bloom chain.
    pub threshold: f32,
}

impl Default for ToneMapSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
            bloom_scalar: 1.0,
            saturation: 1.0,
            threshold: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FxaaSettings {
    pub span_max: f32,
    pub reduce_mul: f32,
    pub reduce_min: f32,
    pub enabled: bool,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self {
            span_max: 8.0,
            reduce_mul: 1.0 / 8.0,
            reduce_min: 1.0 / 128.0,
            enabled: true,
        }
    }
}

/// What the present pass puts on screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebugView {
    /// The anti-aliased (or composited, with FXAA off) image.
    #[default]
    Final,
    GBuffer(GBufferChannel),
    Lighting,
    Luminance,
    Bloom(Cascade),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub bloom: BloomSettings,
    pub tone_map: ToneMapSettings,
    pub fxaa: FxaaSettings,
    /// Clear colour of the albedo channel.
    pub background: wgpu::Color,
    pub debug_view: DebugView,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            bloom: BloomSettings::default(),
            tone_map: ToneMapSettings::default(),
            fxaa: FxaaSettings::default(),
            background: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
            debug_view: DebugView::Final,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascades_chain_from_luminance() {
        assert_eq!(Cascade::Small.seed(), None);
        assert_eq!(Cascade::Medium.seed(), Some(Cascade::Small));
        assert_eq!(Cascade::Large.seed(), Some(Cascade::Medium));
        assert_eq!(
            Cascade::ALL.map(Cascade::divisor),
            [4, 8, 16],
        );
    }

    #[test]
    fn iterations_are_clamped_when_read() {
        let mut bloom = BloomSettings::default();
        bloom.cascade_mut(Cascade::Large).iterations = 500;
        assert_eq!(bloom.iterations(Cascade::Large), MAX_BLUR_ITERATIONS);
    }

    #[test]
    fn default_curves_match_their_cascade() {
        let bloom = BloomSettings::default();
        for cascade in Cascade::ALL {
            assert_eq!(
                bloom.curve(cascade),
                &gaussian::blur_weights(cascade.sigma())
            );
        }
    }
}
