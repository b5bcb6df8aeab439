//! The ordered list of passes one frame runs, as plain data.
//!
//! [`FramePlan::build`] derives the steps from the current [`RenderSettings`];
//! the renderer walks them in order. Keeping the plan free of GPU state lets
//! the pass ordering, the blur ping-pong and the debug view routing be checked
//! without a device.

use anyhow::bail;

use crate::settings::{Cascade, DebugView, RenderSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurDirection {
    Horizontal,
    Vertical,
}

/// A surface a pass writes to or samples from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKey {
    GBuffer,
    Lighting,
    Luminance,
    Blur(Cascade, BlurDirection),
    Composite,
    Fxaa,
    Backbuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    GBuffer,
    Lighting,
    Luminance,
    /// Step `step` of the cascade's `2 * iterations` alternating blurs.
    Blur {
        cascade: Cascade,
        step: u32,
        direction: BlurDirection,
    },
    Composite,
    Fxaa,
    /// Debug view (or final image) plus the GUI overlay, into the backbuffer.
    Present,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PassStep {
    pub kind: PassKind,
    pub target: TargetKey,
    pub inputs: Vec<TargetKey>,
    /// The target is cleared when bound; otherwise its contents are kept.
    pub clear: bool,
}

impl PassStep {
    fn new(kind: PassKind, target: TargetKey, inputs: Vec<TargetKey>) -> Self {
        Self {
            kind,
            target,
            inputs,
            clear: true,
        }
    }
}

/// A bind or unbind of a target, in the order the plan issues them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindEvent {
    Bind(TargetKey),
    Unbind(TargetKey),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    steps: Vec<PassStep>,
    cascade_outputs: [TargetKey; 3],
    final_image: TargetKey,
    presented: TargetKey,
}

impl FramePlan {
    pub fn build(settings: &RenderSettings) -> Self {
        use TargetKey::*;

        let mut steps = vec![
            PassStep::new(PassKind::GBuffer, GBuffer, vec![]),
            PassStep::new(PassKind::Lighting, Lighting, vec![GBuffer]),
            PassStep::new(PassKind::Luminance, Luminance, vec![Lighting, GBuffer]),
        ];

        let mut cascade_outputs = [Luminance; 3];
        for cascade in Cascade::ALL {
            let seed = match cascade.seed() {
                Some(previous) => cascade_outputs[previous.index()],
                None => Luminance,
            };
            let horizontal = Blur(cascade, BlurDirection::Horizontal);
            let vertical = Blur(cascade, BlurDirection::Vertical);
            let iterations = settings.bloom.iterations(cascade);

            for step in 0..2 * iterations {
                let (direction, target, input) = if step % 2 == 0 {
                    let input = if step == 0 { seed } else { vertical };
                    (BlurDirection::Horizontal, horizontal, input)
                } else {
                    (BlurDirection::Vertical, vertical, horizontal)
                };
                steps.push(PassStep::new(
                    PassKind::Blur {
                        cascade,
                        step,
                        direction,
                    },
                    target,
                    vec![input],
                ));
            }

            cascade_outputs[cascade.index()] = if iterations == 0 { seed } else { vertical };
        }

        let mut composite_inputs = vec![Lighting];
        composite_inputs.extend(cascade_outputs);
        steps.push(PassStep::new(PassKind::Composite, Composite, composite_inputs));

        let final_image = if settings.fxaa.enabled {
            steps.push(PassStep::new(PassKind::Fxaa, Fxaa, vec![Composite]));
            Fxaa
        } else {
            Composite
        };

        let presented = match settings.debug_view {
            DebugView::Final => final_image,
            DebugView::GBuffer(_) => GBuffer,
            DebugView::Lighting => Lighting,
            DebugView::Luminance => Luminance,
            DebugView::Bloom(cascade) => cascade_outputs[cascade.index()],
        };
        steps.push(PassStep::new(PassKind::Present, Backbuffer, vec![presented]));

        Self {
            steps,
            cascade_outputs,
            final_image,
            presented,
        }
    }

    pub fn steps(&self) -> &[PassStep] {
        &self.steps
    }

    /// Target holding the finished blur of `cascade`; the seed itself when it runs no iterations.
    pub fn cascade_output(&self, cascade: Cascade) -> TargetKey {
        self.cascade_outputs[cascade.index()]
    }

    /// The composite, or the FXAA target when anti-aliasing is enabled.
    pub fn final_image(&self) -> TargetKey {
        self.final_image
    }

    /// What the present pass samples, given the debug view the plan was built for.
    pub fn presented(&self) -> TargetKey {
        self.presented
    }

    /// Number of steps of a given shape, e.g. horizontal blurs, for sizing uniform arenas.
    pub fn count(&self, pred: impl Fn(&PassKind) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.kind)).count()
    }

    /// Every step binds its target, draws, and unbinds it before the next one.
    pub fn bind_events(&self) -> impl Iterator<Item = BindEvent> + '_ {
        self.steps
            .iter()
            .flat_map(|s| [BindEvent::Bind(s.target), BindEvent::Unbind(s.target)])
    }

    /// Check that the plan only samples what it already produced, never samples the
    /// target it is writing, and binds strictly last in, first out.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut produced: Vec<TargetKey> = Vec::new();
        for (i, step) in self.steps.iter().enumerate() {
            for input in &step.inputs {
                if *input == step.target {
                    bail!("step {i} ({:?}) samples its own target {input:?}", step.kind);
                }
                if !produced.contains(input) {
                    bail!("step {i} ({:?}) reads {input:?} before it was written", step.kind);
                }
            }
            if !produced.contains(&step.target) {
                produced.push(step.target);
            }
        }

        let mut bound: Vec<TargetKey> = Vec::new();
        for event in self.bind_events() {
            match event {
                BindEvent::Bind(key) => {
                    if let Some(open) = bound.last() {
                        bail!("{key:?} bound while {open:?} is still bound");
                    }
                    bound.push(key);
                }
                BindEvent::Unbind(key) => match bound.pop() {
                    Some(top) if top == key => (),
                    top => bail!("unbind of {key:?} out of order, top is {top:?}"),
                },
            }
        }
        if !bound.is_empty() {
            bail!("plan ends with {bound:?} still bound");
        }

        match self.steps.last() {
            Some(last) if last.kind == PassKind::Present => Ok(()),
            _ => bail!("plan does not end in a present pass"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::GBufferChannel;

    fn settings_with_iterations(iterations: [u32; 3]) -> RenderSettings {
        let mut settings = RenderSettings::default();
        for (cascade, n) in Cascade::ALL.into_iter().zip(iterations) {
            settings.bloom.cascade_mut(cascade).iterations = n;
        }
        settings
    }

    fn kinds(plan: &FramePlan) -> Vec<&'static str> {
        plan.steps()
            .iter()
            .map(|s| match s.kind {
                PassKind::GBuffer => "gbuffer",
                PassKind::Lighting => "lighting",
                PassKind::Luminance => "luminance",
                PassKind::Blur { .. } => "blur",
                PassKind::Composite => "composite",
                PassKind::Fxaa => "fxaa",
                PassKind::Present => "present",
            })
            .collect()
    }

    #[test]
    fn default_plan_runs_every_pass_in_order() {
        let plan = FramePlan::build(&RenderSettings::default());
        plan.validate().unwrap();
        let mut expected = vec!["gbuffer", "lighting", "luminance"];
        expected.extend(std::iter::repeat_n("blur", 2 * (2 + 2 + 3)));
        expected.extend(["composite", "fxaa", "present"]);
        assert_eq!(kinds(&plan), expected);
        assert_eq!(plan.final_image(), TargetKey::Fxaa);
        assert_eq!(plan.presented(), TargetKey::Fxaa);
    }

    #[test]
    fn blur_steps_alternate_and_read_the_previous_step() {
        let plan = FramePlan::build(&settings_with_iterations([2, 0, 0]));
        let blurs: Vec<&PassStep> = plan
            .steps()
            .iter()
            .filter(|s| matches!(s.kind, PassKind::Blur { .. }))
            .collect();
        let h = TargetKey::Blur(Cascade::Small, BlurDirection::Horizontal);
        let v = TargetKey::Blur(Cascade::Small, BlurDirection::Vertical);

        let shape: Vec<(TargetKey, TargetKey)> =
            blurs.iter().map(|s| (s.target, s.inputs[0])).collect();
        assert_eq!(
            shape,
            vec![(h, TargetKey::Luminance), (v, h), (h, v), (v, h)]
        );
        assert_eq!(plan.cascade_output(Cascade::Small), v);
    }

    #[test]
    fn cascades_seed_from_the_previous_output() {
        let plan = FramePlan::build(&settings_with_iterations([1, 1, 1]));
        let first_read = |cascade: Cascade| {
            plan.steps()
                .iter()
                .find(|s| matches!(s.kind, PassKind::Blur { cascade: c, step: 0, .. } if c == cascade))
                .map(|s| s.inputs[0])
                .unwrap()
        };
        assert_eq!(first_read(Cascade::Small), TargetKey::Luminance);
        assert_eq!(
            first_read(Cascade::Medium),
            TargetKey::Blur(Cascade::Small, BlurDirection::Vertical)
        );
        assert_eq!(
            first_read(Cascade::Large),
            TargetKey::Blur(Cascade::Medium, BlurDirection::Vertical)
        );
    }

    #[test]
    fn zero_iterations_pass_the_seed_through() {
        let plan = FramePlan::build(&settings_with_iterations([0, 3, 0]));
        plan.validate().unwrap();
        assert_eq!(plan.cascade_output(Cascade::Small), TargetKey::Luminance);
        assert_eq!(
            plan.cascade_output(Cascade::Medium),
            TargetKey::Blur(Cascade::Medium, BlurDirection::Vertical)
        );
        assert_eq!(plan.cascade_output(Cascade::Large), plan.cascade_output(Cascade::Medium));
        assert_eq!(plan.count(|k| matches!(k, PassKind::Blur { .. })), 6);

        let composite = plan
            .steps()
            .iter()
            .find(|s| s.kind == PassKind::Composite)
            .unwrap();
        assert_eq!(composite.inputs[1], TargetKey::Luminance);
    }

    #[test]
    fn disabled_fxaa_presents_the_composite() {
        let mut settings = RenderSettings::default();
        settings.fxaa.enabled = false;
        let plan = FramePlan::build(&settings);
        plan.validate().unwrap();
        assert!(!kinds(&plan).contains(&"fxaa"));
        assert_eq!(plan.presented(), TargetKey::Composite);
    }

    #[test]
    fn debug_views_route_the_present_input() {
        let mut settings = settings_with_iterations([0, 0, 0]);
        settings.debug_view = DebugView::Bloom(Cascade::Large);
        assert_eq!(FramePlan::build(&settings).presented(), TargetKey::Luminance);

        settings.debug_view = DebugView::GBuffer(GBufferChannel::Normal);
        assert_eq!(FramePlan::build(&settings).presented(), TargetKey::GBuffer);
    }

    #[test]
    fn iterations_are_clamped() {
        let plan = FramePlan::build(&settings_with_iterations([1000, 0, 0]));
        let max = crate::settings::MAX_BLUR_ITERATIONS as usize;
        assert_eq!(plan.count(|k| matches!(k, PassKind::Blur { .. })), 2 * max);
    }

    #[test]
    fn validate_rejects_reads_before_writes() {
        let mut plan = FramePlan::build(&RenderSettings::default());
        plan.steps.swap(1, 2);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn validate_rejects_feedback_loops() {
        let mut plan = FramePlan::build(&RenderSettings::default());
        plan.steps[2].inputs.push(TargetKey::Luminance);
        let err = plan.validate().unwrap_err().to_string();
        assert!(err.contains("own target"), "{err}");
    }
}
