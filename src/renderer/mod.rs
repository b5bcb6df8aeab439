//! The deferred renderer: owns every offscreen target and the program registry,
//! and turns a [`Scene`] into one frame.
//!
//! A frame is recorded into a single command encoder following the
//! [`FramePlan`] built from the current [`RenderSettings`]:
//!
//! 1. G-buffer: renderables sorted by material, then quad batches
//! 2. lighting: ambient plus one full-screen draw per light, blended additively
//! 3. luminance threshold at half resolution
//! 4. three bloom cascades of alternating horizontal/vertical blurs
//! 5. composite and tone mapping
//! 6. FXAA (optional)
//! 7. present: the selected debug view, then the GUI sprites on top

use std::collections::HashMap;

use cgmath::{Matrix4, Point3, SquareMatrix};

use crate::{
    camera::{self, Camera, Projection},
    data_structures::{
        material::Material,
        scene::Scene,
        texture::Texture,
    },
    pipelines::{self, LDR_FORMAT},
    resources::{AssetHandle, AssetManager},
    settings::{Cascade, DebugView, RenderSettings},
    shader::{ShaderProgram, ShaderRegistry},
    sprite_batch::{GlyphSortType, Rect, SpriteBatch},
    targets::{GBuffer, GBufferChannel, Load, RenderTarget, TargetId, TargetSize, TargetStack},
};

pub mod frame_plan;

pub use frame_plan::{BindEvent, BlurDirection, FramePlan, PassKind, PassStep, TargetKey};

const WHITE: [f32; 4] = [1.0; 4];

/// What the G-buffer and lighting passes need to know about the viewer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameCamera {
    pub view_projection: Matrix4<f32>,
    pub position: Point3<f32>,
}

impl FrameCamera {
    pub fn new(camera: &Camera, projection: &Projection) -> Self {
        Self {
            view_projection: camera::view_projection(camera, projection),
            position: camera.position,
        }
    }
}

/// Every offscreen target of the pipeline.
#[derive(Debug)]
struct Targets {
    gbuffer: GBuffer,
    lighting: RenderTarget,
    luminance: RenderTarget,
    /// Indexed by cascade, then horizontal/vertical.
    blur: [[RenderTarget; 2]; 3],
    composite: RenderTarget,
    fxaa: RenderTarget,
}

fn direction_index(direction: BlurDirection) -> usize {
    match direction {
        BlurDirection::Horizontal => 0,
        BlurDirection::Vertical => 1,
    }
}

impl Targets {
    fn new(device: &wgpu::Device, viewport: (u32, u32)) -> Self {
        let blur = Cascade::ALL.map(|cascade| {
            let size = TargetSize::Viewport {
                divisor: cascade.divisor(),
            };
            [BlurDirection::Horizontal, BlurDirection::Vertical].map(|direction| {
                RenderTarget::new(
                    device,
                    &format!("blur {} {direction:?}", cascade.name()),
                    size,
                    Texture::HDR_FORMAT,
                    viewport,
                )
            })
        });
        Self {
            gbuffer: GBuffer::new(device, viewport.0, viewport.1),
            lighting: RenderTarget::new(device, "lighting", TargetSize::FULL, Texture::HDR_FORMAT, viewport),
            luminance: RenderTarget::new(device, "luminance", TargetSize::HALF, Texture::HDR_FORMAT, viewport),
            blur,
            composite: RenderTarget::new(device, "composite", TargetSize::FULL, LDR_FORMAT, viewport),
            fxaa: RenderTarget::new(device, "fxaa", TargetSize::FULL, LDR_FORMAT, viewport),
        }
    }

    fn colour_targets_mut(&mut self) -> impl Iterator<Item = &mut RenderTarget> {
        [&mut self.lighting, &mut self.luminance, &mut self.composite, &mut self.fxaa]
            .into_iter()
            .chain(self.blur.iter_mut().flatten())
    }

    fn resize(&mut self, device: &wgpu::Device, viewport: (u32, u32)) {
        self.gbuffer.resize(device, viewport.0, viewport.1);
        let reallocated = self
            .colour_targets_mut()
            .map(|target| target.resize(device, viewport))
            .filter(|changed| *changed)
            .count();
        log::debug!("{reallocated} colour targets reallocated for {viewport:?}");
    }

    fn target(&self, key: TargetKey) -> Option<&RenderTarget> {
        match key {
            TargetKey::Lighting => Some(&self.lighting),
            TargetKey::Luminance => Some(&self.luminance),
            TargetKey::Blur(cascade, direction) => {
                Some(&self.blur[cascade.index()][direction_index(direction)])
            }
            TargetKey::Composite => Some(&self.composite),
            TargetKey::Fxaa => Some(&self.fxaa),
            TargetKey::GBuffer | TargetKey::Backbuffer => None,
        }
    }

    /// Sampleable texture behind `key`. The G-buffer resolves to the channel the
    /// debug view selects, albedo otherwise.
    fn texture(&self, key: TargetKey, view: DebugView) -> anyhow::Result<&Texture> {
        match key {
            TargetKey::GBuffer => {
                let channel = match view {
                    DebugView::GBuffer(channel) => channel,
                    _ => GBufferChannel::Albedo,
                };
                Ok(self.gbuffer.texture_at(channel.index()))
            }
            TargetKey::Backbuffer => anyhow::bail!("the backbuffer cannot be sampled"),
            key => self
                .target(key)
                .map(RenderTarget::texture)
                .ok_or_else(|| anyhow::anyhow!("no target for {key:?}")),
        }
    }
}

#[derive(Debug)]
pub struct DeferredRenderer {
    programs: ShaderRegistry,
    stack: TargetStack,
    targets: Targets,
    viewport: (u32, u32),
    /// Draws the debug view into the backbuffer; separate from the GUI batch so
    /// both vertex uploads survive until submit.
    present_batch: SpriteBatch,
    frame: u64,
}

impl DeferredRenderer {
    /// Compile every program and allocate every target for `viewport`.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        viewport: (u32, u32),
    ) -> Self {
        let viewport = (viewport.0.max(1), viewport.1.max(1));
        let mut programs = ShaderRegistry::new();
        for desc in pipelines::programs(surface_format) {
            programs.register(device, &desc);
        }
        log::info!(
            "deferred renderer ready at {}x{} presenting {surface_format:?}",
            viewport.0,
            viewport.1
        );
        Self {
            programs,
            stack: TargetStack::new(),
            targets: Targets::new(device, viewport),
            viewport,
            present_batch: SpriteBatch::new(device, "present"),
            frame: 0,
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn programs(&self) -> &ShaderRegistry {
        &self.programs
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.targets.gbuffer
    }

    /// The colour target behind `key`; `None` for the G-buffer and the backbuffer.
    pub fn target(&self, key: TargetKey) -> Option<&RenderTarget> {
        self.targets.target(key)
    }

    /// Reallocate every target for the new viewport. Handles fetched before are stale afterwards.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let viewport = (width.max(1), height.max(1));
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.targets.resize(device, viewport);
        self.programs.invalidate_textures();
    }

    /// Copy a colour target back to the CPU, e.g. to inspect the last frame.
    pub fn read_target(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        key: TargetKey,
    ) -> anyhow::Result<Vec<u8>> {
        let target = self
            .targets
            .target(key)
            .ok_or_else(|| anyhow::anyhow!("{key:?} has no colour target to read"))?;
        target.read_pixels(device, queue, &mut self.stack)
    }

    /// Record and submit one frame into `output`.
    ///
    /// `gui` must already be ended for this frame. On error nothing is submitted
    /// and every target is left unbound, so the next frame starts clean.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &wgpu::TextureView,
        scene: &Scene,
        assets: &AssetManager,
        camera: &FrameCamera,
        settings: &RenderSettings,
        gui: &SpriteBatch,
    ) -> anyhow::Result<()> {
        let plan = FramePlan::build(settings);
        plan.validate()?;
        self.programs.begin_frame(device, &draw_budget(&plan, scene));

        let presented = self.targets.texture(plan.presented(), settings.debug_view)?;
        self.present_batch.begin(GlyphSortType::None);
        self.present_batch.add(Rect::CLIP, Rect::UNIT, presented, WHITE, 0.0);
        self.present_batch.end(device, queue);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        let mut frame = Frame {
            device,
            programs: &mut self.programs,
            stack: &mut self.stack,
            targets: &self.targets,
            settings,
        };
        let recorded = plan.steps().iter().try_for_each(|step| {
            let result = match step.kind {
                PassKind::GBuffer => frame.gbuffer_pass(&mut encoder, scene, assets, camera),
                PassKind::Lighting => frame.lighting_pass(&mut encoder, scene, camera),
                PassKind::Luminance => frame.luminance_pass(&mut encoder),
                PassKind::Blur {
                    cascade, direction, ..
                } => frame.blur_pass(&mut encoder, step, cascade, direction),
                PassKind::Composite => frame.composite_pass(&mut encoder, &plan),
                PassKind::Fxaa => frame.fxaa_pass(&mut encoder),
                PassKind::Present => {
                    frame.present_pass(&mut encoder, output, &self.present_batch, gui, self.viewport)
                }
            };
            result.map_err(|e| e.context(format!("{:?} pass", step.kind)))
        });
        let binds = self.stack.end_frame();
        recorded?;

        self.programs.upload(queue);
        queue.submit(std::iter::once(encoder.finish()));
        self.frame += 1;
        log::trace!("frame {} submitted with {binds} binds", self.frame);
        Ok(())
    }

    /// Release every target and program. The renderer is consumed.
    pub fn shutdown(self) {
        log::info!("deferred renderer shut down after {} frames", self.frame);
    }
}

/// Number of uniform blocks each program needs this frame.
fn draw_budget(plan: &FramePlan, scene: &Scene) -> HashMap<&'static str, usize> {
    let quads = scene.sorted_quad_batches().len();
    let blurs = |direction: BlurDirection| {
        plan.count(|k| matches!(k, PassKind::Blur { direction: d, .. } if *d == direction))
    };
    HashMap::from([
        (pipelines::GBUFFER, scene.renderables().count()),
        (pipelines::QUAD_BATCH, quads),
        (pipelines::QUAD_BATCH_TWO_SIDED, quads),
        (pipelines::AMBIENT_LIGHT, 1),
        (pipelines::DIRECTIONAL_LIGHT, scene.directional_lights().len()),
        (pipelines::POINT_LIGHT, scene.point_lights().len()),
        (pipelines::SPOT_LIGHT, scene.spot_lights().len()),
        (pipelines::LUMINANCE, 1),
        (pipelines::HORIZONTAL_BLUR, blurs(BlurDirection::Horizontal)),
        (pipelines::VERTICAL_BLUR, blurs(BlurDirection::Vertical)),
        (pipelines::COMPOSITE, 1),
        (pipelines::FXAA, plan.count(|k| *k == PassKind::Fxaa)),
        // debug view quad and GUI overlay
        (pipelines::SPRITE, 2),
    ])
}

/// Borrows of renderer state shared by the passes of one frame.
struct Frame<'a> {
    device: &'a wgpu::Device,
    programs: &'a mut ShaderRegistry,
    stack: &'a mut TargetStack,
    targets: &'a Targets,
    settings: &'a RenderSettings,
}

fn bind_material(program: &mut ShaderProgram, material: &Material, assets: &AssetManager) {
    for (slot, texture) in material.textures() {
        program.bind_texture(slot.uniform(), assets.get_texture(texture));
    }
    program.set_uniform("u_albedoColor", material.albedo_color);
    program.set_uniform("u_emissiveIntensity", material.emissive_intensity);
}

/// Every G-buffer channel under the name the lighting programs sample it by.
fn bind_gbuffer(program: &mut ShaderProgram, gbuffer: &GBuffer) {
    program.bind_texture("u_albedoMap", gbuffer.texture(GBufferChannel::Albedo));
    program.bind_texture("u_normalMap", gbuffer.texture(GBufferChannel::Normal));
    program.bind_texture("u_positionMap", gbuffer.texture(GBufferChannel::Position));
    program.bind_texture("u_emissiveMap", gbuffer.texture(GBufferChannel::Emissive));
    program.bind_texture("u_matProps", gbuffer.texture(GBufferChannel::MaterialProps));
}

impl Frame<'_> {
    /// One full-screen triangle into `target`; `setup` stages uniforms and textures.
    fn fullscreen(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        program: &'static str,
        setup: impl FnOnce(&mut ShaderProgram),
    ) -> anyhow::Result<()> {
        let program = self.programs.get_mut(program)?;
        let mut pass = target.bind(encoder, self.stack, Load::Clear(wgpu::Color::BLACK));
        program.use_program(&mut pass);
        setup(program);
        let drawn = program
            .apply(self.device, &mut pass)
            .map(|()| pass.draw(0..3, 0..1));
        program.unuse();
        target.unbind(pass, self.stack);
        drawn
    }

    fn gbuffer_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        assets: &AssetManager,
        camera: &FrameCamera,
    ) -> anyhow::Result<()> {
        let targets = self.targets;
        let gbuffer = &targets.gbuffer;
        let mut pass = gbuffer.bind(encoder, self.stack, self.settings.background);
        let drawn = self.draw_geometry(&mut pass, scene, assets, camera);
        gbuffer.unbind(pass, self.stack);
        drawn
    }

    fn draw_geometry(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        scene: &Scene,
        assets: &AssetManager,
        camera: &FrameCamera,
    ) -> anyhow::Result<()> {
        let renderables = scene.sorted_renderables();
        if !renderables.is_empty() {
            let program = self.programs.get_mut(pipelines::GBUFFER)?;
            program.use_program(pass);
            program.set_uniform("u_camera", camera.view_projection);
            let mut current: Option<AssetHandle<Material>> = None;
            let mut material_breaks = 0;
            for renderable in renderables {
                if current != Some(renderable.material) {
                    bind_material(program, assets.get_material(renderable.material), assets);
                    current = Some(renderable.material);
                    material_breaks += 1;
                }
                program.set_uniform("u_model", renderable.model_matrix());
                program.apply(self.device, pass)?;
                assets.get_mesh(renderable.mesh).draw(pass);
            }
            program.unuse();
            log::trace!("gbuffer: {material_breaks} material changes");
        }

        // quad batches: the two-sided program only for the runs that need it
        let mut current: Option<(&'static str, AssetHandle<Material>)> = None;
        for batch in scene.sorted_quad_batches() {
            let Some(mesh) = batch.mesh() else {
                continue;
            };
            let material = assets.get_material(batch.material());
            let name = if material.two_sided {
                pipelines::QUAD_BATCH_TWO_SIDED
            } else {
                pipelines::QUAD_BATCH
            };
            let program_changed = current.is_none_or(|(active, _)| active != name);
            if program_changed {
                if let Some((active, _)) = current {
                    self.programs.get_mut(active)?.unuse();
                }
            }
            let program = self.programs.get_mut(name)?;
            if program_changed {
                program.use_program(pass);
                program.set_uniform("u_camera", camera.view_projection);
                program.set_uniform("u_model", Matrix4::<f32>::identity());
            }
            if program_changed || current.is_none_or(|(_, m)| m != batch.material()) {
                bind_material(program, material, assets);
            }
            current = Some((name, batch.material()));
            program.apply(self.device, pass)?;
            mesh.draw(pass);
        }
        if let Some((active, _)) = current {
            self.programs.get_mut(active)?.unuse();
        }
        Ok(())
    }

    fn lighting_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        camera: &FrameCamera,
    ) -> anyhow::Result<()> {
        let targets = self.targets;
        let target = &targets.lighting;
        let mut pass = target.bind(encoder, self.stack, Load::Clear(wgpu::Color::BLACK));
        let drawn = self.draw_lights(&mut pass, scene, camera);
        target.unbind(pass, self.stack);
        drawn
    }

    fn draw_lights(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        scene: &Scene,
        camera: &FrameCamera,
    ) -> anyhow::Result<()> {
        let cam_pos = camera.position;
        let device = self.device;
        let gbuffer = &self.targets.gbuffer;

        let mut program = self.programs.get_mut(pipelines::AMBIENT_LIGHT)?;
        let ambient = scene.ambient();
        program.use_program(pass);
        bind_gbuffer(program, gbuffer);
        program.set_uniform("u_ambientColor", ambient.colour);
        program.set_uniform("u_ambientIntensity", ambient.intensity);
        program.apply(device, pass)?;
        pass.draw(0..3, 0..1);
        program.unuse();

        if scene.directional_lights().len() > 0 {
            program = self.programs.get_mut(pipelines::DIRECTIONAL_LIGHT)?;
            program.use_program(pass);
            bind_gbuffer(program, gbuffer);
            program.set_uniform("u_camPos", cam_pos);
            for light in scene.directional_lights() {
                program.set_uniform("u_lightDirection", light.direction);
                program.set_uniform("u_lightColor", light.colour);
                program.set_uniform("u_lightIntensity", light.intensity);
                program.apply(device, pass)?;
                pass.draw(0..3, 0..1);
            }
            program.unuse();
        }

        if scene.point_lights().len() > 0 {
            program = self.programs.get_mut(pipelines::POINT_LIGHT)?;
            program.use_program(pass);
            bind_gbuffer(program, gbuffer);
            program.set_uniform("u_camPos", cam_pos);
            for light in scene.point_lights() {
                program.set_uniform("u_lightPos", light.position);
                program.set_uniform("u_lightColor", light.colour);
                program.set_uniform("u_lightIntensity", light.intensity);
                program.set_uniform("u_attenuationRate", light.attenuation_rate);
                program.set_uniform("u_radius", light.radius);
                program.apply(device, pass)?;
                pass.draw(0..3, 0..1);
            }
            program.unuse();
        }

        if scene.spot_lights().len() > 0 {
            program = self.programs.get_mut(pipelines::SPOT_LIGHT)?;
            program.use_program(pass);
            bind_gbuffer(program, gbuffer);
            program.set_uniform("u_camPos", cam_pos);
            for light in scene.spot_lights() {
                let (inner, outer) = light.cutoff_cosines();
                program.set_uniform("u_lightPos", light.position);
                program.set_uniform("u_lightColor", light.colour);
                program.set_uniform("u_lightIntensity", light.intensity);
                program.set_uniform("u_lightDirection", light.params.direction);
                program.set_uniform("u_falloff", light.params.falloff);
                program.set_uniform("u_innerCutoff", inner);
                program.set_uniform("u_outerCutoff", outer);
                program.apply(device, pass)?;
                pass.draw(0..3, 0..1);
            }
            program.unuse();
        }
        Ok(())
    }

    fn luminance_pass(&mut self, encoder: &mut wgpu::CommandEncoder) -> anyhow::Result<()> {
        let targets = self.targets;
        let threshold = self.settings.tone_map.threshold;
        self.fullscreen(encoder, &targets.luminance, pipelines::LUMINANCE, |program| {
            program.bind_texture("u_lightingMap", targets.lighting.texture());
            program.bind_texture("u_emissiveMap", targets.gbuffer.texture(GBufferChannel::Emissive));
            program.set_uniform("u_threshold", threshold);
        })
    }

    fn blur_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        step: &PassStep,
        cascade: Cascade,
        direction: BlurDirection,
    ) -> anyhow::Result<()> {
        let targets = self.targets;
        let settings = self.settings;
        let bloom = &settings.bloom;
        let target = targets
            .target(step.target)
            .ok_or_else(|| anyhow::anyhow!("blur step writes {:?}", step.target))?;
        let input = targets.texture(step.inputs[0], DebugView::Final)?;
        let program = match direction {
            BlurDirection::Horizontal => pipelines::HORIZONTAL_BLUR,
            BlurDirection::Vertical => pipelines::VERTICAL_BLUR,
        };
        self.fullscreen(encoder, target, program, |program| {
            program.bind_texture("u_blurTex", input);
            program.set_uniform("u_blurWeights", &bloom.curve(cascade)[..]);
            program.set_uniform("u_blurRadius", bloom.cascade(cascade).radius);
        })
    }

    fn composite_pass(&mut self, encoder: &mut wgpu::CommandEncoder, plan: &FramePlan) -> anyhow::Result<()> {
        let targets = self.targets;
        let settings = self.settings;
        let [small, medium, large] = Cascade::ALL
            .map(|cascade| targets.texture(plan.cascade_output(cascade), DebugView::Final));
        let (small, medium, large) = (small?, medium?, large?);
        let weights = Cascade::ALL.map(|cascade| settings.bloom.cascade(cascade).weight);
        self.fullscreen(encoder, &targets.composite, pipelines::COMPOSITE, |program| {
            program.bind_texture("u_lightingMap", targets.lighting.texture());
            program.bind_texture("u_blurTexSmall", small);
            program.bind_texture("u_blurTexMedium", medium);
            program.bind_texture("u_blurTexLarge", large);
            program.set_uniform("u_cascadeWeights", weights);
            program.set_uniform("u_exposure", settings.tone_map.exposure);
            program.set_uniform("u_gamma", settings.tone_map.gamma);
            program.set_uniform("u_bloomScalar", settings.tone_map.bloom_scalar);
            program.set_uniform("u_saturation", settings.tone_map.saturation);
        })
    }

    fn fxaa_pass(&mut self, encoder: &mut wgpu::CommandEncoder) -> anyhow::Result<()> {
        let targets = self.targets;
        let fxaa = self.settings.fxaa;
        let (width, height) = targets.fxaa.dimensions();
        self.fullscreen(encoder, &targets.fxaa, pipelines::FXAA, |program| {
            program.bind_texture("u_screenTexture", targets.composite.texture());
            program.set_uniform("u_resolution", [width as f32, height as f32]);
            program.set_uniform("u_FXAASettings", [fxaa.span_max, fxaa.reduce_mul, fxaa.reduce_min]);
        })
    }

    fn present_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        debug_view: &SpriteBatch,
        gui: &SpriteBatch,
        viewport: (u32, u32),
    ) -> anyhow::Result<()> {
        let program = self.programs.get_mut(pipelines::SPRITE)?;
        self.stack.bind(TargetId::BACKBUFFER, crate::targets::BindMode::Write);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Present Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: Load::Clear(wgpu::Color::BLACK).ops(),
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        program.use_program(&mut pass);
        let drawn = (|| -> anyhow::Result<()> {
            program.set_uniform("u_camera", Matrix4::<f32>::identity());
            program.apply_uniforms(&mut pass)?;
            debug_view.render_batch(self.device, &mut pass, program)?;

            if !gui.is_empty() {
                let (width, height) = viewport;
                let ortho = camera::OPENGL_TO_WGPU_MATRIX
                    * cgmath::ortho(0.0, width as f32, 0.0, height as f32, -1.0, 1.0);
                program.set_uniform("u_camera", ortho);
                program.apply_uniforms(&mut pass)?;
                gui.render_batch(self.device, &mut pass, program)?;
            }
            Ok(())
        })();
        program.unuse();
        drop(pass);
        self.stack.unbind(TargetId::BACKBUFFER);
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::light::{DirectionalLight, PointLight};

    #[test]
    fn budget_counts_every_draw_of_the_plan() {
        let mut scene = Scene::new();
        scene.add_directional_light(DirectionalLight::default());
        scene.add_point_light(PointLight::default());
        scene.add_point_light(PointLight::default());

        let mut settings = RenderSettings::default();
        settings.fxaa.enabled = false;
        let plan = FramePlan::build(&settings);
        let budget = draw_budget(&plan, &scene);

        let iterations: usize = Cascade::ALL
            .iter()
            .map(|c| settings.bloom.iterations(*c) as usize)
            .sum();
        assert_eq!(budget[pipelines::HORIZONTAL_BLUR], iterations);
        assert_eq!(budget[pipelines::VERTICAL_BLUR], iterations);
        assert_eq!(budget[pipelines::DIRECTIONAL_LIGHT], 1);
        assert_eq!(budget[pipelines::POINT_LIGHT], 2);
        assert_eq!(budget[pipelines::SPOT_LIGHT], 0);
        assert_eq!(budget[pipelines::FXAA], 0);
        assert_eq!(budget[pipelines::GBUFFER], 0);
    }

    #[test]
    fn every_budgeted_program_exists() {
        let names: Vec<&str> = pipelines::programs(wgpu::TextureFormat::Bgra8Unorm)
            .iter()
            .map(|p| p.name)
            .collect();
        let budget = draw_budget(&FramePlan::build(&RenderSettings::default()), &Scene::new());
        for name in budget.keys() {
            assert!(names.contains(name), "{name}");
        }
    }
}
