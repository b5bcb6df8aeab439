//! Render pipelines and the programs the deferred renderer is built from.
//!
//! [`programs`] lists every program by name with its uniform block, texture
//! slots, vertex input and output targets. The renderer registers them all in
//! a [`crate::shader::ShaderRegistry`] at start-up and fetches them by name.

use crate::{
    data_structures::{mesh::MeshVertex, texture::Texture},
    gaussian,
    shader::{ProgramDescriptor, UniformKind, VertexInput},
    sprite_batch::SpriteVertex,
    targets::GBufferChannel,
};

pub const GBUFFER: &str = "GBuffer";
pub const QUAD_BATCH: &str = "QuadBatch";
pub const QUAD_BATCH_TWO_SIDED: &str = "QuadBatchTwoSided";
pub const AMBIENT_LIGHT: &str = "AmbientLight";
pub const DIRECTIONAL_LIGHT: &str = "DirectionalLight";
pub const POINT_LIGHT: &str = "PointLight";
pub const SPOT_LIGHT: &str = "SpotLight";
pub const LUMINANCE: &str = "Luminance";
pub const HORIZONTAL_BLUR: &str = "HorizontalBlur";
pub const VERTICAL_BLUR: &str = "VerticalBlur";
pub const COMPOSITE: &str = "Composite";
pub const FXAA: &str = "FXAA";
pub const SPRITE: &str = "Sprite";

/// Format of the tone mapped images (composite and FXAA targets).
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const FULLSCREEN_WGSL: &str = include_str!("fullscreen.wgsl");
const LIGHTING_WGSL: &str = include_str!("lighting.wgsl");

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

fn target(format: wgpu::TextureFormat, blend: Option<wgpu::BlendState>) -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format,
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

fn fullscreen(
    name: &'static str,
    fragment: &str,
    uniforms: Vec<(&'static str, UniformKind)>,
    textures: Vec<&'static str>,
    output: Option<wgpu::ColorTargetState>,
) -> ProgramDescriptor {
    ProgramDescriptor {
        name,
        source: format!("{FULLSCREEN_WGSL}\n{fragment}").into(),
        uniforms,
        textures,
        vertex: VertexInput::FullScreen,
        targets: vec![output],
        depth: None,
        cull_mode: None,
    }
}

fn gbuffer(name: &'static str, cull_mode: Option<wgpu::Face>) -> ProgramDescriptor {
    ProgramDescriptor {
        name,
        source: include_str!("gbuffer.wgsl").into(),
        uniforms: vec![
            ("u_camera", UniformKind::Mat4),
            ("u_model", UniformKind::Mat4),
            ("u_albedoColor", UniformKind::Vec4),
            ("u_emissiveIntensity", UniformKind::Float),
        ],
        textures: vec![
            "u_albedoMap",
            "u_normalMap",
            "u_emissiveMap",
            "u_metallicMap",
            "u_roughnessMap",
            "u_aoMap",
        ],
        vertex: VertexInput::Buffers(vec![MeshVertex::desc()]),
        targets: GBufferChannel::formats()
            .into_iter()
            .map(|format| target(format, None))
            .collect(),
        depth: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        cull_mode,
    }
}

fn light(
    name: &'static str,
    fragment: &str,
    uniforms: Vec<(&'static str, UniformKind)>,
) -> ProgramDescriptor {
    fullscreen(
        name,
        &format!("{LIGHTING_WGSL}\n{fragment}"),
        uniforms,
        vec!["u_albedoMap", "u_normalMap", "u_positionMap", "u_matProps"],
        target(Texture::HDR_FORMAT, Some(ADDITIVE)),
    )
}

fn blur(name: &'static str, direction: [f32; 2]) -> ProgramDescriptor {
    let [x, y] = direction;
    fullscreen(
        name,
        &format!(
            "const BLUR_DIRECTION: vec2<f32> = vec2<f32>({x:?}, {y:?});\n{}",
            include_str!("blur.wgsl")
        ),
        vec![
            ("u_blurWeights", UniformKind::FloatArray(gaussian::TAPS)),
            ("u_blurRadius", UniformKind::Float),
        ],
        vec!["u_blurTex"],
        target(Texture::HDR_FORMAT, None),
    )
}

/// Every program the renderer uses. `surface_format` is the format presented to.
pub fn programs(surface_format: wgpu::TextureFormat) -> Vec<ProgramDescriptor> {
    vec![
        gbuffer(GBUFFER, Some(wgpu::Face::Back)),
        gbuffer(QUAD_BATCH, Some(wgpu::Face::Back)),
        gbuffer(QUAD_BATCH_TWO_SIDED, None),
        fullscreen(
            AMBIENT_LIGHT,
            include_str!("ambient.wgsl"),
            vec![
                ("u_ambientColor", UniformKind::Vec3),
                ("u_ambientIntensity", UniformKind::Float),
            ],
            vec!["u_albedoMap", "u_emissiveMap", "u_positionMap"],
            target(Texture::HDR_FORMAT, Some(ADDITIVE)),
        ),
        light(
            DIRECTIONAL_LIGHT,
            include_str!("directional.wgsl"),
            vec![
                ("u_lightDirection", UniformKind::Vec3),
                ("u_lightIntensity", UniformKind::Float),
                ("u_lightColor", UniformKind::Vec3),
                ("u_camPos", UniformKind::Vec3),
            ],
        ),
        light(
            POINT_LIGHT,
            include_str!("point.wgsl"),
            vec![
                ("u_lightPos", UniformKind::Vec3),
                ("u_lightIntensity", UniformKind::Float),
                ("u_lightColor", UniformKind::Vec3),
                ("u_attenuationRate", UniformKind::Float),
                ("u_camPos", UniformKind::Vec3),
                ("u_radius", UniformKind::Float),
            ],
        ),
        light(
            SPOT_LIGHT,
            include_str!("spot.wgsl"),
            vec![
                ("u_lightPos", UniformKind::Vec3),
                ("u_lightIntensity", UniformKind::Float),
                ("u_lightColor", UniformKind::Vec3),
                ("u_innerCutoff", UniformKind::Float),
                ("u_lightDirection", UniformKind::Vec3),
                ("u_outerCutoff", UniformKind::Float),
                ("u_falloff", UniformKind::Vec3),
                ("u_camPos", UniformKind::Vec3),
            ],
        ),
        fullscreen(
            LUMINANCE,
            include_str!("luminance.wgsl"),
            vec![("u_threshold", UniformKind::Float)],
            vec!["u_lightingMap", "u_emissiveMap"],
            target(Texture::HDR_FORMAT, None),
        ),
        blur(HORIZONTAL_BLUR, [1.0, 0.0]),
        blur(VERTICAL_BLUR, [0.0, 1.0]),
        fullscreen(
            COMPOSITE,
            include_str!("composite.wgsl"),
            vec![
                ("u_exposure", UniformKind::Float),
                ("u_gamma", UniformKind::Float),
                ("u_bloomScalar", UniformKind::Float),
                ("u_saturation", UniformKind::Float),
                ("u_cascadeWeights", UniformKind::Vec3),
            ],
            vec![
                "u_lightingMap",
                "u_blurTexSmall",
                "u_blurTexMedium",
                "u_blurTexLarge",
            ],
            target(LDR_FORMAT, None),
        ),
        fullscreen(
            FXAA,
            include_str!("fxaa.wgsl"),
            vec![
                ("u_resolution", UniformKind::Vec2),
                ("u_FXAASettings", UniformKind::Vec3),
            ],
            vec!["u_screenTexture"],
            target(LDR_FORMAT, None),
        ),
        ProgramDescriptor {
            name: SPRITE,
            source: include_str!("sprite.wgsl").into(),
            uniforms: vec![("u_camera", UniformKind::Mat4)],
            textures: vec!["u_texture"],
            vertex: VertexInput::Buffers(vec![SpriteVertex::desc()]),
            targets: vec![target(surface_format, Some(wgpu::BlendState::ALPHA_BLENDING))],
            depth: None,
            cull_mode: None,
        },
    ]
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    targets: &[Option<wgpu::ColorTargetState>],
    depth_stencil: Option<wgpu::DepthStencilState>,
    cull_mode: Option<wgpu::Face>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::shader::UniformLayout;

    #[test]
    fn program_names_are_unique() {
        let programs = programs(wgpu::TextureFormat::Bgra8Unorm);
        let names: HashSet<&str> = programs.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), programs.len());
    }

    #[test]
    fn uniform_blocks_match_their_wgsl_structs() {
        // sizes of the `Uniforms` structs as declared in the shaders
        let expected = [
            (GBUFFER, 160),
            (AMBIENT_LIGHT, 16),
            (DIRECTIONAL_LIGHT, 48),
            (POINT_LIGHT, 48),
            (SPOT_LIGHT, 80),
            (LUMINANCE, 16),
            (HORIZONTAL_BLUR, 80),
            (COMPOSITE, 32),
            (FXAA, 32),
            (SPRITE, 64),
        ];
        let programs = programs(wgpu::TextureFormat::Bgra8Unorm);
        for (name, size) in expected {
            let program = programs.iter().find(|p| p.name == name).unwrap();
            assert_eq!(UniformLayout::new(&program.uniforms).size(), size, "{name}");
        }
    }

    #[test]
    fn shaders_declare_every_named_slot() {
        for program in programs(wgpu::TextureFormat::Bgra8Unorm) {
            for (name, _) in &program.uniforms {
                assert!(program.source.contains(name), "{} misses {name}", program.name);
            }
            for name in &program.textures {
                assert!(program.source.contains(name), "{} misses {name}", program.name);
            }
        }
    }
}
