//! Name-keyed shader programs.
//!
//! A [`ShaderProgram`] couples a render pipeline with a named uniform block and
//! named texture slots, so passes can write `set_uniform("u_exposure", 1.0)` and
//! `bind_texture("u_albedoMap", tex)` without knowing byte offsets or binding
//! numbers. Names a program does not declare are ignored.
//!
//! Every program uses the same binding model:
//!
//! - `@group(0) @binding(0)` is the uniform block, addressed with a dynamic offset
//! - `@group(1) @binding(0..n)` are the texture slots, `@binding(n)` their sampler
//!
//! Uniform values are staged on the CPU. Each [`ShaderProgram::apply`] snapshots the
//! staged block into a per-frame arena and draws with that block's offset, so many
//! draws per frame (one per light, one per blur step) each see their own values.
//! The arena is written to the GPU once per frame by [`ShaderRegistry::upload`].

use std::{borrow::Cow, collections::HashMap, num::NonZeroU64};

use anyhow::{Context as _, bail};

use crate::{
    data_structures::texture::{Texture, TextureId},
    pipelines::mk_render_pipeline,
};

/// WGSL type of a uniform block member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    /// `array<vec4<f32>, ceil(n / 4)>` holding `n` tightly packed floats.
    FloatArray(usize),
}

impl UniformKind {
    fn align(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::UInt => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat4 => 16,
            UniformKind::FloatArray(_) => 16,
        }
    }

    fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::UInt => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
            UniformKind::FloatArray(n) => n.div_ceil(4) * 16,
        }
    }
}

/// A value that can be written into a uniform block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    UInt(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
    Floats(&'a [f32]),
}

impl UniformValue<'_> {
    fn fits(&self, kind: UniformKind) -> bool {
        match (self, kind) {
            (UniformValue::Float(_), UniformKind::Float)
            | (UniformValue::UInt(_), UniformKind::UInt)
            | (UniformValue::Vec2(_), UniformKind::Vec2)
            | (UniformValue::Vec3(_), UniformKind::Vec3)
            | (UniformValue::Vec4(_), UniformKind::Vec4)
            | (UniformValue::Mat4(_), UniformKind::Mat4) => true,
            (UniformValue::Floats(values), UniformKind::FloatArray(n)) => values.len() <= n,
            _ => false,
        }
    }

    fn write(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::UInt(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => dst[..8].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => dst[..12].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec4(v) => dst[..16].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Mat4(m) => dst[..64].copy_from_slice(bytemuck::cast_slice(m)),
            UniformValue::Floats(values) => {
                let bytes: &[u8] = bytemuck::cast_slice(values);
                dst[..bytes.len()].copy_from_slice(bytes);
            }
        }
    }
}

impl From<f32> for UniformValue<'_> {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<u32> for UniformValue<'_> {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<bool> for UniformValue<'_> {
    fn from(v: bool) -> Self {
        UniformValue::UInt(v as u32)
    }
}

impl From<[f32; 2]> for UniformValue<'_> {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue<'_> {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue<'_> {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<cgmath::Vector2<f32>> for UniformValue<'_> {
    fn from(v: cgmath::Vector2<f32>) -> Self {
        UniformValue::Vec2(v.into())
    }
}

impl From<cgmath::Vector3<f32>> for UniformValue<'_> {
    fn from(v: cgmath::Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<cgmath::Point3<f32>> for UniformValue<'_> {
    fn from(v: cgmath::Point3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<cgmath::Vector4<f32>> for UniformValue<'_> {
    fn from(v: cgmath::Vector4<f32>) -> Self {
        UniformValue::Vec4(v.into())
    }
}

impl From<cgmath::Matrix4<f32>> for UniformValue<'_> {
    fn from(m: cgmath::Matrix4<f32>) -> Self {
        UniformValue::Mat4(m.into())
    }
}

impl<'a> From<&'a [f32]> for UniformValue<'a> {
    fn from(v: &'a [f32]) -> Self {
        UniformValue::Floats(v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: UniformKind,
    pub offset: usize,
}

/// Byte layout of a WGSL uniform struct, members in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: usize,
}

/// Result of writing a value into a staged uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformWrite {
    Written,
    Missing,
    Mismatch,
}

impl UniformLayout {
    pub fn new(members: &[(&'static str, UniformKind)]) -> Self {
        let mut offset: usize = 0;
        let mut fields = Vec::with_capacity(members.len());
        for &(name, kind) in members {
            offset = offset.next_multiple_of(kind.align());
            fields.push(UniformField { name, kind, offset });
            offset += kind.size();
        }
        // uniform structs are 16 byte aligned; keep a non-empty block for bind group validation
        let size = offset.next_multiple_of(16).max(16);
        Self { fields, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn write(&self, staging: &mut [u8], name: &str, value: UniformValue<'_>) -> UniformWrite {
        let Some(field) = self.field(name) else {
            return UniformWrite::Missing;
        };
        if !value.fits(field.kind) {
            return UniformWrite::Mismatch;
        }
        let end = field.offset + field.kind.size();
        value.write(&mut staging[field.offset..end]);
        UniformWrite::Written
    }
}

/// How a program receives its vertices.
#[derive(Clone, Debug)]
pub enum VertexInput {
    /// No buffers; the vertex shader derives a screen covering triangle from the vertex index.
    FullScreen,
    Buffers(Vec<wgpu::VertexBufferLayout<'static>>),
}

/// Everything needed to compile and register a program.
#[derive(Clone, Debug)]
pub struct ProgramDescriptor {
    pub name: &'static str,
    pub source: Cow<'static, str>,
    pub uniforms: Vec<(&'static str, UniformKind)>,
    pub textures: Vec<&'static str>,
    pub vertex: VertexInput,
    pub targets: Vec<Option<wgpu::ColorTargetState>>,
    pub depth: Option<wgpu::DepthStencilState>,
    pub cull_mode: Option<wgpu::Face>,
}

pub struct ShaderProgram {
    name: &'static str,
    pipeline: wgpu::RenderPipeline,
    layout: UniformLayout,
    staging: Vec<u8>,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    stride: usize,
    capacity: usize,
    arena: Vec<u8>,
    draws: usize,
    texture_slots: Vec<&'static str>,
    bound: Vec<Option<Texture>>,
    texture_bind_group_layout: Option<wgpu::BindGroupLayout>,
    texture_groups: HashMap<Vec<TextureId>, wgpu::BindGroup>,
    in_use: bool,
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("name", &self.name)
            .field("uniforms", &self.layout.fields().len())
            .field("textures", &self.texture_slots)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ShaderProgram {
    pub fn new(device: &wgpu::Device, desc: &ProgramDescriptor) -> Self {
        let layout = UniformLayout::new(&desc.uniforms);
        let stride = layout
            .size()
            .next_multiple_of(device.limits().min_uniform_buffer_offset_alignment as usize);

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(desc.name),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(layout.size() as u64),
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout = (!desc.textures.is_empty())
            .then(|| texture_layout(device, desc.name, desc.textures.len()));

        let mut group_layouts = vec![&uniform_bind_group_layout];
        if let Some(textures) = &texture_bind_group_layout {
            group_layouts.push(textures);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.name),
            bind_group_layouts: &group_layouts,
            push_constant_ranges: &[],
        });

        let vertex_layouts: &[wgpu::VertexBufferLayout] = match &desc.vertex {
            VertexInput::FullScreen => &[],
            VertexInput::Buffers(layouts) => layouts,
        };
        let pipeline = mk_render_pipeline(
            device,
            desc.name,
            &pipeline_layout,
            &desc.targets,
            desc.depth.clone(),
            desc.cull_mode,
            vertex_layouts,
            wgpu::ShaderModuleDescriptor {
                label: Some(desc.name),
                source: wgpu::ShaderSource::Wgsl(desc.source.clone()),
            },
        );

        let capacity = 4;
        let (uniform_buffer, uniform_bind_group) = uniform_storage(
            device,
            desc.name,
            &uniform_bind_group_layout,
            stride,
            capacity,
            layout.size(),
        );

        log::debug!(
            "compiled program '{}' ({} uniform bytes, {} texture slots)",
            desc.name,
            layout.size(),
            desc.textures.len()
        );

        Self {
            name: desc.name,
            pipeline,
            staging: vec![0; layout.size()],
            layout,
            uniform_bind_group_layout,
            uniform_buffer,
            uniform_bind_group,
            stride,
            capacity,
            arena: Vec::new(),
            draws: 0,
            bound: vec![None; desc.textures.len()],
            texture_slots: desc.textures.clone(),
            texture_bind_group_layout,
            texture_groups: HashMap::new(),
            in_use: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn uniform_layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Draws recorded since the last [`ShaderProgram::begin_frame`].
    pub fn draws(&self) -> usize {
        self.draws
    }

    /// Reset the per-frame arena and make room for `expected_draws` blocks.
    pub fn begin_frame(&mut self, device: &wgpu::Device, expected_draws: usize) {
        self.arena.clear();
        self.draws = 0;
        if expected_draws > self.capacity {
            self.capacity = expected_draws.next_power_of_two();
            let (buffer, group) = uniform_storage(
                device,
                self.name,
                &self.uniform_bind_group_layout,
                self.stride,
                self.capacity,
                self.layout.size(),
            );
            self.uniform_buffer = buffer;
            self.uniform_bind_group = group;
            log::debug!("program '{}' grew to {} draws", self.name, self.capacity);
        }
    }

    /// Make this program current in `pass`.
    pub fn use_program(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        self.in_use = true;
    }

    /// Release the program. Bound textures are forgotten; staged uniforms are kept.
    pub fn unuse(&mut self) {
        self.in_use = false;
        self.bound.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn set_uniform<'v>(&mut self, name: &str, value: impl Into<UniformValue<'v>>) {
        match self.layout.write(&mut self.staging, name, value.into()) {
            UniformWrite::Written => (),
            UniformWrite::Missing => {
                log::trace!("program '{}' has no uniform '{name}'", self.name)
            }
            UniformWrite::Mismatch => {
                log::warn!("value for '{name}' does not fit its type in '{}'", self.name)
            }
        }
    }

    pub fn bind_texture(&mut self, name: &str, texture: &Texture) {
        match self.texture_slots.iter().position(|slot| *slot == name) {
            Some(slot) => self.bound[slot] = Some(texture.clone()),
            None => log::trace!("program '{}' has no texture slot '{name}'", self.name),
        }
    }

    /// Forget cached texture bind groups; required once the textures they reference were reallocated.
    pub fn invalidate_textures(&mut self) {
        self.texture_groups.clear();
    }

    /// Push the staged uniforms and bound textures for the next draw.
    pub fn apply(&mut self, device: &wgpu::Device, pass: &mut wgpu::RenderPass<'_>) -> anyhow::Result<()> {
        self.apply_uniforms(pass)?;
        self.apply_textures(device, pass)
    }

    pub fn apply_uniforms(&mut self, pass: &mut wgpu::RenderPass<'_>) -> anyhow::Result<()> {
        debug_assert!(self.in_use, "program '{}' applied without use_program", self.name);
        if self.draws >= self.capacity {
            bail!(
                "program '{}' has room for {} draws this frame, begin_frame under-counted",
                self.name,
                self.capacity
            );
        }
        let offset = self.draws * self.stride;
        self.arena.resize(offset + self.stride, 0);
        self.arena[offset..offset + self.staging.len()].copy_from_slice(&self.staging);
        pass.set_bind_group(0, &self.uniform_bind_group, &[offset as u32]);
        self.draws += 1;
        Ok(())
    }

    pub fn apply_textures(
        &mut self,
        device: &wgpu::Device,
        pass: &mut wgpu::RenderPass<'_>,
    ) -> anyhow::Result<()> {
        let Some(layout) = &self.texture_bind_group_layout else {
            return Ok(());
        };
        let mut textures = Vec::with_capacity(self.bound.len());
        for (slot, texture) in self.texture_slots.iter().zip(&self.bound) {
            textures.push(
                texture
                    .as_ref()
                    .with_context(|| format!("texture '{slot}' not bound for '{}'", self.name))?,
            );
        }
        let key: Vec<TextureId> = textures.iter().map(|t| t.id).collect();
        let group = self.texture_groups.entry(key).or_insert_with(|| {
            let mut entries: Vec<wgpu::BindGroupEntry> = textures
                .iter()
                .enumerate()
                .map(|(i, texture)| wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                })
                .collect();
            entries.push(wgpu::BindGroupEntry {
                binding: textures.len() as u32,
                resource: wgpu::BindingResource::Sampler(&textures[0].sampler),
            });
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(self.name),
                layout,
                entries: &entries,
            })
        });
        pass.set_bind_group(1, &*group, &[]);
        Ok(())
    }

    /// Write this frame's uniform blocks to the GPU.
    pub fn upload(&self, queue: &wgpu::Queue) {
        if !self.arena.is_empty() {
            queue.write_buffer(&self.uniform_buffer, 0, &self.arena);
        }
    }
}

fn texture_layout(device: &wgpu::Device, label: &str, textures: usize) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..textures)
        .map(|i| wgpu::BindGroupLayoutEntry {
            binding: i as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: textures as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn uniform_storage(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    stride: usize,
    capacity: usize,
    block_size: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (stride * capacity) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(block_size as u64),
            }),
        }],
    });
    (buffer, group)
}

/// All compiled programs, looked up by name.
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    programs: HashMap<&'static str, ShaderProgram>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, device: &wgpu::Device, desc: &ProgramDescriptor) {
        let program = ShaderProgram::new(device, desc);
        if self.programs.insert(desc.name, program).is_some() {
            log::warn!("program '{}' registered twice, keeping the newer one", desc.name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&ShaderProgram> {
        self.programs
            .get(name)
            .with_context(|| format!("no shader program named '{name}'"))
    }

    pub fn get_mut(&mut self, name: &str) -> anyhow::Result<&mut ShaderProgram> {
        self.programs
            .get_mut(name)
            .with_context(|| format!("no shader program named '{name}'"))
    }

    /// Size every program's arena for the frame. Programs missing from `budget` get none.
    pub fn begin_frame(&mut self, device: &wgpu::Device, budget: &HashMap<&'static str, usize>) {
        for (name, program) in self.programs.iter_mut() {
            program.begin_frame(device, budget.get(name).copied().unwrap_or(0));
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        self.programs.values().for_each(|p| p.upload(queue));
    }

    pub fn invalidate_textures(&mut self) {
        self.programs
            .values_mut()
            .for_each(ShaderProgram::invalidate_textures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_pack_behind_vec3_like_wgsl() {
        let layout = UniformLayout::new(&[
            ("u_lightDirection", UniformKind::Vec3),
            ("u_lightIntensity", UniformKind::Float),
            ("u_lightColor", UniformKind::Vec3),
            ("u_resolution", UniformKind::Vec2),
        ]);
        let offsets: Vec<usize> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16, 32]);
        assert_eq!(layout.size(), 48);
    }

    #[test]
    fn vec3_after_scalar_is_realigned() {
        let layout = UniformLayout::new(&[
            ("u_weight", UniformKind::Float),
            ("u_camPos", UniformKind::Vec3),
            ("u_camera", UniformKind::Mat4),
        ]);
        assert_eq!(layout.field("u_camPos").map(|f| f.offset), Some(16));
        assert_eq!(layout.field("u_camera").map(|f| f.offset), Some(32));
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn float_arrays_take_whole_vec4_rows() {
        let layout = UniformLayout::new(&[
            ("u_blurWeights", UniformKind::FloatArray(15)),
            ("u_blurRadius", UniformKind::Float),
        ]);
        assert_eq!(layout.field("u_blurRadius").map(|f| f.offset), Some(64));
        assert_eq!(layout.size(), 80);
    }

    #[test]
    fn empty_blocks_still_have_a_binding_size() {
        assert_eq!(UniformLayout::new(&[]).size(), 16);
    }

    #[test]
    fn writes_land_at_field_offsets() {
        let layout = UniformLayout::new(&[
            ("u_exposure", UniformKind::Float),
            ("u_tint", UniformKind::Vec4),
        ]);
        let mut staging = vec![0u8; layout.size()];
        assert_eq!(
            layout.write(&mut staging, "u_tint", [1.0, 2.0, 3.0, 4.0].into()),
            UniformWrite::Written
        );
        let floats: &[f32] = bytemuck::cast_slice(&staging);
        assert_eq!(&floats[4..8], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(floats[0], 0.0);
    }

    #[test]
    fn unknown_names_and_wrong_types_leave_staging_untouched() {
        let layout = UniformLayout::new(&[("u_gamma", UniformKind::Float)]);
        let mut staging = vec![0u8; layout.size()];
        assert_eq!(
            layout.write(&mut staging, "u_missing", 1.0.into()),
            UniformWrite::Missing
        );
        assert_eq!(
            layout.write(&mut staging, "u_gamma", [1.0, 1.0].into()),
            UniformWrite::Mismatch
        );
        assert!(staging.iter().all(|b| *b == 0));
    }

    #[test]
    fn float_arrays_reject_oversized_values() {
        let layout = UniformLayout::new(&[("u_w", UniformKind::FloatArray(3))]);
        let mut staging = vec![0u8; layout.size()];
        let values = [1.0f32; 4];
        assert_eq!(
            layout.write(&mut staging, "u_w", values.as_slice().into()),
            UniformWrite::Mismatch
        );
        assert_eq!(
            layout.write(&mut staging, "u_w", values[..3].into()),
            UniformWrite::Written
        );
    }
}
