//! Screen-space quad batching.
//!
//! [`GlyphBatch`] is the CPU side: it collects textured quads between `begin` and
//! `end`, sorts them, and cuts the sorted list into [`RenderBatch`]es, one per run
//! of quads sharing a texture. [`SpriteBatch`] adds the vertex buffer and the
//! textures it needs to issue one draw per run.

use std::collections::HashMap;

use cgmath::Rad;

use crate::{
    data_structures::texture::{Texture, TextureId},
    shader::ShaderProgram,
};

/// Texture slot the sprite program samples from.
pub const SPRITE_TEXTURE: &str = "u_texture";

const VERTICES_PER_GLYPH: usize = 6;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub colour: [f32; 4],
    pub uv: [f32; 2],
}

impl SpriteVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Axis aligned rectangle, `(x, y)` is the bottom left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// The whole texture, or clip space covering the whole viewport, depending on use.
    pub const UNIT: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);
    pub const CLIP: Rect = Rect::new(-1.0, -1.0, 2.0, 2.0);
}

impl From<[f32; 4]> for Rect {
    fn from([x, y, w, h]: [f32; 4]) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlyphSortType {
    /// Insertion order.
    None,
    /// Smaller depth first.
    FrontToBack,
    /// Larger depth first.
    BackToFront,
    /// Grouped by texture, insertion order within a texture.
    #[default]
    Texture,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoordinateFormat {
    #[default]
    Cartesian,
    /// Corners are mapped `(x, y) -> (x - y, (x + y) / 2)` after rotation.
    Isometric,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glyph {
    pub texture: TextureId,
    pub depth: f32,
    pub top_left: SpriteVertex,
    pub bottom_left: SpriteVertex,
    pub top_right: SpriteVertex,
    pub bottom_right: SpriteVertex,
}

impl Glyph {
    /// UVs follow wgpu's top-left texture origin: the top edge samples `uv.y`.
    pub fn new(dest: Rect, uv: Rect, texture: TextureId, colour: [f32; 4], depth: f32) -> Self {
        let corners = [
            [dest.x, dest.y + dest.h],
            [dest.x, dest.y],
            [dest.x + dest.w, dest.y + dest.h],
            [dest.x + dest.w, dest.y],
        ];
        Self::from_corners(corners, uv, texture, colour, depth)
    }

    /// Like [`Glyph::new`] with the corners rotated by `angle` about the rect's centre.
    pub fn rotated(
        dest: Rect,
        uv: Rect,
        texture: TextureId,
        colour: [f32; 4],
        depth: f32,
        angle: Rad<f32>,
        format: CoordinateFormat,
    ) -> Self {
        let (sin, cos) = angle.0.sin_cos();
        let (hw, hh) = (dest.w / 2.0, dest.h / 2.0);
        let centre = [dest.x + hw, dest.y + hh];
        let corners = [[-hw, hh], [-hw, -hh], [hw, hh], [hw, -hh]].map(|[x, y]| {
            let (x, y) = (x * cos - y * sin, x * sin + y * cos);
            let (x, y) = match format {
                CoordinateFormat::Cartesian => (x, y),
                CoordinateFormat::Isometric => (x - y, (x + y) * 0.5),
            };
            [centre[0] + x, centre[1] + y]
        });
        Self::from_corners(corners, uv, texture, colour, depth)
    }

    fn from_corners(
        [tl, bl, tr, br]: [[f32; 2]; 4],
        uv: Rect,
        texture: TextureId,
        colour: [f32; 4],
        depth: f32,
    ) -> Self {
        let vertex = |position, uv| SpriteVertex {
            position,
            colour,
            uv,
        };
        Self {
            texture,
            depth,
            top_left: vertex(tl, [uv.x, uv.y]),
            bottom_left: vertex(bl, [uv.x, uv.y + uv.h]),
            top_right: vertex(tr, [uv.x + uv.w, uv.y]),
            bottom_right: vertex(br, [uv.x + uv.w, uv.y + uv.h]),
        }
    }

    /// Two counter-clockwise triangles.
    pub fn vertices(&self) -> [SpriteVertex; VERTICES_PER_GLYPH] {
        [
            self.top_left,
            self.bottom_left,
            self.bottom_right,
            self.bottom_right,
            self.top_right,
            self.top_left,
        ]
    }
}

/// A contiguous run of vertices drawn with one texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderBatch {
    pub offset: u32,
    pub num_vertices: u32,
    pub texture: TextureId,
}

#[derive(Debug, Default)]
pub struct GlyphBatch {
    sort: GlyphSortType,
    glyphs: Vec<Glyph>,
    batches: Vec<RenderBatch>,
    vertices: Vec<SpriteVertex>,
}

impl GlyphBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame of glyphs. Everything from the previous frame is dropped.
    pub fn begin(&mut self, sort: GlyphSortType) {
        self.sort = sort;
        self.glyphs.clear();
        self.batches.clear();
        self.vertices.clear();
    }

    pub fn add(&mut self, dest: Rect, uv: Rect, texture: TextureId, colour: [f32; 4], depth: f32) {
        self.glyphs.push(Glyph::new(dest, uv, texture, colour, depth));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_rotated(
        &mut self,
        dest: Rect,
        uv: Rect,
        texture: TextureId,
        colour: [f32; 4],
        depth: f32,
        angle: Rad<f32>,
        format: CoordinateFormat,
    ) {
        self.glyphs
            .push(Glyph::rotated(dest, uv, texture, colour, depth, angle, format));
    }

    /// Append the glyphs of `other` as if they had been added here.
    pub fn merge_glyphs(&mut self, other: &GlyphBatch) {
        self.glyphs.extend_from_slice(&other.glyphs);
    }

    /// Sort the glyphs and cut them into same-texture runs.
    pub fn end(&mut self) {
        match self.sort {
            GlyphSortType::None => (),
            GlyphSortType::FrontToBack => self.glyphs.sort_by(|a, b| a.depth.total_cmp(&b.depth)),
            GlyphSortType::BackToFront => self.glyphs.sort_by(|a, b| b.depth.total_cmp(&a.depth)),
            GlyphSortType::Texture => self.glyphs.sort_by_key(|g| g.texture),
        }

        self.batches.clear();
        self.vertices.clear();
        self.vertices.reserve(self.glyphs.len() * VERTICES_PER_GLYPH);
        for glyph in &self.glyphs {
            let offset = self.vertices.len() as u32;
            self.vertices.extend_from_slice(&glyph.vertices());
            match self.batches.last_mut() {
                Some(batch) if batch.texture == glyph.texture => {
                    batch.num_vertices += VERTICES_PER_GLYPH as u32
                }
                _ => self.batches.push(RenderBatch {
                    offset,
                    num_vertices: VERTICES_PER_GLYPH as u32,
                    texture: glyph.texture,
                }),
            }
        }
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn batches(&self) -> &[RenderBatch] {
        &self.batches
    }

    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// A [`GlyphBatch`] with the GPU resources to draw it.
#[derive(Debug)]
pub struct SpriteBatch {
    label: String,
    glyphs: GlyphBatch,
    textures: HashMap<TextureId, Texture>,
    buffer: wgpu::Buffer,
    capacity: usize,
}

impl SpriteBatch {
    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        let capacity = 64 * VERTICES_PER_GLYPH;
        Self {
            label: label.to_string(),
            glyphs: GlyphBatch::new(),
            textures: HashMap::new(),
            buffer: vertex_buffer(device, label, capacity),
            capacity,
        }
    }

    pub fn begin(&mut self, sort: GlyphSortType) {
        self.glyphs.begin(sort);
        self.textures.clear();
    }

    pub fn add(&mut self, dest: Rect, uv: Rect, texture: &Texture, colour: [f32; 4], depth: f32) {
        self.textures.entry(texture.id).or_insert_with(|| texture.clone());
        self.glyphs.add(dest, uv, texture.id, colour, depth);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_rotated(
        &mut self,
        dest: Rect,
        uv: Rect,
        texture: &Texture,
        colour: [f32; 4],
        depth: f32,
        angle: Rad<f32>,
        format: CoordinateFormat,
    ) {
        self.textures.entry(texture.id).or_insert_with(|| texture.clone());
        self.glyphs
            .add_rotated(dest, uv, texture.id, colour, depth, angle, format);
    }

    pub fn merge_glyphs(&mut self, other: &SpriteBatch) {
        self.glyphs.merge_glyphs(&other.glyphs);
        for (id, texture) in &other.textures {
            self.textures.entry(*id).or_insert_with(|| texture.clone());
        }
    }

    /// Sort, batch and upload. Call once per frame; the buffer holds a single frame of vertices.
    pub fn end(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.glyphs.end();
        let needed = self.glyphs.vertices().len();
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            self.buffer = vertex_buffer(device, &self.label, self.capacity);
        }
        if needed > 0 {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(self.glyphs.vertices()));
        }
    }

    pub fn glyphs(&self) -> &GlyphBatch {
        &self.glyphs
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// One draw per run. `program` must be in use and have its uniforms applied.
    pub fn render_batch(
        &self,
        device: &wgpu::Device,
        pass: &mut wgpu::RenderPass<'_>,
        program: &mut ShaderProgram,
    ) -> anyhow::Result<()> {
        if self.glyphs.batches().is_empty() {
            return Ok(());
        }
        pass.set_vertex_buffer(0, self.buffer.slice(..));
        for batch in self.glyphs.batches() {
            let Some(texture) = self.textures.get(&batch.texture) else {
                log::warn!("sprite batch '{}' lost texture {:?}", self.label, batch.texture);
                continue;
            };
            program.bind_texture(SPRITE_TEXTURE, texture);
            program.apply_textures(device, pass)?;
            pass.draw(batch.offset..batch.offset + batch.num_vertices, 0..1);
        }
        Ok(())
    }
}

fn vertex_buffer(device: &wgpu::Device, label: &str, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (vertices * std::mem::size_of::<SpriteVertex>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [f32; 4] = [1.0; 4];

    fn tex(raw: u64) -> TextureId {
        TextureId::from_raw(raw)
    }

    #[test]
    fn begin_drops_previous_frame() {
        let mut batch = GlyphBatch::new();
        batch.begin(GlyphSortType::None);
        batch.add(Rect::UNIT, Rect::UNIT, tex(1), WHITE, 0.0);
        batch.end();
        batch.begin(GlyphSortType::None);
        assert!(batch.glyphs().is_empty());
        assert!(batch.batches().is_empty());
        assert!(batch.vertices().is_empty());
    }

    #[test]
    fn texture_sort_keeps_each_texture_in_one_run() {
        let mut batch = GlyphBatch::new();
        batch.begin(GlyphSortType::Texture);
        for t in [3, 1, 3, 2, 1, 3] {
            batch.add(Rect::UNIT, Rect::UNIT, tex(t), WHITE, 0.0);
        }
        batch.end();
        let textures: Vec<u64> = batch.batches().iter().map(|b| b.texture.raw()).collect();
        assert_eq!(textures, vec![1, 2, 3]);
        let counts: Vec<u32> = batch.batches().iter().map(|b| b.num_vertices).collect();
        assert_eq!(counts, vec![12, 6, 18]);
        assert_eq!(batch.vertices().len(), 36);
    }

    #[test]
    fn unsorted_batches_split_on_every_texture_change() {
        let mut batch = GlyphBatch::new();
        batch.begin(GlyphSortType::None);
        for t in [1, 1, 2, 1] {
            batch.add(Rect::UNIT, Rect::UNIT, tex(t), WHITE, 0.0);
        }
        batch.end();
        let runs: Vec<(u32, u32)> = batch
            .batches()
            .iter()
            .map(|b| (b.offset, b.num_vertices))
            .collect();
        assert_eq!(runs, vec![(0, 12), (12, 6), (18, 6)]);
    }

    #[test]
    fn depth_sorts_are_stable() {
        let mut batch = GlyphBatch::new();
        batch.begin(GlyphSortType::BackToFront);
        batch.add(Rect::UNIT, Rect::UNIT, tex(1), WHITE, 1.0);
        batch.add(Rect::UNIT, Rect::UNIT, tex(2), WHITE, 5.0);
        batch.add(Rect::UNIT, Rect::UNIT, tex(3), WHITE, 1.0);
        batch.end();
        let order: Vec<u64> = batch.glyphs().iter().map(|g| g.texture.raw()).collect();
        assert_eq!(order, vec![2, 1, 3]);

        batch.begin(GlyphSortType::FrontToBack);
        batch.add(Rect::UNIT, Rect::UNIT, tex(1), WHITE, 1.0);
        batch.add(Rect::UNIT, Rect::UNIT, tex(2), WHITE, -2.0);
        batch.end();
        assert_eq!(batch.glyphs()[0].texture, tex(2));
    }

    #[test]
    fn uvs_put_texture_row_zero_on_the_top_edge() {
        let glyph = Glyph::new(Rect::CLIP, Rect::UNIT, tex(1), WHITE, 0.0);
        assert_eq!(glyph.top_left.position, [-1.0, 1.0]);
        assert_eq!(glyph.top_left.uv, [0.0, 0.0]);
        assert_eq!(glyph.bottom_right.position, [1.0, -1.0]);
        assert_eq!(glyph.bottom_right.uv, [1.0, 1.0]);
    }

    #[test]
    fn rotation_turns_about_the_centre() {
        let dest = Rect::new(2.0, 2.0, 2.0, 2.0);
        let glyph = Glyph::rotated(
            dest,
            Rect::UNIT,
            tex(1),
            WHITE,
            0.0,
            Rad(std::f32::consts::FRAC_PI_2),
            CoordinateFormat::Cartesian,
        );
        // a quarter turn moves the top left corner to the bottom left
        let [x, y] = glyph.top_left.position;
        assert!((x - 2.0).abs() < 1e-5 && (y - 2.0).abs() < 1e-5, "{x},{y}");
        let unrotated = Glyph::rotated(
            dest,
            Rect::UNIT,
            tex(1),
            WHITE,
            0.0,
            Rad(0.0),
            CoordinateFormat::Cartesian,
        );
        assert_eq!(unrotated, Glyph::new(dest, Rect::UNIT, tex(1), WHITE, 0.0));
    }

    #[test]
    fn merge_appends_without_sorting() {
        let mut a = GlyphBatch::new();
        let mut b = GlyphBatch::new();
        a.begin(GlyphSortType::None);
        b.begin(GlyphSortType::None);
        a.add(Rect::UNIT, Rect::UNIT, tex(2), WHITE, 0.0);
        b.add(Rect::UNIT, Rect::UNIT, tex(1), WHITE, 0.0);
        a.merge_glyphs(&b);
        let order: Vec<u64> = a.glyphs().iter().map(|g| g.texture.raw()).collect();
        assert_eq!(order, vec![2, 1]);
    }
}
