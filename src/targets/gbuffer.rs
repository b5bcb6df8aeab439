//! G-buffer attachments.
//!
//! The channel set and its formats are fixed when the buffer is created. A resize
//! reallocates every attachment (and the depth buffer) with the same formats.

use crate::data_structures::texture::Texture;

use super::{
    render_target::Load,
    stack::{BindMode, TargetId, TargetStack},
};

/// One colour attachment of the G-buffer, in attachment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GBufferChannel {
    Albedo,
    Normal,
    Position,
    Emissive,
    MaterialProps,
}

impl GBufferChannel {
    pub const COUNT: usize = 5;

    pub const ALL: [GBufferChannel; Self::COUNT] = [
        GBufferChannel::Albedo,
        GBufferChannel::Normal,
        GBufferChannel::Position,
        GBufferChannel::Emissive,
        GBufferChannel::MaterialProps,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            GBufferChannel::Albedo | GBufferChannel::MaterialProps => {
                wgpu::TextureFormat::Rgba8Unorm
            }
            GBufferChannel::Normal | GBufferChannel::Position | GBufferChannel::Emissive => {
                wgpu::TextureFormat::Rgba16Float
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GBufferChannel::Albedo => "Albedo",
            GBufferChannel::Normal => "Normal",
            GBufferChannel::Position => "Position",
            GBufferChannel::Emissive => "Emissive",
            GBufferChannel::MaterialProps => "MaterialProps",
        }
    }

    pub fn formats() -> [wgpu::TextureFormat; Self::COUNT] {
        Self::ALL.map(Self::format)
    }
}

#[derive(Debug)]
pub struct GBuffer {
    id: TargetId,
    size: (u32, u32),
    attachments: Vec<Texture>,
    depth: Texture,
}

impl GBuffer {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = (width.max(1), height.max(1));
        Self {
            id: TargetId::next(),
            size,
            attachments: Self::allocate(device, size),
            depth: Texture::create_depth_texture(device, [size.0, size.1], "gbuffer depth"),
        }
    }

    fn allocate(device: &wgpu::Device, size: (u32, u32)) -> Vec<Texture> {
        GBufferChannel::ALL
            .iter()
            .map(|channel| {
                Texture::create_render_texture(
                    device,
                    [size.0, size.1],
                    channel.format(),
                    &format!("gbuffer {}", channel.name()),
                )
            })
            .collect()
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.size
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn texture(&self, channel: GBufferChannel) -> &Texture {
        &self.attachments[channel.index()]
    }

    /// Index based access used by debug views. Out of range is a programming error.
    pub fn texture_at(&self, index: usize) -> &Texture {
        assert!(
            index < self.attachments.len(),
            "gbuffer channel {index} out of range (0..{})",
            self.attachments.len()
        );
        &self.attachments[index]
    }

    pub fn depth(&self) -> &Texture {
        &self.depth
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if size == self.size {
            return;
        }
        self.size = size;
        self.attachments = Self::allocate(device, size);
        self.depth = Texture::create_depth_texture(device, [size.0, size.1], "gbuffer depth");
        log::debug!("gbuffer reallocated at {}x{}", size.0, size.1);
    }

    /// Bind every channel plus depth for writing. The albedo channel is cleared
    /// to `background`, all others to transparent black, depth to 1.
    pub fn bind<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        stack: &mut TargetStack,
        background: wgpu::Color,
    ) -> wgpu::RenderPass<'e> {
        stack.bind(self.id, BindMode::Write);
        let attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = self
            .attachments
            .iter()
            .enumerate()
            .map(|(i, texture)| {
                let clear = if i == GBufferChannel::Albedo.index() {
                    background
                } else {
                    wgpu::Color::TRANSPARENT
                };
                Some(wgpu::RenderPassColorAttachment {
                    view: &texture.view,
                    resolve_target: None,
                    ops: Load::Clear(clear).ops(),
                    depth_slice: None,
                })
            })
            .collect();
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GBuffer Pass"),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }

    pub fn unbind(&self, pass: wgpu::RenderPass<'_>, stack: &mut TargetStack) {
        drop(pass);
        stack.unbind(self.id);
    }
}
