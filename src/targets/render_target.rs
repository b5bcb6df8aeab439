//! Offscreen colour targets.
//!
//! A [`RenderTarget`] pairs one colour attachment with the rule that sizes it.
//! Binding a target for writing opens a render pass on its attachment; the pass
//! is handed back to [`RenderTarget::unbind`] which ends it and releases the
//! binding on the [`TargetStack`].

use anyhow::Context as _;

use crate::data_structures::texture::Texture;

use super::stack::{BindMode, TargetId, TargetStack};

/// How a target derives its pixel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSize {
    /// `viewport / divisor` on both axes.
    Viewport { divisor: u32 },
    Fixed { width: u32, height: u32 },
}

impl TargetSize {
    pub const FULL: TargetSize = TargetSize::Viewport { divisor: 1 };
    pub const HALF: TargetSize = TargetSize::Viewport { divisor: 2 };

    /// Resolve against the viewport. Never returns a zero dimension.
    pub fn resolve(self, viewport: (u32, u32)) -> (u32, u32) {
        match self {
            TargetSize::Viewport { divisor } => {
                let divisor = divisor.max(1);
                ((viewport.0 / divisor).max(1), (viewport.1 / divisor).max(1))
            }
            TargetSize::Fixed { width, height } => (width.max(1), height.max(1)),
        }
    }
}

/// What happens to a target's previous contents when it is bound for writing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Load {
    Clear(wgpu::Color),
    Keep,
}

impl Load {
    pub(crate) fn ops(self) -> wgpu::Operations<wgpu::Color> {
        wgpu::Operations {
            load: match self {
                Load::Clear(colour) => wgpu::LoadOp::Clear(colour),
                Load::Keep => wgpu::LoadOp::Load,
            },
            store: wgpu::StoreOp::Store,
        }
    }
}

#[derive(Debug)]
pub struct RenderTarget {
    id: TargetId,
    label: String,
    size: TargetSize,
    texture: Texture,
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: TargetSize,
        format: wgpu::TextureFormat,
        viewport: (u32, u32),
    ) -> Self {
        let (width, height) = size.resolve(viewport);
        let texture = Texture::create_render_texture(device, [width, height], format, label);
        log::debug!("created target '{label}' {width}x{height} {format:?}");
        Self {
            id: TargetId::next(),
            label: label.to_string(),
            size,
            texture,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size_rule(&self) -> TargetSize {
        self.size
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.texture.size()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format
    }

    /// Sampleable handle of the colour attachment.
    ///
    /// Only meaningful after a write pass completed; invalidated by [`RenderTarget::resize`].
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Reallocate the attachment for a new viewport. Format and size rule are kept.
    ///
    /// Returns `false` when the resolved size did not change and nothing was reallocated.
    pub fn resize(&mut self, device: &wgpu::Device, viewport: (u32, u32)) -> bool {
        let (width, height) = self.size.resolve(viewport);
        if (width, height) == self.dimensions() {
            return false;
        }
        self.texture =
            Texture::create_render_texture(device, [width, height], self.texture.format, &self.label);
        true
    }

    /// Bind for writing: opens a render pass on the colour attachment.
    pub fn bind<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        stack: &mut TargetStack,
        load: Load,
    ) -> wgpu::RenderPass<'e> {
        stack.bind(self.id, BindMode::Write);
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.texture.view,
                resolve_target: None,
                ops: load.ops(),
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }

    /// End the pass opened by [`RenderTarget::bind`] and release the binding.
    pub fn unbind(&self, pass: wgpu::RenderPass<'_>, stack: &mut TargetStack) {
        drop(pass);
        stack.unbind(self.id);
    }

    /// Copy the colour attachment back to the CPU as tightly packed rows.
    ///
    /// Blocks until the GPU finished; meant for tests and debugging, not the frame loop.
    pub fn read_pixels(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        stack: &mut TargetStack,
    ) -> anyhow::Result<Vec<u8>> {
        let (width, height) = self.dimensions();
        let texel = self
            .texture
            .format
            .block_copy_size(None)
            .context("target format cannot be copied")?;
        let unpadded = width * texel;
        // copy rows must be aligned to 256 bytes
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("target read-back"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        stack.bind(self.id, BindMode::Read);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Read-back Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));
        stack.unbind(self.id);

        let slice = buffer.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(std::time::Duration::from_secs(3)),
            })
            .map_err(|e| anyhow::anyhow!("device poll failed: {e}"))?;
        futures::executor::block_on(rx.receive())
            .context("read-back channel closed")??;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_fractions_truncate_and_never_reach_zero() {
        let viewport = (1440, 900);
        assert_eq!(TargetSize::FULL.resolve(viewport), (1440, 900));
        assert_eq!(TargetSize::HALF.resolve(viewport), (720, 450));
        assert_eq!(TargetSize::Viewport { divisor: 16 }.resolve(viewport), (90, 56));
        assert_eq!(TargetSize::Viewport { divisor: 16 }.resolve((8, 8)), (1, 1));
        assert_eq!(TargetSize::Viewport { divisor: 0 }.resolve((8, 4)), (8, 4));
    }

    #[test]
    fn fixed_sizes_ignore_the_viewport() {
        let shadow = TargetSize::Fixed {
            width: 2048,
            height: 2048,
        };
        assert_eq!(shadow.resolve((1, 1)), (2048, 2048));
        assert_eq!(TargetSize::Fixed { width: 0, height: 3 }.resolve((1, 1)), (1, 3));
    }
}
