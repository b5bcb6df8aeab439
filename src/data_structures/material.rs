use crate::{data_structures::texture::Texture, resources::AssetHandle};

/// Texture slots of a material, in G-buffer program binding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Normal,
    Emissive,
    Metallic,
    Roughness,
    AO,
}

impl TextureSlot {
    pub const COUNT: usize = 6;

    pub const ALL: [TextureSlot; Self::COUNT] = [
        TextureSlot::Albedo,
        TextureSlot::Normal,
        TextureSlot::Emissive,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
        TextureSlot::AO,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Sampler name in the G-buffer programs.
    pub fn uniform(self) -> &'static str {
        match self {
            TextureSlot::Albedo => "u_albedoMap",
            TextureSlot::Normal => "u_normalMap",
            TextureSlot::Emissive => "u_emissiveMap",
            TextureSlot::Metallic => "u_metallicMap",
            TextureSlot::Roughness => "u_roughnessMap",
            TextureSlot::AO => "u_aoMap",
        }
    }
}

/// Surface description consumed by the G-buffer pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    textures: [AssetHandle<Texture>; TextureSlot::COUNT],
    /// Multiplied into the albedo map.
    pub albedo_color: [f32; 4],
    pub emissive_intensity: f32,
    /// Rendered without back-face culling.
    pub two_sided: bool,
}

impl Material {
    /// A plain white, non-metallic, fully rough material built from fallback maps.
    pub fn new(
        white: AssetHandle<Texture>,
        flat_normal: AssetHandle<Texture>,
        black: AssetHandle<Texture>,
    ) -> Self {
        Self {
            textures: [white, flat_normal, black, black, white, white],
            albedo_color: [1.0; 4],
            emissive_intensity: 1.0,
            two_sided: false,
        }
    }

    pub fn texture(&self, slot: TextureSlot) -> AssetHandle<Texture> {
        self.textures[slot.index()]
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: AssetHandle<Texture>) {
        self.textures[slot.index()] = texture;
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: AssetHandle<Texture>) -> Self {
        self.set_texture(slot, texture);
        self
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, AssetHandle<Texture>)> + '_ {
        TextureSlot::ALL.into_iter().map(|slot| (slot, self.texture(slot)))
    }
}
