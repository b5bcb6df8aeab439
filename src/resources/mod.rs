//! Asset loading and lookup.
//!
//! The [`AssetManager`] resolves textures, meshes and materials by name. Every
//! cache is created with a default entry, so a missing asset degrades to a
//! white texture, a cube or a plain material instead of failing the frame.

use std::io::{BufReader, Cursor};

use crate::data_structures::{
    material::{Material, TextureSlot},
    mesh::{Mesh, MeshData},
    texture::Texture,
};

pub mod cache;
pub mod mesh;
pub mod texture;

pub use cache::{AssetCache, AssetHandle};

pub const WHITE_TEXTURE: &str = "enjon.textures.white";
pub const FLAT_NORMAL_TEXTURE: &str = "enjon.textures.flat_normal";
pub const BLACK_TEXTURE: &str = "enjon.textures.black";
pub const CUBE_MESH: &str = "enjon.meshes.cube";
pub const QUAD_MESH: &str = "enjon.meshes.quad";
pub const DEFAULT_MATERIAL: &str = "enjon.materials.default";

/// Handles produced by loading an OBJ file.
#[derive(Clone, Debug)]
pub struct ObjAsset {
    pub mesh: AssetHandle<Mesh>,
    /// One per `newmtl` entry of the referenced material library, named `<file>/<material>`.
    pub materials: Vec<AssetHandle<Material>>,
}

#[derive(Debug)]
pub struct AssetManager {
    textures: AssetCache<Texture>,
    meshes: AssetCache<Mesh>,
    materials: AssetCache<Material>,
}

impl AssetManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let mut textures = AssetCache::new(
            "texture",
            WHITE_TEXTURE,
            Texture::from_color(device, queue, [255, 255, 255, 255], WHITE_TEXTURE),
        );
        let white = textures.default_handle();
        let flat_normal = textures.insert(
            FLAT_NORMAL_TEXTURE,
            Texture::create_default_normal_map(1, 1, device, queue),
        );
        let black = textures.insert(
            BLACK_TEXTURE,
            Texture::from_color(device, queue, [0, 0, 0, 255], BLACK_TEXTURE),
        );

        let mut meshes = AssetCache::new(
            "mesh",
            CUBE_MESH,
            Mesh::from_data(device, CUBE_MESH, &MeshData::cube()),
        );
        meshes.insert(QUAD_MESH, Mesh::from_data(device, QUAD_MESH, &MeshData::quad()));

        let materials = AssetCache::new(
            "material",
            DEFAULT_MATERIAL,
            Material::new(white, flat_normal, black),
        );

        Self {
            textures,
            meshes,
            materials,
        }
    }

    pub fn texture(&self, name: &str) -> AssetHandle<Texture> {
        self.textures.handle(name)
    }

    pub fn mesh(&self, name: &str) -> AssetHandle<Mesh> {
        self.meshes.handle(name)
    }

    pub fn material(&self, name: &str) -> AssetHandle<Material> {
        self.materials.handle(name)
    }

    pub fn get_texture(&self, handle: AssetHandle<Texture>) -> &Texture {
        self.textures.get(handle)
    }

    pub fn get_mesh(&self, handle: AssetHandle<Mesh>) -> &Mesh {
        self.meshes.get(handle)
    }

    pub fn get_material(&self, handle: AssetHandle<Material>) -> &Material {
        self.materials.get(handle)
    }

    pub fn get_material_mut(&mut self, handle: AssetHandle<Material>) -> &mut Material {
        self.materials.get_mut(handle)
    }

    pub fn add_texture(&mut self, name: &str, texture: Texture) -> AssetHandle<Texture> {
        self.textures.insert(name, texture)
    }

    pub fn add_mesh(&mut self, name: &str, mesh: Mesh) -> AssetHandle<Mesh> {
        self.meshes.insert(name, mesh)
    }

    pub fn add_material(&mut self, name: &str, material: Material) -> AssetHandle<Material> {
        self.materials.insert(name, material)
    }

    /// A fresh copy of the default material, to customise and register.
    pub fn new_material(&self) -> Material {
        self.materials.get(self.materials.default_handle()).clone()
    }

    /// Load an image from the asset directory and register it under its file name.
    pub async fn load_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        file_name: &str,
        is_normal_map: bool,
    ) -> anyhow::Result<AssetHandle<Texture>> {
        if let Some(handle) = self.textures.find(file_name) {
            return Ok(handle);
        }
        let texture = texture::load_texture(file_name, is_normal_map, device, queue, None).await?;
        log::info!("loaded texture {file_name}");
        Ok(self.textures.insert(file_name, texture))
    }

    /// Load an OBJ file (and its material library, if any) from the asset directory.
    ///
    /// All models in the file are merged into one mesh registered under the file name.
    pub async fn load_mesh_obj(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        file_name: &str,
    ) -> anyhow::Result<ObjAsset> {
        let obj_text = texture::load_string(file_name).await?;
        let mut obj_reader = BufReader::new(Cursor::new(obj_text));

        let (models, obj_materials) = tobj::load_obj_buf_async(
            &mut obj_reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |p| async move {
                match texture::load_string(&p).await {
                    Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                    Err(e) => {
                        log::warn!("{e:#}");
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            },
        )
        .await?;

        let data = mesh::mesh_data_from_obj(&models, file_name);
        let mesh = self.add_mesh(file_name, Mesh::from_data(device, file_name, &data));

        let mut materials = Vec::new();
        match obj_materials {
            Ok(obj_materials) => {
                for m in obj_materials {
                    let mut material = self.new_material();
                    if let Some(diffuse) = &m.diffuse_texture {
                        let handle = self.load_texture(device, queue, diffuse, false).await?;
                        material.set_texture(TextureSlot::Albedo, handle);
                    }
                    if let Some(normal) = &m.normal_texture {
                        let handle = self.load_texture(device, queue, normal, true).await?;
                        material.set_texture(TextureSlot::Normal, handle);
                    }
                    if let Some([r, g, b]) = m.diffuse {
                        material.albedo_color = [r, g, b, m.dissolve.unwrap_or(1.0)];
                    }
                    materials.push(self.add_material(&format!("{file_name}/{}", m.name), material));
                }
            }
            Err(e) => log::warn!("{file_name} has no usable material library: {e}"),
        }

        log::info!(
            "loaded {file_name}: {} vertices, {} materials",
            data.vertices.len(),
            materials.len()
        );
        Ok(ObjAsset { mesh, materials })
    }
}
