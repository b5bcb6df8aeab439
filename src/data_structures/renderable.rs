use cgmath::{Matrix4, One, Quaternion, Vector3};

use crate::{
    data_structures::{material::Material, mesh::Mesh},
    resources::AssetHandle,
};

/// A mesh drawn with a material at a transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Renderable {
    pub mesh: AssetHandle<Mesh>,
    pub material: AssetHandle<Material>,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Renderable {
    pub fn new(mesh: AssetHandle<Mesh>, material: AssetHandle<Material>) -> Self {
        Self {
            mesh,
            material,
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_position(mut self, position: impl Into<Vector3<f32>>) -> Self {
        self.position = position.into();
        self
    }

    pub fn with_rotation(mut self, rotation: Quaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: impl Into<Vector3<f32>>) -> Self {
        self.scale = scale.into();
        self
    }

    /// Translate * rotate * scale.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}
