use cgmath::{InnerSpace, Matrix4, Point3, Transform, Vector3};

use crate::{
    data_structures::{
        material::Material,
        mesh::{Mesh, MeshData, MeshVertex},
    },
    resources::AssetHandle,
    sprite_batch::Rect,
};

/// World-space textured quads sharing one material, uploaded as a single mesh.
///
/// Fill between [`QuadBatch::begin`] and [`QuadBatch::end`]; the G-buffer pass
/// draws whatever was last ended.
#[derive(Debug)]
pub struct QuadBatch {
    material: AssetHandle<Material>,
    data: MeshData,
    mesh: Option<Mesh>,
}

impl QuadBatch {
    pub fn new(material: AssetHandle<Material>) -> Self {
        Self {
            material,
            data: MeshData::default(),
            mesh: None,
        }
    }

    pub fn material(&self) -> AssetHandle<Material> {
        self.material
    }

    pub fn begin(&mut self) {
        self.data = MeshData::default();
    }

    /// Add the unit quad (XY plane, facing +Z) placed by `transform`.
    pub fn add(&mut self, transform: Matrix4<f32>, uv: Rect) {
        let normal = transform
            .transform_vector(Vector3::unit_z())
            .normalize();
        let tangent = transform
            .transform_vector(Vector3::unit_x())
            .normalize();
        let base = self.data.vertices.len() as u32;
        for (x, y, tex_coords) in [
            (-0.5, -0.5, [uv.x, uv.y + uv.h]),
            (0.5, -0.5, [uv.x + uv.w, uv.y + uv.h]),
            (0.5, 0.5, [uv.x + uv.w, uv.y]),
            (-0.5, 0.5, [uv.x, uv.y]),
        ] {
            let position = transform.transform_point(Point3::new(x, y, 0.0));
            self.data.vertices.push(MeshVertex {
                position: position.into(),
                tex_coords,
                normal: normal.into(),
                tangent: tangent.into(),
            });
        }
        self.data
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Upload the quads added since `begin`.
    pub fn end(&mut self, device: &wgpu::Device) {
        self.mesh = (!self.data.indices.is_empty())
            .then(|| Mesh::from_data(device, "quad batch", &self.data));
    }

    pub fn len(&self) -> usize {
        self.data.vertices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.data.vertices.is_empty()
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Matrix4};

    use super::*;

    #[test]
    fn quads_are_placed_by_their_transform() {
        let mut batch = QuadBatch::new(AssetHandle::from_raw(3));
        batch.begin();
        let transform = Matrix4::from_translation(Vector3::new(0.0, 2.0, 0.0))
            * Matrix4::from_angle_x(Deg(-90.0))
            * Matrix4::from_scale(4.0);
        batch.add(transform, Rect::UNIT);
        assert_eq!(batch.len(), 1);
        let data = batch.data();
        for v in &data.vertices {
            assert!((v.position[1] - 2.0).abs() < 1e-5);
            assert!((Vector3::from(v.normal) - Vector3::unit_y()).magnitude() < 1e-5);
        }
        assert_eq!(data.vertices[3].tex_coords, [0.0, 0.0]);
        assert_eq!(data.vertices[3].position[0], -2.0);
    }
}
