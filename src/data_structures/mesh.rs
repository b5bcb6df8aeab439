//! Indexed triangle meshes for the G-buffer pass.

use cgmath::{InnerSpace, Vector2, Vector3};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl MeshVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3,
        3 => Float32x3,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// CPU side geometry, counter-clockwise front faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centred on the origin, one quad of four vertices per face.
    pub fn cube() -> Self {
        let faces: [([f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
        ];
        let mut data = MeshData::default();
        for (normal, tangent) in faces {
            data.push_face(normal.into(), tangent.into(), 0.5);
        }
        data
    }

    /// Unit quad in the XY plane facing +Z.
    pub fn quad() -> Self {
        let mut data = MeshData::default();
        data.push_face(Vector3::unit_z(), Vector3::unit_x(), 0.0);
        data
    }

    /// Quad spanned by `tangent` and `normal x tangent`, pushed `offset` along `normal`.
    fn push_face(&mut self, normal: Vector3<f32>, tangent: Vector3<f32>, offset: f32) {
        let up = normal.cross(tangent);
        let centre = normal * offset;
        let base = self.vertices.len() as u32;
        for (s, t, uv) in [
            (-0.5, -0.5, [0.0, 1.0]),
            (0.5, -0.5, [1.0, 1.0]),
            (0.5, 0.5, [1.0, 0.0]),
            (-0.5, 0.5, [0.0, 0.0]),
        ] {
            self.vertices.push(MeshVertex {
                position: (centre + tangent * s + up * t).into(),
                tex_coords: uv,
                normal: normal.into(),
                tangent: tangent.into(),
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Per-vertex tangents averaged from the triangles sharing the vertex.
    ///
    /// Formats like OBJ carry no tangents, but the normal maps need them.
    pub fn compute_tangents(&mut self) {
        let mut accumulated = vec![Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        for c in self.indices.chunks_exact(3) {
            let [v0, v1, v2] = [c[0], c[1], c[2]].map(|i| self.vertices[i as usize]);

            let pos0: Vector3<f32> = v0.position.into();
            let delta_pos1 = Vector3::from(v1.position) - pos0;
            let delta_pos2 = Vector3::from(v2.position) - pos0;

            let uv0: Vector2<f32> = v0.tex_coords.into();
            let delta_uv1 = Vector2::from(v1.tex_coords) - uv0;
            let delta_uv2 = Vector2::from(v2.tex_coords) - uv0;

            //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
            //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
            let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) / det;
            for i in c {
                accumulated[*i as usize] += tangent;
            }
        }
        for (vertex, tangent) in self.vertices.iter_mut().zip(accumulated) {
            if tangent.magnitude2() > 0.0 {
                vertex.tangent = tangent.normalize().into();
            }
        }
    }

    /// Append `other`, rebasing its indices.
    pub fn append(&mut self, other: &MeshData) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl Mesh {
    pub fn from_data(device: &wgpu::Device, name: &str, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name:?} Vertex Buffer")),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name:?} Index Buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: data.indices.len() as u32,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.num_elements, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winding_normal(data: &MeshData, tri: &[u32]) -> Vector3<f32> {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::from(data.vertices[i as usize].position));
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn cube_faces_wind_counter_clockwise_outwards() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for tri in cube.indices.chunks(3) {
            let normal = Vector3::from(cube.vertices[tri[0] as usize].normal);
            assert!(winding_normal(&cube, tri).dot(normal) > 0.99);
        }
        for v in &cube.vertices {
            assert!(v.position.iter().all(|p| p.abs() == 0.5));
        }
    }

    #[test]
    fn recomputed_tangents_follow_u() {
        let mut quad = MeshData::quad();
        quad.vertices.iter_mut().for_each(|v| v.tangent = [0.0; 3]);
        quad.compute_tangents();
        for v in &quad.vertices {
            assert!((Vector3::from(v.tangent) - Vector3::unit_x()).magnitude() < 1e-5);
        }
    }

    #[test]
    fn degenerate_uvs_leave_tangents_alone() {
        let mut quad = MeshData::quad();
        quad.vertices.iter_mut().for_each(|v| v.tex_coords = [0.5, 0.5]);
        quad.compute_tangents();
        assert!(quad.vertices.iter().all(|v| v.tangent == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn append_rebases_indices() {
        let mut data = MeshData::quad();
        data.append(&MeshData::quad());
        assert_eq!(&data.indices[6..], &[4, 5, 6, 4, 6, 7]);
    }
}
