use crate::data_structures::mesh::{MeshData, MeshVertex};

/// Merge the models of an OBJ file into one mesh.
///
/// OBJ carries no tangents, so they are computed from the texture coordinates.
/// Models whose indices would overflow `u32` once merged are skipped with a warning.
pub fn mesh_data_from_obj(models: &[tobj::Model], file_name: &str) -> MeshData {
    let mut merged = MeshData::default();
    for m in models {
        let vertices: Vec<MeshVertex> = (0..m.mesh.positions.len() / 3)
            .map(|i| MeshVertex {
                position: [
                    m.mesh.positions[i * 3],
                    m.mesh.positions[i * 3 + 1],
                    m.mesh.positions[i * 3 + 2],
                ],
                tex_coords: [
                    m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                    1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                normal: [
                    m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                    m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                    m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                ],
                tangent: [0.0; 3],
            })
            .collect();

        if merged.vertices.len() + vertices.len() > u32::MAX as usize
            || m.mesh.indices.iter().any(|i| *i as usize >= vertices.len())
        {
            log::warn!(
                "Model '{}' in file {} could not be loaded due to overflows. Make sure you use the right scale in your .obj export settings.",
                m.name,
                file_name
            );
            continue;
        }

        let mut part = MeshData {
            vertices,
            indices: m.mesh.indices.clone(),
        };
        part.compute_tangents();
        merged.append(&part);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(name: &str) -> tobj::Model {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            texcoords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        tobj::Model::new(mesh, name.to_string())
    }

    #[test]
    fn models_are_merged_with_flipped_v_and_tangents() {
        let data = mesh_data_from_obj(&[triangle("a"), triangle("b")], "two.obj");
        assert_eq!(data.vertices.len(), 6);
        assert_eq!(data.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(data.vertices[2].tex_coords, [0.0, 0.0]);
        assert_eq!(data.vertices[0].tex_coords, [0.0, 1.0]);
        for v in &data.vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-5, "{:?}", v.tangent);
        }
    }

    #[test]
    fn out_of_range_indices_skip_the_model() {
        let mut broken = triangle("broken");
        broken.mesh.indices = vec![0, 1, 7];
        let data = mesh_data_from_obj(&[broken, triangle("ok")], "broken.obj");
        assert_eq!(data.vertices.len(), 3);
    }
}
