//! Flattening indexed mesh data into non-indexed vertex streams.
//!
//! Triangles are ordered by sub-material and partitioned into groups,
//! one group per renderable material of the mesh (empty groups
//! included, so group count always equals the material count). Each
//! triangle corner becomes one vertex stream entry.

use tracing::warn;

use crate::model::Mesh;
use crate::scene::sink::{GeometryGroup, GeometrySpec};
use crate::scene::skeleton::Skeleton;

/// Skin influences per vertex, as renderers expect.
const MAX_INFLUENCES: usize = 4;

pub(crate) fn build_geometry(
    mesh: &Mesh,
    renderable_count: usize,
    skeleton: Option<&Skeleton>,
) -> GeometrySpec {
    let mut order: Vec<usize> = (0..mesh.triangles.len()).collect();
    order.sort_by_key(|&i| mesh.triangles[i].submaterial_index);

    let mut groups = Vec::with_capacity(renderable_count);
    let mut cursor = 0u32;
    for submaterial in 0..renderable_count as u32 {
        let count = mesh
            .triangles
            .iter()
            .filter(|t| t.submaterial_index == submaterial)
            .count() as u32
            * 3;
        groups.push(GeometryGroup {
            start: cursor,
            count,
            material_index: submaterial,
        });
        cursor += count;
    }

    let corners = mesh.triangles.len() * 3;
    let mut spec = GeometrySpec {
        position: Vec::with_capacity(corners * 3),
        normal: Vec::with_capacity(corners * 3),
        uv: Vec::with_capacity(corners * 2),
        uv2: mesh.light_uvs.as_ref().map(|_| Vec::with_capacity(corners * 2)),
        color: Vec::with_capacity(corners * 4),
        skin_index: skeleton.map(|_| Vec::with_capacity(corners * MAX_INFLUENCES)),
        skin_weight: skeleton.map(|_| Vec::with_capacity(corners * MAX_INFLUENCES)),
        groups,
    };

    for &triangle_index in &order {
        let triangle = &mesh.triangles[triangle_index];
        for corner in 0..3 {
            let vertex = &mesh.vertices[triangle.vert_index[corner] as usize];
            spec.position.extend_from_slice(&vertex.pos.to_slice());
            spec.normal
                .extend_from_slice(&triangle.normals[corner].to_slice());
            spec.uv
                .extend_from_slice(&mesh.uvs[triangle.uv_index[corner] as usize].to_slice());

            if let (Some(uv2), Some(light_uvs), Some(light_uv_index)) = (
                spec.uv2.as_mut(),
                mesh.light_uvs.as_ref(),
                triangle.light_uv_index.as_ref(),
            ) {
                uv2.extend_from_slice(&light_uvs[light_uv_index[corner] as usize].to_slice());
            }

            let rgb = if mesh.colors.is_empty() {
                [1.0, 1.0, 1.0]
            } else {
                mesh.colors[triangle.color_index[corner] as usize]
            };
            let alpha = match (&mesh.alphas, &triangle.alpha_index) {
                (Some(alphas), Some(alpha_index)) => alphas[alpha_index[corner] as usize],
                _ => 1.0,
            };
            spec.color.extend_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]);

            if let Some(skeleton) = skeleton {
                push_skin(&mut spec, skeleton, mesh, vertex, corner);
            }
        }
    }

    spec
}

fn push_skin(
    spec: &mut GeometrySpec,
    skeleton: &Skeleton,
    mesh: &Mesh,
    vertex: &crate::model::Vertex,
    corner: usize,
) {
    let mut indices = [0u16; MAX_INFLUENCES];
    let mut weights = [0f32; MAX_INFLUENCES];
    let mut taken = 0;
    // Weights are sorted descending at parse, so truncation keeps the
    // strongest influences.
    for weight in &vertex.weights {
        if taken == MAX_INFLUENCES {
            break;
        }
        let Some(joint) = skeleton.joint_by_id(weight.bone as i32) else {
            warn!(mesh = %mesh.name, bone = weight.bone, corner, "skin weight references unknown bone");
            continue;
        };
        indices[taken] = joint as u16;
        weights[taken] = weight.weight;
        taken += 1;
    }
    let total: f32 = weights.iter().sum();
    if total > 0.0 {
        for weight in &mut weights {
            *weight /= total;
        }
    }
    spec.skin_index
        .as_mut()
        .expect("skinned geometry")
        .extend_from_slice(&indices);
    spec.skin_weight
        .as_mut()
        .expect("skinned geometry")
        .extend_from_slice(&weights);
}
