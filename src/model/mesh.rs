//! Mesh records of a POL file.
//!
//! A mesh stores indexed attribute tables (positions with skin weights,
//! UVs, optional light-map UVs, vertex colors, v2 per-corner alphas)
//! and triangles that index into them. Every index is validated here;
//! a file that survives parsing can be flattened without bounds checks.

use std::io::{Read, Seek};

use binrw::BinReaderExt;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::math::{Direction, Position, Uv};
use crate::model::material::{scan_name_tokens, Material};
use crate::model::POL_VERSION_1;
use crate::strings::read_cstr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeshAttrs {
    pub alpha: bool,
    pub both: bool,
    pub env: bool,
    pub mirrored: bool,
    pub nolighting: bool,
    pub nomakeshadow: bool,
    pub sprite: bool,
    pub water: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BoneWeight {
    /// Bone id (not an index into the bone table).
    pub bone: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vertex {
    pub pos: Position,
    /// Sorted by descending weight.
    pub weights: Vec<BoneWeight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Triangle {
    pub vert_index: [u32; 3],
    pub uv_index: [u32; 3],
    pub light_uv_index: Option<[u32; 3]>,
    pub color_index: [u32; 3],
    pub alpha_index: Option<[u32; 3]>,
    pub normals: [Direction; 3],
    pub submaterial_index: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mesh {
    pub name: String,
    pub attrs: MeshAttrs,
    /// Index into the material table; -1 means no material.
    pub material_index: i32,
    pub vertices: Vec<Vertex>,
    pub uvs: Vec<Uv>,
    pub light_uvs: Option<Vec<Uv>>,
    pub colors: Vec<[f32; 3]>,
    pub alphas: Option<Vec<f32>>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Meshes named `collision` are invisible collision hulls.
    pub fn is_collision_hull(&self) -> bool {
        self.name == "collision"
    }
}

fn parse_attrs(name: &str) -> MeshAttrs {
    let mut attrs = MeshAttrs::default();
    scan_name_tokens(name, |token| {
        let flag = match token {
            "alpha" => &mut attrs.alpha,
            "both" => &mut attrs.both,
            "env" => &mut attrs.env,
            "mirrored" => &mut attrs.mirrored,
            "nolighting" => &mut attrs.nolighting,
            "nomakeshadow" => &mut attrs.nomakeshadow,
            "sprite" => &mut attrs.sprite,
            "water" => &mut attrs.water,
            _ => return false,
        };
        *flag = true;
        true
    });
    attrs
}

fn check_index(table: &'static str, index: u32, len: usize) -> Result<u32> {
    if (index as usize) < len {
        Ok(index)
    } else {
        Err(Error::IndexOutOfRange {
            table,
            index: index as i64,
            len,
        })
    }
}

fn read_index3<R: Read + Seek>(reader: &mut R) -> Result<[u32; 3]> {
    Ok([reader.read_le()?, reader.read_le()?, reader.read_le()?])
}

/// Parse one mesh record. Returns `None` for a placeholder slot
/// (type -1), which occupies an index but carries no data.
pub(crate) fn parse_mesh<R: Read + Seek>(
    reader: &mut R,
    version: u32,
    materials: &[Material],
) -> Result<Option<Mesh>> {
    let mesh_type: i32 = reader.read_le()?;
    match mesh_type {
        0 => {}
        -1 => return Ok(None),
        other => {
            return Err(Error::UnsupportedVersion {
                what: "POL mesh record type",
                version: other as u32,
            })
        }
    }

    let name = read_cstr(reader)?;
    let attrs = parse_attrs(&name);

    let material_index: i32 = reader.read_le()?;
    if material_index < -1 || material_index as i64 >= materials.len() as i64 {
        return Err(Error::IndexOutOfRange {
            table: "materials",
            index: material_index as i64,
            len: materials.len(),
        });
    }
    let submaterial_limit = if material_index >= 0 {
        materials[material_index as usize].renderable_count()
    } else {
        1
    };

    let nr_vertices: u32 = reader.read_le()?;
    let mut vertices = Vec::with_capacity(nr_vertices as usize);
    for _ in 0..nr_vertices {
        let pos: Position = reader.read_le()?;
        let nr_weights = if version == POL_VERSION_1 {
            reader.read_le::<u32>()?
        } else {
            u32::from(reader.read_le::<u16>()?)
        };
        let mut weights = Vec::with_capacity(nr_weights as usize);
        for _ in 0..nr_weights {
            let bone = if version == POL_VERSION_1 {
                reader.read_le::<u32>()?
            } else {
                u32::from(reader.read_le::<u16>()?)
            };
            let weight: f32 = reader.read_le()?;
            weights.push(BoneWeight { bone, weight });
        }
        weights.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        vertices.push(Vertex { pos, weights });
    }

    let nr_uvs: u32 = reader.read_le()?;
    let mut uvs = Vec::with_capacity(nr_uvs as usize);
    for _ in 0..nr_uvs {
        uvs.push(reader.read_le::<Uv>()?);
    }

    let nr_light_uvs: u32 = reader.read_le()?;
    let light_uvs = if nr_light_uvs > 0 {
        let mut table = Vec::with_capacity(nr_light_uvs as usize);
        for _ in 0..nr_light_uvs {
            table.push(reader.read_le::<Uv>()?);
        }
        Some(table)
    } else {
        None
    };

    let nr_colors: u32 = reader.read_le()?;
    let mut colors = Vec::with_capacity(nr_colors as usize);
    for _ in 0..nr_colors {
        if version == POL_VERSION_1 {
            colors.push([reader.read_le()?, reader.read_le()?, reader.read_le()?]);
        } else {
            let rgba: [u8; 4] = reader.read_le()?;
            if rgba[3] != 255 {
                warn!(mesh = %name, alpha = rgba[3], "non-opaque vertex color");
            }
            colors.push([
                f32::from(rgba[0]) / 255.0,
                f32::from(rgba[1]) / 255.0,
                f32::from(rgba[2]) / 255.0,
            ]);
        }
    }

    let alphas = if version == POL_VERSION_1 {
        None
    } else {
        let nr_alphas: u32 = reader.read_le()?;
        let mut table = Vec::with_capacity(nr_alphas as usize);
        for _ in 0..nr_alphas {
            table.push(f32::from(reader.read_le::<u8>()?) / 255.0);
        }
        Some(table)
    };
    let nr_alphas = alphas.as_ref().map_or(0, Vec::len);

    let nr_triangles: u32 = reader.read_le()?;
    let mut triangles = Vec::with_capacity(nr_triangles as usize);
    for _ in 0..nr_triangles {
        let vert_index = read_index3(reader)?;
        for &i in &vert_index {
            check_index("vertices", i, vertices.len())?;
        }
        let uv_index = read_index3(reader)?;
        for &i in &uv_index {
            check_index("uvs", i, uvs.len())?;
        }
        let light_uv_index = if nr_light_uvs > 0 {
            // Light UV indices continue the UV index space; rebase them
            // into the light-UV table.
            let raw = read_index3(reader)?;
            let mut rebased = [0u32; 3];
            for (dst, &i) in rebased.iter_mut().zip(&raw) {
                let adjusted = i.checked_sub(nr_uvs).ok_or(Error::IndexOutOfRange {
                    table: "light_uvs",
                    index: i as i64 - nr_uvs as i64,
                    len: nr_light_uvs as usize,
                })?;
                *dst = check_index("light_uvs", adjusted, nr_light_uvs as usize)?;
            }
            Some(rebased)
        } else {
            None
        };
        let color_index = read_index3(reader)?;
        if !colors.is_empty() {
            for &i in &color_index {
                check_index("colors", i, colors.len())?;
            }
        }
        let alpha_index = if nr_alphas > 0 {
            let idx = read_index3(reader)?;
            for &i in &idx {
                check_index("alphas", i, nr_alphas)?;
            }
            Some(idx)
        } else {
            None
        };
        let normals = [
            reader.read_le::<Direction>()?,
            reader.read_le::<Direction>()?,
            reader.read_le::<Direction>()?,
        ];
        let mut submaterial_index: u32 = reader.read_le()?;
        if submaterial_index as usize >= submaterial_limit {
            warn!(
                mesh = %name,
                submaterial_index, submaterial_limit, "submaterial index clamped to 0"
            );
            submaterial_index = 0;
        }
        triangles.push(Triangle {
            vert_index,
            uv_index,
            light_uv_index,
            color_index,
            alpha_index,
            normals,
            submaterial_index,
        });
    }

    if version == POL_VERSION_1 {
        let footer: (u32, u32) = (reader.read_le()?, reader.read_le()?);
        if footer != (1, 0) {
            return Err(Error::UnexpectedFooter(footer.0, footer.1));
        }
    }

    Ok(Some(Mesh {
        name,
        attrs,
        material_index,
        vertices,
        uvs,
        light_uvs,
        colors,
        alphas,
        triangles,
    }))
}
