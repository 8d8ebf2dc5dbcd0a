//! POL polygonal models.
//!
//! A POL file is a material tree, a list of meshes and a bone
//! hierarchy, parsed in a single forward pass. Versions 1 and 2 differ
//! in weight-count width, color encoding, the v2 per-corner alpha
//! table and the v1 per-mesh footer.

pub mod material;
pub mod mesh;

use std::io::Cursor;

use binrw::BinReaderExt;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::math::{Position, RotationQuat};
use crate::strings::read_cstr;

pub use material::{Material, MaterialAttrs, TextureRole};
pub use mesh::{BoneWeight, Mesh, MeshAttrs, Triangle, Vertex};

pub(crate) const POL_VERSION_1: u32 = 1;
pub(crate) const POL_VERSION_2: u32 = 2;

/// A bone in bind pose. `pos`/`rotq` are relative to the parent.
#[derive(Debug, Clone, Serialize)]
pub struct Bone {
    pub name: String,
    pub id: i32,
    /// Parent bone id, -1 for a root.
    pub parent: i32,
    pub pos: Position,
    pub rotq: RotationQuat,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pol {
    pub version: u32,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub bones: Vec<Bone>,
}

impl Pol {
    pub fn parse(data: &[u8]) -> Result<Pol> {
        let mut reader = Cursor::new(data);

        let magic: [u8; 4] = reader.read_le()?;
        if &magic != b"POL\0" {
            return Err(Error::BadMagic { expected: "POL\0" });
        }
        let version: u32 = reader.read_le()?;
        if version != POL_VERSION_1 && version != POL_VERSION_2 {
            return Err(Error::UnsupportedVersion {
                what: "POL",
                version,
            });
        }

        let nr_materials: u32 = reader.read_le()?;
        let mut materials = Vec::with_capacity(nr_materials as usize);
        for _ in 0..nr_materials {
            materials.push(material::parse_material(&mut reader, true)?);
        }

        let nr_meshes: u32 = reader.read_le()?;
        let mut meshes = Vec::new();
        for _ in 0..nr_meshes {
            match mesh::parse_mesh(&mut reader, version, &materials)? {
                Some(mesh) => meshes.push(mesh),
                None => debug!("placeholder mesh slot"),
            }
        }

        let nr_bones: u32 = reader.read_le()?;
        let mut bones = Vec::with_capacity(nr_bones as usize);
        for _ in 0..nr_bones {
            bones.push(Bone {
                name: read_cstr(&mut reader)?,
                id: reader.read_le()?,
                parent: reader.read_le()?,
                pos: reader.read_le()?,
                rotq: reader.read_le()?,
            });
        }

        validate_bones(&bones)?;
        if !bones.is_empty() {
            validate_weights(&meshes, &bones)?;
        }

        let consumed = reader.position() as usize;
        if consumed != data.len() {
            warn!(
                consumed,
                file_len = data.len(),
                "trailing bytes after POL data"
            );
        }

        Ok(Pol {
            version,
            materials,
            meshes,
            bones,
        })
    }
}

/// Parent references must resolve by id and the hierarchy must be
/// acyclic; walk from the roots and require full coverage.
fn validate_bones(bones: &[Bone]) -> Result<()> {
    let ids: Vec<i32> = bones.iter().map(|b| b.id).collect();
    for bone in bones {
        if bone.parent >= 0 && !ids.contains(&bone.parent) {
            return Err(Error::IndexOutOfRange {
                table: "bones",
                index: bone.parent as i64,
                len: bones.len(),
            });
        }
    }

    let mut reached = vec![false; bones.len()];
    let mut queue: Vec<usize> = (0..bones.len())
        .filter(|&i| bones[i].parent < 0)
        .collect();
    for &root in &queue {
        reached[root] = true;
    }
    while let Some(current) = queue.pop() {
        let id = bones[current].id;
        for (i, bone) in bones.iter().enumerate() {
            if bone.parent == id && !reached[i] {
                reached[i] = true;
                queue.push(i);
            }
        }
    }
    if reached.iter().any(|r| !r) {
        return Err(Error::CyclicHierarchy);
    }
    Ok(())
}

/// Skin weights reference bones by id; every referenced id must exist.
fn validate_weights(meshes: &[Mesh], bones: &[Bone]) -> Result<()> {
    for mesh in meshes {
        for vertex in &mesh.vertices {
            for weight in &vertex.weights {
                if !bones.iter().any(|b| b.id == weight.bone as i32) {
                    return Err(Error::IndexOutOfRange {
                        table: "bones",
                        index: weight.bone as i64,
                        len: bones.len(),
                    });
                }
            }
        }
    }
    Ok(())
}
