//! Material records of a POL file.
//!
//! A material is a named node carrying either a set of role-tagged
//! texture references or a list of child materials (sub-materials that
//! triangles select per-face), never both. Rendering hints ride in the
//! name as parenthesised tokens, e.g. `skin (alpha) (env)`.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use binrw::BinReaderExt;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::strings::read_cstr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TextureRole {
    ColorMap,
    SpecularMask,
    Glare,
    AlphaMap,
    LightMap,
    NormalMap,
    HeightMap,
}

impl TextureRole {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(TextureRole::ColorMap),
            4 => Some(TextureRole::SpecularMask),
            5 => Some(TextureRole::Glare),
            6 => Some(TextureRole::AlphaMap),
            7 => Some(TextureRole::LightMap),
            8 => Some(TextureRole::NormalMap),
            11 => Some(TextureRole::HeightMap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterialAttrs {
    pub alpha: bool,
    pub env: bool,
    pub sprite: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub name: String,
    pub attrs: MaterialAttrs,
    pub textures: BTreeMap<TextureRole, String>,
    pub children: Vec<Material>,
}

impl Material {
    pub fn texture(&self, role: TextureRole) -> Option<&str> {
        self.textures.get(&role).map(|s| s.as_str())
    }

    /// How many renderable materials this node yields: one per child,
    /// or itself when it has no children.
    pub fn renderable_count(&self) -> usize {
        self.children.len().max(1)
    }
}

/// Scan `(token)` runs out of a material or mesh name.
pub(crate) fn scan_name_tokens(name: &str, mut apply: impl FnMut(&str) -> bool) {
    let mut rest = name;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        let token = &rest[open + 1..open + close];
        if !apply(token) {
            warn!(token, name, "unknown attribute token");
        }
        rest = &rest[open + close + 1..];
    }
}

fn parse_attrs(name: &str) -> MaterialAttrs {
    let mut attrs = MaterialAttrs::default();
    scan_name_tokens(name, |token| match token {
        "alpha" => {
            attrs.alpha = true;
            true
        }
        "env" => {
            attrs.env = true;
            true
        }
        "sprite" => {
            attrs.sprite = true;
            true
        }
        _ => false,
    });
    attrs
}

pub(crate) fn parse_material<R: Read + Seek>(
    reader: &mut R,
    can_have_children: bool,
) -> Result<Material> {
    let name = read_cstr(reader)?;
    let attrs = parse_attrs(&name);

    let nr_textures: u32 = reader.read_le()?;
    let mut textures = BTreeMap::new();
    for _ in 0..nr_textures {
        let filename = read_cstr(reader)?;
        let raw_role: u32 = reader.read_le()?;
        let Some(role) = TextureRole::from_raw(raw_role) else {
            warn!(role = raw_role, material = %name, "unknown texture role");
            continue;
        };
        if textures.insert(role, filename).is_some() {
            return Err(Error::DuplicateTextureRole {
                material: name,
                role: raw_role,
            });
        }
    }
    if !textures.is_empty() && !textures.contains_key(&TextureRole::ColorMap) {
        return Err(Error::MissingColorMap { material: name });
    }

    let mut children = Vec::new();
    if can_have_children {
        let nr_children: u32 = reader.read_le()?;
        if nr_children > 0 && !textures.is_empty() {
            return Err(Error::MaterialHasBothTexturesAndChildren { material: name });
        }
        for _ in 0..nr_children {
            children.push(parse_material(reader, false)?);
        }
    }

    Ok(Material {
        name,
        attrs,
        textures,
        children,
    })
}
