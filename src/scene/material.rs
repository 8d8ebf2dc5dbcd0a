//! Resolving POL materials into renderable material specs.
//!
//! Texture roles map onto renderer slots; `(env)` meshes get a matcap
//! material with the color texture in the matcap slot. Color textures
//! may resolve to an ordered frame list, which subscribes the material
//! to TXA ticks.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Material, Mesh, TextureRole};
use crate::overlay::MeshOverlay;
use crate::scene::sink::{
    MaterialKind, MaterialSpec, ResourceId, ResourceRegistry, SceneSink, TextureSlot, TextureUpload,
};
use crate::source::AssetSource;

/// A created texture plus whether its image carried an alpha plane.
pub(crate) type LoadedTexture = (ResourceId, bool);

/// Texture frame lists already uploaded this load, keyed by lowercased
/// color name or sidecar filename.
pub(crate) type TextureCache = HashMap<String, Vec<LoadedTexture>>;

pub(crate) struct BuiltMaterial {
    pub id: ResourceId,
    /// Set when the color texture is a multi-frame animation set.
    pub frames: Option<(TextureSlot, Vec<ResourceId>)>,
}

pub(crate) fn build_material(
    source: &mut dyn AssetSource,
    sink: &mut dyn SceneSink,
    registry: &mut ResourceRegistry,
    cache: &mut TextureCache,
    material: &Material,
    mesh: &Mesh,
    overlay: Option<&MeshOverlay>,
) -> Result<BuiltMaterial> {
    let kind = if mesh.attrs.env {
        MaterialKind::Matcap
    } else {
        MaterialKind::Phong
    };
    let color_slot = if mesh.attrs.env {
        TextureSlot::Matcap
    } else {
        TextureSlot::Color
    };
    let mut spec = MaterialSpec::new(&material.name, kind);
    let mut frames_out = None;
    let mut color_has_alpha = false;
    let mut alpha_map_bound = false;

    let color_name = material.texture(TextureRole::ColorMap);
    if let Some(color_name) = color_name {
        let frames = load_color_frames(source, sink, registry, cache, color_name)?;
        color_has_alpha = frames[0].1;
        spec.textures.push((color_slot, frames[0].0));
        if frames.len() > 1 {
            frames_out = Some((color_slot, frames.iter().map(|f| f.0).collect()));
        }
    }

    if let Some(name) = material.texture(TextureRole::NormalMap) {
        let (id, _) = load_texture(source, sink, registry, cache, name)?;
        spec.textures.push((TextureSlot::Normal, id));
        spec.normal_scale = [1.0, -1.0];
    }

    if let Some(name) = material.texture(TextureRole::LightMap) {
        let (id, _) = load_texture(source, sink, registry, cache, name)?;
        spec.textures.push((TextureSlot::Light, id));
        spec.light_map_intensity = 0.5;
    }

    if let Some(name) = material.texture(TextureRole::AlphaMap) {
        // An alpha map naming the color file adds nothing; the color
        // image's own alpha plane already covers it.
        let same_as_color =
            color_name.is_some_and(|c| c.eq_ignore_ascii_case(name));
        if same_as_color {
            debug!(material = %material.name, "alpha map equals color map, skipped");
        } else {
            let (id, _) = load_texture(source, sink, registry, cache, name)?;
            spec.textures.push((TextureSlot::Alpha, id));
            alpha_map_bound = true;
        }
    }

    for role in [
        TextureRole::SpecularMask,
        TextureRole::Glare,
        TextureRole::HeightMap,
    ] {
        if let Some(name) = material.texture(role) {
            debug!(material = %material.name, ?role, name, "texture role not rendered");
        }
    }

    if alpha_map_bound {
        spec.transparent = true;
    } else if color_has_alpha {
        spec.alpha_test = Some(0.1);
    }

    if mesh.attrs.alpha {
        spec.transparent = true;
    }
    if mesh.attrs.both {
        spec.double_sided = true;
    }
    if overlay.is_some_and(|o| o.additive_blending) {
        spec.additive_blending = true;
    }

    let id = registry.track(sink.create_material(spec)?);
    Ok(BuiltMaterial {
        id,
        frames: frames_out,
    })
}

/// Resolve a color name to its animation frame set (`base.qnt`,
/// `base2.qnt`, ...), falling back to the literal filename when the
/// base pattern matches nothing.
fn load_color_frames(
    source: &mut dyn AssetSource,
    sink: &mut dyn SceneSink,
    registry: &mut ResourceRegistry,
    cache: &mut TextureCache,
    color_name: &str,
) -> Result<Vec<LoadedTexture>> {
    let key = color_name.to_lowercase();
    if let Some(frames) = cache.get(&key) {
        return Ok(frames.clone());
    }

    let base = color_name
        .rfind('.')
        .map_or(color_name, |dot| &color_name[..dot]);
    let images = match source.load_image_list(base) {
        Ok(images) => images,
        Err(Error::NotFound(_)) => vec![source.load_image(color_name)?],
        Err(e) => return Err(e),
    };

    let mut frames = Vec::with_capacity(images.len());
    for image in &images {
        let id = registry.track(sink.create_texture(TextureUpload {
            width: image.width,
            height: image.height,
            pixels: &image.pixels,
            mipmaps: true,
        })?);
        frames.push((id, image.has_alpha));
    }
    if frames.len() > 1 {
        debug!(color_name, count = frames.len(), "animated color texture");
    }
    cache.insert(key, frames.clone());
    Ok(frames)
}

fn load_texture(
    source: &mut dyn AssetSource,
    sink: &mut dyn SceneSink,
    registry: &mut ResourceRegistry,
    cache: &mut TextureCache,
    name: &str,
) -> Result<LoadedTexture> {
    let key = name.to_lowercase();
    if let Some(frames) = cache.get(&key) {
        return Ok(frames[0]);
    }
    let image = match source.load_image(name) {
        Ok(image) => image,
        Err(e) => {
            warn!(name, "texture failed to load");
            return Err(e);
        }
    };
    let id = registry.track(sink.create_texture(TextureUpload {
        width: image.width,
        height: image.height,
        pixels: &image.pixels,
        mipmaps: true,
    })?);
    cache.insert(key, vec![(id, image.has_alpha)]);
    Ok((id, image.has_alpha))
}
