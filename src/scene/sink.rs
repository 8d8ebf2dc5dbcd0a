//! The renderer boundary.
//!
//! The scene builder describes everything it wants created as plain
//! data and hands it to a [`SceneSink`]; the sink owns the GPU-side
//! objects and returns opaque ids for later mutation and release.

use crate::error::Result;

/// Opaque handle to a sink-owned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

/// RGBA8 pixels for a 2D texture. Mipmaps are always requested.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
    pub mipmaps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Standard lit material.
    Phong,
    /// Color texture sampled by view-space normal, for `(env)` meshes.
    Matcap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Color,
    Matcap,
    Normal,
    Light,
    Alpha,
}

#[derive(Debug, Clone)]
pub struct MaterialSpec {
    pub name: String,
    pub kind: MaterialKind,
    pub textures: Vec<(TextureSlot, ResourceId)>,
    pub light_map_intensity: f32,
    pub normal_scale: [f32; 2],
    pub transparent: bool,
    pub alpha_test: Option<f32>,
    pub additive_blending: bool,
    pub double_sided: bool,
}

impl MaterialSpec {
    pub(crate) fn new(name: &str, kind: MaterialKind) -> Self {
        MaterialSpec {
            name: name.to_owned(),
            kind,
            textures: Vec::new(),
            light_map_intensity: 1.0,
            normal_scale: [1.0, 1.0],
            transparent: false,
            alpha_test: None,
            additive_blending: false,
            double_sided: false,
        }
    }
}

/// A contiguous run of corners drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: u32,
}

/// Non-indexed vertex streams, one entry per triangle corner.
///
/// `position`/`normal` hold 3 floats per corner, `uv`/`uv2` 2, `color`
/// 4 (RGB plus per-corner alpha), and the skin arrays 4 lanes per
/// corner.
#[derive(Debug, Clone, Default)]
pub struct GeometrySpec {
    pub position: Vec<f32>,
    pub normal: Vec<f32>,
    pub uv: Vec<f32>,
    pub uv2: Option<Vec<f32>>,
    pub color: Vec<f32>,
    pub skin_index: Option<Vec<u16>>,
    pub skin_weight: Option<Vec<f32>>,
    pub groups: Vec<GeometryGroup>,
}

#[derive(Debug, Clone)]
pub struct JointSpec {
    pub name: String,
    pub id: i32,
    /// Index of the parent joint within the skeleton, roots have none.
    pub parent: Option<usize>,
    /// Column-major.
    pub inverse_bind: [f32; 16],
    /// Local bind translation.
    pub pos: [f32; 3],
    /// Local bind rotation, `[x, y, z, w]`.
    pub rot: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct SkeletonSpec {
    pub joints: Vec<JointSpec>,
}

#[derive(Debug, Clone)]
pub struct MeshSpec {
    pub name: String,
    pub geometry: ResourceId,
    /// One per geometry group.
    pub materials: Vec<ResourceId>,
    /// When set, the mesh is skinned and the skeleton's root joints
    /// hang under the mesh node.
    pub skeleton: Option<ResourceId>,
    pub visible: bool,
}

pub trait SceneSink {
    fn create_texture(&mut self, texture: TextureUpload<'_>) -> Result<ResourceId>;
    fn create_material(&mut self, material: MaterialSpec) -> Result<ResourceId>;
    fn create_geometry(&mut self, geometry: GeometrySpec) -> Result<ResourceId>;
    fn create_skeleton(&mut self, skeleton: SkeletonSpec) -> Result<ResourceId>;
    fn create_mesh(&mut self, mesh: MeshSpec) -> Result<ResourceId>;

    /// Per-frame joint mutation. `rot` is `[x, y, z, w]`.
    fn set_joint_pose(&mut self, skeleton: ResourceId, joint: usize, pos: [f32; 3], rot: [f32; 4]);

    /// Swap a texture binding, used by TXA frame animation.
    fn set_material_texture(
        &mut self,
        material: ResourceId,
        slot: TextureSlot,
        texture: ResourceId,
    );

    /// Scroll the color texture of a material.
    fn set_texture_offset(&mut self, material: ResourceId, offset: [f32; 2]);

    fn release(&mut self, id: ResourceId);
}

/// Tracks every created resource so teardown releases each exactly
/// once, in creation order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    ids: Vec<ResourceId>,
}

impl ResourceRegistry {
    pub fn track(&mut self, id: ResourceId) -> ResourceId {
        self.ids.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Release everything in insertion order. Idempotent.
    pub fn dispose(&mut self, sink: &mut dyn SceneSink) {
        for id in self.ids.drain(..) {
            sink.release(id);
        }
    }
}
