//! Scene assembly: turning decoded files into sink resources and
//! driving per-frame animation.

mod geometry;
mod material;
pub mod sink;
pub mod skeleton;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::Pol;
use crate::motion::Mot;
use crate::overlay::{self, OprOverlay};
use crate::scene::material::{BuiltMaterial, TextureCache};
use crate::source::AssetSource;

pub use sink::{
    GeometryGroup, GeometrySpec, JointSpec, MaterialKind, MaterialSpec, MeshSpec, ResourceId,
    ResourceRegistry, SceneSink, SkeletonSpec, TextureSlot, TextureUpload,
};
pub use skeleton::{JointRef, Skeleton};

/// Motion files play at 30 frames per second.
const FRAMES_PER_SECOND: f32 = 30.0;

struct LoadedSkeleton {
    id: ResourceId,
    skeleton: Skeleton,
}

struct AnimatedMaterial {
    material: ResourceId,
    slot: TextureSlot,
    frames: Vec<ResourceId>,
}

/// Builds sink resources from a model and owns everything it created.
///
/// [`SceneBuilder::dispose`] is the sole teardown path: it releases
/// every created resource exactly once, in creation order.
#[derive(Default)]
pub struct SceneBuilder {
    registry: ResourceRegistry,
    skeleton: Option<LoadedSkeleton>,
    motion: Option<Mot>,
    txa: Option<Vec<u32>>,
    texture_cache: TextureCache,
    animated: Vec<AnimatedMaterial>,
    uv_scrolls: Vec<(ResourceId, (f32, f32))>,
    meshes: Vec<ResourceId>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        SceneBuilder::default()
    }

    /// Load a model and everything it references. Texture and material
    /// resources for a mesh are created before the mesh itself.
    pub fn load(
        &mut self,
        source: &mut dyn AssetSource,
        sink: &mut dyn SceneSink,
        pol_name: &str,
    ) -> Result<()> {
        let pol = Pol::parse(&source.load(pol_name)?)?;

        let opr_name = sidecar_name(pol_name, "opr");
        let overlays = if source.exists(&opr_name) {
            OprOverlay::parse(&source.load(&opr_name)?)
        } else {
            OprOverlay::default()
        };

        let txa_name = sidecar_name(pol_name, "txa");
        if source.exists(&txa_name) {
            self.txa = Some(overlay::parse_txa(&source.load(&txa_name)?));
        }

        if !pol.bones.is_empty() {
            let skeleton = Skeleton::build(&pol.bones)?;
            let id = self.registry.track(sink.create_skeleton(skeleton.to_spec())?);
            self.skeleton = Some(LoadedSkeleton { id, skeleton });
        }

        for mesh in &pol.meshes {
            if mesh.material_index < 0 {
                debug!(mesh = %mesh.name, "mesh without material skipped");
                continue;
            }
            let top = &pol.materials[mesh.material_index as usize];
            let overlay = overlays.get(&mesh.name);

            // One renderable material per child, or the node itself.
            let mut materials = Vec::with_capacity(top.renderable_count());
            let nodes: Vec<_> = if top.children.is_empty() {
                vec![top]
            } else {
                top.children.iter().collect()
            };
            for node in nodes {
                let BuiltMaterial { id, frames } = material::build_material(
                    source,
                    sink,
                    &mut self.registry,
                    &mut self.texture_cache,
                    node,
                    mesh,
                    overlay,
                )?;
                if let Some((slot, frames)) = frames {
                    self.animated.push(AnimatedMaterial {
                        material: id,
                        slot,
                        frames,
                    });
                }
                materials.push(id);
            }

            if let Some(overlay) = overlay {
                if let Some(scroll) = overlay.uv_scroll {
                    if materials.len() == 1 {
                        self.uv_scrolls.push((materials[0], scroll));
                    } else {
                        warn!(mesh = %mesh.name, "uv scroll on a multi-material mesh ignored");
                    }
                }
            }

            let skeleton = self.skeleton.as_ref();
            let geometry = geometry::build_geometry(
                mesh,
                top.renderable_count(),
                skeleton.map(|s| &s.skeleton),
            );
            let geometry_id = self.registry.track(sink.create_geometry(geometry)?);

            let mesh_id = self.registry.track(sink.create_mesh(MeshSpec {
                name: mesh.name.clone(),
                geometry: geometry_id,
                materials,
                skeleton: skeleton.map(|s| s.id),
                visible: !mesh.is_collision_hull(),
            })?);
            self.meshes.push(mesh_id);
        }

        Ok(())
    }

    /// Load a motion file for the current skeleton. Bones that match
    /// no joint are reported here and skipped during playback.
    pub fn load_motion(&mut self, source: &mut dyn AssetSource, name: &str) -> Result<()> {
        let mot = Mot::parse(&source.load(name)?)?;
        if let Some(loaded) = &self.skeleton {
            for bone in &mot.bones {
                if loaded
                    .skeleton
                    .joint_for_motion(&bone.name, bone.id)
                    .is_none()
                {
                    warn!(bone = %bone.name, id = bone.id, "motion bone matches no joint");
                }
            }
        }
        self.motion = Some(mot);
        Ok(())
    }

    /// Load a texture-animation table explicitly (sidecar tables are
    /// picked up by [`SceneBuilder::load`] automatically).
    pub fn load_txa(&mut self, source: &mut dyn AssetSource, name: &str) -> Result<()> {
        self.txa = Some(overlay::parse_txa(&source.load(name)?));
        Ok(())
    }

    /// Advance the scene to frame `frame`: UV scrolls first, then bone
    /// poses, then TXA texture swaps.
    pub fn apply_motion(&mut self, sink: &mut dyn SceneSink, frame: u32) {
        let t = frame as f32 / FRAMES_PER_SECOND;
        for &(material, (u, v)) in &self.uv_scrolls {
            sink.set_texture_offset(material, [u * t, v * t]);
        }

        if let (Some(loaded), Some(mot)) = (&self.skeleton, &self.motion) {
            // A single-frame motion holds the bind pose; there is
            // nothing to step through.
            if mot.frame_count > 1 {
                let index = (frame % (mot.frame_count - 1)) + 1;
                for bone in &mot.bones {
                    let Some(joint) = loaded.skeleton.joint_for_motion(&bone.name, bone.id) else {
                        continue;
                    };
                    let Some(record) = bone.frames.get(index as usize) else {
                        warn!(bone = %bone.name, index, "motion frame out of range");
                        continue;
                    };
                    sink.set_joint_pose(
                        loaded.id,
                        joint,
                        record.pos.to_slice(),
                        record.rotq.to_slice(),
                    );
                }
            }
        }

        if let Some(txa) = &self.txa {
            if !txa.is_empty() {
                let picked = txa[frame as usize % txa.len()] as usize;
                for animated in &self.animated {
                    let index = if picked < animated.frames.len() {
                        picked
                    } else {
                        warn!(picked, frames = animated.frames.len(), "TXA index clamped");
                        0
                    };
                    sink.set_material_texture(
                        animated.material,
                        animated.slot,
                        animated.frames[index],
                    );
                }
            }
        }
    }

    pub fn mesh_ids(&self) -> &[ResourceId] {
        &self.meshes
    }

    pub fn resource_count(&self) -> usize {
        self.registry.len()
    }

    /// Release every created resource in creation order and reset the
    /// builder. Safe to call more than once.
    pub fn dispose(&mut self, sink: &mut dyn SceneSink) {
        self.registry.dispose(sink);
        self.skeleton = None;
        self.motion = None;
        self.txa = None;
        self.texture_cache.clear();
        self.animated.clear();
        self.uv_scrolls.clear();
        self.meshes.clear();
    }
}

/// `dir\model.pol` -> `dir\model.opr`.
fn sidecar_name(name: &str, extension: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}.{}", &name[..dot], extension),
        None => format!("{name}.{extension}"),
    }
}
