//! Skeleton construction from POL bone records.
//!
//! Each bone's local bind transform is `T(rotate(pos, rotq)) * R(rotq)`;
//! inverse bind matrices accumulate the analytic inverse of that chain,
//! so no numeric matrix inversion is involved. Motions address joints
//! by name when unique, falling back to the bone id.

use std::collections::HashMap;

use cgmath::{Matrix4, Quaternion, Rotation, Vector3};

use crate::error::Result;
use crate::model::Bone;
use crate::scene::sink::{JointSpec, SkeletonSpec};

/// Name-table entry: bone names are not guaranteed unique, and an
/// ambiguous name must not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointRef {
    ById(i32),
    Ambiguous,
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub id: i32,
    /// Index into [`Skeleton::joints`].
    pub parent: Option<usize>,
    /// Local bind translation (the rotated bone position).
    pub pos: Vector3<f32>,
    /// Local bind rotation.
    pub rot: Quaternion<f32>,
    /// Inverse of the joint's bind-pose world transform.
    pub inverse_bind: Matrix4<f32>,
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
    by_id: HashMap<i32, usize>,
    by_name: HashMap<String, JointRef>,
}

impl Skeleton {
    /// Build from bones in file order. Assumes the hierarchy was
    /// already validated (ids resolve, no cycles).
    pub fn build(bones: &[Bone]) -> Result<Skeleton> {
        let mut by_id = HashMap::with_capacity(bones.len());
        let mut by_name: HashMap<String, JointRef> = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            by_id.insert(bone.id, index);
            by_name
                .entry(bone.name.clone())
                .and_modify(|r| *r = JointRef::Ambiguous)
                .or_insert(JointRef::ById(bone.id));
        }

        // inv_world = local^-1 * parent_inv_world, resolved on demand.
        let mut joints: Vec<Option<Joint>> = vec![None; bones.len()];
        for index in 0..bones.len() {
            resolve_joint(bones, &by_id, &mut joints, index);
        }

        Ok(Skeleton {
            joints: joints.into_iter().map(|j| j.expect("resolved")).collect(),
            by_id,
            by_name,
        })
    }

    /// Joint index for a motion bone: name first (ambiguous names are
    /// a miss), id second.
    pub fn joint_for_motion(&self, name: &str, id: u32) -> Option<usize> {
        if let Some(JointRef::ById(bone_id)) = self.by_name.get(name) {
            return self.by_id.get(bone_id).copied();
        }
        self.by_id.get(&(id as i32)).copied()
    }

    pub fn joint_by_id(&self, id: i32) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn to_spec(&self) -> SkeletonSpec {
        SkeletonSpec {
            joints: self
                .joints
                .iter()
                .map(|joint| JointSpec {
                    name: joint.name.clone(),
                    id: joint.id,
                    parent: joint.parent,
                    inverse_bind: matrix_to_slice(&joint.inverse_bind),
                    pos: [joint.pos.x, joint.pos.y, joint.pos.z],
                    rot: [joint.rot.v.x, joint.rot.v.y, joint.rot.v.z, joint.rot.s],
                })
                .collect(),
        }
    }
}

fn resolve_joint(
    bones: &[Bone],
    by_id: &HashMap<i32, usize>,
    joints: &mut Vec<Option<Joint>>,
    index: usize,
) {
    if joints[index].is_some() {
        return;
    }
    let bone = &bones[index];
    let rot = bone.rotq.0;
    let pos = rot.rotate_vector(bone.pos.0);

    let parent = if bone.parent >= 0 {
        by_id.get(&bone.parent).copied()
    } else {
        None
    };
    let parent_inv_world = match parent {
        Some(parent_index) => {
            resolve_joint(bones, by_id, joints, parent_index);
            joints[parent_index].as_ref().expect("resolved").inverse_bind
        }
        None => Matrix4::from_scale(1.0),
    };

    // (T(p) * R(q))^-1 = R(q^-1) * T(-p)
    let inv_rot = rot.invert();
    let inv_local =
        Matrix4::from(inv_rot) * Matrix4::from_translation(-pos);
    let inverse_bind = inv_local * parent_inv_world;

    joints[index] = Some(Joint {
        name: bone.name.clone(),
        id: bone.id,
        parent,
        pos,
        rot,
        inverse_bind,
    });
}

fn matrix_to_slice(m: &Matrix4<f32>) -> [f32; 16] {
    [
        m.x.x, m.x.y, m.x.z, m.x.w, m.y.x, m.y.y, m.y.z, m.y.w, m.z.x, m.z.y, m.z.z, m.z.w, m.w.x,
        m.w.y, m.w.z, m.w.w,
    ]
}
