use super::id::HumanBone;
use crate::error::{Result, RetargetError};
use crate::skeleton::{NodeId, Skeleton};
use crate::EPSILON;
use glam::{Quat, Vec3};

/// Proportion-independent humanoid pose.
///
/// Rotations are deltas from each bone's rest orientation, expressed in the
/// skeleton root's frame, so they transfer between skeletons whose rest poses
/// agree in orientation but not in bone length.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    /// Hips offset from the root, in root space, divided by the hips rest height
    pub body_position: Vec3,

    /// Root-space rotation delta per bone (None if the source lacks the bone)
    pub rotations: [Option<Quat>; HumanBone::COUNT],
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self {
            body_position: Vec3::Y,
            rotations: [None; HumanBone::COUNT],
        }
    }
}

impl PoseSnapshot {
    pub fn rotation(&self, bone: HumanBone) -> Option<Quat> {
        self.rotations[bone.index()]
    }
}

/// Pose capture/apply handle bound to one skeleton.
///
/// Binding caches the rest data the transfer needs. The handle holds no borrow
/// of the skeleton; dropping it releases everything.
#[derive(Debug, Clone)]
pub struct PoseHandle {
    hips: NodeId,
    nodes: [Option<NodeId>; HumanBone::COUNT],
    /// Rest world rotation of each mapped bone, in root space
    rest_rotations: [Quat; HumanBone::COUNT],
    /// Hips rest translation along the root's up axis
    hips_rest_height: f32,
    node_count: usize,
}

impl PoseHandle {
    /// Bind to a skeleton. Fails if the skeleton has no usable hips.
    pub fn bind(skeleton: &Skeleton) -> Result<Self> {
        let hips = skeleton
            .bone_node(HumanBone::Hips)
            .ok_or(RetargetError::MissingBone(HumanBone::Hips))?;

        let root_rest = skeleton.rest_world_transform(skeleton.root());
        let hips_rest = skeleton.rest_world_transform(hips);
        let hips_local = root_rest
            .inverse_transform_point(hips_rest.translation)
            .ok_or(RetargetError::DegenerateRest(HumanBone::Hips))?;
        if hips_local.y < EPSILON {
            return Err(RetargetError::DegenerateRest(HumanBone::Hips));
        }

        let root_rest_inv = root_rest.rotation.inverse();
        let mut nodes = [None; HumanBone::COUNT];
        let mut rest_rotations = [Quat::IDENTITY; HumanBone::COUNT];
        for bone in HumanBone::ALL {
            if let Some(node) = skeleton.bone_node(bone) {
                nodes[bone.index()] = Some(node);
                rest_rotations[bone.index()] =
                    (root_rest_inv * skeleton.rest_world_transform(node).rotation).normalize();
            }
        }

        Ok(Self {
            hips,
            nodes,
            rest_rotations,
            hips_rest_height: hips_local.y,
            node_count: skeleton.node_count(),
        })
    }

    pub fn hips_rest_height(&self) -> f32 {
        self.hips_rest_height
    }

    /// Whether this handle was bound to a skeleton shaped like `skeleton`
    pub fn fits(&self, skeleton: &Skeleton) -> bool {
        self.node_count == skeleton.node_count()
            && skeleton.bone_node(HumanBone::Hips) == Some(self.hips)
    }

    /// Record the skeleton's current pose
    pub fn capture(&self, skeleton: &Skeleton) -> PoseSnapshot {
        let root = skeleton.world_transform(skeleton.root());
        let root_inv = root.rotation.inverse();

        let mut snapshot = PoseSnapshot::default();
        for bone in HumanBone::ALL {
            let Some(node) = self.nodes[bone.index()] else {
                continue;
            };
            let current = root_inv * skeleton.world_rotation(node);
            snapshot.rotations[bone.index()] =
                Some((current * self.rest_rotations[bone.index()].inverse()).normalize());
        }

        if let Some(local) = root.inverse_transform_point(skeleton.world_position(self.hips)) {
            snapshot.body_position = local / self.hips_rest_height;
        }

        snapshot
    }

    /// Pose the skeleton from a snapshot taken on any compatible skeleton
    pub fn apply(&self, skeleton: &mut Skeleton, pose: &PoseSnapshot) {
        let root = skeleton.world_transform(skeleton.root());

        let hips_position = root.transform_point(pose.body_position * self.hips_rest_height);
        skeleton.set_world_position(self.hips, hips_position);

        // Parents before children, so each parent's world rotation is final
        for bone in HumanBone::ALL {
            let Some(node) = self.nodes[bone.index()] else {
                continue;
            };
            match pose.rotation(bone) {
                Some(delta) => {
                    let rotation = root.rotation * delta * self.rest_rotations[bone.index()];
                    skeleton.set_world_rotation(node, rotation);
                }
                None => {
                    let rest = skeleton.rest_transform(node).rotation;
                    skeleton.set_local_rotation(node, rest);
                }
            }
        }
    }
}
