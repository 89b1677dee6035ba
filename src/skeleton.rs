//! Skeleton: a node hierarchy addressable by humanoid bone identity
//!
//! Nodes are stored parent-before-child. Each node has a current local
//! transform and a rest local transform. World transforms are derived via
//! forward kinematics and cached with dirty-flag tracking, so reading many bone
//! positions in a frame only walks the hierarchy once.

use crate::bone::{BoneSet, HumanBone, NodeCache};
use crate::error::{Result, RetargetError};
use crate::skeleton_constants::*;
use crate::EPSILON;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Local or world transform with uniform scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub const fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }

    pub const fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            scale: 1.0,
        }
    }

    /// Compose this (parent world) transform with a child's local transform
    pub fn mul_transform(&self, local: &Transform) -> Transform {
        Transform {
            translation: self.transform_point(local.translation),
            rotation: self.rotation * local.rotation,
            scale: self.scale * local.scale,
        }
    }

    /// Map a point from this transform's local space into its parent space
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (point * self.scale)
    }

    /// Map a point from parent space into this transform's local space.
    /// Returns None for a degenerate (zero) scale.
    #[inline]
    pub fn inverse_transform_point(&self, point: Vec3) -> Option<Vec3> {
        if self.scale.abs() < EPSILON {
            return None;
        }
        Some(self.rotation.inverse() * (point - self.translation) / self.scale)
    }
}

/// Index of a node within its skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "node index out of range");
        Self(index as u32)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    local: Transform,
    rest: Transform,
}

/// Character skeleton with a humanoid bone table.
///
/// Topology is fixed once built; only local transforms change afterwards.
#[derive(Debug, Clone)]
pub struct Skeleton {
    nodes: Vec<Node>,
    /// Parent of each node, kept separate so dirty propagation can scan it
    parents: Vec<Option<NodeId>>,
    humanoid: [Option<NodeId>; HumanBone::COUNT],
    cache: RefCell<NodeCache>,
}

impl Skeleton {
    /// Start building a skeleton whose root node has the given name
    pub fn builder(root_name: impl Into<String>) -> SkeletonBuilder {
        SkeletonBuilder::new(root_name)
    }

    /// The root node, always the first node
    #[inline]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.index()).map(|n| n.name.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(node.index()).copied().flatten()
    }

    /// Node playing the given humanoid role, if the skeleton has one
    #[inline]
    pub fn bone_node(&self, bone: HumanBone) -> Option<NodeId> {
        self.humanoid[bone.index()]
    }

    /// World position of the node playing the given role
    pub fn bone_position(&self, bone: HumanBone) -> Option<Vec3> {
        self.bone_node(bone).map(|node| self.world_position(node))
    }

    pub fn local_transform(&self, node: NodeId) -> Transform {
        self.nodes[node.index()].local
    }

    pub fn rest_transform(&self, node: NodeId) -> Transform {
        self.nodes[node.index()].rest
    }

    pub fn set_local_transform(&mut self, node: NodeId, local: Transform) {
        if self.nodes[node.index()].local != local {
            self.nodes[node.index()].local = local;
            self.mark_dirty(node);
        }
    }

    pub fn set_local_rotation(&mut self, node: NodeId, rotation: Quat) {
        let local = Transform {
            rotation,
            ..self.local_transform(node)
        };
        self.set_local_transform(node, local);
    }

    pub fn set_local_scale(&mut self, node: NodeId, scale: f32) {
        let local = Transform {
            scale,
            ..self.local_transform(node)
        };
        self.set_local_transform(node, local);
    }

    /// Get world transform of a node (computes FK if needed)
    pub fn world_transform(&self, node: NodeId) -> Transform {
        self.ensure_computed(node);
        self.cache.borrow().world[node.index()]
    }

    pub fn world_position(&self, node: NodeId) -> Vec3 {
        self.world_transform(node).translation
    }

    pub fn world_rotation(&self, node: NodeId) -> Quat {
        self.world_transform(node).rotation
    }

    /// Move a node so its world position equals `position`, keeping its
    /// rotation. Descendants follow.
    pub fn set_world_position(&mut self, node: NodeId, position: Vec3) {
        let translation = match self.parent(node) {
            Some(parent) => match self.world_transform(parent).inverse_transform_point(position) {
                Some(local) => local,
                None => return,
            },
            None => position,
        };
        let local = Transform {
            translation,
            ..self.local_transform(node)
        };
        self.set_local_transform(node, local);
    }

    /// Rotate a node so its world rotation equals `rotation`. Descendants follow.
    pub fn set_world_rotation(&mut self, node: NodeId, rotation: Quat) {
        let local_rotation = match self.parent(node) {
            Some(parent) => self.world_rotation(parent).inverse() * rotation,
            None => rotation,
        };
        self.set_local_rotation(node, local_rotation.normalize());
    }

    /// World transform of a node in the rest pose (not cached)
    pub fn rest_world_transform(&self, node: NodeId) -> Transform {
        let mut chain = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
            .iter()
            .rev()
            .fold(Transform::IDENTITY, |world, n| {
                world.mul_transform(&self.nodes[n.index()].rest)
            })
    }

    /// Put every node back into its rest transform
    pub fn reset_to_rest(&mut self) {
        for node in &mut self.nodes {
            node.local = node.rest;
        }
        self.cache.borrow_mut().dirty = crate::bone::DirtyFlags::all_dirty(self.nodes.len());
    }

    fn mark_dirty(&mut self, node: NodeId) {
        self.cache
            .get_mut()
            .mark_subtree_dirty(node, &self.parents);
    }

    /// Ensure a node's world transform is computed
    fn ensure_computed(&self, node: NodeId) {
        if !self.cache.borrow().dirty.is_dirty(node) {
            return;
        }

        // Walk up to the first clean ancestor; everything below it is dirty
        let mut chain = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if !self.cache.borrow().dirty.is_dirty(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        let mut cache = self.cache.borrow_mut();
        for &n in chain.iter().rev() {
            let local = &self.nodes[n.index()].local;
            let world = match self.parent(n) {
                Some(parent) => cache.world[parent.index()].mul_transform(local),
                None => *local,
            };
            cache.world[n.index()] = world;
            cache.dirty.clear(n);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self, node: NodeId) -> bool {
        self.cache.borrow().dirty.is_dirty(node)
    }
}

/// Incremental skeleton construction. Parents must be added before children.
#[derive(Debug, Clone)]
pub struct SkeletonBuilder {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    humanoid: [Option<NodeId>; HumanBone::COUNT],
}

impl SkeletonBuilder {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                name: root_name.into(),
                local: Transform::IDENTITY,
                rest: Transform::IDENTITY,
            }],
            parents: vec![None],
            humanoid: [None; HumanBone::COUNT],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Add a node under `parent` with the given rest local transform
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: NodeId,
        rest: Transform,
    ) -> Result<NodeId> {
        if parent.index() >= self.nodes.len() {
            return Err(RetargetError::UnknownNode(parent));
        }
        let index = u32::try_from(self.nodes.len()).map_err(|_| RetargetError::TooManyNodes)?;
        let id = NodeId(index);
        self.nodes.push(Node {
            name: name.into(),
            local: rest,
            rest,
        });
        self.parents.push(Some(parent));
        Ok(id)
    }

    /// Declare that `node` plays the humanoid role `bone`
    pub fn map_bone(&mut self, bone: HumanBone, node: NodeId) -> Result<()> {
        if node.index() >= self.nodes.len() {
            return Err(RetargetError::UnknownNode(node));
        }
        if self.humanoid[bone.index()].is_some() {
            return Err(RetargetError::DuplicateBone(bone));
        }
        self.humanoid[bone.index()] = Some(node);
        Ok(())
    }

    /// Add a node and map it to a humanoid role in one step
    pub fn add_bone(&mut self, bone: HumanBone, parent: NodeId, rest: Transform) -> Result<NodeId> {
        let node = self.add_node(format!("{:?}", bone), parent, rest)?;
        self.map_bone(bone, node)?;
        Ok(node)
    }

    pub fn build(self) -> Skeleton {
        let len = self.nodes.len();
        Skeleton {
            nodes: self.nodes,
            parents: self.parents,
            humanoid: self.humanoid,
            cache: RefCell::new(NodeCache::new(len)),
        }
    }
}

/// Segment scale factors relative to the reference humanoid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanoidProportions {
    /// Hips height and leg segments
    pub legs: f32,
    /// Spine, neck and head segments
    pub torso: f32,
    /// Shoulder, arm and hand segments
    pub arms: f32,
}

impl Default for HumanoidProportions {
    fn default() -> Self {
        Self {
            legs: 1.0,
            torso: 1.0,
            arms: 1.0,
        }
    }
}

impl HumanoidProportions {
    pub fn uniform(scale: f32) -> Self {
        Self {
            legs: scale,
            torso: scale,
            arms: scale,
        }
    }

    fn factor(&self, bone: HumanBone) -> f32 {
        use HumanBone::*;
        match bone {
            Hips | LeftUpperLeg | LeftLowerLeg | LeftFoot | LeftToes | RightUpperLeg
            | RightLowerLeg | RightFoot | RightToes => self.legs,
            LeftShoulder | LeftUpperArm | LeftLowerArm | LeftHand | RightShoulder
            | RightUpperArm | RightLowerArm | RightHand => self.arms,
            _ => self.torso,
        }
    }
}

/// Rest world positions of the bones in the reference T-pose
const REFERENCE_JOINTS: [(HumanBone, Vec3); 24] = [
    (HumanBone::Hips, DEFAULT_HIPS),
    (HumanBone::Spine, DEFAULT_SPINE),
    (HumanBone::Chest, DEFAULT_CHEST),
    (HumanBone::UpperChest, DEFAULT_UPPER_CHEST),
    (HumanBone::Neck, DEFAULT_NECK),
    (HumanBone::Head, DEFAULT_HEAD),
    (HumanBone::LeftShoulder, DEFAULT_LEFT_SHOULDER),
    (HumanBone::LeftUpperArm, DEFAULT_LEFT_UPPER_ARM),
    (HumanBone::LeftLowerArm, DEFAULT_LEFT_LOWER_ARM),
    (HumanBone::LeftHand, DEFAULT_LEFT_HAND),
    (HumanBone::RightShoulder, DEFAULT_RIGHT_SHOULDER),
    (HumanBone::RightUpperArm, DEFAULT_RIGHT_UPPER_ARM),
    (HumanBone::RightLowerArm, DEFAULT_RIGHT_LOWER_ARM),
    (HumanBone::RightHand, DEFAULT_RIGHT_HAND),
    (HumanBone::LeftUpperLeg, DEFAULT_LEFT_UPPER_LEG),
    (HumanBone::LeftLowerLeg, DEFAULT_LEFT_LOWER_LEG),
    (HumanBone::LeftFoot, DEFAULT_LEFT_FOOT),
    (HumanBone::LeftToes, DEFAULT_LEFT_TOES),
    (HumanBone::RightUpperLeg, DEFAULT_RIGHT_UPPER_LEG),
    (HumanBone::RightLowerLeg, DEFAULT_RIGHT_LOWER_LEG),
    (HumanBone::RightFoot, DEFAULT_RIGHT_FOOT),
    (HumanBone::RightToes, DEFAULT_RIGHT_TOES),
    // Eyes sit in front of the head joint
    (HumanBone::LeftEye, Vec3::new(-0.03, 1.6, 0.08)),
    (HumanBone::RightEye, Vec3::new(0.03, 1.6, 0.08)),
];

fn reference_position(bone: HumanBone) -> Option<Vec3> {
    REFERENCE_JOINTS
        .iter()
        .find(|(b, _)| *b == bone)
        .map(|(_, p)| *p)
}

impl Skeleton {
    /// Reference humanoid in T-pose, rooted on the floor at the origin
    pub fn reference_humanoid() -> Skeleton {
        Self::humanoid(&HumanoidProportions::default())
    }

    /// Humanoid in T-pose with segment lengths scaled by `proportions`
    pub fn humanoid(proportions: &HumanoidProportions) -> Skeleton {
        Self::humanoid_without(proportions, BoneSet::empty())
    }

    /// Humanoid whose `unmapped` bones still exist as nodes but are absent
    /// from the humanoid table, like a rig whose importer missed them.
    pub fn humanoid_without(proportions: &HumanoidProportions, unmapped: BoneSet) -> Skeleton {
        let mut builder = SkeletonBuilder::new("Root");
        let mut nodes = [None; HumanBone::COUNT];
        let mut world = [Vec3::ZERO; HumanBone::COUNT];

        for bone in HumanBone::ALL {
            let Some(reference) = reference_position(bone) else {
                continue;
            };
            // Parent joint, skipping optional bones the template lacks
            let parent_bone = std::iter::successors(bone.parent(), |b| b.parent())
                .find(|b| nodes[b.index()].is_some());

            let (parent_node, parent_world, parent_reference) = match parent_bone {
                Some(p) => (
                    nodes[p.index()],
                    world[p.index()],
                    reference_position(p).unwrap_or(Vec3::ZERO),
                ),
                None => (Some(builder.root()), Vec3::ZERO, Vec3::ZERO),
            };
            let Some(parent_node) = parent_node else {
                continue;
            };

            let offset = (reference - parent_reference) * proportions.factor(bone);
            world[bone.index()] = parent_world + offset;

            let Ok(node) = builder.add_node(
                format!("{:?}", bone),
                parent_node,
                Transform::from_translation(offset),
            ) else {
                continue;
            };
            nodes[bone.index()] = Some(node);
            if !unmapped.contains(bone) {
                // Each bone is mapped at most once and the node was just added
                let _ = builder.map_bone(bone, node);
            }
        }

        builder.build()
    }
}
