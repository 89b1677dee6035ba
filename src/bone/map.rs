use super::id::HumanBone;
use crate::skeleton::{NodeId, Skeleton};

/// A humanoid role paired with the skeleton node that plays it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneMap {
    pub bone: HumanBone,
    pub node: NodeId,
}

impl BoneMap {
    pub const fn new(bone: HumanBone, node: NodeId) -> Self {
        Self { bone, node }
    }
}

impl From<(HumanBone, NodeId)> for BoneMap {
    fn from((bone, node): (HumanBone, NodeId)) -> Self {
        Self::new(bone, node)
    }
}

/// Lazy walk over the bones a skeleton actually has.
///
/// Yields in [`HumanBone::ALL`] order and silently skips unmapped identities.
/// A clone resumes from the same point; call [`bone_mapping`] again to restart.
#[derive(Debug, Clone)]
pub struct BoneMapIter<'a> {
    skeleton: &'a Skeleton,
    next: usize,
}

impl Iterator for BoneMapIter<'_> {
    type Item = BoneMap;

    fn next(&mut self) -> Option<BoneMap> {
        while let Some(bone) = HumanBone::from_index(self.next) {
            self.next += 1;
            if let Some(node) = self.skeleton.bone_node(bone) {
                return Some(BoneMap::new(bone, node));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(HumanBone::COUNT.saturating_sub(self.next)))
    }
}

/// Enumerate the (bone, node) pairs resolvable on `skeleton`
pub fn bone_mapping(skeleton: &Skeleton) -> BoneMapIter<'_> {
    BoneMapIter { skeleton, next: 0 }
}

/// Materialized bone mapping, built once per (re)initialization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoneMapping {
    entries: Vec<BoneMap>,
}

impl BoneMapping {
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        bone_mapping(skeleton).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoneMap> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[BoneMap] {
        &self.entries
    }

    /// Node mapped to `bone`, if any
    pub fn node(&self, bone: HumanBone) -> Option<NodeId> {
        self.entries.iter().find(|m| m.bone == bone).map(|m| m.node)
    }

    pub fn contains(&self, bone: HumanBone) -> bool {
        self.node(bone).is_some()
    }
}

impl FromIterator<BoneMap> for BoneMapping {
    fn from_iter<I: IntoIterator<Item = BoneMap>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a BoneMapping {
    type Item = &'a BoneMap;
    type IntoIter = std::slice::Iter<'a, BoneMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
