use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Humanoid role a skeleton node can play.
/// Ordered for topological traversal (parents before children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HumanBone {
    // Root
    Hips = 0,

    // Spine chain
    Spine = 1,
    Chest = 2,
    UpperChest = 3,
    Neck = 4,
    Head = 5,
    LeftEye = 6,
    RightEye = 7,
    Jaw = 8,

    // Left arm chain
    LeftShoulder = 9,
    LeftUpperArm = 10,
    LeftLowerArm = 11,
    LeftHand = 12,

    // Right arm chain
    RightShoulder = 13,
    RightUpperArm = 14,
    RightLowerArm = 15,
    RightHand = 16,

    // Left leg chain
    LeftUpperLeg = 17,
    LeftLowerLeg = 18,
    LeftFoot = 19,
    LeftToes = 20,

    // Right leg chain
    RightUpperLeg = 21,
    RightLowerLeg = 22,
    RightFoot = 23,
    RightToes = 24,

    // Left fingers
    LeftThumbProximal = 25,
    LeftThumbIntermediate = 26,
    LeftThumbDistal = 27,
    LeftIndexProximal = 28,
    LeftIndexIntermediate = 29,
    LeftIndexDistal = 30,
    LeftMiddleProximal = 31,
    LeftMiddleIntermediate = 32,
    LeftMiddleDistal = 33,
    LeftRingProximal = 34,
    LeftRingIntermediate = 35,
    LeftRingDistal = 36,
    LeftLittleProximal = 37,
    LeftLittleIntermediate = 38,
    LeftLittleDistal = 39,

    // Right fingers
    RightThumbProximal = 40,
    RightThumbIntermediate = 41,
    RightThumbDistal = 42,
    RightIndexProximal = 43,
    RightIndexIntermediate = 44,
    RightIndexDistal = 45,
    RightMiddleProximal = 46,
    RightMiddleIntermediate = 47,
    RightMiddleDistal = 48,
    RightRingProximal = 49,
    RightRingIntermediate = 50,
    RightRingDistal = 51,
    RightLittleProximal = 52,
    RightLittleIntermediate = 53,
    RightLittleDistal = 54,
}

const_assert!(HumanBone::COUNT <= 64);

impl HumanBone {
    /// Total number of bone identities
    pub const COUNT: usize = 55;

    /// Convert to array index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a bone by array index
    pub fn from_index(index: usize) -> Option<HumanBone> {
        Self::ALL.get(index).copied()
    }

    /// Get all bone identities in topological order (parents before children)
    pub const ALL: [HumanBone; Self::COUNT] = [
        HumanBone::Hips,
        HumanBone::Spine,
        HumanBone::Chest,
        HumanBone::UpperChest,
        HumanBone::Neck,
        HumanBone::Head,
        HumanBone::LeftEye,
        HumanBone::RightEye,
        HumanBone::Jaw,
        HumanBone::LeftShoulder,
        HumanBone::LeftUpperArm,
        HumanBone::LeftLowerArm,
        HumanBone::LeftHand,
        HumanBone::RightShoulder,
        HumanBone::RightUpperArm,
        HumanBone::RightLowerArm,
        HumanBone::RightHand,
        HumanBone::LeftUpperLeg,
        HumanBone::LeftLowerLeg,
        HumanBone::LeftFoot,
        HumanBone::LeftToes,
        HumanBone::RightUpperLeg,
        HumanBone::RightLowerLeg,
        HumanBone::RightFoot,
        HumanBone::RightToes,
        HumanBone::LeftThumbProximal,
        HumanBone::LeftThumbIntermediate,
        HumanBone::LeftThumbDistal,
        HumanBone::LeftIndexProximal,
        HumanBone::LeftIndexIntermediate,
        HumanBone::LeftIndexDistal,
        HumanBone::LeftMiddleProximal,
        HumanBone::LeftMiddleIntermediate,
        HumanBone::LeftMiddleDistal,
        HumanBone::LeftRingProximal,
        HumanBone::LeftRingIntermediate,
        HumanBone::LeftRingDistal,
        HumanBone::LeftLittleProximal,
        HumanBone::LeftLittleIntermediate,
        HumanBone::LeftLittleDistal,
        HumanBone::RightThumbProximal,
        HumanBone::RightThumbIntermediate,
        HumanBone::RightThumbDistal,
        HumanBone::RightIndexProximal,
        HumanBone::RightIndexIntermediate,
        HumanBone::RightIndexDistal,
        HumanBone::RightMiddleProximal,
        HumanBone::RightMiddleIntermediate,
        HumanBone::RightMiddleDistal,
        HumanBone::RightRingProximal,
        HumanBone::RightRingIntermediate,
        HumanBone::RightRingDistal,
        HumanBone::RightLittleProximal,
        HumanBone::RightLittleIntermediate,
        HumanBone::RightLittleDistal,
    ];

    /// Humanoid parent of this bone (None for hips).
    ///
    /// Optional bones (upper chest, shoulders, toes) sit in the chain like any
    /// other; a skeleton lacking them simply parents the child node elsewhere.
    pub const fn parent(self) -> Option<HumanBone> {
        use HumanBone::*;
        match self {
            Hips => None,
            Spine => Some(Hips),
            Chest => Some(Spine),
            UpperChest => Some(Chest),
            Neck => Some(UpperChest),
            Head => Some(Neck),
            LeftEye | RightEye | Jaw => Some(Head),

            LeftShoulder | RightShoulder => Some(UpperChest),
            LeftUpperArm => Some(LeftShoulder),
            LeftLowerArm => Some(LeftUpperArm),
            LeftHand => Some(LeftLowerArm),
            RightUpperArm => Some(RightShoulder),
            RightLowerArm => Some(RightUpperArm),
            RightHand => Some(RightLowerArm),

            LeftUpperLeg | RightUpperLeg => Some(Hips),
            LeftLowerLeg => Some(LeftUpperLeg),
            LeftFoot => Some(LeftLowerLeg),
            LeftToes => Some(LeftFoot),
            RightLowerLeg => Some(RightUpperLeg),
            RightFoot => Some(RightLowerLeg),
            RightToes => Some(RightFoot),

            LeftThumbProximal | LeftIndexProximal | LeftMiddleProximal | LeftRingProximal
            | LeftLittleProximal => Some(LeftHand),
            RightThumbProximal | RightIndexProximal | RightMiddleProximal
            | RightRingProximal | RightLittleProximal => Some(RightHand),

            LeftThumbIntermediate => Some(LeftThumbProximal),
            LeftThumbDistal => Some(LeftThumbIntermediate),
            LeftIndexIntermediate => Some(LeftIndexProximal),
            LeftIndexDistal => Some(LeftIndexIntermediate),
            LeftMiddleIntermediate => Some(LeftMiddleProximal),
            LeftMiddleDistal => Some(LeftMiddleIntermediate),
            LeftRingIntermediate => Some(LeftRingProximal),
            LeftRingDistal => Some(LeftRingIntermediate),
            LeftLittleIntermediate => Some(LeftLittleProximal),
            LeftLittleDistal => Some(LeftLittleIntermediate),

            RightThumbIntermediate => Some(RightThumbProximal),
            RightThumbDistal => Some(RightThumbIntermediate),
            RightIndexIntermediate => Some(RightIndexProximal),
            RightIndexDistal => Some(RightIndexIntermediate),
            RightMiddleIntermediate => Some(RightMiddleProximal),
            RightMiddleDistal => Some(RightMiddleIntermediate),
            RightRingIntermediate => Some(RightRingProximal),
            RightRingDistal => Some(RightRingIntermediate),
            RightLittleIntermediate => Some(RightLittleProximal),
            RightLittleDistal => Some(RightLittleIntermediate),
        }
    }
}

/// Set of bone identities.
/// Uses a bitset where bit i corresponds to HumanBone with index i.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<HumanBone>", into = "Vec<HumanBone>")]
pub struct BoneSet(u64);

impl BoneSet {
    /// Create an empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create a set from a slice of bones
    pub const fn from_bones(bones: &[HumanBone]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < bones.len() {
            bits |= 1 << bones[i].index();
            i += 1;
        }
        Self(bits)
    }

    #[inline]
    pub fn contains(&self, bone: HumanBone) -> bool {
        (self.0 & (1 << bone.index())) != 0
    }

    /// Return new set with the bone added
    #[inline]
    pub fn with(self, bone: HumanBone) -> Self {
        Self(self.0 | (1 << bone.index()))
    }

    /// Return new set with the bone removed
    #[inline]
    pub fn without(self, bone: HumanBone) -> Self {
        Self(self.0 & !(1 << bone.index()))
    }

    pub fn insert(&mut self, bone: HumanBone) {
        *self = self.with(bone);
    }

    pub fn remove(&mut self, bone: HumanBone) {
        *self = self.without(bone);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in topological order
    pub fn iter(&self) -> impl Iterator<Item = HumanBone> + '_ {
        HumanBone::ALL
            .into_iter()
            .filter(move |bone| self.contains(*bone))
    }
}

impl FromIterator<HumanBone> for BoneSet {
    fn from_iter<I: IntoIterator<Item = HumanBone>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), BoneSet::with)
    }
}

impl From<Vec<HumanBone>> for BoneSet {
    fn from(bones: Vec<HumanBone>) -> Self {
        bones.into_iter().collect()
    }
}

impl From<BoneSet> for Vec<HumanBone> {
    fn from(set: BoneSet) -> Self {
        set.iter().collect()
    }
}
