//! Landmark-based alignment between differently proportioned skeletons
//!
//! After the pose transfer both skeletons share a root frame, but a shorter
//! target ends up with its shoulders (or feet) somewhere else than the
//! source's. The alignment offset is the translation that moves the target's
//! landmark midpoint onto the source's.

use crate::bone::HumanBone;
use crate::skeleton::Skeleton;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Which landmark pair drives the alignment correction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// No correction; the hips are already placed by the root sync
    #[default]
    #[serde(alias = "none")]
    Hips,
    /// Match the midpoint of the feet
    Feet,
    /// Match the midpoint of the shoulders
    Shoulders,
}

impl AlignmentMode {
    /// Left/right landmark bones for this mode
    pub const fn landmarks(self) -> Option<(HumanBone, HumanBone)> {
        match self {
            AlignmentMode::Hips => None,
            AlignmentMode::Feet => Some((HumanBone::LeftFoot, HumanBone::RightFoot)),
            AlignmentMode::Shoulders => {
                Some((HumanBone::LeftShoulder, HumanBone::RightShoulder))
            }
        }
    }
}

/// Combinable alignment request flags.
/// Only one mode is ever evaluated, see [`AlignmentFlags::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AlignmentFlags(u8);

impl AlignmentFlags {
    pub const NONE: Self = Self(0);
    pub const HIPS: Self = Self(1 << 0);
    pub const FEET: Self = Self(1 << 1);
    pub const SHOULDERS: Self = Self(1 << 2);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0 && other.0 != 0
    }

    /// Pick the single mode to evaluate: shoulders, then feet, then hips
    pub const fn resolve(self) -> AlignmentMode {
        if self.contains(Self::SHOULDERS) {
            AlignmentMode::Shoulders
        } else if self.contains(Self::FEET) {
            AlignmentMode::Feet
        } else {
            AlignmentMode::Hips
        }
    }
}

impl BitOr for AlignmentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<AlignmentMode> for AlignmentFlags {
    fn from(mode: AlignmentMode) -> Self {
        match mode {
            AlignmentMode::Hips => Self::HIPS,
            AlignmentMode::Feet => Self::FEET,
            AlignmentMode::Shoulders => Self::SHOULDERS,
        }
    }
}

/// Midpoint of a landmark pair, if both bones resolve
fn landmark_mean(skeleton: &Skeleton, (left, right): (HumanBone, HumanBone)) -> Option<Vec3> {
    let left = skeleton.bone_position(left)?;
    let right = skeleton.bone_position(right)?;
    Some((left + right) / 2.0)
}

/// Translation that moves the target's landmark midpoint onto the source's.
///
/// Returns zero for [`AlignmentMode::Hips`] or when any of the four landmark
/// bones is missing.
pub fn alignment_offset(mode: AlignmentMode, source: &Skeleton, target: &Skeleton) -> Vec3 {
    let Some(landmarks) = mode.landmarks() else {
        return Vec3::ZERO;
    };

    match (
        landmark_mean(source, landmarks),
        landmark_mean(target, landmarks),
    ) {
        (Some(source_mean), Some(target_mean)) => -(target_mean - source_mean),
        _ => Vec3::ZERO,
    }
}
