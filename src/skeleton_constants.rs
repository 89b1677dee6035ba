//! Shared reference humanoid used by both build.rs and runtime code.
//!
//! The joint positions describe a T-pose in world space with the skeleton root
//! on the floor at the origin. The character faces +Z, its left side is -X.
//! build.rs includes this file to validate symmetry at compile time.

// Some constants are only used by build.rs for validation
#![allow(dead_code)]

use glam::Vec3;

/// Height the avatar is fitted to when loaded (meters)
pub const REFERENCE_HEIGHT: f32 = 1.7;

// Torso
pub const DEFAULT_HIPS: Vec3 = Vec3::new(0.0, 0.95, 0.0);
pub const DEFAULT_SPINE: Vec3 = Vec3::new(0.0, 1.05, 0.0);
pub const DEFAULT_CHEST: Vec3 = Vec3::new(0.0, 1.2, 0.0);
pub const DEFAULT_UPPER_CHEST: Vec3 = Vec3::new(0.0, 1.32, 0.0);
pub const DEFAULT_NECK: Vec3 = Vec3::new(0.0, 1.45, 0.0);
pub const DEFAULT_HEAD: Vec3 = Vec3::new(0.0, 1.55, 0.0);

// Arms
pub const DEFAULT_LEFT_SHOULDER: Vec3 = Vec3::new(-0.06, 1.42, 0.0);
pub const DEFAULT_LEFT_UPPER_ARM: Vec3 = Vec3::new(-0.18, 1.42, 0.0);
pub const DEFAULT_LEFT_LOWER_ARM: Vec3 = Vec3::new(-0.45, 1.42, 0.0);
pub const DEFAULT_LEFT_HAND: Vec3 = Vec3::new(-0.7, 1.42, 0.0);
pub const DEFAULT_RIGHT_SHOULDER: Vec3 = Vec3::new(0.06, 1.42, 0.0);
pub const DEFAULT_RIGHT_UPPER_ARM: Vec3 = Vec3::new(0.18, 1.42, 0.0);
pub const DEFAULT_RIGHT_LOWER_ARM: Vec3 = Vec3::new(0.45, 1.42, 0.0);
pub const DEFAULT_RIGHT_HAND: Vec3 = Vec3::new(0.7, 1.42, 0.0);

// Legs
pub const DEFAULT_LEFT_UPPER_LEG: Vec3 = Vec3::new(-0.09, 0.9, 0.0);
pub const DEFAULT_LEFT_LOWER_LEG: Vec3 = Vec3::new(-0.09, 0.5, 0.0);
pub const DEFAULT_LEFT_FOOT: Vec3 = Vec3::new(-0.09, 0.08, 0.0);
pub const DEFAULT_LEFT_TOES: Vec3 = Vec3::new(-0.09, 0.02, 0.12);
pub const DEFAULT_RIGHT_UPPER_LEG: Vec3 = Vec3::new(0.09, 0.9, 0.0);
pub const DEFAULT_RIGHT_LOWER_LEG: Vec3 = Vec3::new(0.09, 0.5, 0.0);
pub const DEFAULT_RIGHT_FOOT: Vec3 = Vec3::new(0.09, 0.08, 0.0);
pub const DEFAULT_RIGHT_TOES: Vec3 = Vec3::new(0.09, 0.02, 0.12);

/// Spine joints from hips to head, used to check the torso rises monotonically.
pub const SPINE_CHAIN: [Vec3; 6] = [
    DEFAULT_HIPS,
    DEFAULT_SPINE,
    DEFAULT_CHEST,
    DEFAULT_UPPER_CHEST,
    DEFAULT_NECK,
    DEFAULT_HEAD,
];

/// Left/right joint pairs that must mirror each other across the YZ plane.
pub const MIRRORED_PAIRS: [(&str, Vec3, Vec3); 8] = [
    ("shoulder", DEFAULT_LEFT_SHOULDER, DEFAULT_RIGHT_SHOULDER),
    ("upper arm", DEFAULT_LEFT_UPPER_ARM, DEFAULT_RIGHT_UPPER_ARM),
    ("lower arm", DEFAULT_LEFT_LOWER_ARM, DEFAULT_RIGHT_LOWER_ARM),
    ("hand", DEFAULT_LEFT_HAND, DEFAULT_RIGHT_HAND),
    ("upper leg", DEFAULT_LEFT_UPPER_LEG, DEFAULT_RIGHT_UPPER_LEG),
    ("lower leg", DEFAULT_LEFT_LOWER_LEG, DEFAULT_RIGHT_LOWER_LEG),
    ("foot", DEFAULT_LEFT_FOOT, DEFAULT_RIGHT_FOOT),
    ("toes", DEFAULT_LEFT_TOES, DEFAULT_RIGHT_TOES),
];
