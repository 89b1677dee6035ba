//! Humanoid Pose Sync - skeleton-to-skeleton pose retargeting
//!
//! Copies the pose of a source humanoid skeleton onto a differently
//! proportioned target every frame, keeping selected bones pinned to the
//! source and aligning the two bodies at the hips, feet or shoulders.
//! Builds as a native library and as a wasm module with a preview API.

pub mod alignment;
pub mod avatar;
pub mod bone;
pub mod config;
pub mod error;
pub mod loader;
pub mod skeleton;
mod skeleton_constants;
pub mod sync;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use alignment::{alignment_offset, AlignmentFlags, AlignmentMode};
pub use avatar::{fit_to_height, model_height, AvatarRig, HandClearance, HandClearanceOffsets};
pub use bone::{bone_mapping, BoneMap, BoneMapping, BoneSet, HumanBone, PoseHandle, PoseSnapshot};
pub use config::{AvatarSettings, SyncSettings};
pub use error::{Result, RetargetError};
pub use glam::{Quat, Vec3};
pub use loader::{LoadSlot, LoadStatus};
pub use skeleton::{HumanoidProportions, NodeId, Skeleton, SkeletonBuilder, Transform};
pub use skeleton_constants::REFERENCE_HEIGHT;
pub use sync::{BoneOffsetProvider, BoneOffsets, PoseSynchronizer, SkeletonRef, SyncState};

/// Length and height threshold below which geometry counts as degenerate
pub const EPSILON: f32 = 1e-5;

/// Route `log` output and panics to the browser console.
///
/// Native hosts install their own logger; this is a no-op there.
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            console_error_panic_hook::set_once();
            console_log::init_with_level(log::Level::Info).ok();
        }
    }
}
