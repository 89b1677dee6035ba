//! Serializable settings for the synchronizer and the avatar host

use crate::alignment::AlignmentMode;
use crate::bone::{BoneSet, HumanBone};
use crate::error::{Result, RetargetError};
use crate::skeleton_constants::REFERENCE_HEIGHT;
use serde::{Deserialize, Serialize};

/// Synchronizer behavior: which bones are pinned and how they are aligned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub alignment: AlignmentMode,
    pub locked_bones: BoneSet,
}

impl SyncSettings {
    /// Bones that follow the source exactly when an avatar mirrors a player's
    /// arms: hips, both arm chains and hands, aligned at the shoulders.
    pub const ARM_LOCK: BoneSet = BoneSet::from_bones(&[
        HumanBone::Hips,
        HumanBone::LeftUpperArm,
        HumanBone::LeftLowerArm,
        HumanBone::LeftHand,
        HumanBone::RightUpperArm,
        HumanBone::RightLowerArm,
        HumanBone::RightHand,
    ]);

    pub const fn arm_lock() -> Self {
        Self {
            alignment: AlignmentMode::Shoulders,
            locked_bones: Self::ARM_LOCK,
        }
    }
}

/// Settings for a loaded avatar model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarSettings {
    /// Display name of the model, if any
    pub name: Option<String>,
    /// Extra uniform scale on top of the height fit
    pub scale: f32,
    /// Height in meters the model is fitted to
    pub reference_height: f32,
    /// Push the whole model back instead of the hands when they would clip
    pub offset_entire_model: bool,
    pub sync: SyncSettings,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            name: None,
            scale: 1.0,
            reference_height: REFERENCE_HEIGHT,
            offset_entire_model: false,
            sync: SyncSettings::arm_lock(),
        }
    }
}

impl AvatarSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            return Err(RetargetError::Settings(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if !(self.reference_height > 0.0 && self.reference_height.is_finite()) {
            return Err(RetargetError::Settings(format!(
                "reference_height must be positive, got {}",
                self.reference_height
            )));
        }
        Ok(())
    }
}
