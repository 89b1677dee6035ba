//! Host glue for driving a loaded avatar from a player skeleton
//!
//! [`AvatarRig`] waits for the avatar model to load, fits it to the reference
//! height, and then keeps a [`PoseSynchronizer`] running from the player's
//! skeleton onto it. Hand clearance against climbing surfaces is fed in every
//! frame and turned into per-bone offsets by [`HandClearanceOffsets`].

use crate::bone::HumanBone;
use crate::config::AvatarSettings;
use crate::error::Result;
use crate::loader::{LoadSlot, LoadStatus};
use crate::skeleton::Skeleton;
use crate::sync::{BoneOffsetProvider, BoneOffsets, PoseSynchronizer, SkeletonRef};
use crate::EPSILON;
use glam::Vec3;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

/// Vertical distance from the skeleton root to its head bone
pub fn model_height(skeleton: &Skeleton) -> Option<f32> {
    let head = skeleton.bone_position(HumanBone::Head)?;
    let root = skeleton.world_position(skeleton.root());
    Some((head.y - root.y).abs())
}

/// Scale the root so the model stands `reference_height` tall, times `scale`.
///
/// Any scale already on the root is factored out first, so fitting twice
/// gives the same result. Returns the applied root scale.
pub fn fit_to_height(skeleton: &mut Skeleton, reference_height: f32, scale: f32) -> Option<f32> {
    let root = skeleton.root();
    let current = skeleton.local_transform(root).scale;
    if current.abs() < EPSILON {
        return None;
    }

    let height = model_height(skeleton)? / current;
    if height < EPSILON {
        return None;
    }

    let fitted = reference_height / height * scale;
    skeleton.set_local_scale(root, fitted);
    Some(fitted)
}

/// Signed distance from each hand to the surface it is holding.
/// Negative values mean the hand would sink into the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandClearance {
    pub left: f32,
    pub right: f32,
}

/// Pushes hands (or the whole model) along `forward` so they do not clip
/// into the surface being climbed.
#[derive(Debug, Clone)]
pub struct HandClearanceOffsets {
    clearance: Rc<Cell<HandClearance>>,
    offset_entire_model: bool,
    forward: Vec3,
}

impl HandClearanceOffsets {
    pub fn new(clearance: Rc<Cell<HandClearance>>, offset_entire_model: bool) -> Self {
        Self {
            clearance,
            offset_entire_model,
            forward: Vec3::Z,
        }
    }

    pub fn with_forward(mut self, forward: Vec3) -> Self {
        self.forward = forward;
        self
    }
}

impl BoneOffsetProvider for HandClearanceOffsets {
    fn prepare_offsets(&mut self, offsets: &mut BoneOffsets) {
        let HandClearance { left, right } = self.clearance.get();

        if self.offset_entire_model {
            let smallest = left.min(right);
            if smallest < 0.0 {
                offsets.insert(HumanBone::Hips, self.forward * smallest);
            }
        } else {
            offsets.insert(HumanBone::LeftHand, self.forward * left);
            offsets.insert(HumanBone::RightHand, self.forward * right);
            // Elbows follow halfway to avoid sharp bends
            offsets.insert(HumanBone::LeftLowerArm, self.forward * (left / 2.0));
            offsets.insert(HumanBone::RightLowerArm, self.forward * (right / 2.0));
        }
    }
}

/// A player-driven avatar: load slot, fitted model and its synchronizer
#[derive(Debug)]
pub struct AvatarRig {
    settings: AvatarSettings,
    loader: LoadSlot<Skeleton>,
    source: Option<SkeletonRef>,
    avatar: Option<SkeletonRef>,
    sync: Option<PoseSynchronizer>,
    clearance: Rc<Cell<HandClearance>>,
}

impl AvatarRig {
    pub fn new(settings: AvatarSettings) -> Self {
        Self {
            settings,
            loader: LoadSlot::new(),
            source: None,
            avatar: None,
            sync: None,
            clearance: Rc::new(Cell::new(HandClearance::default())),
        }
    }

    pub fn settings(&self) -> &AvatarSettings {
        &self.settings
    }

    pub fn avatar(&self) -> Option<&SkeletonRef> {
        self.avatar.as_ref()
    }

    pub fn synchronizer(&self) -> Option<&PoseSynchronizer> {
        self.sync.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    /// Start loading the avatar model, replacing any load in flight
    pub fn begin_load(
        &mut self,
        label: impl Into<String>,
        model: impl Future<Output = Result<Skeleton>> + 'static,
    ) {
        let label = label.into();
        log::info!("Loading {}", label);
        self.loader.start(label, model);
    }

    /// Point the rig at a (new) player skeleton
    pub fn attach_source(&mut self, source: SkeletonRef) {
        if let Some(sync) = self.sync.as_mut() {
            sync.set_source(Some(source.clone()));
        }
        self.source = Some(source);
    }

    /// Distance of each hand from the surface, read on the next tick
    pub fn set_hand_clearance(&self, left: f32, right: f32) {
        self.clearance.set(HandClearance { left, right });
    }

    /// Drop the avatar and stop synchronizing
    pub fn unload(&mut self) {
        self.loader.cancel();
        self.sync = None;
        self.avatar = None;
    }

    /// Advance the load and run one synchronization step. Call once per frame.
    pub fn tick(&mut self) {
        match self.loader.poll() {
            LoadStatus::Ready(skeleton) => self.install(skeleton),
            LoadStatus::Failed(e) => {
                log::error!("Failed to load avatar: {}", e);
                self.sync = None;
                self.avatar = None;
            }
            LoadStatus::Idle | LoadStatus::Pending => {}
        }

        if let Some(sync) = self.sync.as_mut() {
            sync.update();
        }
    }

    fn install(&mut self, mut skeleton: Skeleton) {
        match fit_to_height(
            &mut skeleton,
            self.settings.reference_height,
            self.settings.scale,
        ) {
            Some(scale) => log::debug!("Avatar scaled by {:.3}", scale),
            None => log::warn!("Avatar has no usable head bone, keeping its original size"),
        }

        let avatar = Rc::new(RefCell::new(skeleton));
        let provider =
            HandClearanceOffsets::new(self.clearance.clone(), self.settings.offset_entire_model);
        let sync = PoseSynchronizer::from_settings(
            self.source.clone(),
            Some(avatar.clone()),
            &self.settings.sync,
        )
        .with_offset_provider(provider);

        log::info!(
            "Avatar {} loaded",
            self.settings.name.as_deref().unwrap_or("(unnamed)")
        );
        self.avatar = Some(avatar);
        self.sync = Some(sync);
    }
}
