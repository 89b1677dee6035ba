//! Per-frame pose synchronization from a source skeleton onto a target
//!
//! The synchronizer lazily binds pose handles to both skeletons, then every
//! [`PoseSynchronizer::update`]:
//!
//! 1. re-initializes if a skeleton was reassigned,
//! 2. copies the source root transform onto the target root,
//! 3. transfers the normalized pose,
//! 4. computes the alignment offset,
//! 5. lets the offset provider fill [`BoneOffsets`], then forces locked bones
//!    onto the source positions (hips first).
//!
//! Missing skeletons, bones or landmarks skip the affected step; the update
//! never fails.

use crate::alignment::{alignment_offset, AlignmentMode};
use crate::bone::{BoneMapping, BoneSet, HumanBone, PoseHandle};
use crate::config::SyncSettings;
use crate::skeleton::{NodeId, Skeleton};
use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, single-threaded skeleton reference
pub type SkeletonRef = Rc<RefCell<Skeleton>>;

/// Lifecycle of a [`PoseSynchronizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Never bound, or released by `deactivate`
    Uninitialized,
    /// Handles bound, updates transfer poses
    Ready,
    /// A skeleton was reassigned; the next update re-initializes
    Dirty,
}

/// Per-bone translations added during locked-bone placement.
/// Cleared by the synchronizer before each refill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneOffsets([Option<Vec3>; HumanBone::COUNT]);

impl Default for BoneOffsets {
    fn default() -> Self {
        Self([None; HumanBone::COUNT])
    }
}

impl BoneOffsets {
    pub fn clear(&mut self) {
        self.0 = [None; HumanBone::COUNT];
    }

    pub fn insert(&mut self, bone: HumanBone, offset: Vec3) {
        self.0[bone.index()] = Some(offset);
    }

    pub fn remove(&mut self, bone: HumanBone) -> Option<Vec3> {
        self.0[bone.index()].take()
    }

    pub fn get(&self, bone: HumanBone) -> Option<Vec3> {
        self.0[bone.index()]
    }

    /// Offset for `bone`, zero when none was set
    #[inline]
    pub fn get_or_zero(&self, bone: HumanBone) -> Vec3 {
        self.get(bone).unwrap_or(Vec3::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|o| o.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HumanBone, Vec3)> + '_ {
        HumanBone::ALL
            .into_iter()
            .filter_map(move |bone| self.get(bone).map(|offset| (bone, offset)))
    }
}

/// Fills the per-bone offsets right before locked bones are placed.
///
/// The map is already cleared when this runs and is read immediately after.
pub trait BoneOffsetProvider {
    fn prepare_offsets(&mut self, offsets: &mut BoneOffsets);
}

impl<F> BoneOffsetProvider for F
where
    F: FnMut(&mut BoneOffsets),
{
    fn prepare_offsets(&mut self, offsets: &mut BoneOffsets) {
        self(offsets)
    }
}

/// Copies a source skeleton's pose onto a target skeleton once per frame.
pub struct PoseSynchronizer {
    source: Option<SkeletonRef>,
    target: Option<SkeletonRef>,

    source_handle: Option<PoseHandle>,
    target_handle: Option<PoseHandle>,

    /// Cached target mapping, avoids resolving bones every frame
    mapping: Option<BoneMapping>,
    locked_bones: BoneSet,
    alignment: AlignmentMode,

    offsets: BoneOffsets,
    offset_provider: Option<Box<dyn BoneOffsetProvider>>,

    state: SyncState,
    active: bool,
    last_alignment: Vec3,
    /// Last reported init problem, so steady failures log once
    last_warning: Option<String>,
}

impl std::fmt::Debug for PoseSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseSynchronizer")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("alignment", &self.alignment)
            .field("locked_bones", &self.locked_bones)
            .field("mapped_bones", &self.mapping.as_ref().map(BoneMapping::len))
            .field("has_offset_provider", &self.offset_provider.is_some())
            .finish()
    }
}

impl PoseSynchronizer {
    /// Synchronizer with no locked bones; the target mapping is derived on the
    /// first update.
    pub fn new(source: Option<SkeletonRef>, target: Option<SkeletonRef>) -> Self {
        Self {
            source,
            target,
            source_handle: None,
            target_handle: None,
            mapping: None,
            locked_bones: BoneSet::empty(),
            alignment: AlignmentMode::default(),
            offsets: BoneOffsets::default(),
            offset_provider: None,
            state: SyncState::Uninitialized,
            active: true,
            last_alignment: Vec3::ZERO,
            last_warning: None,
        }
    }

    /// Synchronizer with a precomputed target mapping
    pub fn with_mapping(
        source: Option<SkeletonRef>,
        target: Option<SkeletonRef>,
        mapping: BoneMapping,
        locked_bones: BoneSet,
    ) -> Self {
        Self {
            mapping: Some(mapping),
            locked_bones,
            ..Self::new(source, target)
        }
    }

    /// Synchronizer whose target mapping is derived from `mapping_from` now
    pub fn from_skeleton(
        source: Option<SkeletonRef>,
        target: Option<SkeletonRef>,
        mapping_from: &Skeleton,
        locked_bones: BoneSet,
    ) -> Self {
        Self::with_mapping(
            source,
            target,
            BoneMapping::from_skeleton(mapping_from),
            locked_bones,
        )
    }

    pub fn from_settings(
        source: Option<SkeletonRef>,
        target: Option<SkeletonRef>,
        settings: &SyncSettings,
    ) -> Self {
        Self::new(source, target)
            .with_alignment(settings.alignment)
            .with_locked_bones(settings.locked_bones)
    }

    pub fn with_alignment(mut self, alignment: AlignmentMode) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_locked_bones(mut self, locked_bones: BoneSet) -> Self {
        self.locked_bones = locked_bones;
        self
    }

    pub fn with_offset_provider(mut self, provider: impl BoneOffsetProvider + 'static) -> Self {
        self.set_offset_provider(provider);
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn source(&self) -> Option<&SkeletonRef> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&SkeletonRef> {
        self.target.as_ref()
    }

    /// Rebind the source skeleton; re-initializes on the next update
    pub fn set_source(&mut self, source: Option<SkeletonRef>) {
        self.source = source;
        self.state = SyncState::Dirty;
    }

    /// Rebind the target skeleton; the mapping is rebuilt on the next update
    pub fn set_target(&mut self, target: Option<SkeletonRef>) {
        self.target = target;
        self.mapping = None;
        self.state = SyncState::Dirty;
    }

    pub fn mapping(&self) -> Option<&BoneMapping> {
        self.mapping.as_ref()
    }

    pub fn locked_bones(&self) -> BoneSet {
        self.locked_bones
    }

    pub fn set_locked_bones(&mut self, locked_bones: BoneSet) {
        self.locked_bones = locked_bones;
    }

    pub fn alignment(&self) -> AlignmentMode {
        self.alignment
    }

    pub fn set_alignment(&mut self, alignment: AlignmentMode) {
        self.alignment = alignment;
    }

    /// Offsets applied in the last update
    pub fn offsets(&self) -> &BoneOffsets {
        &self.offsets
    }

    pub fn last_alignment_offset(&self) -> Vec3 {
        self.last_alignment
    }

    pub fn set_offset_provider(&mut self, provider: impl BoneOffsetProvider + 'static) {
        self.offset_provider = Some(Box::new(provider));
    }

    pub fn clear_offset_provider(&mut self) {
        self.offset_provider = None;
    }

    /// Whether pose handles are currently bound
    pub fn has_handles(&self) -> bool {
        self.source_handle.is_some() && self.target_handle.is_some()
    }

    /// Resume updates; re-initializes on the next update
    pub fn activate(&mut self) {
        self.active = true;
        if self.source.is_some() && self.target.is_some() {
            self.state = SyncState::Dirty;
        }
    }

    /// Stop updating and release the pose handles
    pub fn deactivate(&mut self) {
        self.active = false;
        self.release_handles();
        self.state = SyncState::Uninitialized;
    }

    fn release_handles(&mut self) {
        self.source_handle = None;
        self.target_handle = None;
    }

    fn warn_once(&mut self, message: String) {
        if self.last_warning.as_deref() != Some(message.as_str()) {
            log::warn!("{}", message);
            self.last_warning = Some(message);
        }
    }

    /// Bind handles and the target mapping. Leaves the state untouched and
    /// returns false when either skeleton is absent or cannot be bound.
    fn reinitialize(&mut self) -> bool {
        let (Some(source), Some(target)) = (self.source.clone(), self.target.clone()) else {
            return false;
        };

        self.release_handles();

        let bound = match (source.try_borrow(), target.try_borrow()) {
            (Ok(source), Ok(target)) => PoseHandle::bind(&source)
                .and_then(|s| PoseHandle::bind(&target).map(|t| (s, t)))
                .map(|handles| {
                    let mapping = self
                        .mapping
                        .take()
                        .unwrap_or_else(|| BoneMapping::from_skeleton(&target));
                    (handles, mapping)
                }),
            _ => {
                self.warn_once("Pose synchronizer initialization deferred: skeleton borrowed elsewhere".into());
                return false;
            }
        };

        match bound {
            Ok(((source_handle, target_handle), mapping)) => {
                log::debug!(
                    "Pose synchronizer initialized: {} target bones mapped, {} locked",
                    mapping.len(),
                    self.locked_bones.len()
                );
                self.source_handle = Some(source_handle);
                self.target_handle = Some(target_handle);
                self.mapping = Some(mapping);
                self.state = SyncState::Ready;
                self.last_warning = None;
                true
            }
            Err(e) => {
                self.warn_once(format!("Pose synchronizer initialization deferred: {}", e));
                false
            }
        }
    }

    /// Run one synchronization step. Call once per frame.
    pub fn update(&mut self) {
        if !self.active {
            return;
        }
        if self.state != SyncState::Ready && !self.reinitialize() {
            return;
        }

        let (Some(source), Some(target)) = (self.source.clone(), self.target.clone()) else {
            return;
        };
        if Rc::ptr_eq(&source, &target) {
            self.warn_once("Pose synchronizer source and target are the same skeleton".into());
            return;
        }
        let (Ok(source), Ok(mut target)) = (source.try_borrow(), target.try_borrow_mut()) else {
            self.warn_once("Pose synchronizer skipped a frame: skeleton borrowed elsewhere".into());
            return;
        };

        let (Some(source_handle), Some(target_handle)) = (&self.source_handle, &self.target_handle)
        else {
            return;
        };
        if !source_handle.fits(&source) || !target_handle.fits(&target) {
            // Skeleton contents were swapped behind the same reference
            self.state = SyncState::Dirty;
            return;
        }

        // Shared spatial frame
        let source_root = source.world_transform(source.root());
        let target_root = target.root();
        target.set_world_position(target_root, source_root.translation);
        target.set_world_rotation(target_root, source_root.rotation);

        let pose = source_handle.capture(&source);
        target_handle.apply(&mut target, &pose);

        let offset = alignment_offset(self.alignment, &source, &target);
        self.last_alignment = offset;

        self.offsets.clear();
        if let Some(provider) = self.offset_provider.as_mut() {
            provider.prepare_offsets(&mut self.offsets);
        }

        if let Some(mapping) = &self.mapping {
            place_locked_bones(
                &source,
                &mut target,
                mapping,
                self.locked_bones,
                offset,
                &self.offsets,
            );
        }
    }
}

/// Force locked target bones onto the source, hips first.
fn place_locked_bones(
    source: &Skeleton,
    target: &mut Skeleton,
    mapping: &BoneMapping,
    locked_bones: BoneSet,
    alignment: Vec3,
    offsets: &BoneOffsets,
) {
    // Hips already sit right relative to the root; only shift the baseline
    if locked_bones.contains(HumanBone::Hips) && source.bone_node(HumanBone::Hips).is_some() {
        if let Some(hips) = mapping.node(HumanBone::Hips).filter(|n| target.contains(*n)) {
            let position =
                target.world_position(hips) + alignment + offsets.get_or_zero(HumanBone::Hips);
            target.set_world_position(hips, position);
        }
    }

    let mut locked = [(NodeId::new(0), HumanBone::Hips); HumanBone::COUNT];
    let mut len = 0;
    for m in mapping.iter().filter(|m| {
        m.bone != HumanBone::Hips && locked_bones.contains(m.bone) && target.contains(m.node)
    }) {
        if len == locked.len() {
            break;
        }
        locked[len] = (m.node, m.bone);
        len += 1;
    }

    // Node order is parent-before-child, so a placed bone is never moved by
    // a later parent write
    let locked = &mut locked[..len];
    locked.sort_unstable_by_key(|(node, _)| *node);

    for &(node, bone) in locked.iter() {
        let Some(source_position) = source.bone_position(bone) else {
            continue;
        };
        let position = source_position + alignment + offsets.get_or_zero(bone);
        target.set_world_position(node, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::BoneMap;
    use crate::skeleton::{HumanoidProportions, Transform};
    use glam::Quat;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::Cell;

    const TOL: f32 = 1e-4;

    fn shared(skeleton: Skeleton) -> SkeletonRef {
        Rc::new(RefCell::new(skeleton))
    }

    fn short_target() -> Skeleton {
        Skeleton::humanoid(&HumanoidProportions {
            legs: 0.8,
            torso: 0.85,
            arms: 0.9,
        })
    }

    fn posed_source(rng: &mut StdRng) -> Skeleton {
        let mut source = Skeleton::reference_humanoid();
        for bone in [
            HumanBone::Spine,
            HumanBone::LeftUpperArm,
            HumanBone::LeftLowerArm,
            HumanBone::RightUpperArm,
            HumanBone::RightLowerArm,
            HumanBone::LeftUpperLeg,
        ] {
            let node = source.bone_node(bone).unwrap();
            let rotation = Quat::from_euler(
                glam::EulerRot::XYZ,
                rng.random_range(-0.8..0.8),
                rng.random_range(-0.8..0.8),
                rng.random_range(-0.8..0.8),
            );
            source.set_local_rotation(node, rotation);
        }
        let root = source.root();
        source.set_local_transform(
            root,
            Transform::from_translation_rotation(
                Vec3::new(rng.random_range(-3.0..3.0), 0.0, rng.random_range(-3.0..3.0)),
                Quat::from_rotation_y(rng.random_range(-3.0..3.0)),
            ),
        );
        source
    }

    /// Two-landmark skeletons from the shoulder alignment example
    fn shoulder_rig(shoulder_y: f32, half_width: f32) -> Skeleton {
        let mut builder = Skeleton::builder("Root");
        let root = builder.root();
        let hips = builder
            .add_bone(
                HumanBone::Hips,
                root,
                Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            )
            .unwrap();
        for (bone, x) in [
            (HumanBone::LeftShoulder, -half_width),
            (HumanBone::RightShoulder, half_width),
        ] {
            builder
                .add_bone(
                    bone,
                    hips,
                    Transform::from_translation(Vec3::new(x, shoulder_y - 1.0, 0.0)),
                )
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_shoulder_alignment_lifts_locked_hips() {
        let source = shared(shoulder_rig(1.5, 0.2));
        let target = shared(shoulder_rig(1.3, 0.15));

        let mut sync = PoseSynchronizer::new(Some(source), Some(target.clone()))
            .with_alignment(AlignmentMode::Shoulders)
            .with_locked_bones(BoneSet::from_bones(&[HumanBone::Hips]));
        sync.update();

        assert_eq!(sync.state(), SyncState::Ready);
        assert!(sync
            .last_alignment_offset()
            .distance(Vec3::new(0.0, 0.2, 0.0))
            < 1e-5);

        // After pose transfer the target hips sit at their rest height (1.0)
        let hips = target.borrow().bone_position(HumanBone::Hips).unwrap();
        assert!(hips.distance(Vec3::new(0.0, 1.2, 0.0)) < 1e-5);
    }

    #[test]
    fn test_hips_unlocked_are_not_shifted() {
        let source = shared(shoulder_rig(1.5, 0.2));
        let target = shared(shoulder_rig(1.3, 0.15));

        let mut sync = PoseSynchronizer::new(Some(source), Some(target.clone()))
            .with_alignment(AlignmentMode::Shoulders);
        sync.update();

        let hips = target.borrow().bone_position(HumanBone::Hips).unwrap();
        assert!(hips.distance(Vec3::new(0.0, 1.0, 0.0)) < 1e-5);
    }

    #[test]
    fn test_locked_bone_placement() {
        let mut rng = StdRng::seed_from_u64(42);
        let locked = BoneSet::from_bones(&[
            HumanBone::Hips,
            HumanBone::LeftUpperArm,
            HumanBone::LeftLowerArm,
            HumanBone::LeftHand,
            HumanBone::RightHand,
        ]);
        let push = Vec3::new(0.0, 0.0, 0.1);

        for mode in [AlignmentMode::Hips, AlignmentMode::Feet, AlignmentMode::Shoulders] {
            let source = shared(posed_source(&mut rng));
            let target = shared(short_target());

            let mut sync = PoseSynchronizer::new(Some(source.clone()), Some(target.clone()))
                .with_alignment(mode)
                .with_locked_bones(locked)
                .with_offset_provider(move |offsets: &mut BoneOffsets| {
                    offsets.insert(HumanBone::LeftHand, push);
                });
            sync.update();

            let offset = sync.last_alignment_offset();
            let source = source.borrow();
            let target = target.borrow();
            for bone in locked.iter().filter(|b| *b != HumanBone::Hips) {
                let extra = if bone == HumanBone::LeftHand { push } else { Vec3::ZERO };
                let expected = source.bone_position(bone).unwrap() + offset + extra;
                let actual = target.bone_position(bone).unwrap();
                assert!(
                    actual.distance(expected) < TOL,
                    "{:?} with {:?}: {:?} vs {:?}",
                    bone,
                    mode,
                    actual,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_root_is_synchronized() {
        let mut rng = StdRng::seed_from_u64(7);
        let source = shared(posed_source(&mut rng));
        let target = shared(short_target());

        let mut sync = PoseSynchronizer::new(Some(source.clone()), Some(target.clone()));
        sync.update();

        let source = source.borrow();
        let target = target.borrow();
        let s = source.world_transform(source.root());
        let t = target.world_transform(target.root());
        assert!(s.translation.distance(t.translation) < 1e-5);
        assert!(s.rotation.angle_between(t.rotation) < 1e-4);
    }

    #[test]
    fn test_source_is_never_mutated() {
        let mut rng = StdRng::seed_from_u64(3);
        let source = shared(posed_source(&mut rng));
        let before: Vec<Transform> = {
            let s = source.borrow();
            (0..s.node_count())
                .map(|i| s.local_transform(crate::skeleton::NodeId::new(i)))
                .collect()
        };

        let mut sync = PoseSynchronizer::new(Some(source.clone()), Some(shared(short_target())))
            .with_alignment(AlignmentMode::Feet)
            .with_locked_bones(BoneSet::from_bones(&[HumanBone::Hips, HumanBone::Head]));
        sync.update();
        sync.update();

        let s = source.borrow();
        for (i, expected) in before.iter().enumerate() {
            assert_eq!(s.local_transform(crate::skeleton::NodeId::new(i)), *expected);
        }
    }

    #[test]
    fn test_noop_without_skeletons() {
        let target = shared(short_target());
        let before = target.borrow().bone_position(HumanBone::LeftHand).unwrap();

        let mut sync = PoseSynchronizer::new(None, Some(target.clone()))
            .with_locked_bones(BoneSet::from_bones(&[HumanBone::LeftHand]));
        sync.update();
        sync.update();

        assert_eq!(sync.state(), SyncState::Uninitialized);
        assert!(!sync.has_handles());
        assert_eq!(
            target.borrow().bone_position(HumanBone::LeftHand).unwrap(),
            before
        );

        let mut sync = PoseSynchronizer::new(Some(shared(Skeleton::reference_humanoid())), None);
        sync.update();
        assert_eq!(sync.state(), SyncState::Uninitialized);
    }

    #[test]
    fn test_retries_until_both_present() {
        let target = shared(short_target());
        let mut sync = PoseSynchronizer::new(None, Some(target));
        sync.update();
        assert_eq!(sync.state(), SyncState::Uninitialized);

        sync.set_source(Some(shared(Skeleton::reference_humanoid())));
        assert_eq!(sync.state(), SyncState::Dirty);
        sync.update();
        assert_eq!(sync.state(), SyncState::Ready);
        assert!(sync.has_handles());
    }

    #[test]
    fn test_reassigning_target_rebuilds_mapping() {
        let source = shared(Skeleton::reference_humanoid());
        let mut sync = PoseSynchronizer::new(Some(source), Some(shared(short_target())));
        sync.update();
        let full = sync.mapping().unwrap().len();

        let unmapped = BoneSet::from_bones(&[HumanBone::LeftToes, HumanBone::RightToes]);
        let sparse = Skeleton::humanoid_without(&HumanoidProportions::default(), unmapped);
        sync.set_target(Some(shared(sparse)));
        assert_eq!(sync.state(), SyncState::Dirty);
        assert!(sync.mapping().is_none());

        sync.update();
        assert_eq!(sync.state(), SyncState::Ready);
        let mapping = sync.mapping().unwrap();
        assert_eq!(mapping.len(), full - 2);
        assert!(!mapping.contains(HumanBone::LeftToes));
    }

    #[test]
    fn test_reassigning_source_keeps_supplied_mapping() {
        let target_skeleton = short_target();
        let only_hands = BoneMapping::from_iter(
            BoneMapping::from_skeleton(&target_skeleton)
                .iter()
                .copied()
                .filter(|m| matches!(m.bone, HumanBone::LeftHand | HumanBone::RightHand)),
        );
        let mut sync = PoseSynchronizer::with_mapping(
            Some(shared(Skeleton::reference_humanoid())),
            Some(shared(target_skeleton)),
            only_hands.clone(),
            BoneSet::from_bones(&[HumanBone::LeftHand]),
        );
        sync.update();
        assert_eq!(sync.mapping(), Some(&only_hands));

        sync.set_source(Some(shared(Skeleton::reference_humanoid())));
        sync.update();
        assert_eq!(sync.mapping(), Some(&only_hands));
    }

    #[test]
    fn test_locked_chain_ignores_mapping_order() {
        use rand::seq::SliceRandom;

        let mut rng = StdRng::seed_from_u64(11);
        let locked = BoneSet::from_bones(&[
            HumanBone::Hips,
            HumanBone::LeftUpperArm,
            HumanBone::LeftLowerArm,
            HumanBone::LeftHand,
            HumanBone::RightLowerArm,
            HumanBone::RightHand,
        ]);

        for shuffle in [false, true] {
            let mut source_skeleton = Skeleton::reference_humanoid();
            let elbow = source_skeleton.bone_node(HumanBone::LeftLowerArm).unwrap();
            source_skeleton.set_local_rotation(elbow, Quat::from_rotation_z(0.7));
            let source = shared(source_skeleton);

            let target_skeleton = short_target();
            let mut entries: Vec<BoneMap> = BoneMapping::from_skeleton(&target_skeleton)
                .iter()
                .copied()
                .collect();
            if shuffle {
                entries.shuffle(&mut rng);
            } else {
                entries.reverse();
            }
            let target = shared(target_skeleton);

            let mut sync = PoseSynchronizer::with_mapping(
                Some(source.clone()),
                Some(target.clone()),
                entries.into_iter().collect(),
                locked,
            );
            sync.update();

            let source = source.borrow();
            let target = target.borrow();
            for bone in locked.iter().filter(|b| *b != HumanBone::Hips) {
                let expected = source.bone_position(bone).unwrap();
                let actual = target.bone_position(bone).unwrap();
                assert!(
                    actual.distance(expected) < TOL,
                    "{:?} displaced by {} (shuffled: {})",
                    bone,
                    actual.distance(expected),
                    shuffle
                );
            }
        }
    }

    #[test]
    fn test_bind_failure_stays_dirty_and_retries() {
        let unmapped = BoneSet::from_bones(&[HumanBone::Hips]);
        let broken = Skeleton::humanoid_without(&HumanoidProportions::default(), unmapped);
        let target = shared(short_target());
        let before = target.borrow().bone_position(HumanBone::Head).unwrap();

        let mut sync = PoseSynchronizer::new(Some(shared(Skeleton::reference_humanoid())), None);
        sync.set_target(Some(target.clone()));
        sync.set_source(Some(shared(broken)));
        sync.update();
        sync.update();

        assert_eq!(sync.state(), SyncState::Dirty);
        assert!(!sync.has_handles());
        assert_eq!(target.borrow().bone_position(HumanBone::Head).unwrap(), before);

        sync.set_source(Some(shared(Skeleton::reference_humanoid())));
        sync.update();
        assert_eq!(sync.state(), SyncState::Ready);
    }

    #[test]
    fn test_missing_locked_bones_are_skipped() {
        let unmapped = BoneSet::from_bones(&[HumanBone::RightHand]);
        let source = shared(Skeleton::humanoid_without(
            &HumanoidProportions::default(),
            unmapped,
        ));
        let target = shared(short_target());
        let locked = BoneSet::from_bones(&[HumanBone::LeftHand, HumanBone::RightHand]);

        let mut sync = PoseSynchronizer::new(Some(source.clone()), Some(target.clone()))
            .with_locked_bones(locked);
        sync.update();

        let left = target.borrow().bone_position(HumanBone::LeftHand).unwrap();
        let expected = source.borrow().bone_position(HumanBone::LeftHand).unwrap();
        assert!(left.distance(expected) < TOL);

        // Right hand only follows the pose transfer
        let right = target.borrow().bone_position(HumanBone::RightHand).unwrap();
        let short_reach = short_target()
            .bone_position(HumanBone::RightHand)
            .unwrap()
            .x;
        assert!((right.x - short_reach).abs() < TOL);
    }

    #[test]
    fn test_offsets_are_cleared_each_frame() {
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        let mut sync = PoseSynchronizer::new(
            Some(shared(Skeleton::reference_humanoid())),
            Some(shared(short_target())),
        )
        .with_offset_provider(move |offsets: &mut BoneOffsets| {
            assert!(offsets.is_empty());
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                offsets.insert(HumanBone::Head, Vec3::X);
            }
        });

        sync.update();
        assert_eq!(sync.offsets().get(HumanBone::Head), Some(Vec3::X));
        sync.update();
        assert!(sync.offsets().is_empty());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_deactivate_releases_handles() {
        let target = shared(short_target());
        let mut sync = PoseSynchronizer::new(
            Some(shared(Skeleton::reference_humanoid())),
            Some(target.clone()),
        );
        sync.update();
        assert!(sync.has_handles());

        sync.deactivate();
        assert!(!sync.has_handles());
        assert_eq!(sync.state(), SyncState::Uninitialized);

        // Inactive updates do nothing
        let head = target.borrow().bone_node(HumanBone::Head).unwrap();
        target
            .borrow_mut()
            .set_local_rotation(head, Quat::from_rotation_x(0.3));
        sync.update();
        assert!(!sync.has_handles());
        let rotation = target.borrow().local_transform(head).rotation;
        assert!(rotation.angle_between(Quat::from_rotation_x(0.3)) < 1e-5);

        sync.activate();
        assert_eq!(sync.state(), SyncState::Dirty);
        sync.update();
        assert_eq!(sync.state(), SyncState::Ready);
    }

    #[test]
    fn test_same_skeleton_is_skipped() {
        let skeleton = shared(Skeleton::reference_humanoid());
        let mut sync = PoseSynchronizer::new(Some(skeleton.clone()), Some(skeleton.clone()))
            .with_locked_bones(BoneSet::from_bones(&[HumanBone::Hips]));
        sync.update();

        let hips = skeleton.borrow().bone_position(HumanBone::Hips).unwrap();
        assert!(hips.distance(crate::skeleton_constants::DEFAULT_HIPS) < 1e-5);
    }

    #[test]
    fn test_from_skeleton_matches_lazy_mapping() {
        let target_skeleton = short_target();
        let eager = PoseSynchronizer::from_skeleton(
            None,
            None,
            &target_skeleton,
            BoneSet::empty(),
        );
        let mut lazy = PoseSynchronizer::new(
            Some(shared(Skeleton::reference_humanoid())),
            Some(shared(target_skeleton)),
        );
        lazy.update();
        assert_eq!(eager.mapping(), lazy.mapping());
    }
}
