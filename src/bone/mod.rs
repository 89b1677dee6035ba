pub mod cache;
pub mod id;
pub mod map;
pub mod pose;

pub use cache::*;
pub use id::*;
pub use map::*;
pub use pose::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetargetError;
    use crate::skeleton::{HumanoidProportions, Skeleton, Transform};

    use glam::{Quat, Vec3};

    fn lanky() -> Skeleton {
        Skeleton::humanoid(&HumanoidProportions {
            legs: 1.2,
            torso: 0.9,
            arms: 1.3,
        })
    }

    #[test]
    fn test_mapping_completeness() {
        let unmapped = BoneSet::from_bones(&[HumanBone::UpperChest, HumanBone::LeftToes]);
        let skeleton = Skeleton::humanoid_without(&HumanoidProportions::default(), unmapped);
        let mapping = BoneMapping::from_skeleton(&skeleton);

        for bone in HumanBone::ALL {
            let count = mapping.iter().filter(|m| m.bone == bone).count();
            let expected = usize::from(skeleton.bone_node(bone).is_some());
            assert_eq!(count, expected, "{:?} appears {} times", bone, count);
        }
        for entry in &mapping {
            assert!(skeleton.contains(entry.node));
            assert_eq!(skeleton.bone_node(entry.bone), Some(entry.node));
        }
        assert!(!mapping.contains(HumanBone::UpperChest));
        assert!(!mapping.contains(HumanBone::LeftThumbProximal));
    }

    #[test]
    fn test_mapping_is_restartable_and_ordered() {
        let skeleton = Skeleton::reference_humanoid();

        let first: Vec<BoneMap> = bone_mapping(&skeleton).collect();
        let second: Vec<BoneMap> = bone_mapping(&skeleton).collect();
        assert_eq!(first, second);

        let indices: Vec<usize> = first.iter().map(|m| m.bone.index()).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_topological_order() {
        for bone in HumanBone::ALL {
            if let Some(parent) = bone.parent() {
                assert!(
                    parent.index() < bone.index(),
                    "{:?} listed before its parent {:?}",
                    bone,
                    parent
                );
            }
        }
        for (i, bone) in HumanBone::ALL.iter().enumerate() {
            assert_eq!(bone.index(), i);
        }
    }

    #[test]
    fn test_bone_set_membership() {
        let set = BoneSet::from_bones(&[HumanBone::Hips, HumanBone::RightLittleDistal]);
        assert!(set.contains(HumanBone::Hips));
        assert!(set.contains(HumanBone::RightLittleDistal));
        assert!(!set.contains(HumanBone::Head));
        assert_eq!(set.len(), 2);

        let set = set.without(HumanBone::Hips).with(HumanBone::Head);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![HumanBone::Head, HumanBone::RightLittleDistal]
        );
    }

    #[test]
    fn test_bone_set_serializes_as_names() {
        let set = BoneSet::from_bones(&[HumanBone::LeftHand, HumanBone::Hips]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["hips","left_hand"]"#);

        let parsed: BoneSet = serde_json::from_str(r#"["left_upper_arm","right_hand"]"#).unwrap();
        assert!(parsed.contains(HumanBone::LeftUpperArm));
        assert!(parsed.contains(HumanBone::RightHand));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_bind_requires_hips() {
        let unmapped = BoneSet::from_bones(&[HumanBone::Hips]);
        let skeleton = Skeleton::humanoid_without(&HumanoidProportions::default(), unmapped);
        assert_eq!(
            PoseHandle::bind(&skeleton).unwrap_err(),
            RetargetError::MissingBone(HumanBone::Hips)
        );
    }

    #[test]
    fn test_bind_rejects_hips_on_floor() {
        let mut builder = Skeleton::builder("Root");
        let root = builder.root();
        builder
            .add_bone(HumanBone::Hips, root, Transform::IDENTITY)
            .unwrap();
        let skeleton = builder.build();

        assert_eq!(
            PoseHandle::bind(&skeleton).unwrap_err(),
            RetargetError::DegenerateRest(HumanBone::Hips)
        );
    }

    #[test]
    fn test_rest_pose_round_trip() {
        let skeleton = Skeleton::reference_humanoid();
        let handle = PoseHandle::bind(&skeleton).unwrap();
        let pose = handle.capture(&skeleton);

        for bone in bone_mapping(&skeleton).map(|m| m.bone) {
            let delta = pose.rotation(bone).unwrap();
            assert!(delta.angle_between(Quat::IDENTITY) < 1e-4);
        }
        assert!((pose.body_position - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_transfer_between_identical_skeletons() {
        let mut source = Skeleton::reference_humanoid();
        let mut target = Skeleton::reference_humanoid();

        let spine = source.bone_node(HumanBone::Spine).unwrap();
        let arm = source.bone_node(HumanBone::LeftUpperArm).unwrap();
        source.set_local_rotation(spine, Quat::from_rotation_x(0.4));
        source.set_local_rotation(arm, Quat::from_rotation_z(-1.1));

        let source_handle = PoseHandle::bind(&source).unwrap();
        let target_handle = PoseHandle::bind(&target).unwrap();
        target_handle.apply(&mut target, &source_handle.capture(&source));

        for m in bone_mapping(&source) {
            let expected = source.world_position(m.node);
            let actual = target.bone_position(m.bone).unwrap();
            assert!(
                actual.distance(expected) < 1e-4,
                "{:?}: {:?} vs {:?}",
                m.bone,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_transfer_preserves_limb_directions() {
        let mut source = Skeleton::reference_humanoid();
        let mut target = lanky();

        let forearm = source.bone_node(HumanBone::RightLowerArm).unwrap();
        let thigh = source.bone_node(HumanBone::LeftUpperLeg).unwrap();
        source.set_local_rotation(forearm, Quat::from_rotation_y(0.9));
        source.set_local_rotation(thigh, Quat::from_rotation_x(-0.6));

        let pose = PoseHandle::bind(&source).unwrap().capture(&source);
        PoseHandle::bind(&target).unwrap().apply(&mut target, &pose);

        let direction = |skeleton: &Skeleton, from: HumanBone, to: HumanBone| {
            (skeleton.bone_position(to).unwrap() - skeleton.bone_position(from).unwrap())
                .normalize()
        };

        for (from, to) in [
            (HumanBone::RightLowerArm, HumanBone::RightHand),
            (HumanBone::LeftUpperLeg, HumanBone::LeftLowerLeg),
            (HumanBone::Spine, HumanBone::Chest),
        ] {
            let expected = direction(&source, from, to);
            let actual = direction(&target, from, to);
            assert!(
                actual.dot(expected) > 1.0 - 1e-4,
                "{:?}->{:?} points {:?}, expected {:?}",
                from,
                to,
                actual,
                expected
            );
        }

        // Limb lengths stay the target's own
        let reach = target
            .bone_position(HumanBone::RightHand)
            .unwrap()
            .distance(target.bone_position(HumanBone::RightLowerArm).unwrap());
        let rest_reach = lanky()
            .bone_position(HumanBone::RightHand)
            .unwrap()
            .distance(lanky().bone_position(HumanBone::RightLowerArm).unwrap());
        assert!((reach - rest_reach).abs() < 1e-4);
    }

    #[test]
    fn test_body_position_scales_with_hips_height() {
        let mut source = Skeleton::reference_humanoid();
        let mut target = Skeleton::humanoid(&HumanoidProportions::uniform(0.5));

        let hips = source.bone_node(HumanBone::Hips).unwrap();
        let crouched = source.world_position(hips) * 0.8;
        source.set_world_position(hips, crouched);

        let pose = PoseHandle::bind(&source).unwrap().capture(&source);
        let target_handle = PoseHandle::bind(&target).unwrap();
        target_handle.apply(&mut target, &pose);

        let target_hips = target.bone_position(HumanBone::Hips).unwrap();
        assert!((target_hips.y - target_handle.hips_rest_height() * 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_missing_source_bone_resets_target_to_rest() {
        let unmapped = BoneSet::from_bones(&[HumanBone::Head]);
        let source = Skeleton::humanoid_without(&HumanoidProportions::default(), unmapped);
        let mut target = Skeleton::reference_humanoid();

        let head = target.bone_node(HumanBone::Head).unwrap();
        target.set_local_rotation(head, Quat::from_rotation_y(1.0));

        let pose = PoseHandle::bind(&source).unwrap().capture(&source);
        assert!(pose.rotation(HumanBone::Head).is_none());

        PoseHandle::bind(&target).unwrap().apply(&mut target, &pose);
        assert!(target.local_transform(head).rotation.angle_between(Quat::IDENTITY) < 1e-5);
    }
}
