//! Handle-based wasm-bindgen API for previewing retargeting in the browser.
//!
//! Each preview session owns a source and a target humanoid built from
//! proportions, plus the synchronizer between them. JS drives the source and
//! reads the target back as a flat joint buffer.

use crate::bone::{BoneMapping, HumanBone};
use crate::config::SyncSettings;
use crate::skeleton::{HumanoidProportions, Skeleton, Transform};
use crate::sync::{PoseSynchronizer, SkeletonRef};
use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

pub type PreviewHandle = u32;

/// One target joint as laid out in the buffer returned to JS
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct JointSample {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

struct PreviewSession {
    source: SkeletonRef,
    target: SkeletonRef,
    mapping: BoneMapping,
    sync: PoseSynchronizer,
    settings: SyncSettings,
}

#[derive(Default)]
struct SessionTable {
    next: PreviewHandle,
    sessions: HashMap<PreviewHandle, PreviewSession>,
}

thread_local! {
    static SESSIONS: RefCell<SessionTable> = RefCell::new(SessionTable::default());
}

fn with_session<F, R>(handle: PreviewHandle, f: F) -> Option<R>
where
    F: FnOnce(&PreviewSession) -> R,
{
    SESSIONS.with(|table| table.borrow().sessions.get(&handle).map(f))
}

fn with_session_mut<F, R>(handle: PreviewHandle, f: F) -> Option<R>
where
    F: FnOnce(&mut PreviewSession) -> R,
{
    SESSIONS.with(|table| table.borrow_mut().sessions.get_mut(&handle).map(f))
}

/// Install the panic hook and console logger
#[wasm_bindgen]
pub fn init_logging() {
    crate::init_logging();
}

/// Create a session retargeting the reference humanoid onto one with the
/// given segment proportions. `settings_json` is a [`SyncSettings`] object;
/// an empty string selects the arm-lock preset.
#[wasm_bindgen]
pub fn create_preview_session(
    legs: f32,
    torso: f32,
    arms: f32,
    settings_json: &str,
) -> Result<PreviewHandle, JsValue> {
    let settings = if settings_json.trim().is_empty() {
        SyncSettings::arm_lock()
    } else {
        serde_json::from_str(settings_json)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse settings: {}", e)))?
    };

    let proportions = HumanoidProportions { legs, torso, arms };
    let target_skeleton = Skeleton::humanoid(&proportions);
    let mapping = BoneMapping::from_skeleton(&target_skeleton);

    let source = Rc::new(RefCell::new(Skeleton::reference_humanoid()));
    let target = Rc::new(RefCell::new(target_skeleton));
    let sync = PoseSynchronizer::with_mapping(
        Some(source.clone()),
        Some(target.clone()),
        mapping.clone(),
        settings.locked_bones,
    )
    .with_alignment(settings.alignment);

    let handle = SESSIONS.with(|table| {
        let mut table = table.borrow_mut();
        let handle = table.next;
        table.next = table.next.wrapping_add(1);
        table.sessions.insert(
            handle,
            PreviewSession {
                source,
                target,
                mapping,
                sync,
                settings,
            },
        );
        handle
    });

    log::info!("Created preview session {}", handle);
    Ok(handle)
}

#[wasm_bindgen]
pub fn destroy_preview_session(handle: PreviewHandle) -> bool {
    let removed = SESSIONS.with(|table| table.borrow_mut().sessions.remove(&handle).is_some());
    if removed {
        log::info!("Destroyed preview session {}", handle);
    }
    removed
}

/// Move and turn the source skeleton's root
#[wasm_bindgen]
pub fn set_source_root(handle: PreviewHandle, x: f32, y: f32, z: f32, yaw: f32) -> bool {
    with_session(handle, |session| {
        let mut source = session.source.borrow_mut();
        let root = source.root();
        source.set_local_transform(
            root,
            Transform::from_translation_rotation(Vec3::new(x, y, z), Quat::from_rotation_y(yaw)),
        );
    })
    .is_some()
}

/// Set a source bone's local rotation, offset from its rest rotation
#[wasm_bindgen]
pub fn set_source_bone_rotation(
    handle: PreviewHandle,
    bone_index: usize,
    x: f32,
    y: f32,
    z: f32,
    w: f32,
) -> bool {
    let Some(bone) = HumanBone::from_index(bone_index) else {
        log::warn!("No humanoid bone with index {}", bone_index);
        return false;
    };

    with_session(handle, |session| {
        let mut source = session.source.borrow_mut();
        let Some(node) = source.bone_node(bone) else {
            return false;
        };
        let rest = source.rest_transform(node).rotation;
        let rotation = (Quat::from_xyzw(x, y, z, w).normalize() * rest).normalize();
        source.set_local_rotation(node, rotation);
        true
    })
    .unwrap_or(false)
}

/// Run one synchronization step
#[wasm_bindgen]
pub fn update_preview_session(handle: PreviewHandle) -> bool {
    with_session_mut(handle, |session| session.sync.update()).is_some()
}

/// Target joints in mapping order, 7 floats each (position xyz, rotation xyzw)
#[wasm_bindgen]
pub fn target_joint_buffer(handle: PreviewHandle) -> Vec<f32> {
    with_session(handle, |session| {
        let target = session.target.borrow();
        let samples: Vec<JointSample> = session
            .mapping
            .iter()
            .map(|m| {
                let world = target.world_transform(m.node);
                JointSample {
                    position: world.translation.to_array(),
                    rotation: world.rotation.to_array(),
                }
            })
            .collect();
        bytemuck::cast_slice::<JointSample, f32>(&samples).to_vec()
    })
    .unwrap_or_default()
}

/// Bone indices matching the entries of [`target_joint_buffer`]
#[wasm_bindgen]
pub fn target_joint_bones(handle: PreviewHandle) -> Vec<u32> {
    with_session(handle, |session| {
        session
            .mapping
            .iter()
            .map(|m| m.bone.index() as u32)
            .collect()
    })
    .unwrap_or_default()
}

/// Settings of the session as a JS object
#[wasm_bindgen]
pub fn preview_settings(handle: PreviewHandle) -> Result<JsValue, JsValue> {
    let settings = with_session(handle, |session| session.settings)
        .ok_or_else(|| JsValue::from_str(&format!("No preview session {}", handle)))?;
    serde_wasm_bindgen::to_value(&settings).map_err(JsValue::from)
}
