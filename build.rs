//! Build script for reference skeleton validation
//!
//! This script runs at compile time and checks that the reference humanoid
//! used to build template skeletons is mirror-symmetric and upright.

// Include the shared skeleton constants
#[path = "src/skeleton_constants.rs"]
mod skeleton_constants;

use skeleton_constants::{MIRRORED_PAIRS, SPINE_CHAIN};

/// Allowed deviation from perfect symmetry (meters)
const TOLERANCE: f32 = 1e-4;

fn validate_symmetry() -> Vec<String> {
    let mut errors = Vec::new();

    for (name, left, right) in MIRRORED_PAIRS {
        let mirrored = glam::Vec3::new(-right.x, right.y, right.z);
        let diff = left.distance(mirrored);
        if diff > TOLERANCE {
            errors.push(format!(
                "  {} is not mirrored: left {:?}, right {:?} (diff: {:.4}m)",
                name, left, right, diff
            ));
        }
        if left.x >= 0.0 {
            errors.push(format!("  left {} must lie on -X, got {:?}", name, left));
        }
    }

    errors
}

fn validate_spine() -> Vec<String> {
    SPINE_CHAIN
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1].y <= pair[0].y)
        .map(|(i, pair)| {
            format!(
                "  spine joint {} ({:.3}m) is not above joint {} ({:.3}m)",
                i + 1,
                pair[1].y,
                i,
                pair[0].y
            )
        })
        .collect()
}

fn main() {
    // Rerun if shared constants change
    println!("cargo:rerun-if-changed=src/skeleton_constants.rs");

    let mut errors = validate_symmetry();
    errors.extend(validate_spine());

    if !errors.is_empty() {
        for e in &errors {
            println!("cargo:warning=VALIDATION ERROR: {}", e);
        }
        panic!("Reference skeleton validation failed! Fix src/skeleton_constants.rs.");
    }
}
