//! Look-at solving: rewrite a chain of bones to track a target.

pub mod config;
pub mod queue;
pub mod solver;

pub use config::{
    Constraint, FrameRanges, LookAtConfig, PointMode, Projection, ProjectileConfig, Tracking,
    default_constraints, fallback_constraint,
};
pub use queue::{EventKinds, EventQueue, MotionEvent};
pub use solver::{LookAtResult, LookAtSolver, LookTarget};

use mmd_pmx::Bone;

use crate::error::{Result, RigError};

/// Copies selected rest-position axes (0 = x, 1 = y, 2 = z) from one bone
/// to another.
///
/// Standard models park 両目 up on the forehead as a handle; borrowing the
/// height (and depth, for targets) from 右目 puts the aim pivot where the
/// eyes actually sit.
pub fn copy_position_axes(bones: &mut [Bone], dst: &str, src: &str, axes: &[usize]) -> Result<()> {
    let find = |name: &str| {
        bones
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| RigError::BoneNotFound {
                name: name.to_string(),
            })
    };
    let src_index = find(src)?;
    let dst_index = find(dst)?;
    let value = bones[src_index].position;
    for &axis in axes {
        bones[dst_index].position[axis] = value[axis];
    }
    Ok(())
}
