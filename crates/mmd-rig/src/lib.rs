//! Bone-chain transform engine and motion solvers for MMD content.
//!
//! Builds on [`mmd_pmx`] skeletons and [`mmd_vmd`] keyframes: a memoizing
//! per-(frame, bone) transform cache, a look-at solver that rewrites a
//! chain of bones to track a camera, another model or a fixed point, and a
//! ballistic extension that aims turret chains along launch velocities.

pub mod camera;
pub mod error;
pub mod lookat;
pub mod math;
pub mod projectile;
pub mod transform;

pub use camera::{CameraMotion, CameraSample};
pub use error::{Result, RigError};
pub use lookat::{
    Constraint, EventKinds, FrameRanges, LookAtConfig, LookAtResult, LookAtSolver, LookTarget,
    PointMode, Projection, ProjectileConfig, Tracking, copy_position_axes,
};
pub use projectile::{
    BulletMotion, GRAVITY, Launch, apex, make_bullet_motion, project_asap, project_ontime,
};
pub use transform::{BoneTransforms, CENTER_BONE, Placement, Resolved, compose_global};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
