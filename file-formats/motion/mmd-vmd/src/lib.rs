//! Parser and writer for MikuMikuDance VMD motion files.
//!
//! A VMD file is a binary keyframe container with six sections (bones,
//! morphs, cameras, lights, self-shadows, show-IK) and per-channel
//! cubic-bezier easing. This crate reads and writes the full layout and
//! evaluates easing curves with the same Newton inversion the host
//! application uses.

pub mod bezier;
pub mod error;
pub mod interp;
pub mod motion;
pub mod reader;
pub mod sjis;
pub mod types;
pub mod writer;

pub use error::{Result, VmdError};
pub use interp::{BoneCurves, CameraCurves, ControlPoints};
pub use motion::{Interval, Motion, get_interval, remove_redundant};
pub use types::{
    BoneFrame, CAMERA_MODEL_NAME, CameraFrame, IkState, LightFrame, MorphFrame, SIGNATURE,
    SelfShadowFrame, ShowIkFrame,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
