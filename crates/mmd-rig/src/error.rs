//! Error types for the rig engine.

use thiserror::Error;

/// Errors raised while building or driving a bone rig.
#[derive(Debug, Error)]
pub enum RigError {
    /// A bone name was not found in the model's bone table.
    #[error("bone not found in model: {name:?}")]
    BoneNotFound {
        /// The missing bone name.
        name: String,
    },

    /// An overwritten bone has no parent in the transform graph; the solver
    /// needs a parent frame of reference to aim from.
    #[error("overwrite bone {name:?} has no parent in the transform graph")]
    RootOverwriteBone {
        /// The offending bone name.
        name: String,
    },

    /// A bone inherits its additional transform from the source's local
    /// axes, which the transform cache does not model.
    #[error("bone {name:?} uses local-axis inheritance, which is not supported")]
    LocalInheritance {
        /// The offending bone name.
        name: String,
    },

    /// An additional-transform source index points outside the bone table.
    #[error("bone {name:?} inherits from out-of-range bone index {index}")]
    BadInheritanceSource {
        /// The inheriting bone name.
        name: String,
        /// The out-of-range source index.
        index: i32,
    },

    /// The bone parent links contain a cycle.
    #[error("bone parent links form a cycle")]
    CyclicBoneGraph,
}

/// Result type for rig operations.
pub type Result<T> = std::result::Result<T, RigError>;
