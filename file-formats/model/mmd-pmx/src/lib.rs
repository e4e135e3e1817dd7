//! Parser for MikuMikuDance PMX model files.
//!
//! Reads PMX 2.0 and 2.1 models and exposes the bone-graph utilities motion
//! tools build on: parent graphs, target sub-graphs, pruning and topological
//! sorting. Writing models is out of scope.

pub mod bone;
pub mod error;
pub mod graph;
pub mod reader;
pub mod types;

pub use bone::{AdditionalTransform, Bone, BoneFlags, Ik, IkLink, TailPosition};
pub use error::{PmxError, Result};
pub use graph::{BoneGraph, make_all_bone_graph, make_sub_bone_graph, transform_order};
pub use reader::{MAGIC, Model};
pub use types::{
    BoneWeights, DisplayItem, DisplayNode, Globals, IndexSize, Joint, Material, ModelInfo, Morph,
    MorphOffsets, RigidBody, SoftBody, TextEncoding, ToonTexture, Vertex,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
