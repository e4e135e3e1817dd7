//! PMX record types other than bones.

use glam::{Quat, Vec3, Vec4};

use crate::error::{PmxError, Result};

/// Text encoding declared in the header globals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-16 little endian, no BOM.
    Utf16Le,
    Utf8,
}

impl TextEncoding {
    pub fn from_byte(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Utf16Le),
            1 => Ok(Self::Utf8),
            _ => Err(PmxError::InvalidEnum {
                field: "text encoding",
                value,
            }),
        }
    }
}

/// Width of one index table, from the header globals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexSize {
    U8 = 1,
    U16 = 2,
    U32 = 4,
}

impl IndexSize {
    pub fn from_byte(field: &'static str, size: u8) -> Result<Self> {
        match size {
            1 => Ok(Self::U8),
            2 => Ok(Self::U16),
            4 => Ok(Self::U32),
            _ => Err(PmxError::InvalidIndexSize { field, size }),
        }
    }
}

/// The eight header globals.
#[derive(Clone, Copy, Debug)]
pub struct Globals {
    pub encoding: TextEncoding,
    /// Number of extra UV vectors per vertex, 0 to 4.
    pub extra_uv_count: u8,
    pub vertex_index: IndexSize,
    pub texture_index: IndexSize,
    pub material_index: IndexSize,
    pub bone_index: IndexSize,
    pub morph_index: IndexSize,
    pub rigid_body_index: IndexSize,
}

/// The four model-info strings.
#[derive(Clone, Debug, Default)]
pub struct ModelInfo {
    pub name: String,
    pub name_en: String,
    pub comment: String,
    pub comment_en: String,
}

/// Skinning weights of one vertex.
#[derive(Clone, Debug, PartialEq)]
pub enum BoneWeights {
    Bdef1 {
        bone: i32,
    },
    Bdef2 {
        bones: [i32; 2],
        /// Weight of the first bone; the second gets the complement.
        weight: f32,
    },
    Bdef4 {
        bones: [i32; 4],
        weights: [f32; 4],
    },
    Sdef {
        bones: [i32; 2],
        weight: f32,
        c: Vec3,
        r0: Vec3,
        r1: Vec3,
    },
    /// PMX 2.1 dual-quaternion weights, same layout as BDEF4.
    Qdef {
        bones: [i32; 4],
        weights: [f32; 4],
    },
}

/// One vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: [f32; 2],
    pub extra_uvs: Vec<Vec4>,
    pub weights: BoneWeights,
    pub edge_scale: f32,
}

/// How the toon texture of a material is referenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToonTexture {
    /// Index into the model's texture table.
    Texture(i32),
    /// One of the ten shared toon textures.
    Shared(u8),
}

/// One material.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub name_en: String,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_power: f32,
    pub ambient: Vec3,
    pub draw_flags: u8,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture: i32,
    pub sphere_texture: i32,
    pub sphere_mode: u8,
    pub toon: ToonTexture,
    pub memo: String,
    /// Number of face-vertex indices this material covers.
    pub face_vertex_count: i32,
}

/// One offset record of a group or flip morph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphRef {
    pub morph: i32,
    pub weight: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexOffset {
    pub vertex: i32,
    pub offset: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneOffset {
    pub bone: i32,
    pub translation: Vec3,
    pub rotation: Quat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvOffset {
    pub vertex: i32,
    pub offset: Vec4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialOffset {
    /// Material index, or -1 for all materials.
    pub material: i32,
    /// 0 multiplies, 1 adds.
    pub operation: u8,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_power: f32,
    pub ambient: Vec3,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture_tint: Vec4,
    pub sphere_tint: Vec4,
    pub toon_tint: Vec4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImpulseOffset {
    pub rigid_body: i32,
    pub local: bool,
    pub velocity: Vec3,
    pub torque: Vec3,
}

/// Offset payload of a morph, by morph kind.
#[derive(Clone, Debug, PartialEq)]
pub enum MorphOffsets {
    Group(Vec<MorphRef>),
    Vertex(Vec<VertexOffset>),
    Bone(Vec<BoneOffset>),
    /// UV morph; channel 0 is the base UV, 1 to 4 the extra UV vectors.
    Uv { channel: u8, offsets: Vec<UvOffset> },
    Material(Vec<MaterialOffset>),
    Flip(Vec<MorphRef>),
    Impulse(Vec<ImpulseOffset>),
}

/// One morph.
#[derive(Clone, Debug)]
pub struct Morph {
    pub name: String,
    pub name_en: String,
    /// UI panel the morph appears in.
    pub panel: u8,
    pub offsets: MorphOffsets,
}

/// One entry of a display node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayItem {
    Bone(i32),
    Morph(i32),
}

/// One display-frame node.
#[derive(Clone, Debug)]
pub struct DisplayNode {
    pub name: String,
    pub name_en: String,
    pub special: bool,
    pub items: Vec<DisplayItem>,
}

/// One rigid body.
#[derive(Clone, Debug)]
pub struct RigidBody {
    pub name: String,
    pub name_en: String,
    pub bone: i32,
    pub group: u8,
    pub collision_mask: u16,
    /// 0 sphere, 1 box, 2 capsule.
    pub shape: u8,
    pub size: Vec3,
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    /// 0 follows the bone, 1 physics, 2 physics with bone alignment.
    pub mode: u8,
}

/// One joint. Every joint kind carries the same 6DOF payload.
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub name_en: String,
    /// 0 spring 6DOF, 1 6DOF, 2 point-to-point, 3 cone twist, 5 slider,
    /// 6 hinge.
    pub kind: u8,
    pub body_a: i32,
    pub body_b: i32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub linear_lower: Vec3,
    pub linear_upper: Vec3,
    pub angular_lower: Vec3,
    pub angular_upper: Vec3,
    pub spring_linear: Vec3,
    pub spring_angular: Vec3,
}

/// One soft-body anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoftBodyAnchor {
    pub rigid_body: i32,
    pub vertex: i32,
    pub near: bool,
}

/// One soft body (PMX 2.1 only).
#[derive(Clone, Debug)]
pub struct SoftBody {
    pub name: String,
    pub name_en: String,
    /// 0 tri-mesh, 1 rope.
    pub shape: u8,
    pub material: i32,
    pub group: u8,
    pub collision_mask: u16,
    pub flags: u8,
    pub b_link_distance: i32,
    pub cluster_count: i32,
    pub total_mass: f32,
    pub collision_margin: f32,
    pub aero_model: i32,
    /// VCF, DP, DG, LF, PR, VC, DF, MT, CHR, KHR, SHR, AHR.
    pub config: [f32; 12],
    /// SRHR_CL, SKHR_CL, SSHR_CL, SR_SPLT_CL, SK_SPLT_CL, SS_SPLT_CL.
    pub cluster: [f32; 6],
    /// V_IT, P_IT, D_IT, C_IT.
    pub iterations: [i32; 4],
    /// LST, AST, VST.
    pub material_coeffs: [f32; 3],
    pub anchors: Vec<SoftBodyAnchor>,
    pub pin_vertices: Vec<i32>,
}
