//! The bone table.

use bitflags::bitflags;
use glam::Vec3;

bitflags! {
    /// Bone flag word.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BoneFlags: u16 {
        /// Tail is a bone index rather than an offset.
        const TAIL_IS_BONE = 0x0001;
        const CAN_ROTATE = 0x0002;
        const CAN_TRANSLATE = 0x0004;
        const VISIBLE = 0x0008;
        const CAN_OPERATE = 0x0010;
        const IS_IK = 0x0020;
        /// Additional transform reads the source's local pose.
        const APPLY_LOCAL = 0x0080;
        const ADD_ROTATE = 0x0100;
        const ADD_TRANSLATE = 0x0200;
        const AXIS_IS_FIXED = 0x0400;
        const LOCAL_AXES = 0x0800;
        const AFTER_PHYSICS = 0x1000;
        const EXTERNAL_PARENT = 0x2000;
    }
}

/// Where the bone's display tail points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TailPosition {
    /// Another bone.
    Bone(i32),
    /// An offset from this bone's position.
    Offset(Vec3),
}

/// Rotation/translation inherited from another bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdditionalTransform {
    pub source: i32,
    pub weight: f32,
}

/// One link of an IK chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkLink {
    pub bone: i32,
    /// Euler angle limits (lower, upper) when the link is constrained.
    pub limit: Option<(Vec3, Vec3)>,
}

/// IK payload of a bone with [`BoneFlags::IS_IK`].
#[derive(Clone, Debug, PartialEq)]
pub struct Ik {
    pub target: i32,
    pub loop_count: i32,
    /// Angle limit per iteration, radians.
    pub angle_limit: f32,
    pub links: Vec<IkLink>,
}

/// One bone.
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub name_en: String,
    /// Rest position in model space.
    pub position: Vec3,
    /// Parent bone index, -1 for none.
    pub parent: i32,
    /// Deformation tier; lower tiers transform first.
    pub transform_hierarchy: i32,
    pub flags: BoneFlags,
    pub tail: TailPosition,
    pub additional: Option<AdditionalTransform>,
    pub fixed_axis: Option<Vec3>,
    /// Local (x, z) axes when [`BoneFlags::LOCAL_AXES`] is set.
    pub local_axes: Option<(Vec3, Vec3)>,
    pub external_parent: Option<i32>,
    pub ik: Option<Ik>,
}

impl Bone {
    pub fn is_after_physics(&self) -> bool {
        self.flags.contains(BoneFlags::AFTER_PHYSICS)
    }

    pub fn can_rotate(&self) -> bool {
        self.flags.contains(BoneFlags::CAN_ROTATE)
    }

    pub fn can_translate(&self) -> bool {
        self.flags.contains(BoneFlags::CAN_TRANSLATE)
    }

    /// Source of the additional transform, when one is inherited.
    pub fn additional_source(&self) -> Option<i32> {
        if self
            .flags
            .intersects(BoneFlags::ADD_ROTATE | BoneFlags::ADD_TRANSLATE)
        {
            self.additional.map(|a| a.source)
        } else {
            None
        }
    }
}
