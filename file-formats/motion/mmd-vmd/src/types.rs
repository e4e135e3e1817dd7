//! VMD record types.
//!
//! One struct per frame section of the file, in file order: bones, morphs,
//! cameras, lights, self-shadows, show-IK. Field layouts mirror the binary
//! records; vectors and quaternions stay f32 like the wire format.

use glam::{Quat, Vec3};

use crate::interp::{BoneCurves, CameraCurves};

/// The 30-byte signature every supported file starts with.
pub const SIGNATURE: &[u8; 30] = b"Vocaloid Motion Data 0002\0\0\0\0\0";

/// The decoded model-name a camera/lighting motion carries.
pub const CAMERA_MODEL_NAME: &str = "カメラ・照明";

/// The exact 20-byte model-name field of a camera/lighting motion:
/// shift_jis `カメラ・照明`, a NUL, then the ASCII tail `on Data`.
pub const CAMERA_MODEL_NAME_BYTES: [u8; 20] = [
    0x83, 0x4a, 0x83, 0x81, 0x83, 0x89, 0x81, 0x45, 0x8f, 0xc6, 0x96, 0xbe, 0x00, b'o', b'n',
    b' ', b'D', b'a', b't', b'a',
];

/// Width of the bone/morph name field.
pub const BONE_NAME_WIDTH: usize = 15;
/// Width of the IK bone name field in show-IK records.
pub const IK_NAME_WIDTH: usize = 20;
/// Width of the model name field in the header.
pub const MODEL_NAME_WIDTH: usize = 20;

/// A bone keyframe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneFrame {
    /// Bone name (decoded shift_jis).
    pub name: String,
    /// Frame number.
    pub frame: u32,
    /// Translation offset from the bone's rest position, local space.
    pub position: Vec3,
    /// Local rotation.
    pub rotation: Quat,
    /// Raw 64-byte interpolation block; see [`BoneCurves`].
    #[cfg_attr(feature = "serde-support", serde(with = "serde_bytes64"))]
    pub interpolation: [u8; 64],
}

impl BoneFrame {
    /// A rest keyframe: mother bone at frame 0, identity pose, linear easing.
    pub fn sample() -> Self {
        Self {
            name: "全ての親".to_string(),
            frame: 0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            interpolation: BoneCurves::linear_block(),
        }
    }

    /// Decodes the interpolation block.
    pub fn curves(&self) -> BoneCurves {
        BoneCurves::unpack(&self.interpolation)
    }

    /// True when position, rotation and easing match, ignoring the frame
    /// number and name.
    pub fn same_pose(&self, other: &Self) -> bool {
        self.position == other.position
            && self.rotation == other.rotation
            && self.interpolation == other.interpolation
    }
}

/// A morph (blend-shape weight) keyframe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct MorphFrame {
    pub name: String,
    pub frame: u32,
    pub weight: f32,
}

/// A camera keyframe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraFrame {
    pub frame: u32,
    /// Distance from the view target along the view ray; negative in front.
    pub distance: f32,
    /// View target position.
    pub position: Vec3,
    /// Euler angles (pitch, yaw, roll) in radians.
    pub rotation: Vec3,
    /// Raw 24-byte interpolation block; see [`CameraCurves`].
    pub interpolation: [u8; 24],
    /// Field of view in degrees.
    pub view_angle: u32,
    /// True for orthographic projection.
    pub orthographic: bool,
}

impl CameraFrame {
    /// The host application's default camera keyframe.
    pub fn sample() -> Self {
        Self {
            frame: 0,
            distance: -45.0,
            position: Vec3::new(0.0, 10.0, 0.0),
            rotation: Vec3::ZERO,
            interpolation: CameraCurves::linear_block(),
            view_angle: 30,
            orthographic: false,
        }
    }

    /// Decodes the interpolation block.
    pub fn curves(&self) -> CameraCurves {
        CameraCurves::unpack(&self.interpolation)
    }

    /// True when every field except the frame number matches.
    pub fn same_pose(&self, other: &Self) -> bool {
        self.distance == other.distance
            && self.position == other.position
            && self.rotation == other.rotation
            && self.interpolation == other.interpolation
            && self.view_angle == other.view_angle
            && self.orthographic == other.orthographic
    }
}

/// A light keyframe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct LightFrame {
    pub frame: u32,
    /// Light color, RGB in [0, 1].
    pub color: Vec3,
    /// Light direction.
    pub direction: Vec3,
}

impl LightFrame {
    /// The host application's default lighting.
    pub fn sample() -> Self {
        Self {
            frame: 0,
            color: Vec3::splat(0.602),
            direction: Vec3::new(-0.5, -1.0, 0.5),
        }
    }
}

/// A self-shadow keyframe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct SelfShadowFrame {
    pub frame: u32,
    pub mode: u8,
    pub distance: f32,
}

/// The on/off state of one IK chain inside a show-IK keyframe.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct IkState {
    /// IK bone name (decoded shift_jis, 20-byte field).
    pub name: String,
    pub enabled: bool,
}

/// A model-visibility / IK-state keyframe.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct ShowIkFrame {
    pub frame: u32,
    /// Model visibility.
    pub show: bool,
    pub ik_states: Vec<IkState>,
}

#[cfg(feature = "serde-support")]
mod serde_bytes64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_seq(bytes.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 64], D::Error> {
        let v: Vec<u8> = Vec::deserialize(de)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sjis;

    #[test]
    fn camera_name_bytes_decode_to_constant() {
        assert_eq!(sjis::decode_fixed(&CAMERA_MODEL_NAME_BYTES), CAMERA_MODEL_NAME);
    }

    #[test]
    fn same_pose_ignores_frame_number() {
        let a = BoneFrame::sample();
        let mut b = a.clone();
        b.frame = 42;
        assert!(a.same_pose(&b));
        b.position.x = 1.0;
        assert!(!a.same_pose(&b));
    }
}
