//! VMD binary reader.
//!
//! Sections appear in a fixed order: bones, morphs, cameras, lights,
//! self-shadows, show-IK. Files written by older tools simply stop after the
//! last section they know about, so a clean end-of-stream at a section
//! boundary ends the file; running out of bytes in the middle of a declared
//! section is an error.

use std::io::{ErrorKind, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Quat, Vec3};

use crate::error::{Result, VmdError};
use crate::sjis;
use crate::types::{
    BONE_NAME_WIDTH, BoneFrame, CameraFrame, IK_NAME_WIDTH, IkState, LightFrame, MODEL_NAME_WIDTH,
    MorphFrame, SIGNATURE, SelfShadowFrame, ShowIkFrame,
};
use crate::Motion;

/// Reads a whole motion from `input`.
pub fn read_motion<R: Read>(input: &mut R) -> Result<Motion> {
    let mut signature = [0u8; 30];
    input.read_exact(&mut signature)?;
    if signature != *SIGNATURE {
        return Err(VmdError::InvalidSignature {
            found: String::from_utf8_lossy(&signature).into_owned(),
        });
    }

    let mut name_field = [0u8; MODEL_NAME_WIDTH];
    input.read_exact(&mut name_field)?;
    let model_name = sjis::decode_fixed(&name_field);

    let mut motion = Motion::new(model_name);
    motion.bones = read_section(input, "bone", read_bone_frame)?;
    motion.morphs = read_section(input, "morph", read_morph_frame)?;
    motion.cameras = read_section(input, "camera", read_camera_frame)?;
    motion.lights = read_section(input, "light", read_light_frame)?;
    motion.self_shadows = read_section(input, "self-shadow", read_self_shadow_frame)?;
    motion.show_ik = read_section(input, "show-IK", read_show_ik_frame)?;
    log::debug!(
        "read motion for {:?}: {} bone, {} morph, {} camera frames",
        motion.model_name,
        motion.bones.len(),
        motion.morphs.len(),
        motion.cameras.len()
    );
    Ok(motion)
}

/// Reads one counted section, or returns empty when the stream ended cleanly
/// before the count.
fn read_section<R, T>(
    input: &mut R,
    section: &'static str,
    read_frame: impl Fn(&mut R) -> Result<T>,
) -> Result<Vec<T>>
where
    R: Read,
{
    let Some(count) = read_optional_count(input)? else {
        return Ok(Vec::new());
    };
    let mut frames = Vec::with_capacity(count as usize);
    for read in 0..count {
        match read_frame(input) {
            Ok(frame) => frames.push(frame),
            Err(VmdError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(VmdError::TruncatedSection {
                    section,
                    expected: count,
                    read,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(frames)
}

/// Reads a u32 frame count, mapping a clean end-of-stream to `None`.
fn read_optional_count<R: Read>(input: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = input.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(VmdError::Io(ErrorKind::UnexpectedEof.into()));
        }
        filled += n;
    }
    Ok(Some(u32::from_le_bytes(buf)))
}

fn read_name<R: Read>(input: &mut R, width: usize) -> Result<String> {
    let mut field = vec![0u8; width];
    input.read_exact(&mut field)?;
    Ok(sjis::decode_fixed(&field))
}

fn read_vec3<R: Read>(input: &mut R) -> Result<Vec3> {
    Ok(Vec3::new(
        input.read_f32::<LittleEndian>()?,
        input.read_f32::<LittleEndian>()?,
        input.read_f32::<LittleEndian>()?,
    ))
}

fn read_bone_frame<R: Read>(input: &mut R) -> Result<BoneFrame> {
    let name = read_name(input, BONE_NAME_WIDTH)?;
    let frame = input.read_u32::<LittleEndian>()?;
    let position = read_vec3(input)?;
    let rotation = Quat::from_xyzw(
        input.read_f32::<LittleEndian>()?,
        input.read_f32::<LittleEndian>()?,
        input.read_f32::<LittleEndian>()?,
        input.read_f32::<LittleEndian>()?,
    );
    let mut interpolation = [0u8; 64];
    input.read_exact(&mut interpolation)?;
    Ok(BoneFrame {
        name,
        frame,
        position,
        rotation,
        interpolation,
    })
}

fn read_morph_frame<R: Read>(input: &mut R) -> Result<MorphFrame> {
    Ok(MorphFrame {
        name: read_name(input, BONE_NAME_WIDTH)?,
        frame: input.read_u32::<LittleEndian>()?,
        weight: input.read_f32::<LittleEndian>()?,
    })
}

fn read_camera_frame<R: Read>(input: &mut R) -> Result<CameraFrame> {
    let frame = input.read_u32::<LittleEndian>()?;
    let distance = input.read_f32::<LittleEndian>()?;
    let position = read_vec3(input)?;
    let rotation = read_vec3(input)?;
    let mut interpolation = [0u8; 24];
    input.read_exact(&mut interpolation)?;
    Ok(CameraFrame {
        frame,
        distance,
        position,
        rotation,
        interpolation,
        view_angle: input.read_u32::<LittleEndian>()?,
        orthographic: input.read_u8()? != 0,
    })
}

fn read_light_frame<R: Read>(input: &mut R) -> Result<LightFrame> {
    Ok(LightFrame {
        frame: input.read_u32::<LittleEndian>()?,
        color: read_vec3(input)?,
        direction: read_vec3(input)?,
    })
}

fn read_self_shadow_frame<R: Read>(input: &mut R) -> Result<SelfShadowFrame> {
    Ok(SelfShadowFrame {
        frame: input.read_u32::<LittleEndian>()?,
        mode: input.read_u8()?,
        distance: input.read_f32::<LittleEndian>()?,
    })
}

fn read_show_ik_frame<R: Read>(input: &mut R) -> Result<ShowIkFrame> {
    let frame = input.read_u32::<LittleEndian>()?;
    let show = input.read_u8()? != 0;
    let count = input.read_u32::<LittleEndian>()?;
    let mut ik_states = Vec::with_capacity(count as usize);
    for _ in 0..count {
        ik_states.push(IkState {
            name: read_name(input, IK_NAME_WIDTH)?,
            enabled: input.read_u8()? != 0,
        });
    }
    Ok(ShowIkFrame {
        frame,
        show,
        ik_states,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(model_name_field: &[u8; 20]) -> Vec<u8> {
        let mut bytes = SIGNATURE.to_vec();
        bytes.extend_from_slice(model_name_field);
        bytes
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = vec![0u8; 50];
        bytes[..4].copy_from_slice(b"RIFF");
        let err = read_motion(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, VmdError::InvalidSignature { .. }));
    }

    #[test]
    fn empty_file_after_header_has_no_frames() {
        let mut field = [0u8; 20];
        field[..5].copy_from_slice(b"model");
        let bytes = header(&field);
        let motion = read_motion(&mut bytes.as_slice()).unwrap();
        assert_eq!(motion.model_name, "model");
        assert!(motion.bones.is_empty());
        assert!(motion.show_ik.is_empty());
    }

    #[test]
    fn stops_cleanly_after_bone_section() {
        let mut bytes = header(&[0u8; 20]);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        // Morph count and everything after is simply absent.
        let motion = read_motion(&mut bytes.as_slice()).unwrap();
        assert!(motion.bones.is_empty());
        assert!(motion.morphs.is_empty());
    }

    #[test]
    fn truncated_section_reports_progress() {
        let mut bytes = header(&[0u8; 20]);
        bytes.extend_from_slice(&2u32.to_le_bytes());
        // One full bone record (111 bytes), then nothing.
        bytes.extend_from_slice(&[0u8; 111]);
        let err = read_motion(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            VmdError::TruncatedSection {
                section: "bone",
                expected: 2,
                read: 1,
            }
        ));
    }

    #[test]
    fn detects_camera_motion_header() {
        use crate::types::CAMERA_MODEL_NAME_BYTES;
        let bytes = header(&CAMERA_MODEL_NAME_BYTES);
        let motion = read_motion(&mut bytes.as_slice()).unwrap();
        assert!(motion.is_camera_motion());
    }
}
