//! VMD binary writer.
//!
//! All six sections are always emitted, empty ones as a zero count. A
//! camera/lighting motion writes the exact 20-byte model-name field the host
//! application produces, including its non-NUL tail bytes.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use glam::Vec3;

use crate::error::Result;
use crate::sjis;
use crate::types::{
    BONE_NAME_WIDTH, BoneFrame, CAMERA_MODEL_NAME, CAMERA_MODEL_NAME_BYTES, CameraFrame,
    IK_NAME_WIDTH, LightFrame, MODEL_NAME_WIDTH, MorphFrame, SIGNATURE, SelfShadowFrame,
    ShowIkFrame,
};
use crate::Motion;

/// Writes a whole motion to `output`.
pub fn write_motion<W: Write>(motion: &Motion, output: &mut W) -> Result<()> {
    output.write_all(SIGNATURE)?;
    if motion.model_name == CAMERA_MODEL_NAME {
        output.write_all(&CAMERA_MODEL_NAME_BYTES)?;
    } else {
        output.write_all(&sjis::encode_fixed(&motion.model_name, MODEL_NAME_WIDTH)?)?;
    }

    write_section(output, &motion.bones, write_bone_frame)?;
    write_section(output, &motion.morphs, write_morph_frame)?;
    write_section(output, &motion.cameras, write_camera_frame)?;
    write_section(output, &motion.lights, write_light_frame)?;
    write_section(output, &motion.self_shadows, write_self_shadow_frame)?;
    write_section(output, &motion.show_ik, write_show_ik_frame)?;
    Ok(())
}

fn write_section<W, T>(
    output: &mut W,
    frames: &[T],
    write_frame: impl Fn(&mut W, &T) -> Result<()>,
) -> Result<()>
where
    W: Write,
{
    output.write_u32::<LittleEndian>(frames.len() as u32)?;
    for frame in frames {
        write_frame(output, frame)?;
    }
    Ok(())
}

fn write_vec3<W: Write>(output: &mut W, v: Vec3) -> Result<()> {
    output.write_f32::<LittleEndian>(v.x)?;
    output.write_f32::<LittleEndian>(v.y)?;
    output.write_f32::<LittleEndian>(v.z)?;
    Ok(())
}

fn write_bone_frame<W: Write>(output: &mut W, frame: &BoneFrame) -> Result<()> {
    output.write_all(&sjis::encode_fixed(&frame.name, BONE_NAME_WIDTH)?)?;
    output.write_u32::<LittleEndian>(frame.frame)?;
    write_vec3(output, frame.position)?;
    output.write_f32::<LittleEndian>(frame.rotation.x)?;
    output.write_f32::<LittleEndian>(frame.rotation.y)?;
    output.write_f32::<LittleEndian>(frame.rotation.z)?;
    output.write_f32::<LittleEndian>(frame.rotation.w)?;
    output.write_all(&frame.interpolation)?;
    Ok(())
}

fn write_morph_frame<W: Write>(output: &mut W, frame: &MorphFrame) -> Result<()> {
    output.write_all(&sjis::encode_fixed(&frame.name, BONE_NAME_WIDTH)?)?;
    output.write_u32::<LittleEndian>(frame.frame)?;
    output.write_f32::<LittleEndian>(frame.weight)?;
    Ok(())
}

fn write_camera_frame<W: Write>(output: &mut W, frame: &CameraFrame) -> Result<()> {
    output.write_u32::<LittleEndian>(frame.frame)?;
    output.write_f32::<LittleEndian>(frame.distance)?;
    write_vec3(output, frame.position)?;
    write_vec3(output, frame.rotation)?;
    output.write_all(&frame.interpolation)?;
    output.write_u32::<LittleEndian>(frame.view_angle)?;
    output.write_u8(u8::from(frame.orthographic))?;
    Ok(())
}

fn write_light_frame<W: Write>(output: &mut W, frame: &LightFrame) -> Result<()> {
    output.write_u32::<LittleEndian>(frame.frame)?;
    write_vec3(output, frame.color)?;
    write_vec3(output, frame.direction)?;
    Ok(())
}

fn write_self_shadow_frame<W: Write>(output: &mut W, frame: &SelfShadowFrame) -> Result<()> {
    output.write_u32::<LittleEndian>(frame.frame)?;
    output.write_u8(frame.mode)?;
    output.write_f32::<LittleEndian>(frame.distance)?;
    Ok(())
}

fn write_show_ik_frame<W: Write>(output: &mut W, frame: &ShowIkFrame) -> Result<()> {
    output.write_u32::<LittleEndian>(frame.frame)?;
    output.write_u8(u8::from(frame.show))?;
    output.write_u32::<LittleEndian>(frame.ik_states.len() as u32)?;
    for state in &frame.ik_states {
        output.write_all(&sjis::encode_fixed(&state.name, IK_NAME_WIDTH)?)?;
        output.write_u8(u8::from(state.enabled))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IkState;
    use glam::Quat;
    use pretty_assertions::assert_eq;

    fn round_trip(motion: &Motion) -> Motion {
        let mut bytes = Vec::new();
        motion.write(&mut bytes).unwrap();
        Motion::read(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn model_motion_round_trips() {
        let mut motion = Motion::new("初音ミク");
        motion.bones.push(BoneFrame {
            name: "右腕".to_string(),
            frame: 30,
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_xyzw(0.1, 0.2, 0.3, 0.927),
            ..BoneFrame::sample()
        });
        motion.morphs.push(MorphFrame {
            name: "まばたき".to_string(),
            frame: 10,
            weight: 0.5,
        });
        motion.show_ik.push(ShowIkFrame {
            frame: 0,
            show: true,
            ik_states: vec![IkState {
                name: "右足ＩＫ".to_string(),
                enabled: false,
            }],
        });
        assert_eq!(round_trip(&motion), motion);
    }

    #[test]
    fn camera_motion_writes_exact_name_field() {
        let mut motion = Motion::new(CAMERA_MODEL_NAME);
        motion.cameras.push(CameraFrame::sample());
        motion.lights.push(LightFrame::sample());
        let mut bytes = Vec::new();
        motion.write(&mut bytes).unwrap();
        assert_eq!(&bytes[30..50], &CAMERA_MODEL_NAME_BYTES);
        assert_eq!(round_trip(&motion), motion);
    }

    #[test]
    fn bone_record_is_111_bytes() {
        let mut motion = Motion::new("m");
        motion.bones.push(BoneFrame::sample());
        let mut bytes = Vec::new();
        motion.write(&mut bytes).unwrap();
        // header 50 + count 4 + record 111 + five empty section counts.
        assert_eq!(bytes.len(), 50 + 4 + 111 + 20);
    }
}
