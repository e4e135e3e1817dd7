//! End-to-end CLI tests over synthetic models and motions.

use std::path::Path;

use assert_cmd::Command;
use glam::{Quat, Vec3};
use predicates::prelude::*;
use tempfile::TempDir;

use mmd_vmd::{BoneCurves, BoneFrame, CAMERA_MODEL_NAME, CameraFrame, Motion};

fn mmd_rs() -> Command {
    Command::cargo_bin("mmd-rs").expect("binary builds")
}

fn write_pmx_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as i32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn write_pmx_bone(buf: &mut Vec<u8>, name: &str, position: [f32; 3], parent: i32, flags: u16) {
    write_pmx_string(buf, name);
    write_pmx_string(buf, "");
    for v in position {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&parent.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&flags.to_le_bytes());
    // tail offset, flags never set TAIL_IS_BONE here
    for _ in 0..3 {
        buf.extend_from_slice(&0f32.to_le_bytes());
    }
}

/// A minimal UTF-8 PMX 2.0 model: root, center and a neck/head/eyes chain.
/// Sections after the bone table are omitted; the reader treats a clean
/// end of stream as empty sections.
fn write_watcher_model(path: &Path) {
    const CAN_ROTATE: u16 = 0x0002;
    const CAN_TRANSLATE: u16 = 0x0004;

    let mut buf = b"PMX ".to_vec();
    buf.extend_from_slice(&2.0f32.to_le_bytes());
    buf.push(8);
    // utf-8 text, no extra uvs, 4-byte indices everywhere
    buf.extend_from_slice(&[1, 0, 4, 4, 4, 4, 4, 4]);
    write_pmx_string(&mut buf, "watcher");
    write_pmx_string(&mut buf, "watcher");
    write_pmx_string(&mut buf, "");
    write_pmx_string(&mut buf, "");
    for _ in 0..4 {
        // vertices, faces, textures, materials
        buf.extend_from_slice(&0i32.to_le_bytes());
    }
    buf.extend_from_slice(&5i32.to_le_bytes());
    write_pmx_bone(&mut buf, "全ての親", [0.0, 0.0, 0.0], -1, CAN_ROTATE | CAN_TRANSLATE);
    write_pmx_bone(&mut buf, "センター", [0.0, 8.0, 0.0], 0, CAN_ROTATE | CAN_TRANSLATE);
    write_pmx_bone(&mut buf, "首", [0.0, 16.0, 0.0], 1, CAN_ROTATE);
    write_pmx_bone(&mut buf, "頭", [0.0, 17.0, 0.0], 2, CAN_ROTATE);
    write_pmx_bone(&mut buf, "両目", [0.0, 18.0, 0.0], 3, CAN_ROTATE);
    std::fs::write(path, buf).expect("write model");
}

fn bone_frame(name: &str, frame: u32) -> BoneFrame {
    BoneFrame {
        name: name.to_string(),
        frame,
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        interpolation: BoneCurves::linear_block(),
    }
}

fn write_motion(path: &Path, motion: &Motion) {
    motion.save(path).expect("write motion");
}

#[test]
fn vmd_info_prints_section_counts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dance.vmd");
    let mut motion = Motion::new("watcher");
    motion.bones.push(bone_frame("首", 0));
    motion.bones.push(bone_frame("首", 30));
    motion.bones.push(bone_frame("頭", 0));
    write_motion(&path, &motion);

    mmd_rs()
        .args(["vmd", "info"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Model: watcher")
                .and(predicate::str::contains("bones"))
                .and(predicate::str::contains("3")),
        );
}

#[test]
fn vmd_diff_flags_a_moved_keyframe() {
    let dir = TempDir::new().unwrap();
    let path_a = dir.path().join("a.vmd");
    let path_b = dir.path().join("b.vmd");

    let mut a = Motion::new("watcher");
    a.bones.push(bone_frame("首", 0));
    a.bones.push(bone_frame("頭", 10));
    let mut b = a.clone();
    b.bones[1].position = Vec3::new(0.0, 1.0, 0.0);
    write_motion(&path_a, &a);
    write_motion(&path_b, &b);

    mmd_rs()
        .args(["vmd", "diff"])
        .arg(&path_a)
        .arg(&path_b)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("NOT_EQUAL")
                .and(predicate::str::contains("頭"))
                .and(predicate::str::contains("motions differ")),
        );
}

#[test]
fn vmd_diff_reports_equal_motions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.vmd");
    let mut motion = Motion::new("watcher");
    motion.bones.push(bone_frame("首", 0));
    write_motion(&path, &motion);

    mmd_rs()
        .args(["vmd", "diff", "--short"])
        .arg(&path)
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("motions are equal"));
}

#[test]
fn vmd_merge_concatenates_sections() {
    let dir = TempDir::new().unwrap();
    let path_a = dir.path().join("a.vmd");
    let path_b = dir.path().join("b.vmd");
    let out = dir.path().join("merged.vmd");

    let mut a = Motion::new("first");
    a.bones.push(bone_frame("首", 0));
    let mut b = Motion::new("second");
    b.bones.push(bone_frame("頭", 10));
    b.cameras.push(CameraFrame::sample());
    write_motion(&path_a, &a);
    write_motion(&path_b, &b);

    mmd_rs()
        .args(["vmd", "merge", "-i"])
        .arg(&path_a)
        .arg(&path_b)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let merged = Motion::open(&out).expect("parse merged motion");
    assert_eq!(merged.model_name, "first");
    assert_eq!(merged.bones.len(), 2);
    assert_eq!(merged.cameras.len(), 1);
}

#[test]
fn trace_camera_writes_a_parseable_motion() {
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("watcher.pmx");
    let motion_path = dir.path().join("watcher.vmd");
    let camera_path = dir.path().join("camera.vmd");
    let out = dir.path().join("traced.vmd");

    write_watcher_model(&model_path);

    let mut motion = Motion::new("watcher");
    motion.bones.push(bone_frame("センター", 0));
    motion.bones.push(bone_frame("頭", 0));
    write_motion(&motion_path, &motion);

    let mut camera = Motion::new(CAMERA_MODEL_NAME);
    camera.cameras.push(CameraFrame::sample());
    let mut far = CameraFrame::sample();
    far.frame = 30;
    far.distance = -30.0;
    far.position = Vec3::new(5.0, 10.0, 0.0);
    camera.cameras.push(far);
    write_motion(&camera_path, &camera);

    mmd_rs()
        .arg("trace-camera")
        .arg(&model_path)
        .arg(&motion_path)
        .arg(&camera_path)
        .arg(&out)
        .assert()
        .success();

    let traced = Motion::open(&out).expect("parse traced motion");
    let names: std::collections::BTreeSet<&str> =
        traced.bones.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains("センター"), "original frames survive");
    for bone in ["首", "頭", "両目"] {
        assert!(names.contains(bone), "{bone} was overwritten");
    }
}

#[test]
fn trace_camera_flag_values_are_validated() {
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("watcher.pmx");
    let motion_path = dir.path().join("watcher.vmd");
    let camera_path = dir.path().join("camera.vmd");
    let out = dir.path().join("traced.vmd");

    write_watcher_model(&model_path);
    write_motion(&motion_path, &Motion::new("watcher"));
    let mut camera = Motion::new(CAMERA_MODEL_NAME);
    camera.cameras.push(CameraFrame::sample());
    write_motion(&camera_path, &camera);

    mmd_rs()
        .arg("trace-camera")
        .arg(&model_path)
        .arg(&motion_path)
        .arg(&camera_path)
        .arg(&out)
        .args(["--constraint", "左腕", "10", "10", "10", "1", "1", "1"])
        .assert()
        .success();

    mmd_rs()
        .arg("trace-camera")
        .arg(&model_path)
        .arg(&motion_path)
        .arg(&camera_path)
        .arg(&out)
        .args(["--forward-dir", "頭", "0", "zero", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a number"));
}
