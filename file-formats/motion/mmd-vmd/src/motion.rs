//! Motion container and keyframe sampling.
//!
//! [`Motion`] holds the six frame sections of a VMD file. The free functions
//! below implement the sampling rules shared by every consumer: interval
//! lookup over sorted keyframes and eased interpolation between two keys,
//! where the curve attached to the *later* key governs the span.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{Quat, Vec3};

use crate::error::Result;
use crate::types::{
    BoneFrame, CAMERA_MODEL_NAME, CameraFrame, LightFrame, MorphFrame, SelfShadowFrame,
    ShowIkFrame,
};
use crate::{reader, writer};

/// An in-memory VMD motion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Motion {
    /// Name of the model this motion animates, or [`CAMERA_MODEL_NAME`].
    pub model_name: String,
    pub bones: Vec<BoneFrame>,
    pub morphs: Vec<MorphFrame>,
    pub cameras: Vec<CameraFrame>,
    pub lights: Vec<LightFrame>,
    pub self_shadows: Vec<SelfShadowFrame>,
    pub show_ik: Vec<ShowIkFrame>,
}

impl Motion {
    /// An empty motion for the given model name.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Reads a motion from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }

    /// Reads a motion from any byte stream.
    pub fn read<R: Read>(input: &mut R) -> Result<Self> {
        reader::read_motion(input)
    }

    /// Writes the motion to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)
    }

    /// Writes the motion to any byte stream.
    pub fn write<W: Write>(&self, output: &mut W) -> Result<()> {
        writer::write_motion(self, output)
    }

    /// True when this is a camera/lighting motion rather than a model one.
    pub fn is_camera_motion(&self) -> bool {
        self.model_name == CAMERA_MODEL_NAME
    }

    /// Groups bone frames by name, each list sorted by frame number.
    pub fn bones_by_name(&self) -> HashMap<String, Vec<BoneFrame>> {
        let mut dict: HashMap<String, Vec<BoneFrame>> = HashMap::new();
        for frame in &self.bones {
            dict.entry(frame.name.clone()).or_default().push(frame.clone());
        }
        for frames in dict.values_mut() {
            frames.sort_by_key(|f| f.frame);
        }
        dict
    }

    /// Drops every keyframe whose value equals both neighbors, per name.
    ///
    /// First and last keyframes of each name always survive. Morph, camera
    /// and light sections are left alone; redundant frames only accumulate
    /// in generated bone motions.
    pub fn remove_redundant_bone_frames(&mut self) {
        let dict = self.bones_by_name();
        let mut names: Vec<&String> = dict.keys().collect();
        names.sort();
        let mut kept = Vec::with_capacity(self.bones.len());
        for name in names {
            kept.extend(remove_redundant(&dict[name], BoneFrame::same_pose));
        }
        self.bones = kept;
    }
}

/// Where a frame number falls relative to a sorted key list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interval {
    /// Before the first key; holds the first key.
    BeforeFirst(u32),
    /// Exactly on a key.
    Exact(u32),
    /// Strictly between two keys.
    Between(u32, u32),
    /// After the last key; holds the last key.
    AfterLast(u32),
    /// The key list is empty.
    Empty,
}

/// Locates `frame` within a sorted, deduplicated key list by binary search.
pub fn get_interval(frame: u32, keys: &[u32]) -> Interval {
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return Interval::Empty;
    };
    if frame < first {
        return Interval::BeforeFirst(first);
    }
    if frame > last {
        return Interval::AfterLast(last);
    }
    match keys.binary_search(&frame) {
        Ok(_) => Interval::Exact(frame),
        Err(i) => Interval::Between(keys[i - 1], keys[i]),
    }
}

/// Removes frames whose value matches both neighbors.
pub fn remove_redundant<T: Clone>(frames: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<T> {
    if frames.len() <= 2 {
        return frames.to_vec();
    }
    let mut kept = vec![frames[0].clone()];
    for window in frames.windows(3) {
        if !(same(&window[0], &window[1]) && same(&window[1], &window[2])) {
            kept.push(window[1].clone());
        }
    }
    kept.push(frames[frames.len() - 1].clone());
    kept
}

fn span_fraction(frame: u32, begin: u32, end: u32) -> f64 {
    f64::from(frame - begin) / f64::from(end - begin)
}

/// Interpolated bone position between two keyframes, per-axis easing.
pub fn interpolate_bone_position(frame: u32, begin: &BoneFrame, end: &BoneFrame) -> Vec3 {
    let curves = end.curves();
    let x = span_fraction(frame, begin.frame, end.frame);
    let lerp = |a: f32, b: f32, curve: crate::interp::ControlPoints| -> f32 {
        let y = curve.ease(x);
        a + ((f64::from(b) - f64::from(a)) * y) as f32
    };
    Vec3::new(
        lerp(begin.position.x, end.position.x, curves.x),
        lerp(begin.position.y, end.position.y, curves.y),
        lerp(begin.position.z, end.position.z, curves.z),
    )
}

/// Interpolated bone rotation between two keyframes: slerp by the eased
/// fraction of the rotation channel.
pub fn interpolate_bone_rotation(frame: u32, begin: &BoneFrame, end: &BoneFrame) -> Quat {
    let x = span_fraction(frame, begin.frame, end.frame);
    let y = end.curves().rotation.ease(x) as f32;
    begin.rotation.slerp(end.rotation, y)
}

/// Interpolated camera position, per-axis easing.
pub fn interpolate_camera_position(frame: u32, begin: &CameraFrame, end: &CameraFrame) -> Vec3 {
    let curves = end.curves();
    let x = span_fraction(frame, begin.frame, end.frame);
    let lerp = |a: f32, b: f32, curve: crate::interp::ControlPoints| -> f32 {
        a + (b - a) * curve.ease(x) as f32
    };
    Vec3::new(
        lerp(begin.position.x, end.position.x, curves.x),
        lerp(begin.position.y, end.position.y, curves.y),
        lerp(begin.position.z, end.position.z, curves.z),
    )
}

/// Interpolated camera euler rotation: each component lerps by the eased
/// fraction of the single rotation channel.
pub fn interpolate_camera_rotation(frame: u32, begin: &CameraFrame, end: &CameraFrame) -> Vec3 {
    let x = span_fraction(frame, begin.frame, end.frame);
    let y = end.curves().rotation.ease(x) as f32;
    begin.rotation + (end.rotation - begin.rotation) * y
}

/// Interpolated camera distance via the distance channel.
pub fn interpolate_camera_distance(frame: u32, begin: &CameraFrame, end: &CameraFrame) -> f32 {
    let x = span_fraction(frame, begin.frame, end.frame);
    let y = end.curves().distance.ease(x) as f32;
    begin.distance + (end.distance - begin.distance) * y
}

/// Interpolated view angle via the view-angle channel.
pub fn interpolate_camera_view_angle(frame: u32, begin: &CameraFrame, end: &CameraFrame) -> f32 {
    let x = span_fraction(frame, begin.frame, end.frame);
    let y = end.curves().view_angle.ease(x) as f32;
    let a = begin.view_angle as f32;
    a + (end.view_angle as f32 - a) * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{BoneCurves, ControlPoints};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn key(frame: u32, x: f32) -> BoneFrame {
        BoneFrame {
            frame,
            position: Vec3::new(x, 0.0, 0.0),
            ..BoneFrame::sample()
        }
    }

    #[test_case(3, Interval::BeforeFirst(5); "before first key")]
    #[test_case(10, Interval::Exact(10); "on a key")]
    #[test_case(12, Interval::Between(10, 20); "between keys")]
    #[test_case(25, Interval::AfterLast(20); "after last key")]
    fn interval_lookup(frame: u32, expected: Interval) {
        assert_eq!(get_interval(frame, &[5, 10, 20]), expected);
    }

    #[test]
    fn interval_of_empty_key_list() {
        assert_eq!(get_interval(0, &[]), Interval::Empty);
    }

    #[test]
    fn linear_position_interpolation_is_exact() {
        let begin = key(0, 0.0);
        let end = key(10, 10.0);
        let mid = interpolate_bone_position(5, &begin, &end);
        assert!((mid.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn eased_interpolation_uses_later_keys_curve() {
        let begin = key(0, 0.0);
        let mut end = key(10, 10.0);
        let mut curves = BoneCurves::LINEAR;
        curves.x = ControlPoints::PARABOLA_EASE_IN;
        end.interpolation = curves.pack();
        let mid = interpolate_bone_position(5, &begin, &end);
        assert!((mid.x - 2.5).abs() < 0.1, "x={}", mid.x);
    }

    #[test]
    fn rotation_slerp_halfway() {
        let begin = key(0, 0.0);
        let mut end = key(10, 0.0);
        end.rotation = Quat::from_rotation_y(1.0);
        let q = interpolate_bone_rotation(5, &begin, &end);
        let expected = Quat::from_rotation_y(0.5);
        assert!(q.dot(expected).abs() > 0.999_99);
    }

    #[test]
    fn redundant_frames_are_dropped() {
        let frames = vec![key(0, 1.0), key(5, 1.0), key(10, 1.0), key(15, 2.0)];
        let kept = remove_redundant(&frames, BoneFrame::same_pose);
        let kept_frames: Vec<u32> = kept.iter().map(|f| f.frame).collect();
        assert_eq!(kept_frames, vec![0, 10, 15]);
    }

    #[test]
    fn bones_by_name_sorts_by_frame() {
        let mut motion = Motion::new("model");
        motion.bones = vec![key(10, 1.0), key(0, 0.0)];
        let dict = motion.bones_by_name();
        let frames: Vec<u32> = dict["全ての親"].iter().map(|f| f.frame).collect();
        assert_eq!(frames, vec![0, 10]);
    }
}
