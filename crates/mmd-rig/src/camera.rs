//! Camera motion sampling.

use glam::DVec3;

use mmd_vmd::motion::{
    interpolate_camera_distance, interpolate_camera_position, interpolate_camera_rotation,
    interpolate_camera_view_angle,
};
use mmd_vmd::{CameraFrame, Interval, get_interval};

use crate::math;

/// A camera pose sampled at one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSample {
    /// Euler rotation (pitch, yaw, roll), radians.
    pub rotation: DVec3,
    /// View target position.
    pub target: DVec3,
    /// Signed distance from the target along the view ray.
    pub distance: f64,
    /// Field of view in degrees.
    pub view_angle: f64,
}

/// Sorted camera keyframes with interpolated sampling.
#[derive(Clone, Debug, Default)]
pub struct CameraMotion {
    frames: Vec<CameraFrame>,
    keys: Vec<u32>,
}

impl CameraMotion {
    pub fn new(mut frames: Vec<CameraFrame>) -> Self {
        frames.sort_by_key(|f| f.frame);
        let keys = frames.iter().map(|f| f.frame).collect();
        Self { frames, keys }
    }

    pub fn frames(&self) -> &[CameraFrame] {
        &self.frames
    }

    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    fn at(&self, key: u32) -> &CameraFrame {
        // keys mirror frames, so the search cannot miss
        &self.frames[self.keys.binary_search(&key).unwrap_or(0)]
    }

    /// Samples the camera pose at a frame. Frames outside the keyed range
    /// clamp to the nearest keyframe; an empty motion yields the host
    /// application's default pose.
    pub fn sample(&self, frame: u32) -> CameraSample {
        match get_interval(frame, &self.keys) {
            Interval::Empty => from_frame(&CameraFrame::sample()),
            Interval::Exact(k) | Interval::BeforeFirst(k) | Interval::AfterLast(k) => {
                from_frame(self.at(k))
            }
            Interval::Between(a, b) => {
                let begin = self.at(a);
                let end = self.at(b);
                CameraSample {
                    rotation: interpolate_camera_rotation(frame, begin, end).as_dvec3(),
                    target: interpolate_camera_position(frame, begin, end).as_dvec3(),
                    distance: f64::from(interpolate_camera_distance(frame, begin, end)),
                    view_angle: f64::from(interpolate_camera_view_angle(frame, begin, end)),
                }
            }
        }
    }

    /// Model-space position of the camera itself at a frame.
    pub fn position(&self, frame: u32) -> DVec3 {
        let sample = self.sample(frame);
        sample.target + math::camera_direction(sample.rotation, sample.distance)
    }
}

fn from_frame(frame: &CameraFrame) -> CameraSample {
    CameraSample {
        rotation: frame.rotation.as_dvec3(),
        target: frame.position.as_dvec3(),
        distance: f64::from(frame.distance),
        view_angle: f64::from(frame.view_angle),
    }
}
