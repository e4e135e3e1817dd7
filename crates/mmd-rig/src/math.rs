//! Vector and quaternion math in the host application's conventions.
//!
//! Rotations follow the conjugate-sandwich convention `q⁻¹ · v · q`, euler
//! angles apply in Z-X-Y order, and positive pitch turns the forward vector
//! `(0, 0, -1)` downward. Everything here is f64; keyframe records stay f32
//! until they cross into this module.

use glam::{DQuat, DVec3};

/// Composes two rotations in application order: `a` first, then `b`.
pub fn compose(a: DQuat, b: DQuat) -> DQuat {
    a * b
}

/// Rotates `v` by `q`.
pub fn rotate(v: DVec3, q: DQuat) -> DVec3 {
    q.conjugate() * v
}

/// The relative rotation taking `a` to `b`.
pub fn diff(a: DQuat, b: DQuat) -> DQuat {
    a.conjugate() * b
}

/// Rotation of `angle` radians about `axis`. Identity when the axis is
/// degenerate.
pub fn axis_angle(axis: DVec3, angle: f64) -> DQuat {
    match axis.try_normalize() {
        Some(n) => DQuat::from_axis_angle(n, angle),
        None => DQuat::IDENTITY,
    }
}

/// Converts (pitch, yaw, roll) euler angles to a quaternion, Z-X-Y order.
pub fn euler_to_quaternion(euler: DVec3) -> DQuat {
    let (sx, cx) = (euler.x * 0.5).sin_cos();
    let (sy, cy) = (euler.y * 0.5).sin_cos();
    let (sz, cz) = (euler.z * 0.5).sin_cos();
    DQuat::from_xyzw(
        sx * cy * cz - cx * sy * sz,
        cx * sy * cz + sx * cy * sz,
        cx * cy * sz + sx * sy * cz,
        cx * cy * cz - sx * sy * sz,
    )
}

/// Recovers (pitch, yaw, roll) euler angles from a quaternion, Z-X-Y order.
pub fn quaternion_to_euler(q: DQuat) -> DVec3 {
    let pitch = (2.0 * (q.y * q.z + q.w * q.x)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (q.w * q.y - q.x * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
    let roll = (2.0 * (q.w * q.z - q.x * q.y)).atan2(1.0 - 2.0 * (q.x * q.x + q.z * q.z));
    DVec3::new(pitch, yaw, roll)
}

/// Unsigned angle between two vectors. Degenerate inputs yield zero rather
/// than NaN.
pub fn angle_between(v1: DVec3, v2: DVec3) -> f64 {
    v1.cross(v2).length().atan2(v1.dot(v2))
}

/// Angle from `v1` to `v2`, signed about `axis`.
pub fn signed_angle(v1: DVec3, v2: DVec3, axis: DVec3) -> f64 {
    let angle = angle_between(v1, v2);
    if v2.cross(v1).dot(axis) >= 0.0 { angle } else { -angle }
}

/// Component of `v` perpendicular to `normal`.
pub fn project_to_plane(v: DVec3, normal: DVec3) -> DVec3 {
    let n = normal.normalize_or_zero();
    v - n * v.dot(n)
}

/// Euler angles (pitch, yaw, roll) that turn a watcher whose forward vector
/// is `dir` and whose up vector is `up` to face along `target_dir`, with
/// roll keeping the head level against `global_up`.
pub fn look_at(dir: DVec3, up: DVec3, target_dir: DVec3, global_up: DVec3) -> DVec3 {
    let dir_flat = project_to_plane(dir, up);
    let target_flat = project_to_plane(target_dir, up);
    let yaw = signed_angle(dir_flat, target_flat, up);
    let pitch_axis = target_flat.cross(up);
    let pitch = signed_angle(target_flat, target_dir, pitch_axis);
    let pitched_up = rotate(up, axis_angle(pitch_axis, pitch));
    let up_flat = project_to_plane(pitched_up, target_dir);
    let global_up_flat = project_to_plane(global_up, target_dir);
    let roll = signed_angle(up_flat, global_up_flat, -target_dir);
    DVec3::new(pitch, yaw, roll)
}

/// Single rotation angle about `axis` that turns `dir` toward `target_dir`,
/// both projected onto the plane of rotation.
pub fn look_at_fixed_axis(dir: DVec3, axis: DVec3, target_dir: DVec3) -> f64 {
    signed_angle(
        project_to_plane(dir, axis),
        project_to_plane(target_dir, axis),
        axis,
    )
}

/// Direction from the view target to the camera for a camera euler rotation,
/// scaled by `magnitude`. A zero rotation with negative distance places the
/// camera in front of the target on the -Z side.
pub fn camera_direction(rotation: DVec3, magnitude: f64) -> DVec3 {
    let (sp, cp) = rotation.x.sin_cos();
    let (sy, cy) = rotation.y.sin_cos();
    DVec3::new(-sy * cp, sp, cy * cp) * magnitude
}

/// Clamps each euler component to `[-limit, limit]`.
pub fn clamp_euler(euler: DVec3, limits: DVec3) -> DVec3 {
    let limits = limits.abs();
    DVec3::new(
        euler.x.clamp(-limits.x, limits.x),
        euler.y.clamp(-limits.y, limits.y),
        euler.z.clamp(-limits.z, limits.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn assert_vec_close(a: DVec3, b: DVec3) {
        assert!((a - b).length() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn euler_round_trip() {
        let angles = DVec3::new(0.3, -0.7, 1.1);
        let back = quaternion_to_euler(euler_to_quaternion(angles));
        assert_vec_close(angles, back);
    }

    #[test]
    fn positive_pitch_turns_forward_down() {
        let q = euler_to_quaternion(DVec3::new(FRAC_PI_4, 0.0, 0.0));
        let dir = rotate(DVec3::new(0.0, 0.0, -1.0), q);
        assert!(dir.y < 0.0, "pitched direction {dir} should point down");
    }

    #[test]
    fn compose_applies_in_order() {
        let pitch = euler_to_quaternion(DVec3::new(FRAC_PI_2, 0.0, 0.0));
        let yaw = euler_to_quaternion(DVec3::new(0.0, FRAC_PI_2, 0.0));
        let v = rotate(DVec3::new(0.0, 0.0, -1.0), compose(pitch, yaw));
        // pitch takes forward to -Y, the later yaw leaves -Y in place
        assert_vec_close(v, DVec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn diff_recovers_second_factor() {
        let a = euler_to_quaternion(DVec3::new(0.2, 0.4, 0.0));
        let b = euler_to_quaternion(DVec3::new(0.0, 0.0, 0.9));
        let combined = compose(a, b);
        let d = diff(a, combined);
        assert!(d.dot(b).abs() > 1.0 - 1e-9);
    }

    #[test]
    fn signed_angle_flips_with_axis() {
        let x = DVec3::X;
        let y = DVec3::Y;
        assert_close(signed_angle(x, y, DVec3::Z), -FRAC_PI_2);
        assert_close(signed_angle(x, y, -DVec3::Z), FRAC_PI_2);
        // the rotation convention closes the loop
        let q = axis_angle(DVec3::Z, signed_angle(x, y, DVec3::Z));
        assert_vec_close(rotate(x, q), y);
    }

    #[test]
    fn degenerate_angles_are_zero() {
        assert_close(angle_between(DVec3::ZERO, DVec3::X), 0.0);
        assert_close(signed_angle(DVec3::ZERO, DVec3::ZERO, DVec3::Y), 0.0);
    }

    #[test]
    fn look_at_aligned_target_is_identity() {
        let angles = look_at(
            DVec3::new(0.0, 0.0, -1.0),
            DVec3::Y,
            DVec3::new(0.0, 0.0, -2.0),
            DVec3::Y,
        );
        assert_vec_close(angles, DVec3::ZERO);
    }

    #[test]
    fn look_at_target_below_pitches_down() {
        let angles = look_at(
            DVec3::new(0.0, 0.0, -1.0),
            DVec3::Y,
            DVec3::new(0.0, -1.0, -1.0),
            DVec3::Y,
        );
        assert_close(angles.x, FRAC_PI_4);
        assert_close(angles.y, 0.0);
        assert_close(angles.z, 0.0);
    }

    #[test]
    fn look_at_rotation_faces_the_target() {
        let forward = DVec3::new(0.0, 0.0, -1.0);
        let target = DVec3::new(1.0, 0.5, -1.0).normalize();
        let angles = look_at(forward, DVec3::Y, target, DVec3::Y);
        let faced = rotate(forward, euler_to_quaternion(angles));
        assert!((faced - target).length() < 1e-7, "{faced} != {target}");
    }

    #[test]
    fn fixed_axis_ignores_out_of_plane_component() {
        let angle = look_at_fixed_axis(
            DVec3::new(0.0, 0.0, -1.0),
            DVec3::Y,
            DVec3::new(-1.0, 5.0, 0.0),
        );
        assert_close(angle, -FRAC_PI_2);
    }

    #[test]
    fn camera_direction_at_rest_points_along_z() {
        let dir = camera_direction(DVec3::ZERO, -45.0);
        assert_vec_close(dir, DVec3::new(0.0, 0.0, -45.0));
    }

    #[test]
    fn camera_direction_yaw_sweeps_x() {
        let dir = camera_direction(DVec3::new(0.0, FRAC_PI_2, 0.0), 1.0);
        assert_vec_close(dir, DVec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn clamp_euler_symmetric() {
        let clamped = clamp_euler(DVec3::new(PI, -PI, 0.1), DVec3::new(1.0, 0.5, 1.0));
        assert_vec_close(clamped, DVec3::new(1.0, -0.5, 0.1));
    }
}
