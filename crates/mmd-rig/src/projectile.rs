//! Ballistics for turret-style chains.
//!
//! Velocities are model units per frame. Gravity uses the host
//! application's scale of 8 cm per model unit at 30 frames per second.

use glam::{DVec3, Quat};

use mmd_vmd::{BoneCurves, BoneFrame, ControlPoints, ShowIkFrame};

use crate::transform::CENTER_BONE;

/// Frames per second of VMD motion.
pub const FPS: f64 = 30.0;

const METERS_PER_UNIT: f64 = 0.08;

/// Gravity in model units per frame squared.
pub const GRAVITY: f64 = -9.8 / METERS_PER_UNIT / (FPS * FPS);

const ROOT_EPS: f64 = 1e-9;

/// A launch solution. `position` and `collision` are relative to the
/// muzzle.
#[derive(Clone, Copy, Debug)]
pub struct Launch {
    /// Initial velocity, units per frame.
    pub velocity: DVec3,
    /// Flight time in frames.
    pub time: f64,
    /// Collision point relative to the muzzle.
    pub collision: DVec3,
}

/// Finds the earliest interception of a target moving at constant velocity,
/// firing at a fixed muzzle speed under gravity. `position` and `velocity`
/// are the target's state relative to the muzzle. `None` when the target is
/// out of reach.
pub fn project_asap(position: DVec3, velocity: DVec3, muzzle_speed: f64) -> Option<Launch> {
    let g = DVec3::new(0.0, -GRAVITY, 0.0);
    let coeffs = [
        g.dot(g) / 4.0,
        velocity.dot(g),
        position.dot(g) + velocity.dot(velocity) - muzzle_speed * muzzle_speed,
        2.0 * position.dot(velocity),
        position.dot(position),
    ];
    let time = smallest_positive_root(&coeffs)?;
    let collision = position + velocity * time;
    let vx = collision.x / time;
    let vz = collision.z / time;
    let vy = (muzzle_speed * muzzle_speed - vx * vx - vz * vz).max(0.0).sqrt();
    Some(Launch {
        velocity: DVec3::new(vx, vy, vz),
        time,
        collision,
    })
}

/// Solves for the launch velocity that meets the target after exactly
/// `time` frames.
pub fn project_ontime(position: DVec3, velocity: DVec3, time: f64) -> Launch {
    let collision = position + velocity * time;
    let launch = DVec3::new(
        collision.x / time,
        collision.y / time - GRAVITY * time / 2.0,
        collision.z / time,
    );
    Launch {
        velocity: launch,
        time,
        collision,
    }
}

/// Time and position of the highest point of a trajectory from `origin`.
pub fn apex(origin: DVec3, velocity: DVec3) -> (f64, DVec3) {
    let time = -velocity.y / GRAVITY;
    let position =
        origin + velocity * time + DVec3::new(0.0, GRAVITY * time * time / 2.0, 0.0);
    (time, position)
}

/// Smallest strictly positive real root of a quartic, bracketing between
/// the critical points of the polynomial.
fn smallest_positive_root(coeffs: &[f64; 5]) -> Option<f64> {
    let eval = |t: f64| coeffs.iter().fold(0.0, |acc, &c| acc * t + c);
    let derivative = [
        4.0 * coeffs[0],
        3.0 * coeffs[1],
        2.0 * coeffs[2],
        coeffs[3],
    ];
    let mut points: Vec<f64> = cubic_roots(derivative)
        .into_iter()
        .filter(|&t| t > 0.0)
        .collect();
    points.sort_by(f64::total_cmp);
    let bound = 1.0
        + coeffs[1..]
            .iter()
            .map(|c| c.abs())
            .fold(0.0, f64::max)
            / coeffs[0].abs();
    let top = bound.max(points.last().copied().unwrap_or(0.0) + 1.0);
    points.insert(0, 0.0);
    points.push(top);

    let mut candidates = Vec::new();
    // tangent roots sit on critical points without a sign change
    for &p in &points {
        if p > ROOT_EPS && eval(p).abs() <= 1e-6 * (1.0 + coeffs[4].abs()) {
            candidates.push(p);
        }
    }
    for pair in points.windows(2) {
        if let Some(root) = bisect(&eval, pair[0], pair[1]) {
            if root > ROOT_EPS {
                candidates.push(root);
            }
        }
    }
    candidates.into_iter().min_by(f64::total_cmp)
}

fn bisect(f: &impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> Option<f64> {
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if (f_lo > 0.0) == (f_hi > 0.0) {
        return None;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || hi - lo < ROOT_EPS {
            return Some(mid);
        }
        if (f_mid > 0.0) == (f_lo > 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Real roots of `a t^3 + b t^2 + c t + d`.
fn cubic_roots(coeffs: [f64; 4]) -> Vec<f64> {
    let [a, b, c, d] = coeffs;
    if a.abs() < 1e-12 {
        return quadratic_roots(b, c, d);
    }
    let p = (3.0 * a * c - b * b) / (3.0 * a * a);
    let q = (2.0 * b * b * b - 9.0 * a * b * c + 27.0 * a * a * d) / (27.0 * a * a * a);
    let shift = -b / (3.0 * a);
    let disc = q * q / 4.0 + p * p * p / 27.0;
    if disc > 0.0 {
        let s = (-q / 2.0 + disc.sqrt()).cbrt();
        let t = (-q / 2.0 - disc.sqrt()).cbrt();
        vec![shift + s + t]
    } else if p.abs() < 1e-12 {
        vec![shift]
    } else {
        let r = (-p / 3.0).sqrt();
        let arg = (3.0 * q / (2.0 * p * r)).clamp(-1.0, 1.0);
        let theta = arg.acos() / 3.0;
        (0..3)
            .map(|k| {
                shift
                    + 2.0
                        * r
                        * (theta - 2.0 * std::f64::consts::PI * f64::from(k) / 3.0).cos()
            })
            .collect()
    }
}

fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < 1e-12 {
        if b.abs() < 1e-12 {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let s = disc.sqrt();
    vec![(-b - s) / (2.0 * a), (-b + s) / (2.0 * a)]
}

/// Keyframes tracing one shot, ready to merge into a bullet model's motion.
#[derive(Clone, Debug)]
pub struct BulletMotion {
    /// Name of the firing bone.
    pub bone: String,
    pub fire_frame: u32,
    /// Frame the shot lands, `ceil(fire + flight time)`.
    pub end_frame: u32,
    /// Center-bone keyframes: muzzle, apex and collision.
    pub frames: Vec<BoneFrame>,
    /// Optional visibility toggles around the shot.
    pub show_ik: Vec<ShowIkFrame>,
}

/// Builds the bullet motion for one shot. `None` when the launch arcs
/// downward from the start (apex not after the fire frame).
pub fn make_bullet_motion(
    bone: &str,
    fire_frame: u32,
    muzzle: DVec3,
    launch: &Launch,
    export_show_ik: bool,
) -> Option<BulletMotion> {
    let (apex_time, apex_position) = apex(muzzle, launch.velocity);
    if apex_time <= 0.0 {
        return None;
    }
    let center_key = |frame: u32, position: DVec3, block: [u8; 64]| BoneFrame {
        name: CENTER_BONE.to_string(),
        frame,
        position: position.as_vec3(),
        rotation: Quat::IDENTITY,
        interpolation: block,
    };

    let mut frames = vec![center_key(fire_frame, muzzle, BoneCurves::linear_block())];
    let apex_frame = fire_frame + apex_time.ceil() as u32;
    let mut rising = BoneCurves::LINEAR;
    rising.y = ControlPoints::PARABOLA_EASE_OUT;
    frames.push(center_key(apex_frame, apex_position, rising.pack()));

    let mut last_frame = apex_frame;
    let collision_frame = fire_frame + launch.time.ceil() as u32;
    if launch.time > apex_time && collision_frame > apex_frame {
        let mut falling = BoneCurves::LINEAR;
        falling.y = ControlPoints::PARABOLA_EASE_IN;
        frames.push(center_key(
            collision_frame,
            muzzle + launch.collision,
            falling.pack(),
        ));
        last_frame = collision_frame;
    }

    let show_ik = if export_show_ik {
        vec![
            ShowIkFrame {
                frame: fire_frame,
                show: true,
                ik_states: Vec::new(),
            },
            ShowIkFrame {
                frame: last_frame + 1,
                show: false,
                ik_states: Vec::new(),
            },
        ]
    } else {
        Vec::new()
    };

    Some(BulletMotion {
        bone: bone.to_string(),
        fire_frame,
        end_frame: fire_frame + launch.time.ceil() as u32,
        frames,
        show_ik,
    })
}
