//! Solver configuration.

use std::collections::HashMap;
use std::f64::consts::PI;

use glam::DVec3;

/// Angular limits and per-axis scaling for one overwritten bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraint {
    /// Per-axis angle limits (pitch, yaw, roll), radians.
    pub limits: DVec3,
    /// Per-axis share of the total look rotation.
    pub scale: DVec3,
}

impl Constraint {
    pub fn new(limits: DVec3, scale: DVec3) -> Self {
        Self { limits, scale }
    }

    /// Limits given in degrees.
    pub fn from_degrees(limits: DVec3, scale: DVec3) -> Self {
        Self::new(limits * (PI / 180.0), scale)
    }
}

/// Constraints for the standard neck/head/eyes chain.
pub fn default_constraints() -> HashMap<String, Constraint> {
    [
        ("首", (10.0, 20.0, 10.0), (1.0, 1.0, 0.8)),
        ("頭", (30.0, 40.0, 20.0), (1.0, 1.0, 0.8)),
        ("両目", (20.0, 30.0, 0.0), (1.0, 1.0, 0.0)),
    ]
    .into_iter()
    .map(|(name, limits, scale)| {
        (
            name.to_string(),
            Constraint::from_degrees(DVec3::from(limits), DVec3::from(scale)),
        )
    })
    .collect()
}

/// Fallback for bones without an explicit constraint: nearly unconstrained,
/// half-weight roll.
pub fn fallback_constraint() -> Constraint {
    Constraint::from_degrees(DVec3::splat(179.0), DVec3::new(1.0, 1.0, 0.5))
}

/// How base directions for the overwritten chain are derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointMode {
    /// Face tracking: a configured forward vector per bone.
    #[default]
    Face,
    /// Turret tracking: display-tail directions of the leaf bones, shared
    /// with their overwritten ancestors.
    Arm,
}

/// How a projectile chain aims.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tracking {
    /// Point straight at the target between shots.
    #[default]
    Line,
    /// Hold the launch elevation between shots too.
    Parabola,
}

/// How the launch velocity is solved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Projection {
    /// Earliest possible interception at a fixed muzzle speed.
    #[default]
    Asap,
    /// Arrive after a fixed flight time.
    OnTime,
}

/// Ballistic options for turret chains.
#[derive(Clone, Debug)]
pub struct ProjectileConfig {
    /// Muzzle speed, model units per frame.
    pub muzzle_speed: f64,
    /// Flight time for [`Projection::OnTime`], frames.
    pub collision_time: f64,
    pub tracking: Tracking,
    pub projection: Projection,
    /// Emit visibility toggles with each bullet motion.
    pub export_show_ik: bool,
    /// Frames at which shots are fired.
    pub fire_frames: Vec<u32>,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            muzzle_speed: 8.0,
            collision_time: 60.0,
            tracking: Tracking::default(),
            projection: Projection::default(),
            export_show_ik: false,
            fire_frames: Vec::new(),
        }
    }
}

/// Frame ranges the solver may touch. Empty means everywhere.
#[derive(Clone, Debug, Default)]
pub struct FrameRanges(Vec<(u32, u32)>);

impl FrameRanges {
    pub fn new(ranges: Vec<(u32, u32)>) -> Self {
        Self(ranges)
    }

    pub fn contains(&self, frame: u32) -> bool {
        self.0.is_empty() || self.0.iter().any(|&(from, to)| from <= frame && frame <= to)
    }
}

/// Everything the solver needs besides the motions themselves.
#[derive(Clone, Debug)]
pub struct LookAtConfig {
    /// Bones whose rotations the solver replaces, root to leaf.
    pub overwrite_bones: Vec<String>,
    pub constraints: HashMap<String, Constraint>,
    /// Per-bone share of the original motion blended back in, per axis.
    pub blend_ratios: HashMap<String, DVec3>,
    /// Per-bone rest forward vector in [`PointMode::Face`].
    pub forward_dirs: HashMap<String, DVec3>,
    /// Scale on the blended-in pitch when it points down, per bone.
    pub up_blend_weights: HashMap<String, f64>,
    /// Horizontal angle beyond which the target is behind the body and
    /// tracking disengages, radians. Zero or negative disables the zone.
    pub ignore_zone: f64,
    pub global_up: DVec3,
    /// Angular speed limit after a camera cut, radians per frame. Zero
    /// disables the cut delay.
    pub omega_limit: f64,
    pub frame_ranges: FrameRanges,
    /// Extra frames to solve beyond the queued keyframe events.
    pub additional_frames: Vec<u32>,
    /// Aim the chain's end bone at the target instead of each pivot.
    pub near_mode: bool,
    pub point_mode: PointMode,
    pub projectile: Option<ProjectileConfig>,
}

impl Default for LookAtConfig {
    fn default() -> Self {
        Self {
            overwrite_bones: ["首", "頭", "両目"].map(String::from).to_vec(),
            constraints: default_constraints(),
            blend_ratios: HashMap::new(),
            forward_dirs: HashMap::new(),
            up_blend_weights: HashMap::new(),
            ignore_zone: 140.0_f64.to_radians(),
            global_up: DVec3::Y,
            omega_limit: PI / 40.0,
            frame_ranges: FrameRanges::default(),
            additional_frames: Vec::new(),
            near_mode: false,
            point_mode: PointMode::default(),
            projectile: None,
        }
    }
}

impl LookAtConfig {
    pub fn constraint(&self, bone: &str) -> Constraint {
        self.constraints
            .get(bone)
            .copied()
            .unwrap_or_else(fallback_constraint)
    }

    pub fn forward_dir(&self, bone: &str) -> DVec3 {
        self.forward_dirs
            .get(bone)
            .copied()
            .unwrap_or(DVec3::new(0.0, 0.0, -1.0))
    }

    pub fn up_blend_weight(&self, bone: &str) -> f64 {
        self.up_blend_weights.get(bone).copied().unwrap_or(1.0)
    }

    pub fn blend_ratio(&self, bone: &str) -> DVec3 {
        self.blend_ratios.get(bone).copied().unwrap_or(DVec3::ZERO)
    }

    /// True when any bone blends the original motion back in.
    pub fn needs_blend(&self) -> bool {
        self.blend_ratios.values().any(|r| r.max_element() > 0.0)
    }

    /// Tilts a bone's forward vector down by `degrees`, keeping unit depth.
    pub fn set_pitch_trim(&mut self, bone: &str, degrees: f64) {
        let forward = DVec3::new(0.0, -degrees.to_radians().tan(), -1.0);
        self.forward_dirs.insert(bone.to_string(), forward);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bones_fall_back_to_wide_limits() {
        let config = LookAtConfig::default();
        let constraint = config.constraint("左腕");
        assert!((constraint.limits.x.to_degrees() - 179.0).abs() < 1e-9);
        assert_eq!(constraint.scale.z, 0.5);
    }

    #[test]
    fn eyes_never_roll_by_default() {
        let config = LookAtConfig::default();
        assert_eq!(config.constraint("両目").scale.z, 0.0);
        assert_eq!(config.constraint("両目").limits.z, 0.0);
    }

    #[test]
    fn empty_ranges_cover_everything() {
        let ranges = FrameRanges::default();
        assert!(ranges.contains(0));
        assert!(ranges.contains(u32::MAX));
        let bounded = FrameRanges::new(vec![(10, 20), (40, 50)]);
        assert!(bounded.contains(20));
        assert!(bounded.contains(40));
        assert!(!bounded.contains(30));
    }

    #[test]
    fn pitch_trim_tilts_the_forward_vector() {
        let mut config = LookAtConfig::default();
        config.set_pitch_trim("頭", 45.0);
        let forward = config.forward_dir("頭");
        assert!((forward.y + 1.0).abs() < 1e-9);
        assert_eq!(forward.z, -1.0);
    }

    #[test]
    fn blending_is_off_until_a_ratio_is_set() {
        let mut config = LookAtConfig::default();
        assert!(!config.needs_blend());
        config.blend_ratios.insert("首".to_string(), DVec3::ZERO);
        assert!(!config.needs_blend());
        config.blend_ratios.insert("頭".to_string(), DVec3::new(0.0, 0.5, 0.0));
        assert!(config.needs_blend());
    }
}
