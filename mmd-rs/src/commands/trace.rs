//! Look-at trace commands: rewrite a face chain to follow a camera or
//! another model's bone.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use glam::DVec3;

use mmd_pmx::{Bone, Model};
use mmd_rig::{
    Constraint, FrameRanges, LookAtConfig, LookAtSolver, LookTarget, copy_position_axes,
};
use mmd_vmd::{BoneFrame, Motion};

/// The eye-pivot bone most standard models carry.
const EYES_BONE: &str = "両目";
const RIGHT_EYE_BONE: &str = "右目";

/// Solver options shared by the trace variants.
#[derive(Args, Clone, Debug)]
pub struct SolverArgs {
    /// Overwrite only the eye bone
    #[arg(long)]
    pub eyes_only: bool,

    /// Angular speed limit after a camera cut, degrees per frame
    #[arg(long, default_value_t = 4.5)]
    pub omega: f64,

    /// Horizontal angle beyond which the target counts as behind the
    /// body, degrees (zero disables)
    #[arg(long, default_value_t = 140.0)]
    pub ignore: f64,

    /// Override a bone constraint: limits in degrees, then per-axis scales
    #[arg(
        long,
        num_args = 7,
        value_names = ["NAME", "X", "Y", "Z", "SX", "SY", "SZ"],
        action = clap::ArgAction::Append
    )]
    pub constraint: Vec<String>,

    /// Extra frames to solve beyond the keyframe events
    #[arg(long = "add-frames", num_args = 1..)]
    pub add_frames: Vec<u32>,

    /// Solve only inside this inclusive frame range (repeatable)
    #[arg(
        long = "frame-range",
        num_args = 2,
        value_names = ["FROM", "TO"],
        action = clap::ArgAction::Append
    )]
    pub frame_range: Vec<u32>,

    /// Blend the original rotation back in: per-axis ratios for a bone
    #[arg(
        long = "vmd-blend",
        num_args = 4,
        value_names = ["NAME", "X", "Y", "Z"],
        action = clap::ArgAction::Append
    )]
    pub vmd_blend: Vec<String>,

    /// Rest forward vector for a bone
    #[arg(
        long = "forward-dir",
        num_args = 4,
        value_names = ["NAME", "X", "Y", "Z"],
        allow_negative_numbers = true,
        action = clap::ArgAction::Append
    )]
    pub forward_dir: Vec<String>,

    /// Tilt a bone's forward vector down by this many degrees
    #[arg(
        long = "pitch-trim",
        num_args = 2,
        value_names = ["NAME", "DEGREES"],
        action = clap::ArgAction::Append
    )]
    pub pitch_trim: Vec<String>,

    /// Scale on the blended-in pitch when it points down
    #[arg(
        long = "up-blend-weight",
        num_args = 2,
        value_names = ["NAME", "WEIGHT"],
        action = clap::ArgAction::Append
    )]
    pub up_blend_weight: Vec<String>,

    /// Aim the chain's end bone at the target instead of each pivot
    #[arg(long)]
    pub near: bool,

    /// Solve each overwritten bone in its own pass; non-leaf bones then
    /// only move on their own original keyframes
    #[arg(long = "per-bone")]
    pub per_bone: bool,
}

impl SolverArgs {
    pub fn build_config(&self) -> Result<LookAtConfig> {
        let mut config = LookAtConfig::default();
        if self.eyes_only {
            config.overwrite_bones = vec![EYES_BONE.to_string()];
        }
        config.omega_limit = self.omega.to_radians();
        config.ignore_zone = self.ignore.to_radians();
        config.additional_frames = self.add_frames.clone();
        config.near_mode = self.near;
        if !self.frame_range.is_empty() {
            let ranges = self
                .frame_range
                .chunks_exact(2)
                .map(|pair| (pair[0], pair[1]))
                .collect();
            config.frame_ranges = FrameRanges::new(ranges);
        }
        for group in self.constraint.chunks_exact(7) {
            let values = parse_numbers(&group[1..], "--constraint")?;
            config.constraints.insert(
                group[0].clone(),
                Constraint::from_degrees(
                    DVec3::new(values[0], values[1], values[2]),
                    DVec3::new(values[3], values[4], values[5]),
                ),
            );
        }
        for group in self.vmd_blend.chunks_exact(4) {
            let values = parse_numbers(&group[1..], "--vmd-blend")?;
            config
                .blend_ratios
                .insert(group[0].clone(), DVec3::new(values[0], values[1], values[2]));
        }
        for group in self.forward_dir.chunks_exact(4) {
            let values = parse_numbers(&group[1..], "--forward-dir")?;
            config
                .forward_dirs
                .insert(group[0].clone(), DVec3::new(values[0], values[1], values[2]));
        }
        for group in self.pitch_trim.chunks_exact(2) {
            let degrees = parse_numbers(&group[1..], "--pitch-trim")?[0];
            config.set_pitch_trim(&group[0], degrees);
        }
        for group in self.up_blend_weight.chunks_exact(2) {
            let weight = parse_numbers(&group[1..], "--up-blend-weight")?[0];
            config.up_blend_weights.insert(group[0].clone(), weight);
        }
        Ok(config)
    }
}

fn parse_numbers(values: &[String], flag: &str) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.parse::<f64>()
                .with_context(|| format!("{flag}: not a number: {v}"))
        })
        .collect()
}

#[derive(Args)]
pub struct TraceCameraArgs {
    /// Watcher model (PMX)
    pub model: PathBuf,

    /// Watcher motion (VMD)
    pub motion: PathBuf,

    /// Camera motion to track (VMD)
    pub camera: PathBuf,

    /// Output motion (VMD)
    pub output: PathBuf,

    #[command(flatten)]
    pub solver: SolverArgs,
}

#[derive(Args)]
pub struct TraceModelArgs {
    /// Watcher model (PMX)
    pub model: PathBuf,

    /// Watcher motion (VMD)
    pub motion: PathBuf,

    /// Target model (PMX)
    pub target_model: PathBuf,

    /// Target motion (VMD)
    pub target_motion: PathBuf,

    /// Output motion (VMD)
    pub output: PathBuf,

    /// Bone of the target model to track
    #[arg(long = "target-bone", default_value = EYES_BONE)]
    pub target_bone: String,

    #[command(flatten)]
    pub solver: SolverArgs,
}

pub fn execute_camera(args: &TraceCameraArgs) -> Result<()> {
    let config = args.solver.build_config()?;
    let mut model = open_model(&args.model)?;
    let motion = open_motion(&args.motion)?;
    let camera = open_motion(&args.camera)?;
    if !camera.is_camera_motion() {
        log::warn!(
            "{} does not carry the camera model name",
            args.camera.display()
        );
    }

    lower_eye_pivot(&mut model.bones, &[1]);
    let solver = LookAtSolver::new(
        model.bones,
        &motion.bones,
        LookTarget::Camera(camera.cameras),
        config.clone(),
    )?;
    let result = run(solver, args.solver.per_bone);
    write_output(motion, &config.overwrite_bones, result, &args.output)
}

pub fn execute_model(args: &TraceModelArgs) -> Result<()> {
    let config = args.solver.build_config()?;
    let mut model = open_model(&args.model)?;
    let motion = open_motion(&args.motion)?;
    let mut target_model = open_model(&args.target_model)?;
    let target_motion = open_motion(&args.target_motion)?;

    lower_eye_pivot(&mut model.bones, &[1]);
    if args.target_bone == EYES_BONE {
        // targets also borrow the depth, so the aim point is the eyeball
        lower_eye_pivot(&mut target_model.bones, &[1, 2]);
    }
    let solver = LookAtSolver::new(
        model.bones,
        &motion.bones,
        LookTarget::Model {
            bones: target_model.bones,
            motion: target_motion.bones,
            bone: args.target_bone.clone(),
        },
        config.clone(),
    )?;
    let result = run(solver, args.solver.per_bone);
    write_output(motion, &config.overwrite_bones, result, &args.output)
}

fn run(solver: LookAtSolver, per_bone: bool) -> Vec<BoneFrame> {
    let result = if per_bone {
        solver.solve_per_bone()
    } else {
        solver.solve()
    };
    result.bone_frames
}

pub fn open_model(path: &Path) -> Result<Model> {
    Model::open(path).with_context(|| format!("failed to read model {}", path.display()))
}

pub fn open_motion(path: &Path) -> Result<Motion> {
    Motion::open(path).with_context(|| format!("failed to read motion {}", path.display()))
}

/// Moves the 両目 pivot from its forehead handle down to where the eyes
/// sit, borrowing the listed axes from 右目. Models without the standard
/// eye bones are left alone.
fn lower_eye_pivot(bones: &mut [Bone], axes: &[usize]) {
    if let Err(err) = copy_position_axes(bones, EYES_BONE, RIGHT_EYE_BONE, axes) {
        log::debug!("eye pivot fixup skipped: {err}");
    }
}

/// Replaces the overwritten bones' keyframes with the solved ones and
/// writes the motion.
pub fn write_output(
    mut motion: Motion,
    overwrite_bones: &[String],
    frames: Vec<BoneFrame>,
    path: &Path,
) -> Result<()> {
    motion.bones.retain(|f| !overwrite_bones.contains(&f.name));
    motion.bones.extend(frames);
    motion.remove_redundant_bone_frames();
    motion
        .save(path)
        .with_context(|| format!("failed to write motion {}", path.display()))?;
    log::info!("wrote {} ({} bone frames)", path.display(), motion.bones.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        solver: SolverArgs,
    }

    fn parse(args: &[&str]) -> SolverArgs {
        Harness::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .unwrap()
            .solver
    }

    #[test]
    fn defaults_match_the_library() {
        let config = parse(&[]).build_config().unwrap();
        assert_eq!(config.overwrite_bones, ["首", "頭", "両目"]);
        assert!((config.omega_limit - 4.5_f64.to_radians()).abs() < 1e-12);
        assert!((config.ignore_zone - 140.0_f64.to_radians()).abs() < 1e-12);
        assert!(!config.near_mode);
    }

    #[test]
    fn eyes_only_narrows_the_chain() {
        let config = parse(&["--eyes-only"]).build_config().unwrap();
        assert_eq!(config.overwrite_bones, ["両目"]);
    }

    #[test]
    fn constraint_flag_overrides_one_bone() {
        let config = parse(&[
            "--constraint", "頭", "15", "25", "5", "1", "1", "0.5",
        ])
        .build_config()
        .unwrap();
        let constraint = config.constraint("頭");
        assert!((constraint.limits.x.to_degrees() - 15.0).abs() < 1e-9);
        assert_eq!(constraint.scale.z, 0.5);
        // other defaults survive
        assert!((config.constraint("首").limits.x.to_degrees() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn frame_ranges_and_extra_frames() {
        let config = parse(&[
            "--frame-range", "10", "20",
            "--frame-range", "40", "50",
            "--add-frames", "5", "45",
        ])
        .build_config()
        .unwrap();
        assert!(config.frame_ranges.contains(15));
        assert!(!config.frame_ranges.contains(30));
        assert_eq!(config.additional_frames, vec![5, 45]);
    }

    #[test]
    fn blend_and_trim_flags() {
        let config = parse(&[
            "--vmd-blend", "頭", "0", "0.5", "0",
            "--pitch-trim", "頭", "45",
            "--up-blend-weight", "頭", "0.3",
        ])
        .build_config()
        .unwrap();
        assert!(config.needs_blend());
        assert!((config.forward_dir("頭").y + 1.0).abs() < 1e-9);
        assert!((config.up_blend_weight("頭") - 0.3).abs() < 1e-12);
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert!(parse(&["--pitch-trim", "頭", "down"]).build_config().is_err());
    }
}
