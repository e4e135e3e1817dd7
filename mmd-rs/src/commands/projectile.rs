//! Projectile commands: ballistic turret aiming and batch task lists.
//!
//! Each solved shot yields a bullet motion written as
//! `{bone}_{fire}_{end}.vmd` next to the output (or under `--bullets-dir`).
//! The `turret` batch driver additionally merges every bullet file in that
//! directory into one motion per turret bone.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rayon::prelude::*;
use serde::Deserialize;

use mmd_rig::{
    BulletMotion, LookAtConfig, LookAtSolver, LookTarget, PointMode, Projection,
    ProjectileConfig, Tracking,
};
use mmd_vmd::Motion;

use super::trace::{open_model, open_motion, write_output};

#[derive(Args)]
pub struct ProjectileArgs {
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

    /// Turret chain bone to overwrite, root to leaf (repeatable)
    #[arg(long = "bone", required = true, action = clap::ArgAction::Append)]
    pub bones: Vec<String>,

    /// Frames at which shots are fired
    #[arg(long = "fire", num_args = 1..)]
    pub fire: Vec<u32>,

    /// Bone of the target model to aim at
    #[arg(long = "target-bone", default_value = "センター")]
    pub target_bone: String,

    /// Muzzle speed, model units per frame
    #[arg(long, default_value_t = 8.0)]
    pub velocity: f64,

    /// Flight time for on-time projection, frames
    #[arg(long = "collision-time", default_value_t = 60.0)]
    pub collision_time: f64,

    /// L: aim straight between shots, P: hold the launch elevation
    #[arg(long, default_value = "L", value_parser = parse_tracking)]
    pub tracking: Tracking,

    /// A: earliest interception at muzzle speed, T: fixed flight time
    #[arg(long, default_value = "A", value_parser = parse_projection)]
    pub projection: Projection,

    /// Emit visibility toggles with each bullet motion
    #[arg(long = "export-showik")]
    pub export_show_ik: bool,

    /// Directory for bullet motions (defaults to the output's directory)
    #[arg(long = "bullets-dir")]
    pub bullets_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct TurretArgs {
    /// JSON task list
    #[arg(long)]
    pub config: PathBuf,
}

fn parse_tracking(value: &str) -> Result<Tracking, String> {
    match value {
        "L" | "l" | "line" => Ok(Tracking::Line),
        "P" | "p" | "parabola" => Ok(Tracking::Parabola),
        other => Err(format!("expected L or P, got {other}")),
    }
}

fn parse_projection(value: &str) -> Result<Projection, String> {
    match value {
        "A" | "a" | "asap" => Ok(Projection::Asap),
        "T" | "t" | "ontime" => Ok(Projection::OnTime),
        other => Err(format!("expected A or T, got {other}")),
    }
}

/// One resolved turret job, shared by the single-shot command and the
/// batch driver.
struct ShotTask {
    model: PathBuf,
    motion: PathBuf,
    target_model: PathBuf,
    target_motion: PathBuf,
    output: PathBuf,
    bones: Vec<String>,
    target_bone: String,
    projectile: ProjectileConfig,
    bullets_dir: PathBuf,
}

pub fn execute(args: &ProjectileArgs) -> Result<()> {
    let task = ShotTask {
        model: args.model.clone(),
        motion: args.motion.clone(),
        target_model: args.target_model.clone(),
        target_motion: args.target_motion.clone(),
        output: args.output.clone(),
        bones: args.bones.clone(),
        target_bone: args.target_bone.clone(),
        projectile: ProjectileConfig {
            muzzle_speed: args.velocity,
            collision_time: args.collision_time,
            tracking: args.tracking,
            projection: args.projection,
            export_show_ik: args.export_show_ik,
            fire_frames: args.fire.clone(),
        },
        bullets_dir: bullets_dir_for(args.bullets_dir.as_deref(), &args.output),
    };
    run_task(&task)?;
    Ok(())
}

/// JSON task list for the batch driver.
#[derive(Debug, Deserialize)]
struct TaskList {
    tasks: Vec<Task>,
    /// Shared bullet directory; per-task outputs' directories otherwise.
    #[serde(default)]
    bullets_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Task {
    model: PathBuf,
    motion: PathBuf,
    target_model: PathBuf,
    target_motion: PathBuf,
    output: PathBuf,
    bones: Vec<String>,
    #[serde(default)]
    fire: Vec<u32>,
    #[serde(default)]
    target_bone: Option<String>,
    #[serde(default)]
    velocity: Option<f64>,
    #[serde(default)]
    collision_time: Option<f64>,
    #[serde(default)]
    tracking: Option<String>,
    #[serde(default)]
    projection: Option<String>,
    #[serde(default)]
    export_show_ik: bool,
}

impl Task {
    fn resolve(&self, shared_dir: Option<&Path>) -> Result<ShotTask> {
        let defaults = ProjectileConfig::default();
        Ok(ShotTask {
            model: self.model.clone(),
            motion: self.motion.clone(),
            target_model: self.target_model.clone(),
            target_motion: self.target_motion.clone(),
            output: self.output.clone(),
            bones: self.bones.clone(),
            target_bone: self
                .target_bone
                .clone()
                .unwrap_or_else(|| "センター".to_string()),
            projectile: ProjectileConfig {
                muzzle_speed: self.velocity.unwrap_or(defaults.muzzle_speed),
                collision_time: self.collision_time.unwrap_or(defaults.collision_time),
                tracking: match &self.tracking {
                    Some(value) => parse_tracking(value).map_err(anyhow::Error::msg)?,
                    None => Tracking::default(),
                },
                projection: match &self.projection {
                    Some(value) => parse_projection(value).map_err(anyhow::Error::msg)?,
                    None => Projection::default(),
                },
                export_show_ik: self.export_show_ik,
                fire_frames: self.fire.clone(),
            },
            bullets_dir: bullets_dir_for(shared_dir, &self.output),
        })
    }
}

pub fn execute_turret(args: &TurretArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read task list {}", args.config.display()))?;
    let list: TaskList = serde_json::from_str(&text)
        .with_context(|| format!("malformed task list {}", args.config.display()))?;

    let tasks = list
        .tasks
        .iter()
        .map(|t| t.resolve(list.bullets_dir.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    log::info!("running {} turret tasks", tasks.len());

    tasks
        .par_iter()
        .map(run_task)
        .collect::<Result<Vec<_>>>()?;

    // merge everything fired at the configured frames, bone by bone
    let fires: BTreeSet<u32> = tasks
        .iter()
        .flat_map(|t| t.projectile.fire_frames.iter().copied())
        .collect();
    let bones: BTreeSet<&str> = tasks
        .iter()
        .flat_map(|t| t.bones.iter().map(String::as_str))
        .collect();
    let dirs: BTreeSet<&Path> = tasks.iter().map(|t| t.bullets_dir.as_path()).collect();
    for dir in dirs {
        merge_bullets(dir, &bones, &fires)?;
    }
    Ok(())
}

fn bullets_dir_for(explicit: Option<&Path>, output: &Path) -> PathBuf {
    explicit.map_or_else(
        || {
            output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        },
        Path::to_path_buf,
    )
}

fn run_task(task: &ShotTask) -> Result<Vec<BulletMotion>> {
    let mut config = LookAtConfig::default();
    config.overwrite_bones = task.bones.clone();
    config.point_mode = PointMode::Arm;
    config.projectile = Some(task.projectile.clone());

    let model = open_model(&task.model)?;
    let motion = open_motion(&task.motion)?;
    let target_model = open_model(&task.target_model)?;
    let target_motion = open_motion(&task.target_motion)?;

    let solver = LookAtSolver::new(
        model.bones,
        &motion.bones,
        LookTarget::Model {
            bones: target_model.bones,
            motion: target_motion.bones,
            bone: task.target_bone.clone(),
        },
        config.clone(),
    )?;
    let result = solver.solve();

    std::fs::create_dir_all(&task.bullets_dir)
        .with_context(|| format!("failed to create {}", task.bullets_dir.display()))?;
    for bullet in &result.bullets {
        write_bullet(&task.bullets_dir, bullet)?;
    }
    write_output(
        motion,
        &config.overwrite_bones,
        result.bone_frames,
        &task.output,
    )?;
    Ok(result.bullets)
}

pub fn bullet_file_name(bullet: &BulletMotion) -> String {
    format!(
        "{}_{}_{}.vmd",
        bullet.bone, bullet.fire_frame, bullet.end_frame
    )
}

/// Splits a `{bone}_{fire}_{end}` file stem back into its parts. Bone
/// names may themselves contain underscores.
pub fn parse_bullet_file_name(stem: &str) -> Option<(&str, u32, u32)> {
    let mut parts = stem.rsplitn(3, '_');
    let end = parts.next()?.parse().ok()?;
    let fire = parts.next()?.parse().ok()?;
    let bone = parts.next()?;
    if bone.is_empty() {
        return None;
    }
    Some((bone, fire, end))
}

fn write_bullet(dir: &Path, bullet: &BulletMotion) -> Result<PathBuf> {
    let mut motion = Motion::new(&bullet.bone);
    motion.bones = bullet.frames.clone();
    motion.show_ik = bullet.show_ik.clone();
    let path = dir.join(bullet_file_name(bullet));
    motion
        .save(&path)
        .with_context(|| format!("failed to write bullet {}", path.display()))?;
    log::debug!("wrote bullet {}", path.display());
    Ok(path)
}

/// Merges every bullet file in `dir` whose bone and fire frame are in the
/// given sets into one `{bone}.vmd` per bone.
fn merge_bullets(dir: &Path, bones: &BTreeSet<&str>, fires: &BTreeSet<u32>) -> Result<()> {
    let mut merged: BTreeMap<String, Motion> = BTreeMap::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("vmd") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((bone, fire, _end)) = parse_bullet_file_name(stem) else {
            continue;
        };
        if !bones.contains(bone) || !fires.contains(&fire) {
            continue;
        }
        let bullet = open_motion(&path)?;
        let slot = merged
            .entry(bone.to_string())
            .or_insert_with(|| Motion::new(bone));
        slot.bones.extend(bullet.bones);
        slot.show_ik.extend(bullet.show_ik);
    }
    for (bone, mut motion) in merged {
        motion.bones.sort_by_key(|f| f.frame);
        motion.show_ik.sort_by_key(|f| f.frame);
        let path = dir.join(format!("{bone}.vmd"));
        motion
            .save(&path)
            .with_context(|| format!("failed to write merged bullet {}", path.display()))?;
        log::info!("merged {} bullet frames into {}", motion.bones.len(), path.display());
    }
    Ok(())
}
