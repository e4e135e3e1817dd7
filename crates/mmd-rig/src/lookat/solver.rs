//! The look-at solver.
//!
//! Replaces the rotations of a chain of bones so it tracks a target: the
//! camera, a bone of another motion, or a fixed point. The solver walks an
//! event queue of every frame where anything of interest moves, resolves
//! the watcher's pose there, and emits replacement keyframes honoring the
//! configured constraints, ignore zone and camera-cut delay.

use std::collections::{BTreeSet, HashMap};

use glam::{DQuat, DVec3, Vec3};

use mmd_pmx::{Bone, BoneFlags, TailPosition, transform_order};
use mmd_vmd::{BoneCurves, BoneFrame, CameraFrame};

use crate::camera::CameraMotion;
use crate::error::{Result, RigError};
use crate::math;
use crate::projectile::{self, BulletMotion};
use crate::transform::{BoneTransforms, CENTER_BONE, Placement, compose_global};

use super::config::{LookAtConfig, PointMode, Projection, Tracking};
use super::queue::{EventKinds, EventQueue};

/// What the overwritten chain tracks.
pub enum LookTarget {
    /// A fixed model-space point.
    Fixed(DVec3),
    /// The camera of a camera motion.
    Camera(Vec<CameraFrame>),
    /// A bone of another model's motion.
    Model {
        bones: Vec<Bone>,
        motion: Vec<BoneFrame>,
        bone: String,
    },
}

#[derive(Debug)]
enum TargetState {
    Fixed(DVec3),
    Camera(CameraMotion),
    Model {
        transforms: BoneTransforms,
        bone: usize,
    },
}

/// Output of a solver run.
#[derive(Debug, Default)]
pub struct LookAtResult {
    /// Replacement keyframes for the overwritten bones.
    pub bone_frames: Vec<BoneFrame>,
    /// Bullet motions for projectile chains, one per shot per leaf.
    pub bullets: Vec<BulletMotion>,
}

#[derive(Debug)]
pub struct LookAtSolver {
    config: LookAtConfig,
    watcher: BoneTransforms,
    target: TargetState,
    /// Overwritten bones in evaluation order.
    overwrite_indexes: Vec<usize>,
    base_dirs: HashMap<usize, DVec3>,
    center: Option<usize>,
    queue: EventQueue,
    prev_rotations: HashMap<usize, DQuat>,
    prev_frame: Option<u32>,
    bullets: Vec<BulletMotion>,
}

impl LookAtSolver {
    /// Binds the watcher model and motion to a target.
    ///
    /// Fails when an overwritten bone is missing, sits at the root of the
    /// transform graph, or uses local-axis inheritance.
    pub fn new(
        bones: Vec<Bone>,
        motion: &[BoneFrame],
        target: LookTarget,
        config: LookAtConfig,
    ) -> Result<Self> {
        let watcher = BoneTransforms::new(bones, motion, &config.overwrite_bones, true)?;
        let mut overwrite_indexes = Vec::with_capacity(config.overwrite_bones.len());
        for name in &config.overwrite_bones {
            let index = watcher
                .bone_index(name)
                .ok_or_else(|| RigError::BoneNotFound { name: name.clone() })?;
            if watcher.graph().in_degree(index) == 0 {
                return Err(RigError::RootOverwriteBone { name: name.clone() });
            }
            overwrite_indexes.push(index);
        }
        let overwrite_indexes = transform_order(&overwrite_indexes, watcher.bones());

        let base_dirs = match config.point_mode {
            PointMode::Face => overwrite_indexes
                .iter()
                .map(|&i| (i, config.forward_dir(&watcher.bones()[i].name)))
                .collect(),
            PointMode::Arm => arm_base_dirs(&watcher, &overwrite_indexes),
        };

        let target = match target {
            LookTarget::Fixed(point) => TargetState::Fixed(point),
            LookTarget::Camera(frames) => TargetState::Camera(CameraMotion::new(frames)),
            LookTarget::Model {
                bones,
                motion,
                bone,
            } => {
                let transforms =
                    BoneTransforms::new(bones, &motion, std::slice::from_ref(&bone), true)?;
                let index = transforms
                    .bone_index(&bone)
                    .ok_or_else(|| RigError::BoneNotFound { name: bone.clone() })?;
                TargetState::Model {
                    transforms,
                    bone: index,
                }
            }
        };

        let center = watcher
            .bone_index(CENTER_BONE)
            .filter(|&i| watcher.graph().contains(i));
        Ok(Self {
            config,
            watcher,
            target,
            overwrite_indexes,
            base_dirs,
            center,
            queue: EventQueue::new(),
            prev_rotations: HashMap::new(),
            prev_frame: None,
            bullets: Vec::new(),
        })
    }

    /// Runs the solver, walking every queued frame once.
    pub fn solve(mut self) -> LookAtResult {
        self.seed_queue();
        log::debug!("solving {} queued events", self.queue.len());
        let mut out: Vec<BoneFrame> = Vec::new();
        while let Some(event) = self.queue.pop_frame() {
            let frame = event.frame;
            if !self.config.frame_ranges.contains(frame) {
                if event.kinds.contains(EventKinds::OVERWRITE) {
                    self.copy_original_frames(frame, &mut out);
                }
                continue;
            }
            // an overwrite keyframe alone changes nothing the solver tracks
            if event.kinds == EventKinds::OVERWRITE && !self.config.needs_blend() {
                continue;
            }

            let (target_pos, target_v, watcher_v) = self.frame_context(frame);
            let Some(frames) =
                self.make_look_at_frames(frame, event.kinds, target_pos, target_v, watcher_v)
            else {
                // ignore zone: leave the frame to the surrounding motion
                continue;
            };

            let delayed = event.kinds.contains(EventKinds::CUT)
                && self.config.omega_limit > 0.0
                && matches!(self.target, TargetState::Camera(_))
                && self.delay_after_cut(frame, &frames);
            if !delayed {
                self.record_prev(frame, &frames);
                out.extend(frames);
            }
            self.watcher.delete(frame);
            if let TargetState::Model { transforms, .. } = &mut self.target {
                transforms.delete(frame);
            }
        }
        LookAtResult {
            bone_frames: out,
            bullets: self.bullets,
        }
    }

    /// Runs the solver with an independent pass per overwritten bone.
    ///
    /// Non-leaf bones only move on their own original keyframes, keeping
    /// the body's rhythm; leaves re-aim at every event. A frame one pass
    /// finds inside the ignore zone is skipped by every later pass.
    pub fn solve_per_bone(mut self) -> LookAtResult {
        self.seed_queue();
        let template = std::mem::take(&mut self.queue);
        let mut ignored: BTreeSet<u32> = BTreeSet::new();
        let mut touched: BTreeSet<u32> = BTreeSet::new();
        let mut out: Vec<BoneFrame> = Vec::new();
        for &index in &self.overwrite_indexes.clone() {
            self.queue = template.clone();
            let is_leaf = self.watcher.leaf_indexes().contains(&index);
            while let Some(mut event) = self.queue.pop_frame() {
                let frame = event.frame;
                if ignored.contains(&frame) {
                    event.kinds |= EventKinds::IGNORE;
                }
                if !self.config.frame_ranges.contains(frame) {
                    if event.kinds.contains(EventKinds::OVERWRITE) {
                        if let Some(original) = self.watcher.keyframe(frame, index) {
                            out.push(original.clone());
                        }
                    }
                    continue;
                }
                if !is_leaf && !self.watcher.has_keyframe(frame, index) {
                    continue;
                }
                if event.kinds.contains(EventKinds::IGNORE) {
                    continue;
                }
                let (target_pos, target_v, watcher_v) = self.frame_context(frame);
                match self.get_rotation(frame, event.kinds, index, target_pos, target_v, watcher_v)
                {
                    Some(rotation) => {
                        self.watcher
                            .resolve_with(frame, index, Placement::new(rotation, DVec3::ZERO));
                        out.push(self.bone_frame(frame, index, rotation));
                        touched.insert(frame);
                    }
                    None => {
                        ignored.insert(frame);
                    }
                }
            }
        }
        for &frame in &touched {
            self.watcher.delete(frame);
            if let TargetState::Model { transforms, .. } = &mut self.target {
                transforms.delete(frame);
            }
        }
        out.sort_by(|a, b| a.frame.cmp(&b.frame).then_with(|| a.name.cmp(&b.name)));
        LookAtResult {
            bone_frames: out,
            bullets: self.bullets,
        }
    }

    fn seed_queue(&mut self) {
        for &index in self.watcher.transform_indexes() {
            let kind = if self.overwrite_indexes.contains(&index) {
                EventKinds::OVERWRITE
            } else {
                EventKinds::BONE
            };
            for &frame in self.watcher.keys(index) {
                self.queue.push(frame, kind);
            }
        }
        match &self.target {
            TargetState::Fixed(_) => {}
            TargetState::Camera(camera) => {
                let keys = camera.keys();
                for (i, &frame) in keys.iter().enumerate() {
                    let kind = if i > 0 && keys[i - 1] + 1 == frame {
                        EventKinds::CUT
                    } else {
                        EventKinds::CAMERA
                    };
                    self.queue.push(frame, kind);
                }
            }
            TargetState::Model { transforms, .. } => {
                for &index in transforms.transform_indexes() {
                    for &frame in transforms.keys(index) {
                        self.queue.push(frame, EventKinds::BONE);
                    }
                }
            }
        }
        for &frame in &self.config.additional_frames {
            self.queue.push(frame, EventKinds::USER);
        }
        if let Some(ballistics) = &self.config.projectile {
            for &frame in &ballistics.fire_frames {
                self.queue.push(frame, EventKinds::FIRE);
            }
        }
    }

    /// Target position and, when ballistics need them, per-frame velocities
    /// of the target and the watcher's center toward the next queued frame.
    fn frame_context(&mut self, frame: u32) -> (DVec3, DVec3, DVec3) {
        let target_pos = self.target_position(frame);
        if self.config.projectile.is_none() {
            return (target_pos, DVec3::ZERO, DVec3::ZERO);
        }
        match self.queue.peek_frame() {
            Some(next) if next > frame => {
                let span = f64::from(next - frame);
                let target_next = self.target_position(next);
                let center = self.center_position(frame);
                let center_next = self.center_position(next);
                (
                    target_pos,
                    (target_next - target_pos) / span,
                    (center_next - center) / span,
                )
            }
            _ => (target_pos, DVec3::ZERO, DVec3::ZERO),
        }
    }

    fn target_position(&mut self, frame: u32) -> DVec3 {
        match &mut self.target {
            TargetState::Fixed(point) => *point,
            TargetState::Camera(camera) => camera.position(frame),
            TargetState::Model { transforms, bone } => transforms
                .resolve(frame, *bone)
                .map_or(DVec3::ZERO, |r| r.global.position),
        }
    }

    fn center_position(&mut self, frame: u32) -> DVec3 {
        match self.center {
            Some(index) => self
                .watcher
                .resolve(frame, index)
                .map_or(DVec3::ZERO, |r| r.global.position),
            None => DVec3::ZERO,
        }
    }

    /// Keyframes for every overwritten bone at one frame, committing each
    /// override so children see their parents' new pose. `None` when any
    /// bone lands in the ignore zone.
    fn make_look_at_frames(
        &mut self,
        frame: u32,
        kinds: EventKinds,
        target_pos: DVec3,
        target_v: DVec3,
        watcher_v: DVec3,
    ) -> Option<Vec<BoneFrame>> {
        let indexes = self.overwrite_indexes.clone();
        let mut frames = Vec::with_capacity(indexes.len());
        for index in indexes {
            let rotation = self.get_rotation(frame, kinds, index, target_pos, target_v, watcher_v)?;
            self.watcher
                .resolve_with(frame, index, Placement::new(rotation, DVec3::ZERO))?;
            frames.push(self.bone_frame(frame, index, rotation));
        }
        if self.config.needs_blend() {
            frames = self.blend(frame, kinds, frames, target_pos, target_v, watcher_v);
        }
        Some(frames)
    }

    /// The replacement rotation for one bone at one frame.
    fn get_rotation(
        &mut self,
        frame: u32,
        kinds: EventKinds,
        index: usize,
        target_pos: DVec3,
        target_v: DVec3,
        watcher_v: DVec3,
    ) -> Option<DQuat> {
        let parent = self.watcher.graph().predecessors(index).next()?;
        let parent_resolved = self.watcher.resolve(frame, parent)?;
        let additional = self.watcher.additional_placement(frame, index);
        let rest = self.watcher.rest_position(index);
        let parent_rest = self.watcher.rest_position(parent);
        // the bone's pivot with its own local rotation zeroed out
        let pivot = compose_global(
            rest,
            parent_rest,
            parent_resolved.global,
            Placement::IDENTITY,
            additional,
        );
        let forward = self.base_dirs[&index];
        let base_dir = math::rotate(forward, parent_resolved.global.rotation);

        let mut look_target = target_pos;
        if self.config.near_mode {
            look_target += self.near_offset(index, pivot.rotation);
        }
        let look_dir = look_target - pivot.position;

        let (name, is_fixed, fixed_axis) = {
            let bone = &self.watcher.bones()[index];
            (
                bone.name.clone(),
                bone.flags.contains(BoneFlags::AXIS_IS_FIXED),
                bone.fixed_axis,
            )
        };

        if is_fixed {
            let axis = fixed_axis.map_or(DVec3::Y, |a| a.as_dvec3());
            let up = math::rotate(axis, parent_resolved.global.rotation);
            let ballistic = self
                .config
                .projectile
                .as_ref()
                .is_some_and(|p| kinds.contains(EventKinds::FIRE) || p.tracking == Tracking::Parabola);
            if !ballistic {
                let limit = self.config.constraint(&name).limits.x;
                let angle = math::look_at_fixed_axis(base_dir, up, look_dir).clamp(-limit, limit);
                return Some(math::axis_angle(axis, angle));
            }
            let (projection, muzzle_speed, collision_time, export_show_ik) = {
                let p = self.config.projectile.as_ref()?;
                (p.projection, p.muzzle_speed, p.collision_time, p.export_show_ik)
            };
            let relative_v = target_v - watcher_v;
            let launch = match projection {
                Projection::Asap => projectile::project_asap(look_dir, relative_v, muzzle_speed),
                Projection::OnTime => {
                    Some(projectile::project_ontime(look_dir, relative_v, collision_time))
                }
            };
            let Some(launch) = launch else {
                // out of reach: hold the bone level, keep the frame
                return Some(DQuat::IDENTITY);
            };
            let angle =
                math::look_at_fixed_axis(base_dir, up, launch.velocity.normalize_or_zero());
            if kinds.contains(EventKinds::FIRE) && self.watcher.leaf_indexes().contains(&index) {
                if let Some(bullet) = projectile::make_bullet_motion(
                    &name,
                    frame,
                    pivot.position,
                    &launch,
                    export_show_ik,
                ) {
                    self.bullets.push(bullet);
                }
            }
            return Some(math::axis_angle(axis, angle));
        }

        if self.in_ignore_zone(base_dir, look_dir) {
            return None;
        }
        let up = math::rotate(
            DVec3::new(0.0, -forward.z, forward.y),
            parent_resolved.global.rotation,
        );
        let angles = math::look_at(base_dir, up, look_dir, self.config.global_up);
        let constraint = self.config.constraint(&name);
        let clamped = math::clamp_euler(angles * constraint.scale, constraint.limits);
        Some(math::euler_to_quaternion(clamped))
    }

    /// Mixes the original motion of non-leaf bones back into the look pose
    /// and re-aims the leaves against the blended parents.
    fn blend(
        &mut self,
        frame: u32,
        kinds: EventKinds,
        frames: Vec<BoneFrame>,
        target_pos: DVec3,
        target_v: DVec3,
        watcher_v: DVec3,
    ) -> Vec<BoneFrame> {
        let first = self.overwrite_indexes[0];
        self.watcher.delete_descendants(frame, first);
        let indexes = self.overwrite_indexes.clone();
        let mut blended = Vec::with_capacity(frames.len());
        for (i, &index) in indexes.iter().enumerate() {
            if self.watcher.leaf_indexes().contains(&index) {
                match self.get_rotation(frame, kinds, index, target_pos, target_v, watcher_v) {
                    Some(rotation) => {
                        self.watcher
                            .resolve_with(frame, index, Placement::new(rotation, DVec3::ZERO));
                        blended.push(self.bone_frame(frame, index, rotation));
                    }
                    None => blended.push(frames[i].clone()),
                }
                continue;
            }
            let name = self.watcher.bones()[index].name.clone();
            let ratio = self.config.blend_ratio(&name);
            let rotation = if ratio.max_element() > 0.0 {
                let mut original = math::quaternion_to_euler(
                    self.watcher.sample_local(frame, index).rotation,
                );
                if original.x > 0.0 {
                    original.x *= self.config.up_blend_weight(&name);
                }
                let look = math::quaternion_to_euler(frames[i].rotation.as_dquat());
                let constraint = self.config.constraint(&name);
                math::euler_to_quaternion(math::clamp_euler(
                    look + original * ratio,
                    constraint.limits,
                ))
            } else {
                frames[i].rotation.as_dquat()
            };
            self.watcher
                .resolve_with(frame, index, Placement::new(rotation, DVec3::ZERO));
            blended.push(self.bone_frame(frame, index, rotation));
        }
        blended
    }

    /// Near mode: shift the aim point by the offset from this bone to the
    /// chain's end, so the end bone converges on the target.
    fn near_offset(&self, index: usize, pivot_rotation: DQuat) -> DVec3 {
        let leaf = self
            .watcher
            .graph()
            .descendant_leaves(index)
            .into_iter()
            .find(|l| self.overwrite_indexes.contains(l));
        let Some(leaf) = leaf else {
            return DVec3::ZERO;
        };
        let offset = self.watcher.rest_position(leaf) - self.watcher.rest_position(index);
        math::rotate(offset, pivot_rotation)
    }

    fn in_ignore_zone(&self, base_dir: DVec3, look_dir: DVec3) -> bool {
        if self.config.ignore_zone <= 0.0 {
            return false;
        }
        let up = self.config.global_up;
        let body = math::project_to_plane(base_dir, up);
        let look = math::project_to_plane(look_dir, up);
        math::angle_between(body, look) > self.config.ignore_zone
    }

    /// True when a camera cut swings the chain faster than the angular
    /// speed limit. Tracking then pauses and resurfaces once the chain
    /// could have turned that far.
    fn delay_after_cut(&mut self, frame: u32, frames: &[BoneFrame]) -> bool {
        let Some(prev_frame) = self.prev_frame else {
            return false;
        };
        let span = f64::from(frame.saturating_sub(prev_frame)).max(1.0);
        let mut max_rotation = 0.0f64;
        for bone_frame in frames {
            let Some(index) = self.watcher.bone_index(&bone_frame.name) else {
                continue;
            };
            let Some(&prev) = self.prev_rotations.get(&index) else {
                continue;
            };
            let d = math::diff(prev, bone_frame.rotation.as_dquat());
            max_rotation = max_rotation.max(d.w.clamp(-1.0, 1.0).acos());
        }
        if max_rotation / span <= self.config.omega_limit {
            return false;
        }
        let resurface = frame + (max_rotation / self.config.omega_limit).ceil() as u32;
        self.queue.drop_before(resurface);
        self.queue.push(resurface, EventKinds::DELAY);
        log::debug!("camera cut at frame {frame}: tracking resurfaces at {resurface}");
        true
    }

    fn record_prev(&mut self, frame: u32, frames: &[BoneFrame]) {
        self.prev_frame = Some(frame);
        for bone_frame in frames {
            if let Some(index) = self.watcher.bone_index(&bone_frame.name) {
                self.prev_rotations
                    .insert(index, bone_frame.rotation.as_dquat());
            }
        }
    }

    /// Out-of-range frames keep the original overwrite keyframes.
    fn copy_original_frames(&self, frame: u32, out: &mut Vec<BoneFrame>) {
        for &index in &self.overwrite_indexes {
            if let Some(original) = self.watcher.keyframe(frame, index) {
                out.push(original.clone());
            }
        }
    }

    fn bone_frame(&self, frame: u32, index: usize, rotation: DQuat) -> BoneFrame {
        BoneFrame {
            name: self.watcher.bones()[index].name.clone(),
            frame,
            position: Vec3::ZERO,
            rotation: rotation.as_quat(),
            interpolation: BoneCurves::linear_block(),
        }
    }
}

/// Base directions for turret chains: each leaf's display-tail direction,
/// shared with its overwritten ancestors.
fn arm_base_dirs(watcher: &BoneTransforms, overwrite: &[usize]) -> HashMap<usize, DVec3> {
    let mut dirs = HashMap::new();
    for &leaf in watcher.leaf_indexes() {
        if !overwrite.contains(&leaf) {
            continue;
        }
        let bone = &watcher.bones()[leaf];
        let dir = match bone.tail {
            TailPosition::Bone(i) if i >= 0 && (i as usize) < watcher.bones().len() => {
                (watcher.bones()[i as usize].position - bone.position).as_dvec3()
            }
            TailPosition::Bone(_) => DVec3::new(0.0, 0.0, -1.0),
            TailPosition::Offset(v) => v.as_dvec3(),
        };
        dirs.insert(leaf, dir);
        let mut node = leaf;
        while let Some(parent) = watcher.graph().predecessors(node).next() {
            if overwrite.contains(&parent) {
                dirs.insert(parent, dir);
            }
            node = parent;
        }
    }
    for &index in overwrite {
        dirs.entry(index).or_insert(DVec3::new(0.0, 0.0, -1.0));
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookat::config::ProjectileConfig;
    use glam::Quat;
    use pretty_assertions::assert_eq;
    use std::f64::consts::PI;

    fn bone(name: &str, parent: i32, position: Vec3, flags: BoneFlags) -> Bone {
        Bone {
            name: name.to_string(),
            name_en: String::new(),
            position,
            parent,
            transform_hierarchy: 0,
            flags,
            tail: TailPosition::Offset(Vec3::ZERO),
            additional: None,
            fixed_axis: None,
            local_axes: None,
            external_parent: None,
            ik: None,
        }
    }

    fn head_model() -> Vec<Bone> {
        let movable = BoneFlags::CAN_ROTATE | BoneFlags::CAN_TRANSLATE;
        vec![
            bone("全ての親", -1, Vec3::ZERO, movable),
            bone("センター", 0, Vec3::new(0.0, 1.0, 0.0), movable),
            bone("首", 1, Vec3::new(0.0, 3.0, 0.0), BoneFlags::CAN_ROTATE),
            bone("頭", 2, Vec3::new(0.0, 4.0, 0.0), BoneFlags::CAN_ROTATE),
            bone("両目", 3, Vec3::new(0.0, 4.5, -0.2), BoneFlags::CAN_ROTATE),
        ]
    }

    fn center_key(frame: u32) -> BoneFrame {
        BoneFrame {
            name: "センター".to_string(),
            frame,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            interpolation: BoneCurves::linear_block(),
        }
    }

    fn head_only_config() -> LookAtConfig {
        LookAtConfig {
            overwrite_bones: vec!["頭".to_string()],
            ..LookAtConfig::default()
        }
    }

    fn solve_fixed(target: DVec3, config: LookAtConfig) -> LookAtResult {
        let solver = LookAtSolver::new(
            head_model(),
            &[center_key(0)],
            LookTarget::Fixed(target),
            config,
        )
        .unwrap();
        solver.solve()
    }

    #[test]
    fn straight_ahead_target_leaves_the_head_at_rest() {
        let result = solve_fixed(DVec3::new(0.0, 4.0, -10.0), head_only_config());
        assert_eq!(result.bone_frames.len(), 1);
        let frame = &result.bone_frames[0];
        assert_eq!(frame.name, "頭");
        assert_eq!(frame.frame, 0);
        assert!(frame.rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);
    }

    #[test]
    fn high_target_pitches_up_to_the_limit() {
        // 45 degrees up, clamped to the head's 30 degree pitch limit
        let result = solve_fixed(DVec3::new(0.0, 14.0, -10.0), head_only_config());
        let rotation = result.bone_frames[0].rotation.as_dquat();
        let euler = math::quaternion_to_euler(rotation);
        assert!((euler.x.to_degrees() + 30.0).abs() < 1e-4, "{euler}");
        assert!(euler.y.abs() < 1e-6);
    }

    #[test]
    fn target_behind_the_back_is_ignored() {
        let result = solve_fixed(DVec3::new(0.0, 4.0, 10.0), head_only_config());
        assert!(result.bone_frames.is_empty());
    }

    #[test]
    fn disabled_ignore_zone_tracks_backwards() {
        let config = LookAtConfig {
            ignore_zone: 0.0,
            ..head_only_config()
        };
        let result = solve_fixed(DVec3::new(0.0, 4.0, 10.0), config);
        assert_eq!(result.bone_frames.len(), 1);
        let euler =
            math::quaternion_to_euler(result.bone_frames[0].rotation.as_dquat());
        // the full 180 degree turn clamps to the head's yaw limit
        assert!((euler.y.abs().to_degrees() - 40.0).abs() < 1e-4, "{euler}");
    }

    #[test]
    fn boundary_of_the_ignore_zone_still_tracks() {
        let config = LookAtConfig {
            ignore_zone: PI,
            ..head_only_config()
        };
        let result = solve_fixed(DVec3::new(0.0, 4.0, 10.0), config);
        assert_eq!(result.bone_frames.len(), 1);
    }

    #[test]
    fn whole_chain_tracks_within_constraints() {
        let result = solve_fixed(DVec3::new(5.0, 4.5, -5.0), LookAtConfig::default());
        let names: Vec<&str> = result
            .bone_frames
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["首", "頭", "両目"]);
        let config = LookAtConfig::default();
        for frame in &result.bone_frames {
            let euler = math::quaternion_to_euler(frame.rotation.as_dquat());
            let limits = config.constraint(&frame.name).limits;
            assert!(euler.x.abs() <= limits.x + 1e-6);
            assert!(euler.y.abs() <= limits.y + 1e-6);
            assert!(euler.z.abs() <= limits.z + 1e-6);
        }
    }

    #[test]
    fn out_of_range_frames_keep_original_keyframes() {
        let mut original = center_key(30);
        original.name = "頭".to_string();
        original.rotation = Quat::from_rotation_x(0.3);
        let motion = vec![center_key(0), original.clone()];
        let config = LookAtConfig {
            frame_ranges: crate::lookat::config::FrameRanges::new(vec![(0, 10)]),
            ..head_only_config()
        };
        let solver = LookAtSolver::new(
            head_model(),
            &motion,
            LookTarget::Fixed(DVec3::new(0.0, 4.0, -10.0)),
            config,
        )
        .unwrap();
        let result = solver.solve();
        let copied: Vec<&BoneFrame> =
            result.bone_frames.iter().filter(|f| f.frame == 30).collect();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].rotation, original.rotation);
    }

    fn camera_key(frame: u32, yaw: f32) -> CameraFrame {
        CameraFrame {
            frame,
            rotation: Vec3::new(0.0, yaw, 0.0),
            ..CameraFrame::sample()
        }
    }

    #[test]
    fn camera_cut_delays_tracking() {
        let cameras = vec![
            camera_key(0, 0.0),
            camera_key(10, 0.0),
            camera_key(11, std::f32::consts::FRAC_PI_2),
        ];
        let solver = LookAtSolver::new(
            head_model(),
            &[center_key(0)],
            LookTarget::Camera(cameras),
            head_only_config(),
        )
        .unwrap();
        let result = solver.solve();
        let frames: Vec<u32> = result.bone_frames.iter().map(|f| f.frame).collect();
        assert!(frames.contains(&0));
        assert!(frames.contains(&10));
        assert!(!frames.contains(&11), "cut frame should be delayed: {frames:?}");
        let resurface = *frames.last().unwrap();
        assert!(resurface > 11, "tracking should resurface after the cut");
    }

    #[test]
    fn disabling_the_speed_limit_keeps_the_cut_frame() {
        let cameras = vec![
            camera_key(0, 0.0),
            camera_key(10, 0.0),
            camera_key(11, std::f32::consts::FRAC_PI_2),
        ];
        let config = LookAtConfig {
            omega_limit: 0.0,
            ..head_only_config()
        };
        let solver = LookAtSolver::new(
            head_model(),
            &[center_key(0)],
            LookTarget::Camera(cameras),
            config,
        )
        .unwrap();
        let result = solver.solve();
        let frames: Vec<u32> = result.bone_frames.iter().map(|f| f.frame).collect();
        assert_eq!(frames, vec![0, 10, 11]);
    }

    #[test]
    fn model_target_follows_the_other_models_bone() {
        let target_bones = head_model();
        let target_motion = vec![center_key(0)];
        let solver = LookAtSolver::new(
            head_model(),
            &[center_key(0)],
            LookTarget::Model {
                bones: target_bones,
                motion: target_motion,
                bone: "頭".to_string(),
            },
            head_only_config(),
        )
        .unwrap();
        let result = solver.solve();
        // the target's head sits on the watcher's own head: degenerate look
        // directions still emit a frame rather than aborting
        assert_eq!(result.bone_frames.len(), 1);
    }

    #[test]
    fn root_overwrite_bone_is_rejected() {
        let config = LookAtConfig {
            overwrite_bones: vec!["センター".to_string()],
            ..LookAtConfig::default()
        };
        let err = LookAtSolver::new(
            head_model(),
            &[center_key(0)],
            LookTarget::Fixed(DVec3::ZERO),
            config,
        )
        .unwrap_err();
        assert!(matches!(err, RigError::RootOverwriteBone { .. }));
    }

    fn turret_model() -> Vec<Bone> {
        let movable = BoneFlags::CAN_ROTATE | BoneFlags::CAN_TRANSLATE;
        let mut barrel = bone(
            "砲身",
            1,
            Vec3::new(0.0, 2.0, 0.0),
            BoneFlags::CAN_ROTATE | BoneFlags::AXIS_IS_FIXED,
        );
        barrel.fixed_axis = Some(Vec3::X);
        barrel.tail = TailPosition::Offset(Vec3::new(0.0, 0.0, -1.0));
        vec![
            bone("全ての親", -1, Vec3::ZERO, movable),
            bone("センター", 0, Vec3::new(0.0, 1.0, 0.0), movable),
            barrel,
        ]
    }

    #[test]
    fn fire_frames_emit_bullets_from_the_muzzle() {
        let config = LookAtConfig {
            overwrite_bones: vec!["砲身".to_string()],
            point_mode: PointMode::Arm,
            projectile: Some(ProjectileConfig {
                fire_frames: vec![0],
                export_show_ik: true,
                ..ProjectileConfig::default()
            }),
            ..LookAtConfig::default()
        };
        let solver = LookAtSolver::new(
            turret_model(),
            &[center_key(0)],
            LookTarget::Fixed(DVec3::new(0.0, 2.0, -100.0)),
            config,
        )
        .unwrap();
        let result = solver.solve();
        assert_eq!(result.bullets.len(), 1);
        let bullet = &result.bullets[0];
        assert_eq!(bullet.bone, "砲身");
        assert_eq!(bullet.fire_frame, 0);
        assert_eq!(bullet.frames[0].position, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(bullet.show_ik.len(), 2);

        // the barrel's aim stays a pure rotation about its fixed X axis
        let aim = result.bone_frames[0].rotation;
        assert!(aim.y.abs() < 1e-6 && aim.z.abs() < 1e-6, "{aim:?}");
        // the launch arcs upward, so the barrel aims above the line of sight
        let euler = math::quaternion_to_euler(aim.as_dquat());
        assert!(euler.x < 0.0, "{euler}");
    }

    #[test]
    fn per_bone_pass_moves_the_neck_only_on_its_own_keys() {
        let mut neck_key = center_key(0);
        neck_key.name = "首".to_string();
        let motion = vec![center_key(0), neck_key];
        let config = LookAtConfig {
            overwrite_bones: vec!["首".to_string(), "頭".to_string()],
            additional_frames: vec![15],
            ..LookAtConfig::default()
        };
        let solver = LookAtSolver::new(
            head_model(),
            &motion,
            LookTarget::Fixed(DVec3::new(3.0, 4.0, -10.0)),
            config,
        )
        .unwrap();
        let result = solver.solve_per_bone();
        let emitted: Vec<(u32, &str)> = result
            .bone_frames
            .iter()
            .map(|f| (f.frame, f.name.as_str()))
            .collect();
        assert_eq!(emitted, vec![(0, "頭"), (0, "首"), (15, "頭")]);
    }
}
