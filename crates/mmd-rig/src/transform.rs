//! Memoizing bone transform cache.
//!
//! [`BoneTransforms`] binds a bone table to keyframe motion and resolves
//! model-space placements per (frame, bone), walking parents through the
//! bone graph. Results are cached; solvers commit overridden local
//! placements into the same cache so children pick them up, and drop a
//! frame once it is fully emitted.

use std::collections::HashMap;

use glam::{DQuat, DVec3};

use mmd_pmx::{Bone, BoneFlags, BoneGraph, make_all_bone_graph, make_sub_bone_graph};
use mmd_vmd::motion::{interpolate_bone_position, interpolate_bone_rotation};
use mmd_vmd::{BoneFrame, Interval, get_interval};

use crate::error::{Result, RigError};
use crate::math;

/// The bone every model motion hangs off when no explicit root exists.
pub const CENTER_BONE: &str = "センター";

/// A rotation and position pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub rotation: DQuat,
    pub position: DVec3,
}

impl Placement {
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        position: DVec3::ZERO,
    };

    pub fn new(rotation: DQuat, position: DVec3) -> Self {
        Self { rotation, position }
    }
}

/// Fully resolved transforms of one bone at one frame.
#[derive(Clone, Copy, Debug)]
pub struct Resolved {
    /// Model-space placement.
    pub global: Placement,
    /// Local placement, sampled from the motion or committed by a solver.
    pub local: Placement,
    /// Inherited additional transform, when the bone has one.
    pub additional: Option<Placement>,
}

#[derive(Debug)]
struct ExternalLink {
    transforms: Box<BoneTransforms>,
    bone: usize,
}

/// Composes a child's placement onto its parent's model-space placement.
pub fn compose_global(
    rest: DVec3,
    parent_rest: DVec3,
    parent_global: Placement,
    local: Placement,
    additional: Option<Placement>,
) -> Placement {
    let add = additional.unwrap_or(Placement::IDENTITY);
    let offset = rest + local.position + add.position - parent_rest;
    Placement {
        rotation: math::compose(math::compose(add.rotation, local.rotation), parent_global.rotation),
        position: parent_global.position + math::rotate(offset, parent_global.rotation),
    }
}

/// A skeleton bound to keyframe motion, with memoized transform resolution.
#[derive(Debug)]
pub struct BoneTransforms {
    bones: Vec<Bone>,
    graph: BoneGraph,
    name_to_index: HashMap<String, usize>,
    transform_indexes: Vec<usize>,
    leaf_indexes: Vec<usize>,
    frames: HashMap<usize, Vec<BoneFrame>>,
    keys: HashMap<usize, Vec<u32>>,
    cache: HashMap<(u32, usize), Resolved>,
    external: Option<ExternalLink>,
}

impl BoneTransforms {
    /// Binds `motion` to `bones`.
    ///
    /// With `subgraph`, only the chain connecting bone 0 to the `mandatory`
    /// bones is kept; otherwise the whole parent graph is. Bones without
    /// keyframes are pruned (reconnecting their children) unless they are
    /// mandatory or the center bone.
    pub fn new(
        bones: Vec<Bone>,
        motion: &[BoneFrame],
        mandatory: &[String],
        subgraph: bool,
    ) -> Result<Self> {
        let name_to_index: HashMap<String, usize> = bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        let mut mandatory_indexes = Vec::with_capacity(mandatory.len());
        for name in mandatory {
            let &index = name_to_index
                .get(name)
                .ok_or_else(|| RigError::BoneNotFound { name: name.clone() })?;
            mandatory_indexes.push(index);
        }

        let mut frames: HashMap<usize, Vec<BoneFrame>> = HashMap::new();
        for frame in motion {
            if let Some(&index) = name_to_index.get(&frame.name) {
                frames.entry(index).or_default().push(frame.clone());
            }
        }
        for list in frames.values_mut() {
            list.sort_by_key(|f| f.frame);
        }

        let mut graph = if subgraph && !mandatory_indexes.is_empty() {
            make_sub_bone_graph(&bones, 0, &mandatory_indexes)
        } else {
            make_all_bone_graph(&bones, |_| true)
        };
        let prune: Vec<usize> = graph
            .nodes()
            .filter(|n| {
                !frames.contains_key(n)
                    && !mandatory_indexes.contains(n)
                    && bones[*n].name != CENTER_BONE
            })
            .collect();
        for n in prune {
            graph.remove_node(n, true);
        }
        if graph.t_sort().is_none() {
            return Err(RigError::CyclicBoneGraph);
        }

        let transform_indexes: Vec<usize> = graph.nodes().collect();
        let leaf_indexes: Vec<usize> = transform_indexes
            .iter()
            .copied()
            .filter(|&n| graph.out_degree(n) == 0)
            .collect();
        for &index in &transform_indexes {
            let bone = &bones[index];
            if let Some(source) = bone.additional_source() {
                if bone.flags.contains(BoneFlags::APPLY_LOCAL) {
                    return Err(RigError::LocalInheritance {
                        name: bone.name.clone(),
                    });
                }
                if source < 0 || source as usize >= bones.len() {
                    return Err(RigError::BadInheritanceSource {
                        name: bone.name.clone(),
                        index: source,
                    });
                }
            }
        }

        let keys = frames
            .iter()
            .map(|(&i, list)| (i, list.iter().map(|f| f.frame).collect()))
            .collect();
        log::debug!(
            "bound motion to {} transform bones ({} leaves)",
            transform_indexes.len(),
            leaf_indexes.len()
        );
        Ok(Self {
            bones,
            graph,
            name_to_index,
            transform_indexes,
            leaf_indexes,
            frames,
            keys,
            cache: HashMap::new(),
            external: None,
        })
    }

    /// Composes this rig's root bones onto a bone of another rig, so the
    /// whole skeleton rides along with it.
    pub fn set_external_link(&mut self, transforms: BoneTransforms, bone: &str) -> Result<()> {
        let index = transforms
            .bone_index(bone)
            .ok_or_else(|| RigError::BoneNotFound {
                name: bone.to_string(),
            })?;
        self.external = Some(ExternalLink {
            transforms: Box::new(transforms),
            bone: index,
        });
        Ok(())
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn graph(&self) -> &BoneGraph {
        &self.graph
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Bones that survived pruning, in index order.
    pub fn transform_indexes(&self) -> &[usize] {
        &self.transform_indexes
    }

    /// Transform bones without children.
    pub fn leaf_indexes(&self) -> &[usize] {
        &self.leaf_indexes
    }

    pub fn rest_position(&self, bone: usize) -> DVec3 {
        self.bones[bone].position.as_dvec3()
    }

    /// Sorted keyframe numbers of a bone, empty when it has none.
    pub fn keys(&self, bone: usize) -> &[u32] {
        self.keys.get(&bone).map_or(&[], Vec::as_slice)
    }

    /// The keyframe of a bone exactly at `frame`, if one exists.
    pub fn keyframe(&self, frame: u32, bone: usize) -> Option<&BoneFrame> {
        let list = self.frames.get(&bone)?;
        let i = self.keys.get(&bone)?.binary_search(&frame).ok()?;
        Some(&list[i])
    }

    pub fn has_keyframe(&self, frame: u32, bone: usize) -> bool {
        self.keyframe(frame, bone).is_some()
    }

    /// Samples the local placement of a bone at a frame.
    ///
    /// Exact keyframes and frames outside the key range use raw values; only
    /// interpolated frames force the rotation (translation) to identity
    /// (zero) when the bone cannot rotate (translate).
    pub fn sample_local(&self, frame: u32, bone: usize) -> Placement {
        let Some(list) = self.frames.get(&bone) else {
            return Placement::IDENTITY;
        };
        let keys = &self.keys[&bone];
        let raw = |key: u32| {
            let i = keys.binary_search(&key).unwrap_or(0);
            Placement::new(list[i].rotation.as_dquat(), list[i].position.as_dvec3())
        };
        match get_interval(frame, keys) {
            Interval::Empty => Placement::IDENTITY,
            Interval::Exact(k) | Interval::BeforeFirst(k) | Interval::AfterLast(k) => raw(k),
            Interval::Between(a, b) => {
                let begin = &list[keys.binary_search(&a).unwrap_or(0)];
                let end = &list[keys.binary_search(&b).unwrap_or(0)];
                let def = &self.bones[bone];
                let rotation = if def.can_rotate() {
                    interpolate_bone_rotation(frame, begin, end).as_dquat()
                } else {
                    DQuat::IDENTITY
                };
                let position = if def.can_translate() {
                    interpolate_bone_position(frame, begin, end).as_dvec3()
                } else {
                    DVec3::ZERO
                };
                Placement::new(rotation, position)
            }
        }
    }

    /// The additional (inherited) placement of a bone at a frame, when it
    /// has one. The source contributes its resolved local placement, scaled
    /// by the inheritance weight.
    pub fn additional_placement(&mut self, frame: u32, bone: usize) -> Option<Placement> {
        let flags = self.bones[bone].flags;
        let source = self.bones[bone].additional_source()? as usize;
        let weight = f64::from(self.bones[bone].additional?.weight);
        let source_local = if self.graph.contains(source) {
            self.resolve(frame, source)?.local
        } else {
            self.sample_local(frame, source)
        };
        let rotation = if flags.contains(BoneFlags::ADD_ROTATE) {
            DQuat::IDENTITY.slerp(source_local.rotation, weight)
        } else {
            DQuat::IDENTITY
        };
        let position = if flags.contains(BoneFlags::ADD_TRANSLATE) {
            source_local.position * weight
        } else {
            DVec3::ZERO
        };
        Some(Placement::new(rotation, position))
    }

    /// Resolves a bone at a frame, sampling the motion for its local
    /// placement. `None` for bones outside the transform graph.
    pub fn resolve(&mut self, frame: u32, bone: usize) -> Option<Resolved> {
        if !self.graph.contains(bone) {
            return None;
        }
        if let Some(resolved) = self.cache.get(&(frame, bone)) {
            return Some(*resolved);
        }
        let local = self.sample_local(frame, bone);
        self.resolve_to(frame, bone, local)
    }

    /// Resolves a bone with an explicit local placement, committing it to
    /// the cache so children and later lookups see the override.
    pub fn resolve_with(&mut self, frame: u32, bone: usize, local: Placement) -> Option<Resolved> {
        if !self.graph.contains(bone) {
            return None;
        }
        self.resolve_to(frame, bone, local)
    }

    fn resolve_to(&mut self, frame: u32, bone: usize, local: Placement) -> Option<Resolved> {
        let additional = self.additional_placement(frame, bone);
        let rest = self.rest_position(bone);
        let global = if bone == 0 || self.graph.in_degree(bone) == 0 {
            self.root_global(frame, local, rest)?
        } else {
            let parent = self.graph.predecessors(bone).next()?;
            let parent_resolved = self.resolve(frame, parent)?;
            let parent_rest = self.rest_position(parent);
            compose_global(rest, parent_rest, parent_resolved.global, local, additional)
        };
        let resolved = Resolved {
            global,
            local,
            additional,
        };
        self.cache.insert((frame, bone), resolved);
        Some(resolved)
    }

    fn root_global(&mut self, frame: u32, local: Placement, rest: DVec3) -> Option<Placement> {
        match &mut self.external {
            None => Some(Placement::new(local.rotation, rest + local.position)),
            Some(link) => {
                let bone = link.bone;
                let parent_rest = link.transforms.rest_position(bone);
                let parent = link.transforms.resolve(frame, bone)?;
                Some(compose_global(rest, parent_rest, parent.global, local, None))
            }
        }
    }

    /// Drops every cached transform at a frame, here and in the linked rig.
    pub fn delete(&mut self, frame: u32) {
        self.cache.retain(|&(f, _), _| f != frame);
        if let Some(link) = &mut self.external {
            link.transforms.delete(frame);
        }
    }

    /// Drops cached transforms of a bone's descendants at a frame, leaving
    /// the bone's own entry alone.
    pub fn delete_descendants(&mut self, frame: u32, bone: usize) {
        for d in self.graph.descendants(bone) {
            self.cache.remove(&(frame, d));
        }
    }
}
