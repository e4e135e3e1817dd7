//! Bone graphs.
//!
//! A [`BoneGraph`] is a DAG over bone indices with edges from parent to
//! child. Motion tools build one of two shapes: the full parent graph of a
//! model, or the sub-graph connecting a root bone to a set of target bones.
//! Nodes without keyframes can then be pruned (reconnecting their neighbors)
//! before a topological sort yields an evaluation order.

use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::cmp::Reverse;

use crate::bone::Bone;

/// A directed graph over bone indices.
#[derive(Clone, Debug, Default)]
pub struct BoneGraph {
    succs: BTreeMap<usize, BTreeSet<usize>>,
    preds: BTreeMap<usize, BTreeSet<usize>>,
}

impl BoneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the edge `a -> b`, creating both nodes as needed.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.succs.entry(a).or_default().insert(b);
        self.succs.entry(b).or_default();
        self.preds.entry(b).or_default().insert(a);
        self.preds.entry(a).or_default();
    }

    pub fn remove_edge(&mut self, a: usize, b: usize) {
        if let Some(succs) = self.succs.get_mut(&a) {
            succs.remove(&b);
        }
        if let Some(preds) = self.preds.get_mut(&b) {
            preds.remove(&a);
        }
    }

    /// Removes a node. With `reconnect`, every predecessor is joined to
    /// every successor so paths through the node survive.
    pub fn remove_node(&mut self, n: usize, reconnect: bool) {
        let preds: Vec<usize> = self.predecessors(n).collect();
        let succs: Vec<usize> = self.successors(n).collect();
        if reconnect {
            for &p in &preds {
                for &s in &succs {
                    self.add_edge(p, s);
                }
            }
        }
        for p in preds {
            if let Some(set) = self.succs.get_mut(&p) {
                set.remove(&n);
            }
        }
        for s in succs {
            if let Some(set) = self.preds.get_mut(&s) {
                set.remove(&n);
            }
        }
        self.succs.remove(&n);
        self.preds.remove(&n);
    }

    pub fn contains(&self, n: usize) -> bool {
        self.succs.contains_key(&n)
    }

    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.succs.keys().copied()
    }

    pub fn successors(&self, n: usize) -> impl Iterator<Item = usize> + '_ {
        self.succs.get(&n).into_iter().flatten().copied()
    }

    pub fn predecessors(&self, n: usize) -> impl Iterator<Item = usize> + '_ {
        self.preds.get(&n).into_iter().flatten().copied()
    }

    pub fn in_degree(&self, n: usize) -> usize {
        self.preds.get(&n).map_or(0, BTreeSet::len)
    }

    pub fn out_degree(&self, n: usize) -> usize {
        self.succs.get(&n).map_or(0, BTreeSet::len)
    }

    /// True when `b` is reachable from `a` along edges.
    pub fn is_descendant(&self, a: usize, b: usize) -> bool {
        self.descendants(a).contains(&b)
    }

    /// All nodes reachable from `n`, in ascending index order.
    pub fn descendants(&self, n: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.successors(n).collect();
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.successors(node));
            }
        }
        seen
    }

    /// Nodes reachable from `n` with no successors of their own.
    pub fn descendant_leaves(&self, n: usize) -> Vec<usize> {
        self.descendants(n)
            .into_iter()
            .filter(|&d| self.out_degree(d) == 0)
            .collect()
    }

    /// Topological sort, smallest ready index first. `None` on a cycle.
    pub fn t_sort(&self) -> Option<Vec<usize>> {
        let mut remaining: BTreeMap<usize, usize> = BTreeMap::new();
        let mut roots = BinaryHeap::new();
        for n in self.nodes() {
            let degree = self.in_degree(n);
            if degree == 0 {
                roots.push(Reverse(n));
            } else {
                remaining.insert(n, degree);
            }
        }
        let mut order = Vec::with_capacity(self.succs.len());
        while let Some(Reverse(n)) = roots.pop() {
            for child in self.successors(n) {
                if let Some(degree) = remaining.get_mut(&child) {
                    *degree -= 1;
                    if *degree == 0 {
                        remaining.remove(&child);
                        roots.push(Reverse(child));
                    }
                }
            }
            order.push(n);
        }
        if remaining.is_empty() { Some(order) } else { None }
    }
}

/// Builds the parent graph of every bone that passes `keep`.
///
/// Children of the root bone itself are left out; the root has no incoming
/// motion and serves only as the frame of reference.
pub fn make_all_bone_graph(bones: &[Bone], keep: impl Fn(&Bone) -> bool) -> BoneGraph {
    let mut graph = BoneGraph::new();
    for (index, bone) in bones.iter().enumerate() {
        if bone.parent > 0 && keep(bone) {
            graph.add_edge(bone.parent as usize, index);
        }
    }
    graph
}

/// Builds the sub-graph connecting `root` to every reachable bone in
/// `targets`, walking parent links.
pub fn make_sub_bone_graph(bones: &[Bone], root: usize, targets: &[usize]) -> BoneGraph {
    let mut graph = BoneGraph::new();
    let mut frontier: BTreeSet<usize> = targets.iter().copied().collect();
    while !frontier.is_empty() {
        let nodes: BTreeSet<usize> = graph.nodes().collect();
        let mut parents = BTreeSet::new();
        for &target in &frontier {
            if target < root {
                continue;
            }
            let parent = bones[target].parent;
            if parent >= root as i32 {
                graph.add_edge(parent as usize, target);
            }
            if parent > root as i32 && !nodes.contains(&(parent as usize)) {
                parents.insert(parent as usize);
            }
        }
        frontier = parents;
    }
    graph
}

/// Orders bone indices the way the host application evaluates them:
/// before-physics bones first, then by deformation tier, then by index.
pub fn transform_order(indexes: &[usize], bones: &[Bone]) -> Vec<usize> {
    let mut order = indexes.to_vec();
    order.sort_by_key(|&i| {
        (
            bones[i].is_after_physics(),
            bones[i].transform_hierarchy,
            i,
        )
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::{BoneFlags, TailPosition};
    use glam::Vec3;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn bone(parent: i32, hierarchy: i32, flags: BoneFlags) -> Bone {
        Bone {
            name: String::new(),
            name_en: String::new(),
            position: Vec3::ZERO,
            parent,
            transform_hierarchy: hierarchy,
            flags,
            tail: TailPosition::Offset(Vec3::ZERO),
            additional: None,
            fixed_axis: None,
            local_axes: None,
            external_parent: None,
            ik: None,
        }
    }

    #[test]
    fn t_sort_prefers_smallest_ready_index() {
        let mut graph = BoneGraph::new();
        graph.add_edge(0, 2);
        graph.add_edge(0, 1);
        graph.add_edge(1, 3);
        graph.add_edge(2, 3);
        assert_eq!(graph.t_sort(), Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn t_sort_detects_cycles() {
        let mut graph = BoneGraph::new();
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 1);
        assert_eq!(graph.t_sort(), None);
    }

    #[test]
    fn remove_node_reconnects_neighbors() {
        let mut graph = BoneGraph::new();
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(1, 3);
        graph.remove_node(1, true);
        assert!(!graph.contains(1));
        let succs: Vec<usize> = graph.successors(0).collect();
        assert_eq!(succs, vec![2, 3]);
    }

    #[test]
    fn descendants_and_leaves() {
        let mut graph = BoneGraph::new();
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(1, 3);
        assert!(graph.is_descendant(0, 3));
        assert!(!graph.is_descendant(2, 0));
        assert_eq!(graph.descendant_leaves(0), vec![2, 3]);
    }

    #[rstest]
    #[case(&[3], vec![0, 1, 2, 3])]
    #[case(&[2], vec![0, 1, 2])]
    #[case(&[4], vec![0, 4])]
    #[case(&[2, 4], vec![0, 1, 2, 4])]
    fn sub_graph_walks_parents_to_root(#[case] targets: &[usize], #[case] expected: Vec<usize>) {
        // 0 <- 1 <- 2 <- 3 and a stray 4 under 0.
        let bones = vec![
            bone(-1, 0, BoneFlags::empty()),
            bone(0, 0, BoneFlags::empty()),
            bone(1, 0, BoneFlags::empty()),
            bone(2, 0, BoneFlags::empty()),
            bone(0, 0, BoneFlags::empty()),
        ];
        let graph = make_sub_bone_graph(&bones, 0, targets);
        assert_eq!(graph.t_sort(), Some(expected));
    }

    #[test]
    fn transform_order_sorts_physics_last() {
        let bones = vec![
            bone(-1, 0, BoneFlags::AFTER_PHYSICS),
            bone(-1, 1, BoneFlags::empty()),
            bone(-1, 0, BoneFlags::empty()),
        ];
        assert_eq!(transform_order(&[0, 1, 2], &bones), vec![2, 1, 0]);
    }
}
