//! The event queue driving the solver's frame walk.
//!
//! Every keyframe of interest becomes an event; the solver drains them in
//! frame order, merging all events that land on the same frame.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use bitflags::bitflags;

bitflags! {
    /// What happened at a queued frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct EventKinds: u16 {
        /// Keyframe of an overwritten bone.
        const OVERWRITE = 1 << 0;
        /// Keyframe of some other transform bone, watcher or target.
        const BONE = 1 << 1;
        /// Camera keyframe.
        const CAMERA = 1 << 2;
        /// Camera cut: a keyframe one frame after its predecessor.
        const CUT = 1 << 3;
        /// User-requested extra frame.
        const USER = 1 << 4;
        /// Projectile fire frame.
        const FIRE = 1 << 5;
        /// Resurface frame after a camera-cut delay.
        const DELAY = 1 << 6;
        /// Frame already found inside the ignore zone by an earlier pass.
        const IGNORE = 1 << 7;
    }
}

/// One frame of interest with everything that happens on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MotionEvent {
    pub frame: u32,
    pub kinds: EventKinds,
}

/// Min-heap of events, drained frame by frame.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<MotionEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: u32, kinds: EventKinds) {
        self.heap.push(Reverse(MotionEvent { frame, kinds }));
    }

    pub fn peek_frame(&self) -> Option<u32> {
        self.heap.peek().map(|Reverse(event)| event.frame)
    }

    /// Pops every event sharing the smallest frame, merging their kinds.
    pub fn pop_frame(&mut self) -> Option<MotionEvent> {
        let Reverse(mut event) = self.heap.pop()?;
        while self.peek_frame() == Some(event.frame) {
            if let Some(Reverse(next)) = self.heap.pop() {
                event.kinds |= next.kinds;
            }
        }
        Some(event)
    }

    /// Drops every event strictly before `frame`.
    pub fn drop_before(&mut self, frame: u32) {
        while self.peek_frame().is_some_and(|f| f < frame) {
            self.heap.pop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pop_merges_same_frame_events() {
        let mut queue = EventQueue::new();
        queue.push(10, EventKinds::CAMERA);
        queue.push(0, EventKinds::OVERWRITE);
        queue.push(10, EventKinds::OVERWRITE | EventKinds::BONE);
        queue.push(10, EventKinds::FIRE);

        let first = queue.pop_frame().unwrap();
        assert_eq!(first.frame, 0);
        assert_eq!(first.kinds, EventKinds::OVERWRITE);

        let second = queue.pop_frame().unwrap();
        assert_eq!(second.frame, 10);
        assert_eq!(
            second.kinds,
            EventKinds::CAMERA | EventKinds::OVERWRITE | EventKinds::BONE | EventKinds::FIRE
        );
        assert!(queue.pop_frame().is_none());
    }

    #[test]
    fn drop_before_keeps_the_boundary_frame() {
        let mut queue = EventQueue::new();
        for frame in [5, 10, 15, 20] {
            queue.push(frame, EventKinds::BONE);
        }
        queue.drop_before(15);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_frame(), Some(15));
    }
}
