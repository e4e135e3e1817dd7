//! Interpolation parameter blocks.
//!
//! Bone keyframes carry a 64-byte block with one easing curve per channel
//! (X, Y, Z translation and R rotation); camera keyframes carry a 24-byte
//! block with six channels (X, Y, Z, rotation, distance, view angle).
//! Control-point coordinates are bytes on a 0..=127 grid.
//!
//! The 64-byte bone block replicates the per-channel bytes into redundant
//! trailing lanes; [`BoneCurves::pack`] reproduces that layout byte for byte
//! so written files compare equal to ones the host application saves.

use crate::bezier;

/// One easing curve: two control points on the 0..=127 byte grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlPoints {
    /// First control point (x, y).
    pub c1: (u8, u8),
    /// Second control point (x, y).
    pub c2: (u8, u8),
}

impl ControlPoints {
    /// The linear default curve.
    pub const LINEAR: Self = Self {
        c1: (20, 20),
        c2: (107, 107),
    };

    /// Accelerating parabola, y = x^2. Used on the span ending at an impact.
    pub const PARABOLA_EASE_IN: Self = Self {
        c1: (42, 0),
        c2: (85, 42),
    };

    /// Decelerating parabola, y = x(2 - x). Used on the span ending at an
    /// arc's apex.
    pub const PARABOLA_EASE_OUT: Self = Self {
        c1: (42, 85),
        c2: (85, 127),
    };

    /// Maps a time fraction in [0, 1] through this curve.
    pub fn ease(self, x: f64) -> f64 {
        let scale = |b: u8| f64::from(b) / 127.0;
        bezier::ease(
            (scale(self.c1.0), scale(self.c1.1)),
            (scale(self.c2.0), scale(self.c2.1)),
            x,
        )
    }
}

/// Easing curves of a bone keyframe, one per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoneCurves {
    pub x: ControlPoints,
    pub y: ControlPoints,
    pub z: ControlPoints,
    pub rotation: ControlPoints,
}

impl BoneCurves {
    /// Linear easing on every channel.
    pub const LINEAR: Self = Self {
        x: ControlPoints::LINEAR,
        y: ControlPoints::LINEAR,
        z: ControlPoints::LINEAR,
        rotation: ControlPoints::LINEAR,
    };

    /// Reads the curves out of a 64-byte interpolation block.
    ///
    /// Channel `j` keeps its four control bytes at offsets `16*j + {0, 4, 8,
    /// 12}` as `c1x, c1y, c2x, c2y`.
    pub fn unpack(block: &[u8; 64]) -> Self {
        let channel = |j: usize| ControlPoints {
            c1: (block[16 * j], block[16 * j + 4]),
            c2: (block[16 * j + 8], block[16 * j + 12]),
        };
        Self {
            x: channel(0),
            y: channel(1),
            z: channel(2),
            rotation: channel(3),
        }
    }

    /// Builds the 64-byte block, replicating the channel bytes into the
    /// redundant trailing lanes the same way the host application does.
    pub fn pack(&self) -> [u8; 64] {
        let channels = [self.x, self.y, self.z, self.rotation];
        let c1x: Vec<u8> = channels.iter().map(|c| c.c1.0).collect();
        let c1y: Vec<u8> = channels.iter().map(|c| c.c1.1).collect();
        let c2x: Vec<u8> = channels.iter().map(|c| c.c2.0).collect();
        let c2y: Vec<u8> = channels.iter().map(|c| c.c2.1).collect();
        let tail: Vec<u8> = c1y
            .iter()
            .chain(c2x.iter())
            .chain(c2y.iter())
            .copied()
            .collect();

        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&c1x[..2]);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&tail);
        out.extend_from_slice(&c1x[1..]);
        out.extend_from_slice(&tail);
        out.push(0);
        out.extend_from_slice(&c1x[2..]);
        out.extend_from_slice(&tail);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&c1x[3..]);
        out.extend_from_slice(&tail);
        out.extend_from_slice(&[0, 0, 0]);

        let mut block = [0u8; 64];
        block.copy_from_slice(&out);
        block
    }

    /// The 64-byte linear block.
    pub fn linear_block() -> [u8; 64] {
        Self::LINEAR.pack()
    }
}

/// Easing curves of a camera keyframe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraCurves {
    pub x: ControlPoints,
    pub y: ControlPoints,
    pub z: ControlPoints,
    pub rotation: ControlPoints,
    pub distance: ControlPoints,
    pub view_angle: ControlPoints,
}

impl CameraCurves {
    /// Linear easing on every channel.
    pub const LINEAR: Self = Self {
        x: ControlPoints::LINEAR,
        y: ControlPoints::LINEAR,
        z: ControlPoints::LINEAR,
        rotation: ControlPoints::LINEAR,
        distance: ControlPoints::LINEAR,
        view_angle: ControlPoints::LINEAR,
    };

    /// Reads the curves out of a 24-byte block. Channel `j` stores
    /// `c1x, c2x, c1y, c2y` at bytes `4*j..4*j + 4`.
    pub fn unpack(block: &[u8; 24]) -> Self {
        let channel = |j: usize| ControlPoints {
            c1: (block[4 * j], block[4 * j + 2]),
            c2: (block[4 * j + 1], block[4 * j + 3]),
        };
        Self {
            x: channel(0),
            y: channel(1),
            z: channel(2),
            rotation: channel(3),
            distance: channel(4),
            view_angle: channel(5),
        }
    }

    /// Builds the 24-byte block.
    pub fn pack(&self) -> [u8; 24] {
        let channels = [
            self.x,
            self.y,
            self.z,
            self.rotation,
            self.distance,
            self.view_angle,
        ];
        let mut block = [0u8; 24];
        for (j, c) in channels.iter().enumerate() {
            block[4 * j] = c.c1.0;
            block[4 * j + 1] = c.c2.0;
            block[4 * j + 2] = c.c1.1;
            block[4 * j + 3] = c.c2.1;
        }
        block
    }

    /// The 24-byte linear block.
    pub fn linear_block() -> [u8; 24] {
        Self::LINEAR.pack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bone_block_round_trips() {
        let curves = BoneCurves {
            x: ControlPoints {
                c1: (1, 2),
                c2: (3, 4),
            },
            y: ControlPoints {
                c1: (5, 6),
                c2: (7, 8),
            },
            z: ControlPoints {
                c1: (9, 10),
                c2: (11, 12),
            },
            rotation: ControlPoints {
                c1: (13, 14),
                c2: (15, 16),
            },
        };
        assert_eq!(BoneCurves::unpack(&curves.pack()), curves);
    }

    #[test]
    fn linear_bone_block_matches_reference_bytes() {
        let expected: [u8; 64] = [
            20, 20, 0, 0, 20, 20, 20, 20, 107, 107, 107, 107, 107, 107, 107, 107, 20, 20, 20, 20,
            20, 20, 20, 107, 107, 107, 107, 107, 107, 107, 107, 0, 20, 20, 20, 20, 20, 20, 107,
            107, 107, 107, 107, 107, 107, 107, 0, 0, 20, 20, 20, 20, 20, 107, 107, 107, 107, 107,
            107, 107, 107, 0, 0, 0,
        ];
        assert_eq!(BoneCurves::linear_block(), expected);
    }

    #[test]
    fn camera_block_round_trips() {
        let mut curves = CameraCurves::LINEAR;
        curves.distance = ControlPoints {
            c1: (40, 2),
            c2: (90, 125),
        };
        assert_eq!(CameraCurves::unpack(&curves.pack()), curves);
    }

    #[test]
    fn linear_camera_block_matches_reference_bytes() {
        // Six channels of (20, 107, 20, 107).
        let expected: [u8; 24] = [
            20, 107, 20, 107, 20, 107, 20, 107, 20, 107, 20, 107, 20, 107, 20, 107, 20, 107, 20,
            107, 20, 107, 20, 107,
        ];
        assert_eq!(CameraCurves::linear_block(), expected);
    }

    #[test]
    fn parabola_presets_evaluate_to_squares() {
        let y = ControlPoints::PARABOLA_EASE_IN.ease(0.5);
        assert!((y - 0.25).abs() < 0.01);
        let y = ControlPoints::PARABOLA_EASE_OUT.ease(0.5);
        assert!((y - 0.75).abs() < 0.01);
    }
}
