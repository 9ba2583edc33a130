//! Fragment input interpolation
//!
//! Plane equations are evaluated at the quad's four pixel centers. Lane 0
//! sits at the quad origin, lane 1 one pixel right, lane 2 one pixel down
//! and lane 3 diagonally across.

use crate::channel::{Channel, QUAD_SIZE};
use crate::isa::InterpMode;
use serde::{Deserialize, Serialize};
use std::array;

/// Plane coefficients of one input register, one entry per channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpCoef {
    pub a0: [f32; 4],
    pub dadx: [f32; 4],
    pub dady: [f32; 4],
}

impl InterpCoef {
    /// Coefficients of an input that is the same everywhere
    pub fn constant(value: [f32; 4]) -> Self {
        Self {
            a0: value,
            ..Self::default()
        }
    }
}

/// Window position of the quad origin plus per-lane clip w
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadPosition {
    pub x: f32,
    pub y: f32,
    pub w: [f32; QUAD_SIZE],
}

impl Default for QuadPosition {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: [1.0; QUAD_SIZE],
        }
    }
}

const LANE_DX: [f32; QUAD_SIZE] = [0.0, 1.0, 0.0, 1.0];
const LANE_DY: [f32; QUAD_SIZE] = [0.0, 0.0, 1.0, 1.0];

/// Standard 4x multisample positions within a pixel
const SAMPLE_POSITIONS_4X: [(f32, f32); 4] = [(0.375, 0.125), (0.875, 0.375), (0.125, 0.625), (0.625, 0.875)];

/// Interpolation actually applied once flat shading is resolved
pub(crate) fn resolve(mode: InterpMode, flatshade: bool) -> InterpMode {
    match mode {
        InterpMode::Color if flatshade => InterpMode::Constant,
        InterpMode::Color => InterpMode::Perspective,
        other => other,
    }
}

/// Value of channel `chan` at each lane of the quad
pub(crate) fn evaluate(mode: InterpMode, coef: &InterpCoef, chan: usize, pos: &QuadPosition) -> Channel {
    let (a0, dadx, dady) = (coef.a0[chan], coef.dadx[chan], coef.dady[chan]);
    match mode {
        InterpMode::Constant => Channel::splat_f32(a0),
        InterpMode::Linear => Channel::from_f32(array::from_fn(|lane| {
            a0 + dadx * (pos.x + LANE_DX[lane]) + dady * (pos.y + LANE_DY[lane])
        })),
        InterpMode::Perspective | InterpMode::Color => Channel::from_f32(array::from_fn(|lane| {
            (a0 + dadx * (pos.x + LANE_DX[lane]) + dady * (pos.y + LANE_DY[lane])) / pos.w[lane]
        })),
    }
}

/// Shift already-interpolated values by a per-lane pixel offset
pub(crate) fn apply_offset(
    mode: InterpMode,
    coef: &InterpCoef,
    chan: usize,
    ofs_x: &[f32; QUAD_SIZE],
    ofs_y: &[f32; QUAD_SIZE],
    pos: &QuadPosition,
    value: &mut Channel,
) {
    let (dadx, dady) = (coef.dadx[chan], coef.dady[chan]);
    let current = value.as_f32();
    let shifted = match mode {
        InterpMode::Constant => return,
        InterpMode::Linear => array::from_fn(|lane| current[lane] + ofs_x[lane] * dadx + ofs_y[lane] * dady),
        InterpMode::Perspective | InterpMode::Color => {
            array::from_fn(|lane| current[lane] + (ofs_x[lane] * dadx + ofs_y[lane] * dady) / pos.w[lane])
        }
    };
    *value = Channel::from_f32(shifted);
}

/// Offset of `sample` from the pixel center, or `None` for the center sample
pub(crate) fn sample_offset(sample: u32) -> Option<(f32, f32)> {
    match sample {
        0 => None,
        s => {
            let (x, y) = SAMPLE_POSITIONS_4X[(s as usize) % SAMPLE_POSITIONS_4X.len()];
            Some((x - 0.5, y - 0.5))
        }
    }
}
