//! External resource capabilities
//!
//! The machine computes coordinates and addresses; filtering, format
//! conversion and image storage belong to the embedder, which implements
//! [`Sampler`] and [`Image`]. Shader buffers and shared memory are plain byte
//! regions ([`MemoryRegion`]) resolved through [`ShaderBuffers`].
//!
//! Capabilities never fail: a lookup that cannot be satisfied returns zeros.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │           Machine            │
//! │  coords / offsets / masks    │
//! └──────┬───────────┬───────────┘
//!        │           │
//!        ▼           ▼
//!  ┌──────────┐ ┌──────────┐ ┌──────────────────────────┐
//!  │ Sampler  │ │  Image   │ │ ShaderBuffers / shared   │
//!  │ (filter) │ │ (texels) │ │ MemoryRegion (raw bytes) │
//!  └──────────┘ └──────────┘ └──────────────────────────┘
//! ```

pub mod memory;

pub use memory::{BufferPool, MemoryRegion, ShaderBuffers};

use crate::channel::{Vector, QUAD_SIZE};
use crate::isa::{Opcode, TextureTarget};
use serde::{Deserialize, Serialize};

/// Per-lane float values of one coordinate component
pub type Lanes = [f32; QUAD_SIZE];

/// How a sample request picks its level of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodControl {
    /// Implicit, from quad derivatives
    None,
    /// Implicit plus a per-lane bias
    Bias,
    /// Per-lane explicit level
    Explicit,
    /// Level zero
    Zero,
    /// Level from explicit derivatives
    Derivatives,
    /// Four-texel gather
    Gather,
}

/// Arguments of one sample request
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    pub texture_unit: u32,
    pub sampler_unit: u32,
    /// s, t, r, q/layer and the extra argument slot.
    ///
    /// Shadow targets put the compare reference in the slot named by
    /// [`TextureTarget::shadow_ref_index`]; the lod, bias or gather component
    /// goes in the last slot.
    pub args: [Lanes; 5],
    /// d/dx and d/dy per coordinate, for [`LodControl::Derivatives`]
    pub derivatives: Option<[[Lanes; 2]; 3]>,
    pub offsets: [i8; 3],
    pub control: LodControl,
}

/// Texture filtering capability
pub trait Sampler: Send + Sync {
    /// Filtered color per channel
    fn sample(&self, request: &SampleRequest) -> Vector;

    /// Unfiltered texel at integer coordinates; `coords[3]` holds the level
    /// or sample index
    fn fetch_texel(&self, texture_unit: u32, coords: &[[i32; QUAD_SIZE]; 4], offsets: [i8; 3]) -> Vector;

    /// Width, height, depth and level count at `level`
    fn query_dims(&self, texture_unit: u32, level: i32) -> [i32; 4];

    /// Computed level of detail: clamped in `[0]`, unclamped in `[1]`
    fn query_lod(&self, texture_unit: u32, sampler_unit: u32, coords: &[Lanes; 4], control: LodControl) -> [Lanes; 2];
}

/// Target of an image access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageParams {
    pub unit: u32,
    /// Lanes allowed to have side effects
    pub exec_mask: u8,
    pub target: TextureTarget,
    pub format: u32,
}

/// Integer image coordinates: x, y and z/layer
pub type ImageCoords = [[i32; QUAD_SIZE]; 3];

/// Typed image capability
pub trait Image: Send + Sync {
    fn load(&self, params: &ImageParams, coords: &ImageCoords, sample: &[i32; QUAD_SIZE]) -> Vector;

    fn store(&self, params: &ImageParams, coords: &ImageCoords, sample: &[i32; QUAD_SIZE], value: &Vector);

    /// Read-modify-write; returns the previous contents.
    ///
    /// For [`AtomicOp::Cas`], `value` is the comparand and `value2` the replacement.
    fn atomic(
        &self,
        params: &ImageParams,
        op: AtomicOp,
        coords: &ImageCoords,
        sample: &[i32; QUAD_SIZE],
        value: &Vector,
        value2: &Vector,
    ) -> Vector;

    /// Width, height, depth/layers and sample count
    fn dims(&self, params: &ImageParams) -> [i32; 4];
}

/// Atomic read-modify-write operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicOp {
    Uadd,
    Xchg,
    Cas,
    And,
    Or,
    Xor,
    Umin,
    Umax,
    Imin,
    Imax,
    Fadd,
}

impl AtomicOp {
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        Some(match opcode {
            Opcode::AtomUadd => AtomicOp::Uadd,
            Opcode::AtomXchg => AtomicOp::Xchg,
            Opcode::AtomCas => AtomicOp::Cas,
            Opcode::AtomAnd => AtomicOp::And,
            Opcode::AtomOr => AtomicOp::Or,
            Opcode::AtomXor => AtomicOp::Xor,
            Opcode::AtomUmin => AtomicOp::Umin,
            Opcode::AtomUmax => AtomicOp::Umax,
            Opcode::AtomImin => AtomicOp::Imin,
            Opcode::AtomImax => AtomicOp::Imax,
            Opcode::AtomFadd => AtomicOp::Fadd,
            _ => return None,
        })
    }

    /// New word stored when `old` is combined with the operands
    pub fn apply(self, old: u32, value: u32, value2: u32) -> u32 {
        match self {
            AtomicOp::Uadd => old.wrapping_add(value),
            AtomicOp::Xchg => value,
            AtomicOp::Cas => {
                if old == value {
                    value2
                } else {
                    old
                }
            }
            AtomicOp::And => old & value,
            AtomicOp::Or => old | value,
            AtomicOp::Xor => old ^ value,
            AtomicOp::Umin => old.min(value),
            AtomicOp::Umax => old.max(value),
            AtomicOp::Imin => (old as i32).min(value as i32) as u32,
            AtomicOp::Imax => (old as i32).max(value as i32) as u32,
            AtomicOp::Fadd => (f32::from_bits(old) + f32::from_bits(value)).to_bits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_apply() {
        assert_eq!(AtomicOp::Uadd.apply(u32::MAX, 2, 0), 1);
        assert_eq!(AtomicOp::Imin.apply(5, (-3i32) as u32, 0), (-3i32) as u32);
        assert_eq!(AtomicOp::Umin.apply(5, (-3i32) as u32, 0), 5);
        assert_eq!(AtomicOp::Cas.apply(7, 7, 9), 9);
        assert_eq!(AtomicOp::Cas.apply(7, 6, 9), 7);
        assert_eq!(AtomicOp::Fadd.apply(1.5f32.to_bits(), 2.0f32.to_bits(), 0), 3.5f32.to_bits());
    }

    #[test]
    fn test_from_opcode() {
        assert_eq!(AtomicOp::from_opcode(Opcode::AtomXor), Some(AtomicOp::Xor));
        assert_eq!(AtomicOp::from_opcode(Opcode::Load), None);
    }
}
