//! Four-lane channel values
//!
//! A [`Channel`] holds one 32-bit word per lane. The float, signed and
//! unsigned views reinterpret the same bits, so a `MOV` copies bit patterns
//! rather than values. A [`WideChannel`] holds one 64-bit word per lane and is
//! assembled from two adjacent channels, low word first.

use bytemuck::{Pod, Zeroable};

/// Number of lanes processed together
pub const QUAD_SIZE: usize = 4;

/// Bitmask with every lane of a quad set
pub const ALL_LANES: u8 = 0xf;

/// One 32-bit word per lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Channel(pub [u32; QUAD_SIZE]);

/// Four channels: one register
pub type Vector = [Channel; 4];

impl Channel {
    pub const ZERO: Channel = Channel([0; QUAD_SIZE]);
    pub const ALL_ONES: Channel = Channel([!0; QUAD_SIZE]);

    #[inline]
    pub fn splat_u32(value: u32) -> Self {
        Channel([value; QUAD_SIZE])
    }

    #[inline]
    pub fn splat_i32(value: i32) -> Self {
        Self::splat_u32(value as u32)
    }

    #[inline]
    pub fn splat_f32(value: f32) -> Self {
        Self::splat_u32(value.to_bits())
    }

    #[inline]
    pub fn from_f32(values: [f32; QUAD_SIZE]) -> Self {
        Channel(bytemuck::cast(values))
    }

    #[inline]
    pub fn from_i32(values: [i32; QUAD_SIZE]) -> Self {
        Channel(bytemuck::cast(values))
    }

    #[inline]
    pub fn from_u32(values: [u32; QUAD_SIZE]) -> Self {
        Channel(values)
    }

    #[inline]
    pub fn as_f32(&self) -> [f32; QUAD_SIZE] {
        bytemuck::cast(self.0)
    }

    #[inline]
    pub fn as_i32(&self) -> [i32; QUAD_SIZE] {
        bytemuck::cast(self.0)
    }

    #[inline]
    pub fn as_u32(&self) -> [u32; QUAD_SIZE] {
        self.0
    }

    #[inline]
    pub fn f32(&self, lane: usize) -> f32 {
        f32::from_bits(self.0[lane])
    }

    #[inline]
    pub fn i32(&self, lane: usize) -> i32 {
        self.0[lane] as i32
    }

    #[inline]
    pub fn u32(&self, lane: usize) -> u32 {
        self.0[lane]
    }

    /// Lanes whose word is nonzero, as a lane bitmask
    pub fn nonzero_lanes(&self) -> u8 {
        lanes_where(|lane| self.0[lane] != 0)
    }

    /// Copy the lanes selected by `mask` from `other`
    #[inline]
    pub fn merge(&mut self, other: &Channel, mask: u8) {
        for lane in 0..QUAD_SIZE {
            if mask & (1 << lane) != 0 {
                self.0[lane] = other.0[lane];
            }
        }
    }
}

/// Build a lane bitmask from a per-lane predicate
#[inline]
pub fn lanes_where(mut pred: impl FnMut(usize) -> bool) -> u8 {
    let mut mask = 0;
    for lane in 0..QUAD_SIZE {
        if pred(lane) {
            mask |= 1 << lane;
        }
    }
    mask
}

/// One 64-bit word per lane, viewed as double, int64 or uint64
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct WideChannel(pub [u64; QUAD_SIZE]);

impl WideChannel {
    /// Join two channels; `lo` holds bits 0..32 of every lane
    pub fn from_pair(lo: &Channel, hi: &Channel) -> Self {
        let mut out = [0u64; QUAD_SIZE];
        for (lane, word) in out.iter_mut().enumerate() {
            *word = lo.0[lane] as u64 | (hi.0[lane] as u64) << 32;
        }
        WideChannel(out)
    }

    /// Split into (low, high) channels
    pub fn to_pair(&self) -> (Channel, Channel) {
        let mut lo = Channel::ZERO;
        let mut hi = Channel::ZERO;
        for lane in 0..QUAD_SIZE {
            lo.0[lane] = self.0[lane] as u32;
            hi.0[lane] = (self.0[lane] >> 32) as u32;
        }
        (lo, hi)
    }

    #[inline]
    pub fn splat_f64(value: f64) -> Self {
        WideChannel([value.to_bits(); QUAD_SIZE])
    }

    #[inline]
    pub fn from_f64(values: [f64; QUAD_SIZE]) -> Self {
        WideChannel(bytemuck::cast(values))
    }

    #[inline]
    pub fn from_i64(values: [i64; QUAD_SIZE]) -> Self {
        WideChannel(bytemuck::cast(values))
    }

    #[inline]
    pub fn as_f64(&self) -> [f64; QUAD_SIZE] {
        bytemuck::cast(self.0)
    }

    #[inline]
    pub fn as_i64(&self) -> [i64; QUAD_SIZE] {
        bytemuck::cast(self.0)
    }

    #[inline]
    pub fn as_u64(&self) -> [u64; QUAD_SIZE] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_share_bits() {
        let c = Channel::from_f32([1.0, -0.0, f32::INFINITY, -2.5]);
        assert_eq!(c.u32(0), 0x3f80_0000);
        assert_eq!(c.u32(1), 0x8000_0000);
        assert_eq!(c.i32(1), i32::MIN);
        assert_eq!(c.as_f32()[3], -2.5);
        assert_eq!(Channel::splat_i32(-1), Channel::ALL_ONES);
    }

    #[test]
    fn test_merge_respects_mask() {
        let mut dst = Channel::from_u32([1, 2, 3, 4]);
        dst.merge(&Channel::splat_u32(9), 0b0101);
        assert_eq!(dst, Channel::from_u32([9, 2, 9, 4]));
        assert_eq!(Channel::from_u32([0, 5, 0, 1]).nonzero_lanes(), 0b1010);
    }

    #[test]
    fn test_wide_pair_layout() {
        let wide = WideChannel::from_f64([1.0, -2.0, f64::NAN, f64::NEG_INFINITY]);
        let (lo, hi) = wide.to_pair();
        assert_eq!(hi.u32(0), 0x3ff0_0000);
        assert_eq!(lo.u32(0), 0);
        assert_eq!(WideChannel::from_pair(&lo, &hi), wide);
        assert!(WideChannel::from_pair(&lo, &hi).as_f64()[2].is_nan());
    }
}
