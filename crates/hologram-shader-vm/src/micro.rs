//! Micro-operation library
//!
//! Pure per-lane functions over [`Channel`] and [`WideChannel`] values. The
//! dispatcher picks one of these per opcode and applies it to the
//! write-masked channels; nothing here touches machine state.
//!
//! Numeric policy:
//! - floats follow IEEE-754; `min`/`max` return the non-NaN operand
//! - integer arithmetic wraps; shift counts are masked to the operand width
//! - division by zero returns a sentinel instead of trapping:
//!   UDIV/UMOD/U64DIV/U64MOD give all ones, IDIV/I64DIV give 0,
//!   MOD/I64MOD give -1
//! - float to integer conversions saturate, NaN converts to 0

use crate::channel::{Channel, WideChannel};
use std::array;

pub type UnaryFn = fn(&Channel) -> Channel;
pub type BinaryFn = fn(&Channel, &Channel) -> Channel;
pub type TrinaryFn = fn(&Channel, &Channel, &Channel) -> Channel;
pub type QuaternaryFn = fn(&Channel, &Channel, &Channel, &Channel) -> Channel;
pub type WideUnaryFn = fn(&WideChannel) -> WideChannel;
pub type WideBinaryFn = fn(&WideChannel, &WideChannel) -> WideChannel;
pub type WideTrinaryFn = fn(&WideChannel, &WideChannel, &WideChannel) -> WideChannel;
pub type WideCompareFn = fn(&WideChannel, &WideChannel) -> Channel;
/// 64-bit first operand, 32-bit second operand (shifts, ldexp)
pub type WideScalarFn = fn(&WideChannel, &Channel) -> WideChannel;
pub type WidenFn = fn(&Channel) -> WideChannel;
pub type NarrowFn = fn(&WideChannel) -> Channel;

const LOG2_E: f32 = 1.442695;

// Quad corners
const TOP_LEFT: usize = 0;
const TOP_RIGHT: usize = 1;
const BOTTOM_LEFT: usize = 2;
const BOTTOM_RIGHT: usize = 3;

// ================================================================================================
// Lane mapping helpers
// ================================================================================================

#[inline]
fn map_f(a: &Channel, f: impl Fn(f32) -> f32) -> Channel {
    let a = a.as_f32();
    Channel::from_f32(array::from_fn(|i| f(a[i])))
}

#[inline]
fn zip_f(a: &Channel, b: &Channel, f: impl Fn(f32, f32) -> f32) -> Channel {
    let (a, b) = (a.as_f32(), b.as_f32());
    Channel::from_f32(array::from_fn(|i| f(a[i], b[i])))
}

#[inline]
fn zip3_f(a: &Channel, b: &Channel, c: &Channel, f: impl Fn(f32, f32, f32) -> f32) -> Channel {
    let (a, b, c) = (a.as_f32(), b.as_f32(), c.as_f32());
    Channel::from_f32(array::from_fn(|i| f(a[i], b[i], c[i])))
}

/// Float comparison producing `on`/`off` bit patterns
#[inline]
fn cmp_f(a: &Channel, b: &Channel, on: u32, off: u32, f: impl Fn(f32, f32) -> bool) -> Channel {
    let (a, b) = (a.as_f32(), b.as_f32());
    Channel(array::from_fn(|i| if f(a[i], b[i]) { on } else { off }))
}

#[inline]
fn map_i(a: &Channel, f: impl Fn(i32) -> i32) -> Channel {
    let a = a.as_i32();
    Channel::from_i32(array::from_fn(|i| f(a[i])))
}

#[inline]
fn zip_i(a: &Channel, b: &Channel, f: impl Fn(i32, i32) -> i32) -> Channel {
    let (a, b) = (a.as_i32(), b.as_i32());
    Channel::from_i32(array::from_fn(|i| f(a[i], b[i])))
}

#[inline]
fn map_u(a: &Channel, f: impl Fn(u32) -> u32) -> Channel {
    Channel(array::from_fn(|i| f(a.0[i])))
}

#[inline]
fn zip_u(a: &Channel, b: &Channel, f: impl Fn(u32, u32) -> u32) -> Channel {
    Channel(array::from_fn(|i| f(a.0[i], b.0[i])))
}

#[inline]
fn zip3_u(a: &Channel, b: &Channel, c: &Channel, f: impl Fn(u32, u32, u32) -> u32) -> Channel {
    Channel(array::from_fn(|i| f(a.0[i], b.0[i], c.0[i])))
}

#[inline]
fn bool_mask(v: bool) -> u32 {
    if v {
        !0
    } else {
        0
    }
}

#[inline]
fn map_d(a: &WideChannel, f: impl Fn(f64) -> f64) -> WideChannel {
    let a = a.as_f64();
    WideChannel::from_f64(array::from_fn(|i| f(a[i])))
}

#[inline]
fn zip_d(a: &WideChannel, b: &WideChannel, f: impl Fn(f64, f64) -> f64) -> WideChannel {
    let (a, b) = (a.as_f64(), b.as_f64());
    WideChannel::from_f64(array::from_fn(|i| f(a[i], b[i])))
}

#[inline]
fn zip_i64(a: &WideChannel, b: &WideChannel, f: impl Fn(i64, i64) -> i64) -> WideChannel {
    let (a, b) = (a.as_i64(), b.as_i64());
    WideChannel::from_i64(array::from_fn(|i| f(a[i], b[i])))
}

#[inline]
fn zip_u64(a: &WideChannel, b: &WideChannel, f: impl Fn(u64, u64) -> u64) -> WideChannel {
    WideChannel(array::from_fn(|i| f(a.0[i], b.0[i])))
}

/// 64-bit comparison result, written to the low word of a pair
#[inline]
fn lane_mask(f: impl Fn(usize) -> bool) -> Channel {
    Channel(array::from_fn(|i| bool_mask(f(i))))
}

/// Scale `x` by `2^exp` without overflowing intermediate results
pub fn scalbn(mut x: f64, mut exp: i32) -> f64 {
    let two_pow_1023 = f64::from_bits(0x7fe0_0000_0000_0000);
    let two_pow_minus_969 = f64::from_bits(0x0360_0000_0000_0000); // 2^-1022 * 2^53
    if exp > 1023 {
        x *= two_pow_1023;
        exp -= 1023;
        if exp > 1023 {
            x *= two_pow_1023;
            exp = (exp - 1023).min(1023);
        }
    } else if exp < -1022 {
        x *= two_pow_minus_969;
        exp += 1022 - 53;
        if exp < -1022 {
            x *= two_pow_minus_969;
            exp = (exp + 1022 - 53).max(-1022);
        }
    }
    x * f64::from_bits(((0x3ff + exp) as u64) << 52)
}

/// Saturate to [0, 1]; NaN becomes 0
#[inline]
pub fn saturate(x: f32) -> f32 {
    x.max(0.0).min(1.0)
}

// ================================================================================================
// Float arithmetic
// ================================================================================================

/// Bit-exact copy
pub fn mov(a: &Channel) -> Channel {
    *a
}

pub fn add(a: &Channel, b: &Channel) -> Channel {
    zip_f(a, b, |x, y| x + y)
}

pub fn mul(a: &Channel, b: &Channel) -> Channel {
    zip_f(a, b, |x, y| x * y)
}

pub fn div(a: &Channel, b: &Channel) -> Channel {
    zip_f(a, b, |x, y| x / y)
}

/// `a * b + c`, rounded twice
pub fn mad(a: &Channel, b: &Channel, c: &Channel) -> Channel {
    zip3_f(a, b, c, |x, y, z| x * y + z)
}

/// `a * (b - c) + c`
pub fn lrp(a: &Channel, b: &Channel, c: &Channel) -> Channel {
    zip3_f(a, b, c, |x, y, z| x * (y - z) + z)
}

pub fn min(a: &Channel, b: &Channel) -> Channel {
    zip_f(a, b, f32::min)
}

pub fn max(a: &Channel, b: &Channel) -> Channel {
    zip_f(a, b, f32::max)
}

pub fn rcp(a: &Channel) -> Channel {
    map_f(a, |x| 1.0 / x)
}

pub fn rsq(a: &Channel) -> Channel {
    map_f(a, |x| 1.0 / x.sqrt())
}

pub fn sqrt(a: &Channel) -> Channel {
    map_f(a, f32::sqrt)
}

pub fn ex2(a: &Channel) -> Channel {
    map_f(a, |x| 2f32.powf(x))
}

pub fn lg2(a: &Channel) -> Channel {
    map_f(a, |x| x.ln() * LOG2_E)
}

pub fn pow(a: &Channel, b: &Channel) -> Channel {
    zip_f(a, b, f32::powf)
}

pub fn sin(a: &Channel) -> Channel {
    map_f(a, f32::sin)
}

pub fn cos(a: &Channel) -> Channel {
    map_f(a, f32::cos)
}

/// `a * 2^b` with `b` read as a signed integer
pub fn ldexp(a: &Channel, b: &Channel) -> Channel {
    let (a, b) = (a.as_f32(), b.as_i32());
    Channel::from_f32(array::from_fn(|i| scalbn(a[i] as f64, b[i].clamp(-300, 300)) as f32))
}

pub fn flr(a: &Channel) -> Channel {
    map_f(a, f32::floor)
}

pub fn ceil(a: &Channel) -> Channel {
    map_f(a, f32::ceil)
}

/// Round half to even
pub fn rnd(a: &Channel) -> Channel {
    map_f(a, f32::round_ties_even)
}

pub fn trunc(a: &Channel) -> Channel {
    map_f(a, f32::trunc)
}

pub fn frc(a: &Channel) -> Channel {
    map_f(a, |x| x - x.floor())
}

/// -1, 0 or 1
pub fn ssg(a: &Channel) -> Channel {
    map_f(a, |x| {
        if x < 0.0 {
            -1.0
        } else if x > 0.0 {
            1.0
        } else {
            0.0
        }
    })
}

/// `a < 0 ? b : c`
pub fn cmp(a: &Channel, b: &Channel, c: &Channel) -> Channel {
    let a = a.as_f32();
    Channel(array::from_fn(|i| if a[i] < 0.0 { b.0[i] } else { c.0[i] }))
}

/// Address load: floor to integer
pub fn arl(a: &Channel) -> Channel {
    let a = a.as_f32();
    Channel::from_i32(array::from_fn(|i| a[i].floor() as i32))
}

/// Address load, rounding to nearest
pub fn arr(a: &Channel) -> Channel {
    let a = a.as_f32();
    Channel::from_i32(array::from_fn(|i| (a[i] + 0.5).floor() as i32))
}

/// Unsigned address load: a plain copy
pub fn uarl(a: &Channel) -> Channel {
    *a
}

// ================================================================================================
// Float comparisons
// ================================================================================================

pub fn slt(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, 1f32.to_bits(), 0, |x, y| x < y)
}

pub fn sle(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, 1f32.to_bits(), 0, |x, y| x <= y)
}

pub fn sgt(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, 1f32.to_bits(), 0, |x, y| x > y)
}

pub fn sge(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, 1f32.to_bits(), 0, |x, y| x >= y)
}

pub fn seq(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, 1f32.to_bits(), 0, |x, y| x == y)
}

pub fn sne(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, 1f32.to_bits(), 0, |x, y| x != y)
}

pub fn fseq(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, !0, 0, |x, y| x == y)
}

pub fn fsne(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, !0, 0, |x, y| x != y)
}

pub fn fslt(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, !0, 0, |x, y| x < y)
}

pub fn fsge(a: &Channel, b: &Channel) -> Channel {
    cmp_f(a, b, !0, 0, |x, y| x >= y)
}

// ================================================================================================
// Quad derivatives
// ================================================================================================

pub fn ddx(a: &Channel) -> Channel {
    let a = a.as_f32();
    Channel::splat_f32(a[BOTTOM_RIGHT] - a[BOTTOM_LEFT])
}

pub fn ddx_fine(a: &Channel) -> Channel {
    let a = a.as_f32();
    let top = a[TOP_RIGHT] - a[TOP_LEFT];
    let bottom = a[BOTTOM_RIGHT] - a[BOTTOM_LEFT];
    Channel::from_f32([top, top, bottom, bottom])
}

pub fn ddy(a: &Channel) -> Channel {
    let a = a.as_f32();
    Channel::splat_f32(a[BOTTOM_LEFT] - a[TOP_LEFT])
}

pub fn ddy_fine(a: &Channel) -> Channel {
    let a = a.as_f32();
    let left = a[BOTTOM_LEFT] - a[TOP_LEFT];
    let right = a[BOTTOM_RIGHT] - a[TOP_RIGHT];
    Channel::from_f32([left, right, left, right])
}

// ================================================================================================
// 32-bit conversions
// ================================================================================================

pub fn f2i(a: &Channel) -> Channel {
    let a = a.as_f32();
    Channel::from_i32(array::from_fn(|i| a[i] as i32))
}

pub fn f2u(a: &Channel) -> Channel {
    let a = a.as_f32();
    Channel(array::from_fn(|i| a[i] as u32))
}

pub fn i2f(a: &Channel) -> Channel {
    let a = a.as_i32();
    Channel::from_f32(array::from_fn(|i| a[i] as f32))
}

pub fn u2f(a: &Channel) -> Channel {
    Channel::from_f32(array::from_fn(|i| a.0[i] as f32))
}

// ================================================================================================
// 32-bit integer arithmetic
// ================================================================================================

pub fn uadd(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, u32::wrapping_add)
}

pub fn umul(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, u32::wrapping_mul)
}

pub fn umad(a: &Channel, b: &Channel, c: &Channel) -> Channel {
    zip3_u(a, b, c, |x, y, z| x.wrapping_mul(y).wrapping_add(z))
}

/// Unsigned division; all ones when dividing by zero
pub fn udiv(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x.checked_div(y).unwrap_or(!0))
}

/// Unsigned remainder; all ones when dividing by zero
pub fn umod(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x.checked_rem(y).unwrap_or(!0))
}

/// Signed division; 0 when dividing by zero
pub fn idiv(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, |x, y| if y == 0 { 0 } else { x.wrapping_div(y) })
}

/// Signed remainder; -1 when dividing by zero
pub fn imod(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, |x, y| if y == 0 { -1 } else { x.wrapping_rem(y) })
}

pub fn imul_hi(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, |x, y| ((x as i64 * y as i64) >> 32) as i32)
}

pub fn umul_hi(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| ((x as u64 * y as u64) >> 32) as u32)
}

pub fn imax(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, i32::max)
}

pub fn imin(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, i32::min)
}

pub fn umax(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, u32::max)
}

pub fn umin(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, u32::min)
}

pub fn ineg(a: &Channel) -> Channel {
    map_i(a, i32::wrapping_neg)
}

pub fn iabs(a: &Channel) -> Channel {
    map_i(a, i32::wrapping_abs)
}

pub fn issg(a: &Channel) -> Channel {
    map_i(a, i32::signum)
}

// ================================================================================================
// 32-bit integer comparisons
// ================================================================================================

pub fn isge(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, |x, y| bool_mask(x >= y) as i32)
}

pub fn islt(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, |x, y| bool_mask(x < y) as i32)
}

pub fn useq(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| bool_mask(x == y))
}

pub fn usne(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| bool_mask(x != y))
}

pub fn usge(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| bool_mask(x >= y))
}

pub fn uslt(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| bool_mask(x < y))
}

/// `a != 0 ? b : c`
pub fn ucmp(a: &Channel, b: &Channel, c: &Channel) -> Channel {
    zip3_u(a, b, c, |x, y, z| if x != 0 { y } else { z })
}

// ================================================================================================
// Bitwise
// ================================================================================================

pub fn not(a: &Channel) -> Channel {
    map_u(a, |x| !x)
}

pub fn and(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x & y)
}

pub fn or(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x | y)
}

pub fn xor(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x ^ y)
}

pub fn shl(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x << (y & 0x1f))
}

pub fn ishr(a: &Channel, b: &Channel) -> Channel {
    zip_i(a, b, |x, y| x >> (y & 0x1f))
}

pub fn ushr(a: &Channel, b: &Channel) -> Channel {
    zip_u(a, b, |x, y| x >> (y & 0x1f))
}

/// Unsigned bitfield extract of `width` bits at `offset`
pub fn ubfe(value: &Channel, offset: &Channel, width: &Channel) -> Channel {
    zip3_u(value, offset, width, |src, off, width| {
        let off = off & 0x1f;
        if width == 32 && off == 0 {
            return src;
        }
        let width = width & 0x1f;
        if width == 0 {
            0
        } else if width + off < 32 {
            (src << (32 - width - off)) >> (32 - width)
        } else {
            src >> off
        }
    })
}

/// Signed bitfield extract: the top extracted bit is sign-extended
pub fn ibfe(value: &Channel, offset: &Channel, width: &Channel) -> Channel {
    zip3_u(value, offset, width, |src, off, width| {
        let off = off & 0x1f;
        if width == 32 && off == 0 {
            return src;
        }
        let width = width & 0x1f;
        let src = src as i32;
        let out = if width == 0 {
            0
        } else if width + off < 32 {
            (src << (32 - width - off)) >> (32 - width)
        } else {
            src >> off
        };
        out as u32
    })
}

/// Insert the low `width` bits of `insert` into `base` at `offset`
pub fn bfi(base: &Channel, insert: &Channel, offset: &Channel, width: &Channel) -> Channel {
    Channel(array::from_fn(|i| {
        let (base, insert) = (base.0[i], insert.0[i]);
        let off = offset.0[i] & 0x1f;
        let width = width.0[i];
        if width == 32 {
            return insert;
        }
        let field = 1u32.checked_shl(width).unwrap_or(0).wrapping_sub(1);
        let mask = field << off;
        ((insert << off) & mask) | (base & !mask)
    }))
}

pub fn brev(a: &Channel) -> Channel {
    map_u(a, u32::reverse_bits)
}

pub fn popc(a: &Channel) -> Channel {
    map_u(a, u32::count_ones)
}

/// Index of the lowest set bit, -1 if none
pub fn lsb(a: &Channel) -> Channel {
    map_u(a, |x| if x == 0 { !0 } else { x.trailing_zeros() })
}

/// Index of the highest bit that differs from the sign bit, -1 if none
pub fn imsb(a: &Channel) -> Channel {
    map_i(a, |x| {
        let bits = (if x < 0 { !x } else { x }) as u32;
        (32 - bits.leading_zeros()) as i32 - 1
    })
}

/// Index of the highest set bit, -1 if none
pub fn umsb(a: &Channel) -> Channel {
    map_u(a, |x| (32 - x.leading_zeros()).wrapping_sub(1))
}

// ================================================================================================
// Double precision
// ================================================================================================

pub fn dabs(a: &WideChannel) -> WideChannel {
    map_d(a, |x| if x >= 0.0 { x } else { -x })
}

pub fn dneg(a: &WideChannel) -> WideChannel {
    map_d(a, |x| -x)
}

pub fn dadd(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_d(a, b, |x, y| x + y)
}

pub fn dmul(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_d(a, b, |x, y| x * y)
}

pub fn ddiv(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_d(a, b, |x, y| x / y)
}

pub fn dmax(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_d(a, b, f64::max)
}

pub fn dmin(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_d(a, b, f64::min)
}

pub fn drcp(a: &WideChannel) -> WideChannel {
    map_d(a, |x| 1.0 / x)
}

pub fn dsqrt(a: &WideChannel) -> WideChannel {
    map_d(a, f64::sqrt)
}

pub fn drsq(a: &WideChannel) -> WideChannel {
    map_d(a, |x| 1.0 / x.sqrt())
}

pub fn dmad(a: &WideChannel, b: &WideChannel, c: &WideChannel) -> WideChannel {
    let (a, b, c) = (a.as_f64(), b.as_f64(), c.as_f64());
    WideChannel::from_f64(array::from_fn(|i| a[i] * b[i] + c[i]))
}

pub fn dfrac(a: &WideChannel) -> WideChannel {
    map_d(a, |x| x - x.floor())
}

pub fn dflr(a: &WideChannel) -> WideChannel {
    map_d(a, f64::floor)
}

pub fn dldexp(a: &WideChannel, exp: &Channel) -> WideChannel {
    let (a, exp) = (a.as_f64(), exp.as_i32());
    WideChannel::from_f64(array::from_fn(|i| scalbn(a[i], exp[i])))
}

pub fn dslt(a: &WideChannel, b: &WideChannel) -> Channel {
    let (x, y) = (a.as_f64(), b.as_f64());
    lane_mask(|i| x[i] < y[i])
}

pub fn dsge(a: &WideChannel, b: &WideChannel) -> Channel {
    let (x, y) = (a.as_f64(), b.as_f64());
    lane_mask(|i| x[i] >= y[i])
}

pub fn dseq(a: &WideChannel, b: &WideChannel) -> Channel {
    let (x, y) = (a.as_f64(), b.as_f64());
    lane_mask(|i| x[i] == y[i])
}

pub fn dsne(a: &WideChannel, b: &WideChannel) -> Channel {
    let (x, y) = (a.as_f64(), b.as_f64());
    lane_mask(|i| x[i] != y[i])
}

pub fn f2d(a: &Channel) -> WideChannel {
    let a = a.as_f32();
    WideChannel::from_f64(array::from_fn(|i| a[i] as f64))
}

pub fn i2d(a: &Channel) -> WideChannel {
    let a = a.as_i32();
    WideChannel::from_f64(array::from_fn(|i| a[i] as f64))
}

pub fn u2d(a: &Channel) -> WideChannel {
    WideChannel::from_f64(array::from_fn(|i| a.0[i] as f64))
}

pub fn d2f(a: &WideChannel) -> Channel {
    let a = a.as_f64();
    Channel::from_f32(array::from_fn(|i| a[i] as f32))
}

pub fn d2i(a: &WideChannel) -> Channel {
    let a = a.as_f64();
    Channel::from_i32(array::from_fn(|i| a[i] as i32))
}

pub fn d2u(a: &WideChannel) -> Channel {
    let a = a.as_f64();
    Channel(array::from_fn(|i| a[i] as u32))
}

// ================================================================================================
// 64-bit integer
// ================================================================================================

pub fn i64abs(a: &WideChannel) -> WideChannel {
    WideChannel::from_i64(a.as_i64().map(i64::wrapping_abs))
}

pub fn i64ssg(a: &WideChannel) -> WideChannel {
    WideChannel::from_i64(a.as_i64().map(i64::signum))
}

pub fn i64neg(a: &WideChannel) -> WideChannel {
    WideChannel::from_i64(a.as_i64().map(i64::wrapping_neg))
}

pub fn u64add(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_u64(a, b, u64::wrapping_add)
}

pub fn u64mul(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_u64(a, b, u64::wrapping_mul)
}

pub fn u64min(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_u64(a, b, u64::min)
}

pub fn u64max(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_u64(a, b, u64::max)
}

pub fn i64min(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_i64(a, b, i64::min)
}

pub fn i64max(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_i64(a, b, i64::max)
}

/// All ones when dividing by zero
pub fn u64div(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_u64(a, b, |x, y| x.checked_div(y).unwrap_or(!0))
}

/// All ones when dividing by zero
pub fn u64mod(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_u64(a, b, |x, y| x.checked_rem(y).unwrap_or(!0))
}

/// 0 when dividing by zero
pub fn i64div(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_i64(a, b, |x, y| if y == 0 { 0 } else { x.wrapping_div(y) })
}

/// -1 when dividing by zero
pub fn i64mod(a: &WideChannel, b: &WideChannel) -> WideChannel {
    zip_i64(a, b, |x, y| if y == 0 { -1 } else { x.wrapping_rem(y) })
}

pub fn u64seq(a: &WideChannel, b: &WideChannel) -> Channel {
    lane_mask(|i| a.0[i] == b.0[i])
}

pub fn u64sne(a: &WideChannel, b: &WideChannel) -> Channel {
    lane_mask(|i| a.0[i] != b.0[i])
}

pub fn u64slt(a: &WideChannel, b: &WideChannel) -> Channel {
    lane_mask(|i| a.0[i] < b.0[i])
}

pub fn u64sge(a: &WideChannel, b: &WideChannel) -> Channel {
    lane_mask(|i| a.0[i] >= b.0[i])
}

pub fn i64slt(a: &WideChannel, b: &WideChannel) -> Channel {
    let (x, y) = (a.as_i64(), b.as_i64());
    lane_mask(|i| x[i] < y[i])
}

pub fn i64sge(a: &WideChannel, b: &WideChannel) -> Channel {
    let (x, y) = (a.as_i64(), b.as_i64());
    lane_mask(|i| x[i] >= y[i])
}

pub fn u64shl(a: &WideChannel, count: &Channel) -> WideChannel {
    WideChannel(array::from_fn(|i| a.0[i] << (count.0[i] & 0x3f)))
}

pub fn i64shr(a: &WideChannel, count: &Channel) -> WideChannel {
    let a = a.as_i64();
    WideChannel::from_i64(array::from_fn(|i| a[i] >> (count.0[i] & 0x3f)))
}

pub fn u64shr(a: &WideChannel, count: &Channel) -> WideChannel {
    WideChannel(array::from_fn(|i| a.0[i] >> (count.0[i] & 0x3f)))
}

pub fn f2u64(a: &Channel) -> WideChannel {
    let a = a.as_f32();
    WideChannel(array::from_fn(|i| a[i] as u64))
}

pub fn f2i64(a: &Channel) -> WideChannel {
    let a = a.as_f32();
    WideChannel::from_i64(array::from_fn(|i| a[i] as i64))
}

pub fn u2i64(a: &Channel) -> WideChannel {
    WideChannel(array::from_fn(|i| a.0[i] as u64))
}

pub fn i2i64(a: &Channel) -> WideChannel {
    let a = a.as_i32();
    WideChannel::from_i64(array::from_fn(|i| a[i] as i64))
}

pub fn d2u64(a: &WideChannel) -> WideChannel {
    let a = a.as_f64();
    WideChannel(array::from_fn(|i| a[i] as u64))
}

pub fn d2i64(a: &WideChannel) -> WideChannel {
    let a = a.as_f64();
    WideChannel::from_i64(array::from_fn(|i| a[i] as i64))
}

pub fn u642d(a: &WideChannel) -> WideChannel {
    WideChannel::from_f64(array::from_fn(|i| a.0[i] as f64))
}

pub fn i642d(a: &WideChannel) -> WideChannel {
    let a = a.as_i64();
    WideChannel::from_f64(array::from_fn(|i| a[i] as f64))
}

pub fn u642f(a: &WideChannel) -> Channel {
    Channel::from_f32(array::from_fn(|i| a.0[i] as f32))
}

pub fn i642f(a: &WideChannel) -> Channel {
    let a = a.as_i64();
    Channel::from_f32(array::from_fn(|i| a[i] as f32))
}
