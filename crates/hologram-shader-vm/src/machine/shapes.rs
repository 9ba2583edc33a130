//! Instruction shapes
//!
//! Most opcodes differ only in the micro-op they apply. A shape fetches the
//! operands, applies the micro-op and stores the result; vector shapes
//! compute every enabled channel before storing any, so a destination that
//! aliases a source reads the old value.

use super::operand::{check_pairs, DataType, WideType};
use super::Machine;
use crate::channel::{lanes_where, Channel};
use crate::error::{ExecResult, Fault};
use crate::isa::{Instruction, Opcode, WriteMask, CHAN_W, CHAN_X, CHAN_Y, CHAN_Z};
use crate::micro::{
    self, BinaryFn, NarrowFn, QuaternaryFn, TrinaryFn, UnaryFn, WideBinaryFn, WideCompareFn, WideScalarFn,
    WideTrinaryFn, WideUnaryFn, WidenFn,
};
use half::f16;

const PAIRS: [(WriteMask, usize, usize); 2] = [(WriteMask::XY, CHAN_X, CHAN_Y), (WriteMask::ZW, CHAN_Z, CHAN_W)];

impl Machine {
    fn write_mask(inst: &Instruction) -> ExecResult<WriteMask> {
        Ok(inst.dst_at(0)?.write_mask)
    }

    // ============================================================================================
    // 32-bit shapes
    // ============================================================================================

    /// Compute on channel X, broadcast to the write mask
    pub(super) fn scalar_unary(&mut self, inst: &Instruction, op: UnaryFn, ty: DataType) -> ExecResult<()> {
        let a = self.fetch_src(inst, 0, CHAN_X, ty)?;
        self.store_broadcast(inst, &op(&a))
    }

    pub(super) fn scalar_binary(&mut self, inst: &Instruction, op: BinaryFn, ty: DataType) -> ExecResult<()> {
        let a = self.fetch_src(inst, 0, CHAN_X, ty)?;
        let b = self.fetch_src(inst, 1, CHAN_X, ty)?;
        self.store_broadcast(inst, &op(&a, &b))
    }

    pub(super) fn vector_unary(&mut self, inst: &Instruction, op: UnaryFn, ty: DataType) -> ExecResult<()> {
        let mut out = [Channel::ZERO; 4];
        for chan in Self::write_mask(inst)?.channels() {
            out[chan] = op(&self.fetch_src(inst, 0, chan, ty)?);
        }
        self.store_masked(inst, &out)
    }

    pub(super) fn vector_binary(&mut self, inst: &Instruction, op: BinaryFn, ty: DataType) -> ExecResult<()> {
        let mut out = [Channel::ZERO; 4];
        for chan in Self::write_mask(inst)?.channels() {
            let a = self.fetch_src(inst, 0, chan, ty)?;
            let b = self.fetch_src(inst, 1, chan, ty)?;
            out[chan] = op(&a, &b);
        }
        self.store_masked(inst, &out)
    }

    pub(super) fn vector_trinary(&mut self, inst: &Instruction, op: TrinaryFn, ty: DataType) -> ExecResult<()> {
        let mut out = [Channel::ZERO; 4];
        for chan in Self::write_mask(inst)?.channels() {
            let a = self.fetch_src(inst, 0, chan, ty)?;
            let b = self.fetch_src(inst, 1, chan, ty)?;
            let c = self.fetch_src(inst, 2, chan, ty)?;
            out[chan] = op(&a, &b, &c);
        }
        self.store_masked(inst, &out)
    }

    pub(super) fn vector_quaternary(&mut self, inst: &Instruction, op: QuaternaryFn, ty: DataType) -> ExecResult<()> {
        let mut out = [Channel::ZERO; 4];
        for chan in Self::write_mask(inst)?.channels() {
            let a = self.fetch_src(inst, 0, chan, ty)?;
            let b = self.fetch_src(inst, 1, chan, ty)?;
            let c = self.fetch_src(inst, 2, chan, ty)?;
            let d = self.fetch_src(inst, 3, chan, ty)?;
            out[chan] = op(&a, &b, &c, &d);
        }
        self.store_masked(inst, &out)
    }

    // ============================================================================================
    // 64-bit shapes
    // ============================================================================================

    pub(super) fn wide_unary(&mut self, inst: &Instruction, op: WideUnaryFn, ty: WideType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        check_pairs(mask)?;
        for (pair, lo, hi) in PAIRS {
            if mask.intersects(pair) {
                let a = self.fetch_wide(inst, 0, lo, hi, ty)?;
                self.store_wide(inst, &op(&a), lo, Some(hi))?;
            }
        }
        Ok(())
    }

    pub(super) fn wide_binary(&mut self, inst: &Instruction, op: WideBinaryFn, ty: WideType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        check_pairs(mask)?;
        for (pair, lo, hi) in PAIRS {
            if mask.intersects(pair) {
                let a = self.fetch_wide(inst, 0, lo, hi, ty)?;
                let b = self.fetch_wide(inst, 1, lo, hi, ty)?;
                self.store_wide(inst, &op(&a, &b), lo, Some(hi))?;
            }
        }
        Ok(())
    }

    pub(super) fn wide_trinary(&mut self, inst: &Instruction, op: WideTrinaryFn, ty: WideType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        check_pairs(mask)?;
        for (pair, lo, hi) in PAIRS {
            if mask.intersects(pair) {
                let a = self.fetch_wide(inst, 0, lo, hi, ty)?;
                let b = self.fetch_wide(inst, 1, lo, hi, ty)?;
                let c = self.fetch_wide(inst, 2, lo, hi, ty)?;
                self.store_wide(inst, &op(&a, &b, &c), lo, Some(hi))?;
            }
        }
        Ok(())
    }

    /// 64-bit comparison: one 32-bit result per pair, in the pair's first enabled channel
    pub(super) fn wide_compare(&mut self, inst: &Instruction, op: WideCompareFn, ty: WideType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        for (pair, lo, hi) in PAIRS {
            if mask.intersects(pair) {
                let a = self.fetch_wide(inst, 0, lo, hi, ty)?;
                let b = self.fetch_wide(inst, 1, lo, hi, ty)?;
                let chan = if mask.contains(lo) { lo } else { hi };
                self.store(&op(&a, &b), inst.dst_at(0)?, chan, false)?;
            }
        }
        Ok(())
    }

    /// 64-bit first operand, 32-bit second operand from the pair's low channel
    pub(super) fn wide_scalar(&mut self, inst: &Instruction, op: WideScalarFn, ty: WideType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        check_pairs(mask)?;
        for (pair, lo, hi) in PAIRS {
            if mask.intersects(pair) {
                let a = self.fetch_wide(inst, 0, lo, hi, ty)?;
                let b = self.fetch_src(inst, 1, lo, DataType::Int)?;
                self.store_wide(inst, &op(&a, &b), lo, Some(hi))?;
            }
        }
        Ok(())
    }

    /// 32-bit to 64-bit: source X fills XY, source Y fills ZW
    pub(super) fn widen(&mut self, inst: &Instruction, op: WidenFn, ty: DataType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        check_pairs(mask)?;
        for (src_chan, (pair, lo, hi)) in PAIRS.into_iter().enumerate() {
            if mask.covers(pair) {
                let a = self.fetch_src(inst, 0, src_chan, ty)?;
                self.store_wide(inst, &op(&a), lo, Some(hi))?;
            }
        }
        Ok(())
    }

    /// 64-bit to 32-bit: the i-th enabled channel receives pair i
    pub(super) fn narrow(&mut self, inst: &Instruction, op: NarrowFn, ty: WideType) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        for ((_, lo, hi), chan) in PAIRS.into_iter().zip(mask.channels()) {
            let a = self.fetch_wide(inst, 0, lo, hi, ty)?;
            self.store_dst(inst, &op(&a), chan)?;
        }
        Ok(())
    }

    // ============================================================================================
    // Legacy vector opcodes
    // ============================================================================================

    /// `DP2`/`DP3`/`DP4`
    pub(super) fn exec_dot(&mut self, inst: &Instruction, width: usize) -> ExecResult<()> {
        let a = self.fetch_src(inst, 0, CHAN_X, DataType::Float)?;
        let b = self.fetch_src(inst, 1, CHAN_X, DataType::Float)?;
        let mut sum = micro::mul(&a, &b);
        for chan in 1..width {
            let a = self.fetch_src(inst, 0, chan, DataType::Float)?;
            let b = self.fetch_src(inst, 1, chan, DataType::Float)?;
            sum = micro::mad(&a, &b, &sum);
        }
        self.store_broadcast(inst, &sum)
    }

    pub(super) fn exec_dst(&mut self, inst: &Instruction) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        let mut out = [Channel::splat_f32(1.0); 4];
        if mask.contains(CHAN_Y) {
            let a = self.fetch_src(inst, 0, CHAN_Y, DataType::Float)?;
            let b = self.fetch_src(inst, 1, CHAN_Y, DataType::Float)?;
            out[CHAN_Y] = micro::mul(&a, &b);
        }
        if mask.contains(CHAN_Z) {
            out[CHAN_Z] = self.fetch_src(inst, 0, CHAN_Z, DataType::Float)?;
        }
        if mask.contains(CHAN_W) {
            out[CHAN_W] = self.fetch_src(inst, 1, CHAN_W, DataType::Float)?;
        }
        self.store_masked(inst, &out)
    }

    pub(super) fn exec_lit(&mut self, inst: &Instruction) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        let one = Channel::splat_f32(1.0);
        let zero = Channel::ZERO;
        if mask.intersects(WriteMask(0b0110)) {
            let x = self.fetch_src(inst, 0, CHAN_X, DataType::Float)?;
            if mask.contains(CHAN_Z) {
                let y = micro::max(&self.fetch_src(inst, 0, CHAN_Y, DataType::Float)?, &zero);
                let w = self.fetch_src(inst, 0, CHAN_W, DataType::Float)?;
                let w = micro::max(&micro::min(&w, &Channel::splat_f32(128.0)), &Channel::splat_f32(-128.0));
                let p = micro::pow(&y, &w);
                let (xs, ps) = (x.as_f32(), p.as_f32());
                let z = Channel::from_f32(std::array::from_fn(|i| if 0.0 < xs[i] { ps[i] } else { 0.0 }));
                self.store_dst(inst, &z, CHAN_Z)?;
            }
            if mask.contains(CHAN_Y) {
                self.store_dst(inst, &micro::max(&x, &zero), CHAN_Y)?;
            }
        }
        if mask.contains(CHAN_X) {
            self.store_dst(inst, &one, CHAN_X)?;
        }
        if mask.contains(CHAN_W) {
            self.store_dst(inst, &one, CHAN_W)?;
        }
        Ok(())
    }

    pub(super) fn exec_exp(&mut self, inst: &Instruction) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        let x = self.fetch_src(inst, 0, CHAN_X, DataType::Float)?;
        let floor = micro::flr(&x);
        if mask.contains(CHAN_X) {
            self.store_dst(inst, &micro::ex2(&floor), CHAN_X)?;
        }
        if mask.contains(CHAN_Y) {
            let frac = Channel::from_f32(std::array::from_fn(|i| x.f32(i) - floor.f32(i)));
            self.store_dst(inst, &frac, CHAN_Y)?;
        }
        if mask.contains(CHAN_Z) {
            self.store_dst(inst, &micro::ex2(&x), CHAN_Z)?;
        }
        if mask.contains(CHAN_W) {
            self.store_dst(inst, &Channel::splat_f32(1.0), CHAN_W)?;
        }
        Ok(())
    }

    pub(super) fn exec_log(&mut self, inst: &Instruction) -> ExecResult<()> {
        let mask = Self::write_mask(inst)?;
        let x = self.fetch_src(inst, 0, CHAN_X, DataType::Float)?;
        let abs = Channel::from_f32(x.as_f32().map(f32::abs));
        let log = micro::lg2(&abs);
        let floor = micro::flr(&log);
        if mask.contains(CHAN_X) {
            self.store_dst(inst, &floor, CHAN_X)?;
        }
        if mask.contains(CHAN_Y) {
            self.store_dst(inst, &micro::div(&abs, &micro::ex2(&floor)), CHAN_Y)?;
        }
        if mask.contains(CHAN_Z) {
            self.store_dst(inst, &log, CHAN_Z)?;
        }
        if mask.contains(CHAN_W) {
            self.store_dst(inst, &Channel::splat_f32(1.0), CHAN_W)?;
        }
        Ok(())
    }

    /// `PK2H`: x and y to half floats packed in one word
    pub(super) fn exec_pk2h(&mut self, inst: &Instruction) -> ExecResult<()> {
        let x = self.fetch_src(inst, 0, CHAN_X, DataType::Float)?;
        let y = self.fetch_src(inst, 0, CHAN_Y, DataType::Float)?;
        let packed = Channel(std::array::from_fn(|i| {
            f16::from_f32(x.f32(i)).to_bits() as u32 | (f16::from_f32(y.f32(i)).to_bits() as u32) << 16
        }));
        let dst = *inst.dst_at(0)?;
        for chan in dst.write_mask.channels() {
            self.store(&packed, &dst, chan, false)?;
        }
        Ok(())
    }

    /// `UP2H`: the low half goes to x and z, the high half to y and w
    pub(super) fn exec_up2h(&mut self, inst: &Instruction) -> ExecResult<()> {
        let packed = self.fetch_src(inst, 0, CHAN_X, DataType::Uint)?;
        let low = Channel::from_f32(packed.0.map(|w| f16::from_bits(w as u16).to_f32()));
        let high = Channel::from_f32(packed.0.map(|w| f16::from_bits((w >> 16) as u16).to_f32()));
        self.store_masked(inst, &[low, high, low, high])
    }

    /// `KILL_IF`: kill lanes where any swizzled component is negative
    pub(super) fn exec_kill_if(&mut self, inst: &Instruction) -> ExecResult<()> {
        let reg = *inst.src_at(0)?;
        let mut tested = 0u8;
        let mut kill = 0u8;
        for chan in 0..4 {
            let comp = reg.swizzle.component(chan);
            if comp > 3 {
                return Err(Fault::BadSwizzle(comp));
            }
            if tested & (1 << comp) != 0 {
                continue;
            }
            tested |= 1 << comp;
            let value = self.fetch(&reg, chan, DataType::Float)?;
            kill |= lanes_where(|lane| value.f32(lane) < 0.0);
        }
        self.kill_mask |= kill & self.control.exec_mask();
        Ok(())
    }

    pub(super) fn exec_kill(&mut self) {
        self.kill_mask |= self.control.exec_mask();
    }

    /// Opcodes whose dot-product width is fixed
    pub(super) fn dot_width(opcode: Opcode) -> usize {
        match opcode {
            Opcode::Dp2 => 2,
            Opcode::Dp3 => 3,
            _ => 4,
        }
    }
}
