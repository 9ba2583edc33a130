//! Opcode dispatch
//!
//! [`handler`] classifies every opcode: most bind a micro-op to one of the
//! generic shapes in `shapes.rs`, the rest need bespoke handling in
//! [`Machine::execute_special`].

use super::fragment::InterpAt;
use super::operand::{DataType, WideType};
use super::texture::{SampleModifier, TexModifier};
use super::Machine;
use crate::channel::lanes_where;
use crate::control::Flow;
use crate::error::{ExecResult, Fault};
use crate::isa::{Instruction, Opcode, CHAN_X};
use crate::micro::{
    self, BinaryFn, NarrowFn, QuaternaryFn, TrinaryFn, UnaryFn, WideBinaryFn, WideCompareFn, WideScalarFn,
    WideTrinaryFn, WideUnaryFn, WidenFn,
};
use std::sync::atomic::{fence, Ordering};

/// How an opcode is executed
#[derive(Debug, Clone, Copy)]
pub(super) enum Handler {
    ScalarUnary(UnaryFn, DataType),
    ScalarBinary(BinaryFn, DataType),
    VectorUnary(UnaryFn, DataType),
    VectorBinary(BinaryFn, DataType),
    VectorTrinary(TrinaryFn, DataType),
    VectorQuaternary(QuaternaryFn, DataType),
    WideUnary(WideUnaryFn, WideType),
    WideBinary(WideBinaryFn, WideType),
    WideTrinary(WideTrinaryFn, WideType),
    WideCompare(WideCompareFn, WideType),
    WideScalar(WideScalarFn, WideType),
    Widen(WidenFn, DataType),
    Narrow(NarrowFn, WideType),
    Special,
}

pub(super) fn handler(opcode: Opcode) -> Handler {
    use DataType::{Float, Int, Uint};
    use Handler::*;
    use Opcode::*;
    use WideType::{Double, Int64};

    match opcode {
        // float
        Mov => VectorUnary(micro::mov, Float),
        Arl => VectorUnary(micro::arl, Float),
        Arr => VectorUnary(micro::arr, Float),
        Rcp => ScalarUnary(micro::rcp, Float),
        Rsq => ScalarUnary(micro::rsq, Float),
        Sqrt => ScalarUnary(micro::sqrt, Float),
        Ex2 => ScalarUnary(micro::ex2, Float),
        Lg2 => ScalarUnary(micro::lg2, Float),
        Cos => ScalarUnary(micro::cos, Float),
        Sin => ScalarUnary(micro::sin, Float),
        Pow => ScalarBinary(micro::pow, Float),
        Add => VectorBinary(micro::add, Float),
        Mul => VectorBinary(micro::mul, Float),
        Div => VectorBinary(micro::div, Float),
        Min => VectorBinary(micro::min, Float),
        Max => VectorBinary(micro::max, Float),
        Slt => VectorBinary(micro::slt, Float),
        Sle => VectorBinary(micro::sle, Float),
        Sgt => VectorBinary(micro::sgt, Float),
        Sge => VectorBinary(micro::sge, Float),
        Seq => VectorBinary(micro::seq, Float),
        Sne => VectorBinary(micro::sne, Float),
        Fseq => VectorBinary(micro::fseq, Float),
        Fsne => VectorBinary(micro::fsne, Float),
        Fslt => VectorBinary(micro::fslt, Float),
        Fsge => VectorBinary(micro::fsge, Float),
        Ldexp => VectorBinary(micro::ldexp, Float),
        Mad => VectorTrinary(micro::mad, Float),
        Lrp => VectorTrinary(micro::lrp, Float),
        Cmp => VectorTrinary(micro::cmp, Float),
        Frc => VectorUnary(micro::frc, Float),
        Flr => VectorUnary(micro::flr, Float),
        Ceil => VectorUnary(micro::ceil, Float),
        Round => VectorUnary(micro::rnd, Float),
        Trunc => VectorUnary(micro::trunc, Float),
        Ssg => VectorUnary(micro::ssg, Float),
        Ddx => VectorUnary(micro::ddx, Float),
        DdxFine => VectorUnary(micro::ddx_fine, Float),
        Ddy => VectorUnary(micro::ddy, Float),
        DdyFine => VectorUnary(micro::ddy_fine, Float),
        F2i => VectorUnary(micro::f2i, Float),
        F2u => VectorUnary(micro::f2u, Float),

        // signed integer
        I2f => VectorUnary(micro::i2f, Int),
        Ineg => VectorUnary(micro::ineg, Int),
        Iabs => VectorUnary(micro::iabs, Int),
        Issg => VectorUnary(micro::issg, Int),
        Imsb => VectorUnary(micro::imsb, Int),
        Mod => VectorBinary(micro::imod, Int),
        Idiv => VectorBinary(micro::idiv, Int),
        Imax => VectorBinary(micro::imax, Int),
        Imin => VectorBinary(micro::imin, Int),
        Isge => VectorBinary(micro::isge, Int),
        Islt => VectorBinary(micro::islt, Int),
        Ishr => VectorBinary(micro::ishr, Int),
        ImulHi => VectorBinary(micro::imul_hi, Int),
        Ibfe => VectorTrinary(micro::ibfe, Int),

        // unsigned integer and bits
        U2f => VectorUnary(micro::u2f, Uint),
        Uarl => VectorUnary(micro::uarl, Uint),
        Not => VectorUnary(micro::not, Uint),
        Brev => VectorUnary(micro::brev, Uint),
        Popc => VectorUnary(micro::popc, Uint),
        Lsb => VectorUnary(micro::lsb, Uint),
        Umsb => VectorUnary(micro::umsb, Uint),
        Shl => VectorBinary(micro::shl, Uint),
        And => VectorBinary(micro::and, Uint),
        Or => VectorBinary(micro::or, Uint),
        Xor => VectorBinary(micro::xor, Uint),
        Uadd => VectorBinary(micro::uadd, Uint),
        Umul => VectorBinary(micro::umul, Uint),
        Udiv => VectorBinary(micro::udiv, Uint),
        Umod => VectorBinary(micro::umod, Uint),
        Umax => VectorBinary(micro::umax, Uint),
        Umin => VectorBinary(micro::umin, Uint),
        UmulHi => VectorBinary(micro::umul_hi, Uint),
        Useq => VectorBinary(micro::useq, Uint),
        Usne => VectorBinary(micro::usne, Uint),
        Usge => VectorBinary(micro::usge, Uint),
        Uslt => VectorBinary(micro::uslt, Uint),
        Ushr => VectorBinary(micro::ushr, Uint),
        Umad => VectorTrinary(micro::umad, Uint),
        Ucmp => VectorTrinary(micro::ucmp, Uint),
        Ubfe => VectorTrinary(micro::ubfe, Uint),
        Bfi => VectorQuaternary(micro::bfi, Uint),

        // double
        Dabs => WideUnary(micro::dabs, Double),
        Dneg => WideUnary(micro::dneg, Double),
        Drcp => WideUnary(micro::drcp, Double),
        Dsqrt => WideUnary(micro::dsqrt, Double),
        Drsq => WideUnary(micro::drsq, Double),
        Dfrac => WideUnary(micro::dfrac, Double),
        Dflr => WideUnary(micro::dflr, Double),
        D2u64 => WideUnary(micro::d2u64, Double),
        D2i64 => WideUnary(micro::d2i64, Double),
        Dadd => WideBinary(micro::dadd, Double),
        Dmul => WideBinary(micro::dmul, Double),
        Ddiv => WideBinary(micro::ddiv, Double),
        Dmax => WideBinary(micro::dmax, Double),
        Dmin => WideBinary(micro::dmin, Double),
        Dmad => WideTrinary(micro::dmad, Double),
        Dslt => WideCompare(micro::dslt, Double),
        Dsge => WideCompare(micro::dsge, Double),
        Dseq => WideCompare(micro::dseq, Double),
        Dsne => WideCompare(micro::dsne, Double),
        Dldexp => WideScalar(micro::dldexp, Double),
        F2d => Widen(micro::f2d, Float),
        I2d => Widen(micro::i2d, Int),
        U2d => Widen(micro::u2d, Uint),
        D2f => Narrow(micro::d2f, Double),
        D2i => Narrow(micro::d2i, Double),
        D2u => Narrow(micro::d2u, Double),

        // 64-bit integer
        I64abs => WideUnary(micro::i64abs, Int64),
        I64ssg => WideUnary(micro::i64ssg, Int64),
        I64neg => WideUnary(micro::i64neg, Int64),
        U642d => WideUnary(micro::u642d, Int64),
        I642d => WideUnary(micro::i642d, Int64),
        U64add => WideBinary(micro::u64add, Int64),
        U64mul => WideBinary(micro::u64mul, Int64),
        U64min => WideBinary(micro::u64min, Int64),
        U64max => WideBinary(micro::u64max, Int64),
        I64min => WideBinary(micro::i64min, Int64),
        I64max => WideBinary(micro::i64max, Int64),
        U64div => WideBinary(micro::u64div, Int64),
        I64div => WideBinary(micro::i64div, Int64),
        U64mod => WideBinary(micro::u64mod, Int64),
        I64mod => WideBinary(micro::i64mod, Int64),
        U64seq => WideCompare(micro::u64seq, Int64),
        U64sne => WideCompare(micro::u64sne, Int64),
        U64slt => WideCompare(micro::u64slt, Int64),
        U64sge => WideCompare(micro::u64sge, Int64),
        I64slt => WideCompare(micro::i64slt, Int64),
        I64sge => WideCompare(micro::i64sge, Int64),
        U64shl => WideScalar(micro::u64shl, Int64),
        I64shr => WideScalar(micro::i64shr, Int64),
        U64shr => WideScalar(micro::u64shr, Int64),
        F2u64 => Widen(micro::f2u64, Float),
        F2i64 => Widen(micro::f2i64, Float),
        U2i64 => Widen(micro::u2i64, Uint),
        I2i64 => Widen(micro::i2i64, Int),
        U642f => Narrow(micro::u642f, Int64),
        I642f => Narrow(micro::i642f, Int64),

        _ => Special,
    }
}

impl Machine {
    /// Execute one instruction at index `pc`
    pub(super) fn execute(&mut self, inst: &Instruction, pc: usize) -> ExecResult<Flow> {
        use Handler::*;
        match handler(inst.opcode) {
            ScalarUnary(op, ty) => self.scalar_unary(inst, op, ty)?,
            ScalarBinary(op, ty) => self.scalar_binary(inst, op, ty)?,
            VectorUnary(op, ty) => self.vector_unary(inst, op, ty)?,
            VectorBinary(op, ty) => self.vector_binary(inst, op, ty)?,
            VectorTrinary(op, ty) => self.vector_trinary(inst, op, ty)?,
            VectorQuaternary(op, ty) => self.vector_quaternary(inst, op, ty)?,
            WideUnary(op, ty) => self.wide_unary(inst, op, ty)?,
            WideBinary(op, ty) => self.wide_binary(inst, op, ty)?,
            WideTrinary(op, ty) => self.wide_trinary(inst, op, ty)?,
            WideCompare(op, ty) => self.wide_compare(inst, op, ty)?,
            WideScalar(op, ty) => self.wide_scalar(inst, op, ty)?,
            Widen(op, ty) => self.widen(inst, op, ty)?,
            Narrow(op, ty) => self.narrow(inst, op, ty)?,
            Special => return self.execute_special(inst, pc),
        }
        Ok(Flow::Next)
    }

    fn execute_special(&mut self, inst: &Instruction, pc: usize) -> ExecResult<Flow> {
        use Opcode::*;
        match inst.opcode {
            // control flow
            If => {
                let cond = self.fetch_src(inst, 0, CHAN_X, DataType::Float)?;
                let lanes = lanes_where(|lane| cond.f32(lane) != 0.0);
                return self.control.if_(lanes, inst.label_target()?);
            }
            Uif => {
                let cond = self.fetch_src(inst, 0, CHAN_X, DataType::Uint)?;
                return self.control.if_(cond.nonzero_lanes(), inst.label_target()?);
            }
            Else => return self.control.else_(inst.label_target()?),
            Endif => self.control.endif()?,
            Bgnloop => self.control.bgnloop(pc)?,
            Endloop => return self.control.endloop(),
            Brk => self.control.brk(),
            Cont => self.control.cont(),
            Switch => {
                let selector = self.fetch_src(inst, 0, CHAN_X, DataType::Uint)?;
                self.control.switch(selector)?;
            }
            Case => {
                let value = self.fetch_src(inst, 0, CHAN_X, DataType::Uint)?;
                self.control.case(&value)?;
            }
            Default => self.control.default()?,
            Endswitch => self.control.endswitch()?,
            Cal => return self.control.call(pc + 1, inst.label_target()?),
            Ret => return self.control.ret(),
            Endsub => return self.control.endsub(),
            Bgnsub | Nop => {}
            End => {
                self.close_open_primitive()?;
                self.control.check_balanced()?;
                return Ok(Flow::Halt);
            }
            Barrier => return Ok(Flow::Suspend),
            Membar => fence(Ordering::SeqCst),

            // legacy vector ops
            Kill => self.exec_kill(),
            KillIf => self.exec_kill_if(inst)?,
            Lit => self.exec_lit(inst)?,
            Dst => self.exec_dst(inst)?,
            Exp => self.exec_exp(inst)?,
            Log => self.exec_log(inst)?,
            Dp2 | Dp3 | Dp4 => self.exec_dot(inst, Self::dot_width(inst.opcode))?,
            Pk2h => self.exec_pk2h(inst)?,
            Up2h => self.exec_up2h(inst)?,

            // geometry
            Emit => self.exec_emit(inst)?,
            Endprim => self.exec_endprim(inst)?,

            // fragment
            InterpCentroid => self.exec_interp(inst, InterpAt::Centroid)?,
            InterpSample => self.exec_interp(inst, InterpAt::Sample)?,
            InterpOffset => self.exec_interp(inst, InterpAt::Offset)?,

            // texture
            Tex => self.exec_tex(inst, TexModifier::None, 1)?,
            Tex2 => self.exec_tex(inst, TexModifier::None, 2)?,
            Txb => self.exec_tex(inst, TexModifier::Bias, 1)?,
            Txb2 => self.exec_tex(inst, TexModifier::Bias, 2)?,
            Txl => self.exec_tex(inst, TexModifier::Explicit, 1)?,
            Txl2 => self.exec_tex(inst, TexModifier::Explicit, 2)?,
            Txp => self.exec_tex(inst, TexModifier::Projected, 1)?,
            Tg4 => self.exec_tex(inst, TexModifier::Gather, 2)?,
            Txd => self.exec_txd(inst)?,
            Txf => self.exec_txf(inst, false)?,
            SampleI | SampleIMs => self.exec_txf(inst, true)?,
            Txq | Sviewinfo => self.exec_txq(inst)?,
            Lodq => self.exec_lodq(inst, false)?,
            Lod => self.exec_lodq(inst, true)?,
            Sample => self.exec_sample(inst, SampleModifier::None, false)?,
            SampleB => self.exec_sample(inst, SampleModifier::Bias, false)?,
            SampleC => self.exec_sample(inst, SampleModifier::None, true)?,
            SampleCLz => self.exec_sample(inst, SampleModifier::LevelZero, true)?,
            SampleL => self.exec_sample(inst, SampleModifier::Explicit, false)?,
            Gather4 => self.exec_sample(inst, SampleModifier::Gather, false)?,
            SampleD => self.exec_sample_d(inst)?,

            // memory
            Load => self.exec_load(inst)?,
            Store => self.exec_store(inst)?,
            Resq => self.exec_resq(inst)?,
            op if op.is_atomic() => self.exec_atomic(inst)?,

            other => return Err(Fault::UnexpectedOpcode(other.mnemonic())),
        }
        Ok(Flow::Next)
    }
}
