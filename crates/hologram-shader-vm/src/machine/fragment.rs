//! Fragment inputs: interpolation at pc 0 and the `INTERP_*` opcodes

use super::operand::DataType;
use super::Machine;
use crate::channel::Channel;
use crate::error::{ExecResult, Fault};
use crate::interp;
use crate::isa::{Instruction, InterpMode, Program, RegisterFile, SemanticName, SrcRegister, CHAN_X, CHAN_Y};
use crate::perf::perf_span;

/// Where an `INTERP_*` opcode re-evaluates its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InterpAt {
    Centroid,
    Sample,
    Offset,
}

impl Machine {
    /// Evaluate every interpolated input declaration at the quad position
    ///
    /// Inputs declared without an interpolation mode keep whatever the
    /// caller stored.
    pub(super) fn interpolate_inputs(&mut self, program: &Program) -> ExecResult<()> {
        let _span = perf_span!("machine_interpolate");
        let flatshade = self.config.flatshade;
        for decl in program.declarations_of(RegisterFile::Input) {
            if decl.semantic.map(|s| s.name) == Some(SemanticName::Face) {
                self.regs.inputs.get_mut(decl.first as i64)?[CHAN_X] = Channel::splat_f32(self.face);
                continue;
            }
            let Some(mode) = decl.interpolate else { continue };
            let mode = interp::resolve(mode, flatshade);
            for index in decl.range() {
                let index = index as usize;
                let coef = *self.interp_coefs.get(index).ok_or(Fault::IndexOutOfRange {
                    file: RegisterFile::Input,
                    index: index as i64,
                    capacity: self.interp_coefs.len(),
                })?;
                if let Some(slot) = self.interp_modes.get_mut(index) {
                    *slot = mode;
                }
                let reg = self.regs.inputs.get_mut(index as i64)?;
                for chan in decl.usage_mask.channels() {
                    reg[chan] = interp::evaluate(mode, &coef, chan, &self.quad_pos);
                }
            }
        }
        Ok(())
    }

    /// `INTERP_CENTROID`, `INTERP_SAMPLE`, `INTERP_OFFSET`
    ///
    /// Centroid evaluation is the pixel center. Sample and offset shift the
    /// interpolated value along the input's plane; constant inputs do not move.
    pub(super) fn exec_interp(&mut self, inst: &Instruction, at: InterpAt) -> ExecResult<()> {
        let reg = *inst.src_at(0)?;
        let index = self.unit_of(reg.index, reg.indirect.as_ref())? as usize;
        let coef = *self.interp_coefs.get(index).ok_or(Fault::IndexOutOfRange {
            file: RegisterFile::Input,
            index: index as i64,
            capacity: self.interp_coefs.len(),
        })?;
        let mode = self.interp_modes.get(index).copied().unwrap_or(InterpMode::Constant);

        let offset = match at {
            InterpAt::Centroid => None,
            InterpAt::Sample => {
                let sample = self.fetch_src(inst, 1, CHAN_X, DataType::Uint)?.u32(0);
                interp::sample_offset(sample).map(|(x, y)| ([x; 4], [y; 4]))
            }
            InterpAt::Offset => Some((
                self.fetch_src(inst, 1, CHAN_X, DataType::Float)?.as_f32(),
                self.fetch_src(inst, 1, CHAN_Y, DataType::Float)?.as_f32(),
            )),
        };

        // modifiers apply after the shift
        let plain = SrcRegister {
            absolute: false,
            negate: false,
            ..reg
        };
        let mut out = [Channel::ZERO; 4];
        for chan in inst.dst_at(0)?.write_mask.channels() {
            let mut value = self.fetch(&plain, chan, DataType::Float)?;
            if let Some((ofs_x, ofs_y)) = &offset {
                let comp = reg.swizzle.component(chan) as usize;
                interp::apply_offset(mode, &coef, comp, ofs_x, ofs_y, &self.quad_pos, &mut value);
            }
            if reg.absolute {
                value = Channel::from_f32(value.as_f32().map(f32::abs));
            }
            if reg.negate {
                value = Channel::from_f32(value.as_f32().map(|v| -v));
            }
            out[chan] = value;
        }
        self.store_masked(inst, &out)
    }
}
