//! Operand fetch and store
//!
//! Source operands resolve to one [`Channel`] per requested component. Lanes
//! outside the execution mask never dereference an address register: their
//! index is forced to zero. Destination writes touch only executing lanes.

use super::Machine;
use crate::channel::{Channel, WideChannel, QUAD_SIZE};
use crate::error::{ExecResult, Fault};
use crate::isa::{DstRegister, Indirect, Instruction, RegisterFile, SrcRegister, WriteMask};
use crate::micro;

/// How source modifiers interpret a 32-bit operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataType {
    Float,
    Int,
    Uint,
}

/// How source modifiers interpret a 64-bit operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WideType {
    Double,
    Int64,
}

const SIGN_BIT: u32 = 0x8000_0000;

type LaneIndex = [i64; QUAD_SIZE];

impl Machine {
    /// Per-lane index `base + ADDR[..]`, zero in lanes that are not executing
    fn lane_indices(&self, base: i32, indirect: Option<&Indirect>) -> ExecResult<LaneIndex> {
        let mut index = [base as i64; QUAD_SIZE];
        if let Some(ind) = indirect {
            let offsets = self.address_channel(ind)?;
            let exec = self.control.exec_mask();
            for (lane, slot) in index.iter_mut().enumerate() {
                *slot = if exec & (1 << lane) != 0 {
                    *slot + offsets.i32(lane) as i64
                } else {
                    0
                };
            }
        }
        Ok(index)
    }

    pub(super) fn address_channel(&self, ind: &Indirect) -> ExecResult<Channel> {
        if ind.file != RegisterFile::Address {
            return Err(Fault::IndirectFile(ind.file));
        }
        if ind.component > 3 {
            return Err(Fault::BadSwizzle(ind.component));
        }
        Ok(self.regs.addrs.get(ind.index as i64)?[ind.component as usize])
    }

    /// Read component `comp` of `file` at per-lane indices
    pub(super) fn fetch_file(&self, file: RegisterFile, comp: usize, index: &LaneIndex, index2d: &LaneIndex) -> ExecResult<Channel> {
        let mut out = Channel::ZERO;
        match file {
            RegisterFile::Constant => {
                for lane in 0..QUAD_SIZE {
                    let pos = index[lane] * 4 + comp as i64;
                    out.0[lane] = if index[lane] < 0 {
                        0
                    } else {
                        self.regs.constant_word(index2d[lane], pos)?
                    };
                }
            }
            RegisterFile::Input => {
                let stride = self.regs.inputs_per_vertex as i64;
                for lane in 0..QUAD_SIZE {
                    let pos = index2d[lane] * stride + index[lane];
                    out.0[lane] = self.regs.inputs.get(pos)?[comp].0[lane];
                }
            }
            RegisterFile::Output => {
                let base = self.geometry.output_vertex_offset as i64;
                for lane in 0..QUAD_SIZE {
                    out.0[lane] = self.regs.outputs.get(base + index[lane])?[comp].0[lane];
                }
            }
            RegisterFile::Temporary => {
                for lane in 0..QUAD_SIZE {
                    out.0[lane] = self.regs.temps.get(index[lane])?[comp].0[lane];
                }
            }
            RegisterFile::Address => {
                for lane in 0..QUAD_SIZE {
                    out.0[lane] = self.regs.addrs.get(index[lane])?[comp].0[lane];
                }
            }
            RegisterFile::Immediate => {
                for lane in 0..QUAD_SIZE {
                    out.0[lane] = self.regs.immediates.get(index[lane])?[comp].0[lane];
                }
            }
            RegisterFile::SystemValue => {
                for lane in 0..QUAD_SIZE {
                    out.0[lane] = self.regs.system_values.get(index[lane])?[comp].0[lane];
                }
            }
            other => return Err(Fault::UnreadableFile(other)),
        }
        Ok(out)
    }

    /// Component `chan` of a source operand, before modifiers
    fn fetch_raw(&self, reg: &SrcRegister, chan: usize) -> ExecResult<Channel> {
        let comp = reg.swizzle.component(chan);
        if comp > 3 {
            return Err(Fault::BadSwizzle(comp));
        }
        let index = self.lane_indices(reg.index, reg.indirect.as_ref())?;
        let index2d = match &reg.dimension {
            Some(dim) => self.lane_indices(dim.index, dim.indirect.as_ref())?,
            None => [0; QUAD_SIZE],
        };
        self.fetch_file(reg.file, comp as usize, &index, &index2d)
    }

    /// Component `chan` of a source operand with absolute and negate applied
    pub(super) fn fetch(&self, reg: &SrcRegister, chan: usize, ty: DataType) -> ExecResult<Channel> {
        let mut value = self.fetch_raw(reg, chan)?;
        if reg.absolute {
            value = match ty {
                DataType::Float => Channel(value.0.map(|w| w & !SIGN_BIT)),
                DataType::Int | DataType::Uint => micro::iabs(&value),
            };
        }
        if reg.negate {
            value = match ty {
                DataType::Float => Channel(value.0.map(|w| w ^ SIGN_BIT)),
                DataType::Int | DataType::Uint => micro::ineg(&value),
            };
        }
        Ok(value)
    }

    /// Source `src` of `inst`, component `chan`
    #[inline]
    pub(super) fn fetch_src(&self, inst: &Instruction, src: usize, chan: usize, ty: DataType) -> ExecResult<Channel> {
        self.fetch(inst.src_at(src)?, chan, ty)
    }

    /// Lane 0 of a source component as a signed integer
    pub(super) fn fetch_scalar_i32(&self, inst: &Instruction, src: usize, chan: usize) -> ExecResult<i32> {
        Ok(self.fetch_src(inst, src, chan, DataType::Int)?.i32(0))
    }

    /// 64-bit value held in channels `lo` and `hi` of a source
    pub(super) fn fetch_wide(&self, inst: &Instruction, src: usize, lo: usize, hi: usize, ty: WideType) -> ExecResult<WideChannel> {
        let reg = inst.src_at(src)?;
        let mut value = WideChannel::from_pair(&self.fetch_raw(reg, lo)?, &self.fetch_raw(reg, hi)?);
        if reg.absolute {
            value = match ty {
                WideType::Double => micro::dabs(&value),
                WideType::Int64 => micro::i64abs(&value),
            };
        }
        if reg.negate {
            value = match ty {
                WideType::Double => micro::dneg(&value),
                WideType::Int64 => micro::i64neg(&value),
            };
        }
        Ok(value)
    }

    /// Sampler, resource or buffer unit named by source `src`
    ///
    /// An indirect unit is resolved from the first executing lane.
    pub(super) fn resource_unit(&self, reg: &SrcRegister) -> ExecResult<u32> {
        self.unit_of(reg.index, reg.indirect.as_ref())
    }

    pub(super) fn unit_of(&self, index: i32, indirect: Option<&Indirect>) -> ExecResult<u32> {
        let Some(ind) = indirect else {
            return Ok(index as u32);
        };
        let offsets = self.address_channel(ind)?;
        let exec = self.control.exec_mask();
        Ok((0..QUAD_SIZE)
            .find(|lane| exec & (1 << lane) != 0)
            .map(|lane| index.wrapping_add(offsets.i32(lane)) as u32)
            .unwrap_or(0))
    }

    // ============================================================================================
    // Store
    // ============================================================================================

    /// Write `value` to component `chan` of destination `dst` in executing lanes
    ///
    /// An indirect destination is addressed per lane.
    pub(super) fn store(&mut self, value: &Channel, dst: &DstRegister, chan: usize, saturate: bool) -> ExecResult<()> {
        let offsets = match &dst.indirect {
            Some(ind) => Some(self.address_channel(ind)?),
            None => None,
        };
        let exec = self.control.exec_mask();
        let value = if saturate {
            Channel::from_f32(value.as_f32().map(micro::saturate))
        } else {
            *value
        };
        let index = dst.index as i64;
        let (bank, base) = match dst.file {
            RegisterFile::Null => return Ok(()),
            RegisterFile::Output => (&mut self.regs.outputs, self.geometry.output_vertex_offset as i64),
            RegisterFile::Temporary => (&mut self.regs.temps, 0),
            RegisterFile::Address if offsets.is_none() => (&mut self.regs.addrs, 0),
            RegisterFile::Address => return Err(Fault::IndirectFile(RegisterFile::Address)),
            other => return Err(Fault::UnwritableFile(other)),
        };
        match offsets {
            None => bank.get_mut(base + index)?[chan].merge(&value, exec),
            Some(offsets) => {
                for lane in (0..QUAD_SIZE).filter(|lane| exec & (1 << lane) != 0) {
                    let target = bank.get_mut(base + index + offsets.i32(lane) as i64)?;
                    target[chan].0[lane] = value.0[lane];
                }
            }
        }
        Ok(())
    }

    /// Store to destination 0 of `inst`, honoring its saturate flag
    #[inline]
    pub(super) fn store_dst(&mut self, inst: &Instruction, value: &Channel, chan: usize) -> ExecResult<()> {
        self.store(value, inst.dst_at(0)?, chan, inst.saturate)
    }

    /// Store every channel of `values` selected by the destination's write mask
    pub(super) fn store_masked(&mut self, inst: &Instruction, values: &[Channel; 4]) -> ExecResult<()> {
        let dst = *inst.dst_at(0)?;
        for chan in dst.write_mask.channels() {
            self.store(&values[chan], &dst, chan, inst.saturate)?;
        }
        Ok(())
    }

    /// Store one value to every channel in the destination's write mask
    pub(super) fn store_broadcast(&mut self, inst: &Instruction, value: &Channel) -> ExecResult<()> {
        let dst = *inst.dst_at(0)?;
        for chan in dst.write_mask.channels() {
            self.store(value, &dst, chan, inst.saturate)?;
        }
        Ok(())
    }

    /// Store a 64-bit value to channels `lo` and (if present) `hi`
    ///
    /// Saturation clamps the value as a double, sending NaN to zero.
    pub(super) fn store_wide(&mut self, inst: &Instruction, value: &WideChannel, lo: usize, hi: Option<usize>) -> ExecResult<()> {
        let dst = *inst.dst_at(0)?;
        let value = if inst.saturate {
            WideChannel::from_f64(value.as_f64().map(|d| {
                if d < 0.0 || d.is_nan() {
                    0.0
                } else if d > 1.0 {
                    1.0
                } else {
                    d
                }
            }))
        } else {
            *value
        };
        let (lo_value, hi_value) = value.to_pair();
        self.store(&lo_value, &dst, lo, false)?;
        if let Some(hi) = hi {
            self.store(&hi_value, &dst, hi, false)?;
        }
        Ok(())
    }
}

/// Reject write masks that enable only half of a channel pair
pub(super) fn check_pairs(mask: WriteMask) -> ExecResult<()> {
    for pair in [WriteMask::XY, WriteMask::ZW] {
        if mask.intersects(pair) && !mask.covers(pair) {
            return Err(Fault::PartialPairWrite(mask));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pairs() {
        assert!(check_pairs(WriteMask::XYZW).is_ok());
        assert!(check_pairs(WriteMask::ZW).is_ok());
        assert!(check_pairs(WriteMask::NONE).is_ok());
        assert_eq!(check_pairs(WriteMask::XYZ), Err(Fault::PartialPairWrite(WriteMask::XYZ)));
        assert!(check_pairs(WriteMask::Y).is_err());
    }
}
