//! Register storage
//!
//! Every register file is a fixed array of [`Vector`]s sized from
//! [`MachineLimits`] when the machine is built. Constant buffers are
//! caller-owned byte spans bound per slot.

use crate::channel::{Channel, Vector};
use crate::config::{MachineLimits, ShaderStage};
use crate::error::{ExecResult, Fault};
use crate::isa::RegisterFile;
use std::sync::Arc;

/// Fixed-size array of registers of one file
#[derive(Debug, Clone)]
pub(crate) struct RegisterBank {
    file: RegisterFile,
    regs: Vec<Vector>,
}

impl RegisterBank {
    pub(crate) fn new(file: RegisterFile, count: usize) -> Self {
        Self {
            file,
            regs: vec![[Channel::ZERO; 4]; count],
        }
    }

    fn out_of_range(&self, index: i64) -> Fault {
        Fault::IndexOutOfRange {
            file: self.file,
            index,
            capacity: self.regs.len(),
        }
    }

    pub(crate) fn get(&self, index: i64) -> ExecResult<&Vector> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.regs.get(i))
            .ok_or_else(|| self.out_of_range(index))
    }

    pub(crate) fn get_mut(&mut self, index: i64) -> ExecResult<&mut Vector> {
        let fault = self.out_of_range(index);
        usize::try_from(index)
            .ok()
            .and_then(|i| self.regs.get_mut(i))
            .ok_or(fault)
    }

    pub(crate) fn fill(&mut self, values: impl IntoIterator<Item = Vector>) {
        for (slot, value) in self.regs.iter_mut().zip(values) {
            *slot = value;
        }
    }
}

/// Read-only constant buffer bound to one slot
///
/// Reads past the end return zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBuffer {
    data: Arc<[u8]>,
}

impl ConstantBuffer {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    pub fn from_words(words: &[u32]) -> Self {
        Self::new(bytemuck::cast_slice::<u32, u8>(words).to_vec())
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self::new(bytemuck::cast_slice::<f32, u8>(values).to_vec())
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// 32-bit word `pos`, or zero past the end
    #[inline]
    pub(crate) fn word(&self, pos: usize) -> u32 {
        if pos >= self.data.len() / 4 {
            return 0;
        }
        let offset = pos * 4;
        bytemuck::pod_read_unaligned(&self.data[offset..offset + 4])
    }
}

/// All register files of one machine
#[derive(Debug, Clone)]
pub(crate) struct Registers {
    pub(crate) temps: RegisterBank,
    /// `max_prim_vertices` blocks of `max_inputs` registers
    pub(crate) inputs: RegisterBank,
    pub(crate) outputs: RegisterBank,
    pub(crate) addrs: RegisterBank,
    pub(crate) system_values: RegisterBank,
    pub(crate) immediates: RegisterBank,
    pub(crate) constants: Vec<Option<ConstantBuffer>>,
    pub(crate) inputs_per_vertex: usize,
}

impl Registers {
    pub(crate) fn new(limits: &MachineLimits, stage: ShaderStage) -> Self {
        let outputs = match stage {
            ShaderStage::Geometry => limits.max_total_vertices,
            _ => limits.max_outputs,
        };
        Self {
            temps: RegisterBank::new(RegisterFile::Temporary, limits.max_temps),
            inputs: RegisterBank::new(RegisterFile::Input, limits.max_inputs * limits.max_prim_vertices),
            outputs: RegisterBank::new(RegisterFile::Output, outputs),
            addrs: RegisterBank::new(RegisterFile::Address, limits.max_addrs),
            system_values: RegisterBank::new(RegisterFile::SystemValue, limits.max_system_values),
            immediates: RegisterBank::new(RegisterFile::Immediate, 0),
            constants: vec![None; limits.max_constant_buffers],
            inputs_per_vertex: limits.max_inputs,
        }
    }

    /// Load immediates, broadcasting each component to every lane
    pub(crate) fn load_immediates(&mut self, immediates: &[[u32; 4]]) {
        self.immediates = RegisterBank::new(RegisterFile::Immediate, immediates.len());
        self.immediates
            .fill(immediates.iter().map(|imm| imm.map(Channel::splat_u32)));
    }

    /// Word `pos` of constant buffer `slot`; zero when unbound or past the end
    pub(crate) fn constant_word(&self, slot: i64, pos: i64) -> ExecResult<u32> {
        let buffer = usize::try_from(slot)
            .ok()
            .and_then(|s| self.constants.get(s))
            .ok_or(Fault::IndexOutOfRange {
                file: RegisterFile::Constant,
                index: slot,
                capacity: self.constants.len(),
            })?;
        Ok(match (buffer, usize::try_from(pos)) {
            (Some(buffer), Ok(pos)) => buffer.word(pos),
            _ => 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_bounds() {
        let mut bank = RegisterBank::new(RegisterFile::Temporary, 2);
        assert!(bank.get(1).is_ok());
        assert_eq!(
            bank.get(2),
            Err(Fault::IndexOutOfRange {
                file: RegisterFile::Temporary,
                index: 2,
                capacity: 2
            })
        );
        assert!(bank.get(-1).is_err());
        bank.get_mut(0).unwrap()[3] = Channel::splat_u32(7);
        assert_eq!(bank.get(0).unwrap()[3], Channel::splat_u32(7));
    }

    #[test]
    fn test_constant_reads_past_end_are_zero() {
        let buffer = ConstantBuffer::from_words(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.size(), 24);
        assert_eq!(buffer.word(5), 6);
        assert_eq!(buffer.word(6), 0);
        assert_eq!(buffer.word(usize::MAX), 0);

        // a size that is not a multiple of four drops the partial word
        let ragged = ConstantBuffer::new(vec![1u8, 0, 0, 0, 9, 9]);
        assert_eq!(ragged.word(0), 1);
        assert_eq!(ragged.word(1), 0);
    }

    #[test]
    fn test_constant_word_slots() {
        let mut regs = Registers::new(&MachineLimits::default(), ShaderStage::Fragment);
        regs.constants[1] = Some(ConstantBuffer::from_words(&[10, 11]));
        assert_eq!(regs.constant_word(1, 1), Ok(11));
        assert_eq!(regs.constant_word(1, -4), Ok(0));
        assert_eq!(regs.constant_word(0, 0), Ok(0));
        assert!(regs.constant_word(32, 0).is_err());
    }
}
