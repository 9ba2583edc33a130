//! `LOAD`, `STORE`, atomics and `RESQ`
//!
//! Image operands go through the bound [`Image`](crate::resource::Image)
//! capability. Shader buffers, shared memory and constant buffers are
//! addressed as bytes here, with per-lane bounds checks: a lane whose access
//! does not fit reads zero and writes nothing.
//!
//! Side effects are limited to lanes that are executing, are not helper
//! invocations and have not been killed.

use super::operand::DataType;
use super::Machine;
use crate::channel::{Channel, Vector, QUAD_SIZE};
use crate::error::{ExecResult, Fault};
use crate::isa::{Instruction, RegisterFile, CHAN_X};
use crate::perf::perf_span;
use crate::resource::memory::{atomic_word, read_word, write_word};
use crate::resource::{AtomicOp, Image, ImageCoords, ImageParams, MemoryRegion};
use std::array;
use std::sync::Arc;

impl Machine {
    /// Lanes allowed to write memory
    fn side_effect_mask(&self) -> u8 {
        self.control.exec_mask() & self.non_helper_mask & !self.kill_mask
    }

    fn bound_image(&self) -> ExecResult<Arc<dyn Image>> {
        self.image.clone().ok_or(Fault::MissingCapability("image"))
    }

    /// Backing region of a buffer or shared-memory operand; `None` when nothing is bound there
    fn region(&self, file: RegisterFile, unit: u32) -> ExecResult<Option<MemoryRegion>> {
        match file {
            RegisterFile::Memory => Ok(self.local_memory.clone()),
            RegisterFile::Buffer => {
                let buffers = self.buffers.as_ref().ok_or(Fault::MissingCapability("shader buffers"))?;
                Ok(buffers.lookup(unit))
            }
            other => Err(Fault::UnwritableFile(other)),
        }
    }

    /// Run `f` over the bytes of a readable memory operand
    fn with_bytes<R>(&self, file: RegisterFile, unit: u32, f: impl FnOnce(&[u8]) -> R) -> ExecResult<R> {
        match file {
            RegisterFile::Constant => {
                let capacity = self.regs.constants.len();
                let slot = self.regs.constants.get(unit as usize).ok_or(Fault::IndexOutOfRange {
                    file,
                    index: unit as i64,
                    capacity,
                })?;
                Ok(match slot {
                    Some(buffer) => f(buffer.bytes()),
                    None => f(&[]),
                })
            }
            RegisterFile::Memory | RegisterFile::Buffer => Ok(match self.region(file, unit)? {
                Some(region) => region.with_read(f),
                None => f(&[]),
            }),
            other => Err(Fault::UnreadableFile(other)),
        }
    }

    fn image_params(&self, inst: &Instruction, unit: u32) -> ExecResult<ImageParams> {
        let info = inst.memory_info()?;
        Ok(ImageParams {
            unit,
            exec_mask: self.side_effect_mask(),
            target: info.target,
            format: info.format,
        })
    }

    /// Image parameters and integer coordinates read from source `src`
    fn image_access(&self, inst: &Instruction, unit: u32, src: usize) -> ExecResult<(ImageParams, ImageCoords, [i32; QUAD_SIZE])> {
        let params = self.image_params(inst, unit)?;
        let target = params.target;
        let mut coords: ImageCoords = [[0; QUAD_SIZE]; 3];
        for (chan, coord) in coords.iter_mut().enumerate().take(target.image_dim()) {
            *coord = self.fetch_src(inst, src, chan, DataType::Int)?.as_i32();
        }
        let sample = match target.sample_index_channel() {
            Some(chan) => self.fetch_src(inst, src, chan, DataType::Int)?.as_i32(),
            None => [0; QUAD_SIZE],
        };
        Ok((params, coords, sample))
    }

    fn fetch_vector(&self, inst: &Instruction, src: usize, ty: DataType) -> ExecResult<Vector> {
        let mut out = [Channel::ZERO; 4];
        for (chan, value) in out.iter_mut().enumerate() {
            *value = self.fetch_src(inst, src, chan, ty)?;
        }
        Ok(out)
    }

    // ============================================================================================
    // LOAD
    // ============================================================================================

    pub(super) fn exec_load(&mut self, inst: &Instruction) -> ExecResult<()> {
        let resource = *inst.src_at(0)?;
        let unit = self.resource_unit(&resource)?;
        let _span = perf_span!("machine_load", file = ?resource.file, unit);
        if resource.file == RegisterFile::Image {
            let (params, coords, sample) = self.image_access(inst, unit, 1)?;
            let color = self.bound_image()?.load(&params, &coords, &sample);
            return self.store_masked(inst, &color);
        }

        let offsets = self.fetch_src(inst, 1, CHAN_X, DataType::Uint)?;
        let count = inst.dst_at(0)?.write_mask.last_bit();
        let load_size = count * 4;
        let mut out = [Channel::ZERO; 4];
        self.with_bytes(resource.file, unit, |bytes| {
            let size = bytes.len();
            for lane in 0..QUAD_SIZE {
                let offset = offsets.u32(lane) as usize;
                if size < load_size || offset > size - load_size {
                    continue;
                }
                for (chan, value) in out.iter_mut().enumerate().take(count) {
                    value.0[lane] = read_word(bytes, offset + chan * 4).unwrap_or(0);
                }
            }
        })?;
        self.store_masked(inst, &out)
    }

    // ============================================================================================
    // STORE
    // ============================================================================================

    /// `STORE`: the destination names the resource, src0 the address, src1 the data
    pub(super) fn exec_store(&mut self, inst: &Instruction) -> ExecResult<()> {
        let dst = *inst.dst_at(0)?;
        let unit = self.unit_of(dst.index, dst.indirect.as_ref())?;
        let _span = perf_span!("machine_store", file = ?dst.file, unit);
        if dst.file == RegisterFile::Image {
            let (params, coords, sample) = self.image_access(inst, unit, 0)?;
            let value = self.fetch_vector(inst, 1, DataType::Float)?;
            self.bound_image()?.store(&params, &coords, &sample, &value);
            return Ok(());
        }

        let offsets = self.fetch_src(inst, 0, CHAN_X, DataType::Uint)?;
        let value = self.fetch_vector(inst, 1, DataType::Uint)?;
        let mask = self.side_effect_mask();
        let Some(region) = self.region(dst.file, unit)? else {
            return Ok(());
        };
        region.with_write(|bytes| {
            let size = bytes.len();
            for lane in (0..QUAD_SIZE).filter(|lane| mask & (1 << lane) != 0) {
                let offset = offsets.u32(lane) as usize;
                if size < offset {
                    continue;
                }
                let fits = ((size - offset) / 4).min(4);
                for chan in dst.write_mask.channels().take_while(|&c| c < fits) {
                    write_word(bytes, offset + chan * 4, value[chan].u32(lane));
                }
            }
        });
        Ok(())
    }

    // ============================================================================================
    // Atomics
    // ============================================================================================

    /// `ATOM*`: src0 resource, src1 address, src2 operand, src3 compare-and-swap replacement
    ///
    /// The destination receives the value each lane saw before its update.
    pub(super) fn exec_atomic(&mut self, inst: &Instruction) -> ExecResult<()> {
        let op = AtomicOp::from_opcode(inst.opcode).ok_or(Fault::UnexpectedOpcode(inst.opcode.mnemonic()))?;
        let resource = *inst.src_at(0)?;
        let unit = self.resource_unit(&resource)?;
        let _span = perf_span!("machine_atomic", ?op, file = ?resource.file, unit);
        let ty = if op == AtomicOp::Fadd { DataType::Float } else { DataType::Uint };

        if resource.file == RegisterFile::Image {
            let (params, coords, sample) = self.image_access(inst, unit, 1)?;
            let value = self.fetch_vector(inst, 2, ty)?;
            let value2 = if op == AtomicOp::Cas {
                self.fetch_vector(inst, 3, ty)?
            } else {
                [Channel::ZERO; 4]
            };
            let old = self.bound_image()?.atomic(&params, op, &coords, &sample, &value, &value2);
            return self.store_masked(inst, &old);
        }

        if !inst.dst_at(0)?.write_mask.contains(CHAN_X) {
            return Ok(());
        }
        let offsets = self.fetch_src(inst, 1, CHAN_X, DataType::Uint)?;
        let value = self.fetch_src(inst, 2, CHAN_X, ty)?;
        let value2 = if op == AtomicOp::Cas {
            self.fetch_src(inst, 3, CHAN_X, ty)?
        } else {
            Channel::ZERO
        };
        let mask = self.side_effect_mask();
        let mut old = Channel::ZERO;
        if let Some(region) = self.region(resource.file, unit)? {
            // one lock for the quad; lanes update in order so aliasing lanes see each other
            region.with_write(|bytes| {
                let size = bytes.len();
                for lane in (0..QUAD_SIZE).filter(|lane| mask & (1 << lane) != 0) {
                    let offset = offsets.u32(lane) as usize;
                    if size < 4 || offset > size - 4 {
                        continue;
                    }
                    if let Some(prev) = atomic_word(bytes, offset, op, value.u32(lane), value2.u32(lane)) {
                        old.0[lane] = prev;
                    }
                }
            });
        }
        self.store_broadcast(inst, &old)
    }

    // ============================================================================================
    // RESQ
    // ============================================================================================

    /// `RESQ`: image dimensions, or the byte size of a buffer in x
    pub(super) fn exec_resq(&mut self, inst: &Instruction) -> ExecResult<()> {
        let resource = *inst.src_at(0)?;
        let unit = self.resource_unit(&resource)?;
        if resource.file == RegisterFile::Image {
            let params = self.image_params(inst, unit)?;
            let dims = self.bound_image()?.dims(&params);
            return self.store_masked(inst, &dims.map(Channel::splat_i32));
        }
        let size = self.with_bytes(resource.file, unit, <[u8]>::len)?;
        let out: Vector = array::from_fn(|chan| {
            if chan == CHAN_X {
                Channel::splat_u32(size as u32)
            } else {
                Channel::ZERO
            }
        });
        self.store_masked(inst, &out)
    }
}
