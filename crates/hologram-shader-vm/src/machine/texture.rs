//! Texture instructions
//!
//! Coordinates are assembled here and handed to the bound [`Sampler`];
//! filtering is entirely the sampler's business.
//!
//! Operand layout:
//! - `TEX TXB TXL TXP`: coords in src0, sampler in src1, lod/bias/w in src0.w
//! - `TEX2 TXB2 TXL2 TG4`: coords in src0 and src1, sampler in src2, lod/bias/component in src1.x
//! - `TXD`: derivatives in src1 (d/dx) and src2 (d/dy), sampler in src3
//! - `SAMPLE*`: resource in src1, sampler in src2, lod/bias/reference in src3.x,
//!   result swizzled by src1's swizzle

use super::operand::DataType;
use super::Machine;
use crate::channel::Channel;
use crate::error::{ExecResult, Fault};
use crate::isa::{Instruction, TextureTarget, CHAN_W, CHAN_X, CHAN_Y};
use crate::perf::perf_span;
use crate::resource::{Lanes, LodControl, SampleRequest, Sampler};
use std::sync::Arc;

/// How a `TEX`-family instruction selects its level of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TexModifier {
    None,
    Projected,
    Bias,
    Explicit,
    Gather,
}

/// How a `SAMPLE`-family instruction selects its level of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SampleModifier {
    None,
    Bias,
    Explicit,
    Gather,
    LevelZero,
}

impl Machine {
    fn bound_sampler(&self) -> ExecResult<Arc<dyn Sampler>> {
        self.sampler.clone().ok_or(Fault::MissingCapability("sampler"))
    }

    /// Target declared for sampler view `unit`
    fn view_target(&self, unit: u32) -> ExecResult<TextureTarget> {
        self.sampler_views
            .get(unit as usize)
            .copied()
            .flatten()
            .map(|view| view.target)
            .ok_or(Fault::MissingDescriptor("sampler view declaration"))
    }

    /// Texel offsets of the first offset operand, taken from lane 0
    fn texel_offsets(&self, inst: &Instruction) -> ExecResult<[i8; 3]> {
        let Some(ofs) = inst.texture.as_ref().and_then(|t| t.offsets.first()) else {
            return Ok([0; 3]);
        };
        let index = [ofs.index as i64; 4];
        let mut out = [0i8; 3];
        for (slot, &comp) in out.iter_mut().zip(&ofs.swizzle) {
            if comp > 3 {
                return Err(Fault::BadSwizzle(comp));
            }
            *slot = self.fetch_file(ofs.file, comp as usize, &index, &[0; 4])?.i32(0) as i8;
        }
        Ok(out)
    }

    fn fetch_lanes(&self, inst: &Instruction, src: usize, chan: usize) -> ExecResult<Lanes> {
        Ok(self.fetch_src(inst, src, chan, DataType::Float)?.as_f32())
    }

    /// d/dx from `first`, d/dy from `first + 1`, for `count` coordinates
    fn derivatives(&self, inst: &Instruction, first: usize, count: usize) -> ExecResult<[[Lanes; 2]; 3]> {
        let mut derivs = [[[0.0; 4]; 2]; 3];
        for (chan, d) in derivs.iter_mut().enumerate().take(count) {
            d[0] = self.fetch_lanes(inst, first, chan)?;
            d[1] = self.fetch_lanes(inst, first + 1, chan)?;
        }
        Ok(derivs)
    }

    /// Store `color` swizzled through the swizzle of source `src`
    fn store_swizzled(&mut self, inst: &Instruction, color: &[Channel; 4], src: usize) -> ExecResult<()> {
        let swizzle = inst.src_at(src)?.swizzle;
        let mut out = [Channel::ZERO; 4];
        for (chan, slot) in out.iter_mut().enumerate() {
            let comp = swizzle.component(chan);
            *slot = *color.get(comp as usize).ok_or(Fault::BadSwizzle(comp))?;
        }
        self.store_masked(inst, &out)
    }

    // ============================================================================================
    // TEX family
    // ============================================================================================

    pub(super) fn exec_tex(&mut self, inst: &Instruction, modifier: TexModifier, sampler_src: usize) -> ExecResult<()> {
        let target = inst.texture_info()?.target;
        let _span = perf_span!("machine_tex", ?target);
        let unit = self.resource_unit(inst.src_at(sampler_src)?)?;
        let offsets = self.texel_offsets(inst)?;

        let mut args: [Lanes; 5] = [[0.0; 4]; 5];
        let mut projection = None;
        let mut control = LodControl::None;
        if modifier != TexModifier::None {
            let value = if sampler_src == 1 {
                self.fetch_lanes(inst, 0, CHAN_W)?
            } else {
                self.fetch_lanes(inst, 1, CHAN_X)?
            };
            match modifier {
                TexModifier::Projected => projection = Some(value),
                TexModifier::Bias => (args[4], control) = (value, LodControl::Bias),
                TexModifier::Explicit => (args[4], control) = (value, LodControl::Explicit),
                TexModifier::Gather => (args[4], control) = (value, LodControl::Gather),
                TexModifier::None => {}
            }
        }

        let project = |mut v: Lanes| {
            if let Some(q) = projection {
                for (x, q) in v.iter_mut().zip(q) {
                    *x /= q;
                }
            }
            v
        };
        for chan in 0..target.coord_dim() {
            args[chan] = project(self.fetch_lanes(inst, 0, chan)?);
        }
        if let Some(slot) = target.shadow_ref_index() {
            args[slot] = project(self.fetch_lanes(inst, slot / 4, slot % 4)?);
        }

        let color = self.bound_sampler()?.sample(&SampleRequest {
            texture_unit: unit,
            sampler_unit: unit,
            args,
            derivatives: None,
            offsets,
            control,
        });
        self.store_masked(inst, &color)
    }

    /// `TXD`: explicit derivatives
    pub(super) fn exec_txd(&mut self, inst: &Instruction) -> ExecResult<()> {
        use TextureTarget::*;
        let target = inst.texture_info()?.target;
        let _span = perf_span!("machine_txd", ?target);
        let unit = self.resource_unit(inst.src_at(3)?)?;
        let offsets = self.texel_offsets(inst)?;

        let (coords, derivs) = match target {
            Tex1D => (1, 1),
            Shadow1D | Tex1DArray | Shadow1DArray => (3, 1),
            Tex2D | Rect => (2, 2),
            Shadow2D | ShadowRect | Tex2DArray => (3, 2),
            Shadow2DArray => (4, 2),
            _ => (4, 3),
        };
        let mut args: [Lanes; 5] = [[0.0; 4]; 5];
        for (chan, arg) in args.iter_mut().enumerate().take(coords) {
            *arg = self.fetch_lanes(inst, 0, chan)?;
        }
        let derivatives = self.derivatives(inst, 1, derivs)?;

        let color = self.bound_sampler()?.sample(&SampleRequest {
            texture_unit: unit,
            sampler_unit: unit,
            args,
            derivatives: Some(derivatives),
            offsets,
            control: LodControl::Derivatives,
        });
        self.store_masked(inst, &color)
    }

    /// `TXF`, `SAMPLE_I`, `SAMPLE_I_MS`: unfiltered fetch at integer coordinates
    ///
    /// The level (or sample index) is src0.w.
    pub(super) fn exec_txf(&mut self, inst: &Instruction, from_view: bool) -> ExecResult<()> {
        use TextureTarget::*;
        let unit = self.resource_unit(inst.src_at(1)?)?;
        let offsets = self.texel_offsets(inst)?;
        let target = if from_view {
            self.view_target(unit)?
        } else {
            inst.texture_info()?.target
        };
        let _span = perf_span!("machine_txf", ?target);

        let count = match target {
            Buffer | Tex1D | Shadow1D => 1,
            Tex2D | Rect | Shadow1DArray | Shadow2D | ShadowRect | Tex1DArray | Tex2DMsaa => 2,
            _ => 3,
        };
        let mut coords = [[0i32; 4]; 4];
        for (chan, coord) in coords.iter_mut().enumerate().take(count) {
            *coord = self.fetch_src(inst, 0, chan, DataType::Int)?.as_i32();
        }
        coords[3] = self.fetch_src(inst, 0, CHAN_W, DataType::Int)?.as_i32();

        let color = self.bound_sampler()?.fetch_texel(unit, &coords, offsets);
        if from_view {
            self.store_swizzled(inst, &color, 1)
        } else {
            self.store_masked(inst, &color)
        }
    }

    /// `TXQ`, `SVIEWINFO`: dimensions at the level in src0.x (lane 0)
    pub(super) fn exec_txq(&mut self, inst: &Instruction) -> ExecResult<()> {
        let unit = self.resource_unit(inst.src_at(1)?)?;
        let level = self.fetch_scalar_i32(inst, 0, CHAN_X)?;
        let dims = self.bound_sampler()?.query_dims(unit, level);
        self.store_masked(inst, &dims.map(Channel::splat_i32))
    }

    /// `LODQ` and `LOD`: computed level of detail in x (clamped) and y (unclamped)
    pub(super) fn exec_lodq(&mut self, inst: &Instruction, lod: bool) -> ExecResult<()> {
        let resource = self.resource_unit(inst.src_at(1)?)?;
        let (dim, sampler_unit) = if lod {
            (self.view_target(resource)?.coord_dim(), self.resource_unit(inst.src_at(2)?)?)
        } else {
            (inst.texture_info()?.target.coord_dim(), resource)
        };
        let mut coords: [Lanes; 4] = [[0.0; 4]; 4];
        for (chan, coord) in coords.iter_mut().enumerate().take(dim) {
            *coord = self.fetch_lanes(inst, 0, chan)?;
        }
        let [clamped, unclamped] = self
            .bound_sampler()?
            .query_lod(resource, sampler_unit, &coords, LodControl::None);
        let result = [Channel::from_f32(clamped), Channel::from_f32(unclamped)];

        let dst = *inst.dst_at(0)?;
        if lod {
            let swizzle = inst.src_at(1)?.swizzle;
            for chan in dst.write_mask.channels() {
                let value = result.get(swizzle.component(chan) as usize).copied().unwrap_or(Channel::ZERO);
                self.store(&value, &dst, chan, inst.saturate)?;
            }
        } else {
            for chan in dst.write_mask.channels().filter(|&c| c <= CHAN_Y) {
                self.store(&result[chan], &dst, chan, inst.saturate)?;
            }
        }
        Ok(())
    }

    // ============================================================================================
    // SAMPLE family
    // ============================================================================================

    pub(super) fn exec_sample(&mut self, inst: &Instruction, modifier: SampleModifier, compare: bool) -> ExecResult<()> {
        let resource = self.resource_unit(inst.src_at(1)?)?;
        let sampler_unit = self.resource_unit(inst.src_at(2)?)?;
        let offsets = self.texel_offsets(inst)?;
        let target = self.view_target(resource)?;
        let _span = perf_span!("machine_sample", ?target, compare);

        let mut args: [Lanes; 5] = [[0.0; 4]; 5];
        let control = match modifier {
            SampleModifier::None => LodControl::None,
            SampleModifier::Bias => {
                args[4] = self.fetch_lanes(inst, 3, CHAN_X)?;
                LodControl::Bias
            }
            SampleModifier::Explicit => {
                args[4] = self.fetch_lanes(inst, 3, CHAN_X)?;
                LodControl::Explicit
            }
            SampleModifier::Gather => LodControl::Gather,
            SampleModifier::LevelZero => LodControl::Zero,
        };
        let dim = target.coord_dim();
        for (chan, arg) in args.iter_mut().enumerate().take(dim) {
            *arg = self.fetch_lanes(inst, 0, chan)?;
        }
        if compare {
            // one-coordinate targets still put the reference in the third slot
            args[dim.max(2)] = self.fetch_lanes(inst, 3, CHAN_X)?;
        }

        let color = self.bound_sampler()?.sample(&SampleRequest {
            texture_unit: resource,
            sampler_unit,
            args,
            derivatives: None,
            offsets,
            control,
        });
        self.store_swizzled(inst, &color, 1)
    }

    /// `SAMPLE_D`: derivatives in src3 and src4
    pub(super) fn exec_sample_d(&mut self, inst: &Instruction) -> ExecResult<()> {
        use TextureTarget::*;
        let resource = self.resource_unit(inst.src_at(1)?)?;
        let sampler_unit = self.resource_unit(inst.src_at(2)?)?;
        let offsets = self.texel_offsets(inst)?;
        let target = self.view_target(resource)?;

        let (coords, derivs) = match target {
            Tex1D | Tex1DArray | Shadow1D | Shadow1DArray => (2, 1),
            Tex2D | Rect | Tex2DArray | Shadow2D | ShadowRect | Shadow2DArray => (3, 2),
            _ => (4, 3),
        };
        let mut args: [Lanes; 5] = [[0.0; 4]; 5];
        for (chan, arg) in args.iter_mut().enumerate().take(coords) {
            *arg = self.fetch_lanes(inst, 0, chan)?;
        }
        let derivatives = self.derivatives(inst, 3, derivs)?;

        let color = self.bound_sampler()?.sample(&SampleRequest {
            texture_unit: resource,
            sampler_unit,
            args,
            derivatives: Some(derivatives),
            offsets,
            control: LodControl::Derivatives,
        });
        self.store_swizzled(inst, &color, 1)
    }
}
