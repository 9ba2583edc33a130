//! The quad machine
//!
//! A [`Machine`] owns every register file, the control stacks and the
//! bindings of one shader instance. The caller binds a program and resources,
//! fills inputs, then calls [`Machine::run`] until it reports
//! [`RunStatus::Halted`]. A `BARRIER` returns [`RunStatus::Suspended`] with
//! the program counter to pass to the next call.
//!
//! # Example
//!
//! ```rust
//! use hologram_shader_vm::{Machine, MachineConfig, ProgramBuilder, RunStatus, ShaderStage};
//! use hologram_shader_vm::isa::Opcode;
//! use std::sync::Arc;
//!
//! let mut b = ProgramBuilder::new();
//! let one = b.immediate_f32([1.0, 2.0, 3.0, 4.0]);
//! b.op(Opcode::Add, &[b.output(0)], &[b.input(0), b.imm(one)]);
//! b.end();
//! let program = Arc::new(b.build().unwrap());
//!
//! let mut machine = Machine::new(MachineConfig::new(ShaderStage::Vertex)).unwrap();
//! machine.bind_program(program).unwrap();
//! machine.set_input(0, [hologram_shader_vm::Channel::splat_f32(1.0); 4]).unwrap();
//! assert_eq!(machine.run(0).unwrap(), RunStatus::Halted { alive_mask: 0xf });
//! assert_eq!(machine.output(0).unwrap()[3].as_f32(), [5.0; 4]);
//! ```

mod dispatch;
mod fragment;
mod geometry;
mod memory;
mod operand;
mod shapes;
mod texture;

pub use geometry::Primitive;

use crate::channel::{Vector, ALL_LANES};
use crate::config::{MachineConfig, ShaderStage};
use crate::control::{ControlState, Flow, StackDepths};
use crate::error::{Fault, Result, VmError};
use crate::interp::{InterpCoef, QuadPosition};
use crate::isa::{InterpMode, Program, RegisterFile, SamplerView, SemanticName};
use crate::perf::perf_span;
use crate::registers::{ConstantBuffer, Registers};
use crate::resource::{Image, MemoryRegion, Sampler, ShaderBuffers};
use geometry::GeometryState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a call to [`Machine::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The program finished; lanes not killed are set in `alive_mask`
    Halted { alive_mask: u8 },
    /// A barrier was reached; call `run(resume_pc)` to continue. BARRIER
    /// suspends in every stage, not only compute.
    Suspended { resume_pc: usize },
}

/// Quad shader virtual machine
pub struct Machine {
    config: MachineConfig,
    program: Option<Arc<Program>>,
    regs: Registers,
    control: ControlState,
    kill_mask: u8,
    non_helper_mask: u8,
    pc: usize,

    interp_coefs: Vec<InterpCoef>,
    /// Interpolation of each input register after flat shading is resolved
    interp_modes: Vec<InterpMode>,
    quad_pos: QuadPosition,
    face: f32,

    geometry: GeometryState,

    sampler_views: Vec<Option<SamplerView>>,
    sampler: Option<Arc<dyn Sampler>>,
    image: Option<Arc<dyn Image>>,
    buffers: Option<Arc<dyn ShaderBuffers>>,
    local_memory: Option<MemoryRegion>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("stage", &self.config.stage)
            .field("pc", &self.pc)
            .field("exec_mask", &self.control.exec_mask())
            .field("kill_mask", &self.kill_mask)
            .field("program_len", &self.program.as_ref().map(|p| p.len()))
            .finish_non_exhaustive()
    }
}

impl Machine {
    /// Allocate a machine with every register file sized from `config`
    pub fn new(config: MachineConfig) -> Result<Self> {
        config.validate()?;
        let limits = &config.limits;
        let machine = Self {
            regs: Registers::new(limits, config.stage),
            control: ControlState::new(limits),
            kill_mask: 0,
            non_helper_mask: ALL_LANES,
            pc: 0,
            interp_coefs: vec![InterpCoef::default(); limits.max_inputs],
            interp_modes: vec![InterpMode::Constant; limits.max_inputs],
            quad_pos: QuadPosition::default(),
            face: 1.0,
            geometry: GeometryState::new(limits),
            sampler_views: vec![None; limits.max_samplers],
            sampler: None,
            image: None,
            buffers: None,
            local_memory: None,
            program: None,
            config,
        };
        tracing::debug!(stage = ?machine.config.stage, "machine created");
        Ok(machine)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn stage(&self) -> ShaderStage {
        self.config.stage
    }

    // ============================================================================================
    // Binding
    // ============================================================================================

    /// Bind a program, loading its immediates and declarations
    pub fn bind_program(&mut self, program: Arc<Program>) -> Result<()> {
        let _span = perf_span!("machine_bind_program", len = program.len());
        let limits = &self.config.limits;

        if program.immediates.len() > limits.max_immediates {
            return Err(VmError::Binding(format!(
                "{} immediates exceed the limit of {}",
                program.immediates.len(),
                limits.max_immediates
            )));
        }
        self.regs.load_immediates(&program.immediates);

        self.sampler_views.fill(None);
        for decl in program.declarations_of(RegisterFile::SamplerView) {
            let Some(view) = decl.sampler_view else { continue };
            for unit in decl.range() {
                let slot = self
                    .sampler_views
                    .get_mut(unit as usize)
                    .ok_or_else(|| VmError::Binding(format!("sampler view {unit} exceeds the limit")))?;
                *slot = Some(view);
            }
        }

        let num_outputs = program
            .declarations_of(RegisterFile::Output)
            .map(|d| d.last as usize + 1)
            .max()
            .unwrap_or(0);
        let max_vertices = match program.properties.max_output_vertices {
            0 => limits.max_total_vertices,
            n => n as usize,
        };
        self.geometry.configure(num_outputs, max_vertices);

        tracing::debug!(
            instructions = program.len(),
            declarations = program.declarations.len(),
            immediates = program.immediates.len(),
            "program bound"
        );
        self.program = Some(program);
        self.pc = 0;
        Ok(())
    }

    pub fn program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    pub fn bind_sampler(&mut self, sampler: Arc<dyn Sampler>) {
        self.sampler = Some(sampler);
    }

    pub fn bind_image(&mut self, image: Arc<dyn Image>) {
        self.image = Some(image);
    }

    pub fn bind_buffers(&mut self, buffers: Arc<dyn ShaderBuffers>) {
        self.buffers = Some(buffers);
    }

    /// Bind the work group's shared memory; clone the region into every machine of the group
    pub fn bind_local_memory(&mut self, region: MemoryRegion) {
        tracing::debug!(size = region.len(), "local memory bound");
        self.local_memory = Some(region);
    }

    pub fn set_constant_buffer(&mut self, slot: usize, buffer: ConstantBuffer) -> Result<()> {
        let capacity = self.regs.constants.len();
        let entry = self
            .regs
            .constants
            .get_mut(slot)
            .ok_or_else(|| VmError::Binding(format!("constant buffer slot {slot} exceeds {capacity} slots")))?;
        tracing::debug!(slot, size = buffer.size(), "constant buffer bound");
        *entry = Some(buffer);
        Ok(())
    }

    pub fn clear_constant_buffer(&mut self, slot: usize) {
        if let Some(entry) = self.regs.constants.get_mut(slot) {
            *entry = None;
        }
    }

    // ============================================================================================
    // Register access
    // ============================================================================================

    /// Write input register `index` of the first input vertex
    pub fn set_input(&mut self, index: usize, value: Vector) -> Result<()> {
        self.set_vertex_input(0, index, value)
    }

    /// Write input register `index` of geometry input vertex `vertex`
    pub fn set_vertex_input(&mut self, vertex: usize, index: usize, value: Vector) -> Result<()> {
        if index >= self.regs.inputs_per_vertex {
            return Err(VmError::Binding(format!("input {index} exceeds the limit")));
        }
        let flat = vertex * self.regs.inputs_per_vertex + index;
        *self.regs.inputs.get_mut(flat as i64).map_err(binding)? = value;
        Ok(())
    }

    pub fn input(&self, index: usize) -> Result<Vector> {
        Ok(*self.regs.inputs.get(index as i64).map_err(binding)?)
    }

    /// Output register `index`; geometry outputs are laid out vertex after vertex
    pub fn output(&self, index: usize) -> Result<Vector> {
        Ok(*self.regs.outputs.get(index as i64).map_err(binding)?)
    }

    pub fn temp(&self, index: usize) -> Result<Vector> {
        Ok(*self.regs.temps.get(index as i64).map_err(binding)?)
    }

    pub fn set_temp(&mut self, index: usize, value: Vector) -> Result<()> {
        *self.regs.temps.get_mut(index as i64).map_err(binding)? = value;
        Ok(())
    }

    pub fn address(&self, index: usize) -> Result<Vector> {
        Ok(*self.regs.addrs.get(index as i64).map_err(binding)?)
    }

    pub fn set_system_value(&mut self, index: usize, value: Vector) -> Result<()> {
        *self.regs.system_values.get_mut(index as i64).map_err(binding)? = value;
        Ok(())
    }

    /// Register the bound program declared for system value `name`
    pub fn system_value_index(&self, name: SemanticName) -> Option<usize> {
        self.program.as_ref()?.declarations_of(RegisterFile::SystemValue).find_map(|d| {
            d.semantic
                .filter(|s| s.name == name)
                .map(|_| d.first as usize)
        })
    }

    /// Lanes that are not helper invocations; helper lanes run but have no
    /// buffer, image or atomic side effects. Every lane by default.
    pub fn set_non_helper_mask(&mut self, mask: u8) {
        self.non_helper_mask = mask & ALL_LANES;
    }

    pub fn set_interp_coef(&mut self, input: usize, coef: InterpCoef) -> Result<()> {
        let slot = self
            .interp_coefs
            .get_mut(input)
            .ok_or_else(|| VmError::Binding(format!("input {input} has no interpolation slot")))?;
        *slot = coef;
        Ok(())
    }

    pub fn set_quad_position(&mut self, position: QuadPosition) {
        self.quad_pos = position;
    }

    /// Front-face value delivered to `FACE` inputs: positive for front facing
    pub fn set_face(&mut self, face: f32) {
        self.face = face;
    }

    pub fn kill_mask(&self) -> u8 {
        self.kill_mask
    }

    pub fn exec_mask(&self) -> u8 {
        self.control.exec_mask()
    }

    pub fn stack_depths(&self) -> StackDepths {
        self.control.depths()
    }

    /// Completed primitives of `stream`
    pub fn primitives(&self, stream: usize) -> Vec<Primitive> {
        self.geometry.primitives(stream)
    }

    /// Output registers written per emitted vertex
    pub fn outputs_per_vertex(&self) -> usize {
        self.geometry.num_outputs
    }

    // ============================================================================================
    // Run loop
    // ============================================================================================

    /// Execute from `start_pc` until the program halts or reaches a barrier
    ///
    /// Starting at 0 resets the execution and kill masks, the geometry
    /// counters and, for fragment programs, interpolates the declared inputs.
    pub fn run(&mut self, start_pc: usize) -> Result<RunStatus> {
        let program = self.program.clone().ok_or(VmError::UnboundProgram)?;
        let _span = perf_span!("machine_run", start_pc, len = program.len());

        if start_pc == 0 {
            self.begin(&program).map_err(|fault| to_error(0, fault))?;
        }
        self.pc = start_pc;

        loop {
            let pc = self.pc;
            let inst = program
                .instructions
                .get(pc)
                .ok_or(VmError::MalformedProgram {
                    pc,
                    fault: Fault::PcOutOfRange,
                })?;
            self.pc += 1;
            tracing::trace!(pc, exec_mask = self.control.exec_mask(), "{inst}");

            match self.execute(inst, pc).map_err(|fault| to_error(pc, fault))? {
                Flow::Next => {}
                Flow::Jump(target) => {
                    if target >= program.len() {
                        return Err(to_error(
                            pc,
                            Fault::BadLabel {
                                target,
                                len: program.len(),
                            },
                        ));
                    }
                    self.pc = target;
                }
                Flow::Halt => {
                    let alive_mask = !self.kill_mask & ALL_LANES;
                    tracing::debug!(pc, alive_mask, "run halted");
                    return Ok(RunStatus::Halted { alive_mask });
                }
                Flow::Suspend => {
                    tracing::debug!(pc, resume_pc = self.pc, "run suspended at barrier");
                    return Ok(RunStatus::Suspended { resume_pc: self.pc });
                }
            }
        }
    }

    fn begin(&mut self, program: &Program) -> crate::error::ExecResult<()> {
        let default_mask = self.config.stage.default_lane_mask();
        self.control.reset(default_mask);
        self.kill_mask = 0;
        self.geometry.reset();
        if self.config.stage == ShaderStage::Fragment {
            self.interpolate_inputs(program)?;
        }
        Ok(())
    }
}

fn to_error(pc: usize, fault: Fault) -> VmError {
    match fault {
        Fault::MissingCapability(name) => VmError::MissingCapability(name),
        fault => VmError::MalformedProgram { pc, fault },
    }
}

fn binding(fault: Fault) -> VmError {
    VmError::Binding(fault.to_string())
}
