//! # hologram-shader-vm - Quad Shader Virtual Machine
//!
//! A software interpreter for a vectorized shader instruction set. Every
//! instruction runs on four lanes at once (a pixel quad, four vertices or
//! four compute invocations) under per-lane predication derived from nested
//! control flow.
//!
//! ## Architecture
//!
//! - **Channels** ([`channel`]): four 32-bit lanes reinterpretable as f32, i32
//!   or u32; 64-bit values occupy a channel pair
//! - **Micro-ops** ([`micro`]): pure per-lane arithmetic, logic and conversion
//! - **Control** ([`control`]): condition, loop, continue, switch and function
//!   masks with their bounded stacks
//! - **Machine** ([`machine`]): register files, operand fetch/store, opcode
//!   dispatch and the run loop
//! - **Resources** ([`resource`]): sampler and image capabilities supplied by
//!   the embedder, byte-addressed shader buffers and shared memory
//!
//! ## Key Properties
//!
//! 1. **Write predication**: lanes outside the execution mask are never written
//! 2. **Balanced stacks**: every control stack is back at depth zero at `END`
//! 3. **Single suspension point**: only `BARRIER` returns before the program ends
//! 4. **No panics on program content**: malformed programs surface as
//!    [`VmError::MalformedProgram`]
//!
//! ## Example
//!
//! ```rust
//! use hologram_shader_vm::isa::Opcode;
//! use hologram_shader_vm::{Channel, Machine, MachineConfig, ProgramBuilder, RunStatus, ShaderStage};
//! use std::sync::Arc;
//!
//! let mut b = ProgramBuilder::new();
//! let k = b.immediate_f32([0.5, 0.5, 0.5, 0.5]);
//! b.op(Opcode::Mul, &[b.output(0)], &[b.input(0), b.imm(k)]);
//! b.end();
//!
//! let mut machine = Machine::new(MachineConfig::new(ShaderStage::Vertex))?;
//! machine.bind_program(Arc::new(b.build()?))?;
//! machine.set_input(0, [Channel::from_f32([2.0, 4.0, 6.0, 8.0]); 4])?;
//!
//! assert_eq!(machine.run(0)?, RunStatus::Halted { alive_mask: 0xf });
//! assert_eq!(machine.output(0)?[0].as_f32(), [1.0, 2.0, 3.0, 4.0]);
//! # Ok::<(), hologram_shader_vm::VmError>(())
//! ```

pub mod channel;
pub mod config;
pub mod control;
pub mod error;
pub mod interp;
pub mod isa;
pub mod machine;
pub mod micro;
pub mod program_builder;
pub mod registers;
pub mod resource;
pub mod sync;

mod perf;

pub use channel::{Channel, Vector, WideChannel, QUAD_SIZE};
pub use config::{MachineConfig, MachineLimits, ShaderStage};
pub use control::{StackDepths, StackKind};
pub use error::{Fault, Result, VmError};
pub use interp::{InterpCoef, QuadPosition};
pub use machine::{Machine, Primitive, RunStatus};
pub use program_builder::ProgramBuilder;
pub use registers::ConstantBuffer;
pub use resource::{
    AtomicOp, BufferPool, Image, ImageCoords, ImageParams, Lanes, LodControl, MemoryRegion, SampleRequest, Sampler,
    ShaderBuffers,
};
