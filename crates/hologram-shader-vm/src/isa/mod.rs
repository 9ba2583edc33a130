//! Typed shader instruction set
//!
//! - [`opcode`]: the opcode enum and its raw encoding
//! - [`operand`]: register files, swizzles, write masks and addressing modes
//! - [`instruction`]: decoded instructions with texture and memory descriptors
//! - [`program`]: declarations, immediates and the bound program

pub mod instruction;
pub mod opcode;
pub mod operand;
pub mod program;

pub use instruction::{Instruction, MemoryInfo, TextureInfo, TextureTarget};
pub use opcode::Opcode;
pub use operand::{
    Dimension, DstRegister, Indirect, RegisterFile, SrcRegister, Swizzle, TexOffset, WriteMask, CHAN_W, CHAN_X,
    CHAN_Y, CHAN_Z,
};
pub use program::{
    Declaration, InterpMode, Program, ProgramProperties, ReturnType, SamplerView, Semantic, SemanticName,
};
