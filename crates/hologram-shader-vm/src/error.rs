//! Error types for the shader VM
//!
//! Program-validity problems surface as [`VmError::MalformedProgram`] carrying the
//! program counter of the offending instruction and a [`Fault`] describing it.
//! Data-range conditions (constant-buffer overrun, integer division by zero,
//! NaN propagation) are defined results, never errors.

use crate::control::StackKind;
use crate::isa::{RegisterFile, WriteMask};
use thiserror::Error;

/// Errors surfaced by binding and running a machine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// The instruction stream violated a structural contract
    #[error("Malformed program at pc {pc}: {fault}")]
    MalformedProgram { pc: usize, fault: Fault },

    /// No program has been bound to the machine
    #[error("No program bound")]
    UnboundProgram,

    /// Caller-supplied state could not be bound
    #[error("Binding error: {0}")]
    Binding(String),

    /// Invalid machine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Program construction failed
    #[error("Program build error: {0}")]
    Build(String),

    /// An instruction needs a resource capability that was never bound
    #[error("Missing {0} capability")]
    MissingCapability(&'static str),
}

impl VmError {
    /// Returns the fault if this is a program-validity error
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            VmError::MalformedProgram { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

/// A single program-validity violation detected while executing an instruction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Fault {
    #[error("{stack} stack overflow (limit {limit})")]
    StackOverflow { stack: StackKind, limit: usize },

    #[error("{0} stack underflow")]
    StackUnderflow(StackKind),

    #[error("{stack} stack unbalanced at halt (depth {depth})")]
    UnbalancedStack { stack: StackKind, depth: usize },

    #[error("{file} index {index} out of range (capacity {capacity})")]
    IndexOutOfRange { file: RegisterFile, index: i64, capacity: usize },

    #[error("{0} cannot be read as a source operand")]
    UnreadableFile(RegisterFile),

    #[error("{0} cannot be written as a destination operand")]
    UnwritableFile(RegisterFile),

    #[error("indirect addressing through {0}, expected an address register")]
    IndirectFile(RegisterFile),

    #[error("swizzle component {0} out of range")]
    BadSwizzle(u8),

    #[error("missing {kind} operand {index}")]
    MissingOperand { kind: &'static str, index: usize },

    #[error("instruction requires a {0}")]
    MissingDescriptor(&'static str),

    #[error("branch target {target} out of range (program length {len})")]
    BadLabel { target: usize, len: usize },

    #[error("program counter ran past the end of the program")]
    PcOutOfRange,

    #[error("write mask {0} splits a 64-bit channel pair")]
    PartialPairWrite(WriteMask),

    #[error("unknown opcode encoding {0}")]
    UnknownOpcode(u16),

    #[error("opcode {0} is not valid here")]
    UnexpectedOpcode(&'static str),

    #[error("vertex stream {stream} out of range ({streams} streams)")]
    BadStream { stream: u32, streams: usize },

    #[error("no {0} capability bound")]
    MissingCapability(&'static str),
}

/// Result alias used by the public API
pub type Result<T> = std::result::Result<T, VmError>;

/// Result alias used while executing a single instruction
pub(crate) type ExecResult<T> = std::result::Result<T, Fault>;
