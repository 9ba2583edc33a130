//! Programs and declarations

use super::instruction::{Instruction, TextureTarget};
use super::operand::{RegisterFile, WriteMask};
use serde::{Deserialize, Serialize};

/// Semantic name attached to an input, output or system value declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticName {
    Position,
    Color,
    BackColor,
    Fog,
    PointSize,
    Generic,
    Normal,
    Face,
    EdgeFlag,
    PrimitiveId,
    InstanceId,
    VertexId,
    StencilRef,
    ClipDistance,
    SampleId,
    SamplePos,
    SampleMask,
    InvocationId,
    VertexIdNoBase,
    BaseVertex,
    ThreadId,
    BlockId,
    BlockSize,
    GridSize,
    HelperInvocation,
    TessCoord,
    VerticesIn,
}

/// Semantic tag with its index (e.g. `GENERIC[3]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Semantic {
    pub name: SemanticName,
    pub index: u32,
}

/// Fragment input interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpMode {
    Constant,
    Linear,
    Perspective,
    /// Constant when flat shading, perspective otherwise
    Color,
}

/// Element type returned by a sampler view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnType {
    #[default]
    Float,
    Sint,
    Uint,
}

/// Declaration of a sampler view bound at one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerView {
    pub target: TextureTarget,
    pub return_type: ReturnType,
}

/// Declaration of a register range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub file: RegisterFile,
    pub first: u32,
    pub last: u32,
    /// Channels the program actually reads (inputs) or writes (outputs)
    pub usage_mask: WriteMask,
    pub semantic: Option<Semantic>,
    pub interpolate: Option<InterpMode>,
    pub sampler_view: Option<SamplerView>,
}

impl Declaration {
    pub fn new(file: RegisterFile, first: u32, last: u32) -> Self {
        Self {
            file,
            first,
            last,
            usage_mask: WriteMask::XYZW,
            semantic: None,
            interpolate: None,
            sampler_view: None,
        }
    }

    pub fn with_semantic(mut self, name: SemanticName, index: u32) -> Self {
        self.semantic = Some(Semantic { name, index });
        self
    }

    pub fn with_interpolation(mut self, mode: InterpMode) -> Self {
        self.interpolate = Some(mode);
        self
    }

    pub fn with_usage(mut self, mask: WriteMask) -> Self {
        self.usage_mask = mask;
        self
    }

    pub fn with_sampler_view(mut self, target: TextureTarget, return_type: ReturnType) -> Self {
        self.sampler_view = Some(SamplerView { target, return_type });
        self
    }

    pub fn range(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }
}

/// Program-wide properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgramProperties {
    /// Vertex budget per geometry invocation; 0 means the configured limit
    pub max_output_vertices: u32,
}

/// A decoded program ready to bind
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub declarations: Vec<Declaration>,
    /// Four 32-bit words per immediate, in declaration order
    pub immediates: Vec<[u32; 4]>,
    pub properties: ProgramProperties,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Declarations of one register file
    pub fn declarations_of(&self, file: RegisterFile) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.file == file)
    }

    /// One line of assembly per instruction
    pub fn disassemble(&self) -> String {
        self.instructions
            .iter()
            .enumerate()
            .map(|(pc, inst)| format!("{pc:4}: {inst}\n"))
            .collect()
    }
}
