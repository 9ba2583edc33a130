//! Decoded instructions
//!
//! An [`Instruction`] carries its opcode, operands, an optional branch target
//! and the optional texture or memory descriptor the resource opcodes need.
//! Instructions display as one line of assembly:
//!
//! ```text
//! ADD_SAT TEMP[0].xy, TEMP[1], -IMM[0].xxxx
//! ```

use super::opcode::Opcode;
use super::operand::{DstRegister, SrcRegister, TexOffset};
use crate::error::{ExecResult, Fault};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource shape of a texture, sampler view, image or buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureTarget {
    Buffer,
    Tex1D,
    #[default]
    Tex2D,
    Tex3D,
    Cube,
    Rect,
    Shadow1D,
    Shadow2D,
    ShadowRect,
    Tex1DArray,
    Tex2DArray,
    Shadow1DArray,
    Shadow2DArray,
    ShadowCube,
    Tex2DMsaa,
    Tex2DArrayMsaa,
    CubeArray,
    ShadowCubeArray,
}

impl TextureTarget {
    /// Number of coordinate components a sample instruction reads
    pub fn coord_dim(self) -> usize {
        use TextureTarget::*;
        match self {
            Buffer | Tex1D | Shadow1D => 1,
            Tex2D | Rect | Tex1DArray | Shadow2D | ShadowRect | Shadow1DArray | Tex2DMsaa => 2,
            Tex3D | Cube | Tex2DArray | ShadowCube | Shadow2DArray | Tex2DArrayMsaa => 3,
            CubeArray | ShadowCubeArray => 4,
        }
    }

    /// Source component holding the shadow compare reference, if any
    pub fn shadow_ref_index(self) -> Option<usize> {
        use TextureTarget::*;
        match self {
            Shadow1D | Shadow2D | ShadowRect | Shadow1DArray => Some(2),
            Shadow2DArray | ShadowCube => Some(3),
            ShadowCubeArray => Some(4),
            _ => None,
        }
    }

    /// Number of integer coordinates an image access uses
    pub fn image_dim(self) -> usize {
        use TextureTarget::*;
        match self {
            Buffer | Tex1D | Shadow1D => 1,
            Tex2D | Rect | Tex1DArray | Shadow2D | ShadowRect | Shadow1DArray | Tex2DMsaa => 2,
            _ => 3,
        }
    }

    /// Coordinate channel holding the sample index for multisampled images
    pub fn sample_index_channel(self) -> Option<usize> {
        match self {
            TextureTarget::Tex2DMsaa | TextureTarget::Tex2DArrayMsaa => Some(3),
            _ => None,
        }
    }
}

/// Texture descriptor of a texture instruction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextureInfo {
    pub target: TextureTarget,
    pub offsets: Vec<TexOffset>,
}

/// Descriptor of an image or buffer access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub target: TextureTarget,
    /// Pixel format handed to the image capability
    pub format: u32,
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub saturate: bool,
    pub dst: Vec<DstRegister>,
    pub src: Vec<SrcRegister>,
    /// Branch target (instruction index)
    pub label: Option<usize>,
    pub texture: Option<TextureInfo>,
    pub memory: Option<MemoryInfo>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            saturate: false,
            dst: Vec::new(),
            src: Vec::new(),
            label: None,
            texture: None,
            memory: None,
        }
    }

    pub fn with_dst(mut self, dst: DstRegister) -> Self {
        self.dst.push(dst);
        self
    }

    pub fn with_src(mut self, src: SrcRegister) -> Self {
        self.src.push(src);
        self
    }

    pub fn with_label(mut self, label: usize) -> Self {
        self.label = Some(label);
        self
    }

    pub fn saturated(mut self) -> Self {
        self.saturate = true;
        self
    }

    pub fn with_texture(mut self, texture: TextureInfo) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_memory(mut self, memory: MemoryInfo) -> Self {
        self.memory = Some(memory);
        self
    }

    pub(crate) fn src_at(&self, index: usize) -> ExecResult<&SrcRegister> {
        self.src
            .get(index)
            .ok_or(Fault::MissingOperand { kind: "source", index })
    }

    pub(crate) fn dst_at(&self, index: usize) -> ExecResult<&DstRegister> {
        self.dst
            .get(index)
            .ok_or(Fault::MissingOperand { kind: "destination", index })
    }

    pub(crate) fn label_target(&self) -> ExecResult<usize> {
        self.label.ok_or(Fault::MissingDescriptor("branch target"))
    }

    pub(crate) fn texture_info(&self) -> ExecResult<&TextureInfo> {
        self.texture.as_ref().ok_or(Fault::MissingDescriptor("texture descriptor"))
    }

    pub(crate) fn memory_info(&self) -> ExecResult<MemoryInfo> {
        self.memory.ok_or(Fault::MissingDescriptor("memory descriptor"))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if self.saturate {
            f.write_str("_SAT")?;
        }
        let mut sep = " ";
        for dst in &self.dst {
            write!(f, "{sep}{dst}")?;
            sep = ", ";
        }
        for src in &self.src {
            write!(f, "{sep}{src}")?;
            sep = ", ";
        }
        if let Some(tex) = &self.texture {
            write!(f, "{sep}{:?}", tex.target)?;
        }
        if let Some(label) = self.label {
            write!(f, " :{label}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::operand::{RegisterFile, Swizzle, WriteMask};

    #[test]
    fn test_instruction_display() {
        let inst = Instruction::new(Opcode::Add)
            .saturated()
            .with_dst(DstRegister::new(RegisterFile::Temporary, 0).mask(WriteMask::XY))
            .with_src(SrcRegister::new(RegisterFile::Temporary, 1))
            .with_src(SrcRegister::new(RegisterFile::Immediate, 0).swizzle(Swizzle::XXXX).neg());
        assert_eq!(inst.to_string(), "ADD_SAT TEMP[0].xy, TEMP[1], -IMM[0].xxxx");

        let branch = Instruction::new(Opcode::Else).with_label(12);
        assert_eq!(branch.to_string(), "ELSE :12");
    }

    #[test]
    fn test_texture_target_dims() {
        assert_eq!(TextureTarget::Shadow1D.coord_dim(), 1);
        assert_eq!(TextureTarget::Shadow1D.shadow_ref_index(), Some(2));
        assert_eq!(TextureTarget::ShadowCube.shadow_ref_index(), Some(3));
        assert_eq!(TextureTarget::CubeArray.coord_dim(), 4);
        assert_eq!(TextureTarget::Tex2D.shadow_ref_index(), None);
        assert_eq!(TextureTarget::Tex2DArrayMsaa.image_dim(), 3);
        assert_eq!(TextureTarget::Tex2DArrayMsaa.sample_index_channel(), Some(3));
    }

    #[test]
    fn test_missing_operand_is_a_fault() {
        let inst = Instruction::new(Opcode::Mov);
        assert_eq!(
            inst.src_at(0),
            Err(Fault::MissingOperand { kind: "source", index: 0 })
        );
        assert!(inst.label_target().is_err());
    }

    #[test]
    fn test_instruction_serialization() {
        let inst = Instruction::new(Opcode::Tex)
            .with_dst(DstRegister::new(RegisterFile::Output, 0))
            .with_src(SrcRegister::new(RegisterFile::Input, 1))
            .with_src(SrcRegister::new(RegisterFile::Sampler, 0))
            .with_texture(TextureInfo {
                target: TextureTarget::Tex2D,
                offsets: Vec::new(),
            });
        let bytes = bincode::serialize(&inst).unwrap();
        let back: Instruction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, inst);
    }
}
