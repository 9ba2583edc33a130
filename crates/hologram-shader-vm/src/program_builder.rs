//! Program construction
//!
//! [`ProgramBuilder`] appends instructions and declarations and resolves
//! branch labels, so tests and embedders can write programs without
//! computing instruction indices by hand.
//!
//! Label conventions follow the executing machine:
//! - `IF`/`UIF` jump to their `ELSE` (or to `ENDIF` when there is none)
//! - `ELSE` jumps to its `ENDIF`
//! - `CAL` jumps to the `BGNSUB` of the named subroutine
//!
//! # Example
//!
//! ```rust
//! use hologram_shader_vm::ProgramBuilder;
//! use hologram_shader_vm::isa::Opcode;
//!
//! let mut b = ProgramBuilder::new();
//! let k = b.immediate_f32([0.0, 1.0, 2.0, 3.0]);
//! b.if_(b.input(0));
//! b.op(Opcode::Mov, &[b.output(0)], &[b.imm(k)]);
//! b.else_();
//! b.op(Opcode::Mov, &[b.output(0)], &[b.imm(k).scalar(0)]);
//! b.endif();
//! b.end();
//!
//! let program = b.build().unwrap();
//! assert_eq!(program.instructions[0].label, Some(2));
//! assert_eq!(program.instructions[2].label, Some(4));
//! ```

use crate::error::{Result, VmError};
use crate::isa::{
    Declaration, DstRegister, Instruction, MemoryInfo, Opcode, Program, ProgramProperties, RegisterFile, SrcRegister,
    TexOffset, TextureInfo, TextureTarget,
};
use std::collections::HashMap;

/// Incremental program builder with label resolution
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
    declarations: Vec<Declaration>,
    immediates: Vec<[u32; 4]>,
    properties: ProgramProperties,
    /// `IF`/`ELSE` instructions waiting for their target
    open_ifs: Vec<usize>,
    open_loops: usize,
    open_switches: usize,
    subroutines: HashMap<String, usize>,
    calls: Vec<(usize, String)>,
    error: Option<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next instruction will get
    pub fn next_index(&self) -> usize {
        self.instructions.len()
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    // ============================================================================================
    // Operands
    // ============================================================================================

    pub fn temp(&self, index: i32) -> SrcRegister {
        SrcRegister::new(RegisterFile::Temporary, index)
    }

    pub fn temp_dst(&self, index: i32) -> DstRegister {
        DstRegister::new(RegisterFile::Temporary, index)
    }

    pub fn input(&self, index: i32) -> SrcRegister {
        SrcRegister::new(RegisterFile::Input, index)
    }

    pub fn output(&self, index: i32) -> DstRegister {
        DstRegister::new(RegisterFile::Output, index)
    }

    pub fn imm(&self, index: i32) -> SrcRegister {
        SrcRegister::new(RegisterFile::Immediate, index)
    }

    /// `CONST[slot][index]`
    pub fn constant(&self, slot: i32, index: i32) -> SrcRegister {
        SrcRegister::new(RegisterFile::Constant, index).dim(slot)
    }

    pub fn addr_dst(&self, index: i32) -> DstRegister {
        DstRegister::new(RegisterFile::Address, index)
    }

    pub fn system_value(&self, index: i32) -> SrcRegister {
        SrcRegister::new(RegisterFile::SystemValue, index)
    }

    /// Resource operand (sampler, view, image, buffer or shared memory)
    pub fn resource(&self, file: RegisterFile, unit: i32) -> SrcRegister {
        SrcRegister::new(file, unit)
    }

    pub fn null(&self) -> DstRegister {
        DstRegister::new(RegisterFile::Null, 0)
    }

    // ============================================================================================
    // Declarations and immediates
    // ============================================================================================

    /// Append an immediate; returns its index in the immediate file
    pub fn immediate_u32(&mut self, value: [u32; 4]) -> i32 {
        self.immediates.push(value);
        (self.immediates.len() - 1) as i32
    }

    pub fn immediate_f32(&mut self, value: [f32; 4]) -> i32 {
        self.immediate_u32(value.map(f32::to_bits))
    }

    pub fn immediate_i32(&mut self, value: [i32; 4]) -> i32 {
        self.immediate_u32(value.map(|v| v as u32))
    }

    pub fn declare(&mut self, declaration: Declaration) -> &mut Self {
        self.declarations.push(declaration);
        self
    }

    pub fn max_output_vertices(&mut self, count: u32) -> &mut Self {
        self.properties.max_output_vertices = count;
        self
    }

    // ============================================================================================
    // Instructions
    // ============================================================================================

    /// Append a prepared instruction; returns its index
    pub fn push(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn op(&mut self, opcode: Opcode, dst: &[DstRegister], src: &[SrcRegister]) -> usize {
        let mut inst = Instruction::new(opcode);
        inst.dst.extend_from_slice(dst);
        inst.src.extend_from_slice(src);
        self.push(inst)
    }

    /// Like [`op`](Self::op) with the result clamped to [0, 1]
    pub fn op_sat(&mut self, opcode: Opcode, dst: &[DstRegister], src: &[SrcRegister]) -> usize {
        let index = self.op(opcode, dst, src);
        self.instructions[index].saturate = true;
        index
    }

    /// Texture instruction with its target
    pub fn tex(&mut self, opcode: Opcode, dst: DstRegister, src: &[SrcRegister], target: TextureTarget) -> usize {
        self.tex_offset(opcode, dst, src, target, Vec::new())
    }

    pub fn tex_offset(
        &mut self,
        opcode: Opcode,
        dst: DstRegister,
        src: &[SrcRegister],
        target: TextureTarget,
        offsets: Vec<TexOffset>,
    ) -> usize {
        let index = self.op(opcode, &[dst], src);
        self.instructions[index].texture = Some(TextureInfo { target, offsets });
        index
    }

    /// Image or buffer instruction with its memory descriptor
    pub fn memory(
        &mut self,
        opcode: Opcode,
        dst: DstRegister,
        src: &[SrcRegister],
        target: TextureTarget,
        format: u32,
    ) -> usize {
        let index = self.op(opcode, &[dst], src);
        self.instructions[index].memory = Some(MemoryInfo { target, format });
        index
    }

    pub fn end(&mut self) -> usize {
        self.op(Opcode::End, &[], &[])
    }

    // ============================================================================================
    // Structured control flow
    // ============================================================================================

    /// `IF`: lanes where `cond.x` is a nonzero float
    pub fn if_(&mut self, cond: SrcRegister) -> usize {
        let index = self.op(Opcode::If, &[], &[cond]);
        self.open_ifs.push(index);
        index
    }

    /// `UIF`: lanes where `cond.x` is a nonzero integer
    pub fn uif(&mut self, cond: SrcRegister) -> usize {
        let index = self.op(Opcode::Uif, &[], &[cond]);
        self.open_ifs.push(index);
        index
    }

    pub fn else_(&mut self) -> usize {
        let index = self.op(Opcode::Else, &[], &[]);
        match self.open_ifs.pop() {
            Some(open) if self.instructions[open].opcode != Opcode::Else => {
                self.instructions[open].label = Some(index);
            }
            _ => self.fail(format!("ELSE at {index} without an open IF")),
        }
        self.open_ifs.push(index);
        index
    }

    pub fn endif(&mut self) -> usize {
        let index = self.op(Opcode::Endif, &[], &[]);
        match self.open_ifs.pop() {
            Some(open) => self.instructions[open].label = Some(index),
            None => self.fail(format!("ENDIF at {index} without an open IF")),
        }
        index
    }

    pub fn bgnloop(&mut self) -> usize {
        self.open_loops += 1;
        self.op(Opcode::Bgnloop, &[], &[])
    }

    pub fn endloop(&mut self) -> usize {
        let index = self.op(Opcode::Endloop, &[], &[]);
        match self.open_loops.checked_sub(1) {
            Some(open) => self.open_loops = open,
            None => self.fail(format!("ENDLOOP at {index} without an open loop")),
        }
        index
    }

    pub fn brk(&mut self) -> usize {
        self.op(Opcode::Brk, &[], &[])
    }

    pub fn cont(&mut self) -> usize {
        self.op(Opcode::Cont, &[], &[])
    }

    pub fn switch(&mut self, selector: SrcRegister) -> usize {
        self.open_switches += 1;
        self.op(Opcode::Switch, &[], &[selector])
    }

    pub fn case(&mut self, value: SrcRegister) -> usize {
        self.op(Opcode::Case, &[], &[value])
    }

    pub fn default_case(&mut self) -> usize {
        self.op(Opcode::Default, &[], &[])
    }

    pub fn endswitch(&mut self) -> usize {
        let index = self.op(Opcode::Endswitch, &[], &[]);
        match self.open_switches.checked_sub(1) {
            Some(open) => self.open_switches = open,
            None => self.fail(format!("ENDSWITCH at {index} without an open SWITCH")),
        }
        index
    }

    /// Start subroutine `name`
    pub fn bgnsub(&mut self, name: &str) -> usize {
        let index = self.op(Opcode::Bgnsub, &[], &[]);
        if self.subroutines.insert(name.to_string(), index).is_some() {
            self.fail(format!("subroutine {name} defined twice"));
        }
        index
    }

    pub fn endsub(&mut self) -> usize {
        self.op(Opcode::Endsub, &[], &[])
    }

    /// `CAL` to subroutine `name`, which may be defined later
    pub fn call(&mut self, name: &str) -> usize {
        let index = self.op(Opcode::Cal, &[], &[]);
        self.calls.push((index, name.to_string()));
        index
    }

    pub fn ret(&mut self) -> usize {
        self.op(Opcode::Ret, &[], &[])
    }

    /// Resolve call targets and check that every construct was closed
    pub fn build(mut self) -> Result<Program> {
        if let Some(message) = self.error.take() {
            return Err(VmError::Build(message));
        }
        if let Some(&open) = self.open_ifs.last() {
            return Err(VmError::Build(format!("IF at {open} is never closed")));
        }
        if self.open_loops > 0 {
            return Err(VmError::Build(format!("{} loops are never closed", self.open_loops)));
        }
        if self.open_switches > 0 {
            return Err(VmError::Build(format!("{} switches are never closed", self.open_switches)));
        }
        for (index, name) in &self.calls {
            let target = self
                .subroutines
                .get(name)
                .ok_or_else(|| VmError::Build(format!("CAL at {index} names unknown subroutine {name}")))?;
            self.instructions[*index].label = Some(*target);
        }

        tracing::debug!(
            instructions = self.instructions.len(),
            subroutines = self.subroutines.len(),
            "program built"
        );
        Ok(Program {
            instructions: self.instructions,
            declarations: self.declarations,
            immediates: self.immediates,
            properties: self.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_without_else_targets_endif() {
        let mut b = ProgramBuilder::new();
        b.if_(b.input(0));
        b.op(Opcode::Mov, &[b.output(0)], &[b.input(1)]);
        b.endif();
        b.end();
        let program = b.build().unwrap();
        assert_eq!(program.instructions[0].label, Some(2));
    }

    #[test]
    fn test_nested_ifs_resolve_innermost_first() {
        let mut b = ProgramBuilder::new();
        b.if_(b.input(0)); // 0
        b.uif(b.input(1)); // 1
        b.endif(); // 2
        b.else_(); // 3
        b.endif(); // 4
        b.end();
        let program = b.build().unwrap();
        assert_eq!(program.instructions[0].label, Some(3));
        assert_eq!(program.instructions[1].label, Some(2));
        assert_eq!(program.instructions[3].label, Some(4));
    }

    #[test]
    fn test_call_resolves_forward_reference() {
        let mut b = ProgramBuilder::new();
        b.call("helper");
        b.end();
        let sub = b.bgnsub("helper");
        b.ret();
        b.endsub();
        let program = b.build().unwrap();
        assert_eq!(program.instructions[0].label, Some(sub));
        assert_eq!(sub, 2);
    }

    #[test]
    fn test_structural_errors() {
        let mut b = ProgramBuilder::new();
        b.endif();
        assert!(matches!(b.build(), Err(VmError::Build(_))));

        let mut b = ProgramBuilder::new();
        b.bgnloop();
        b.end();
        assert!(matches!(b.build(), Err(VmError::Build(_))));

        let mut b = ProgramBuilder::new();
        b.if_(b.input(0));
        b.else_();
        b.else_();
        b.endif();
        assert!(matches!(b.build(), Err(VmError::Build(_))));

        let mut b = ProgramBuilder::new();
        b.call("missing");
        b.end();
        let err = b.build().unwrap_err();
        assert_eq!(err, VmError::Build("CAL at 0 names unknown subroutine missing".into()));
    }

    #[test]
    fn test_switch_with_default_case() {
        let mut b = ProgramBuilder::new();
        assert_eq!(b.next_index(), 0);
        b.switch(b.input(0));
        b.case(b.input(1));
        b.brk();
        assert_eq!(b.default_case(), 3);
        b.brk();
        b.endswitch();
        b.end();
        let program = b.build().unwrap();
        let ops: Vec<Opcode> = program.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            ops,
            [
                Opcode::Switch,
                Opcode::Case,
                Opcode::Brk,
                Opcode::Default,
                Opcode::Brk,
                Opcode::Endswitch,
                Opcode::End
            ]
        );
    }

    #[test]
    fn test_immediates_and_saturate() {
        let mut b = ProgramBuilder::new();
        assert_eq!(b.immediate_f32([1.0; 4]), 0);
        assert_eq!(b.immediate_i32([-1, 0, 1, 2]), 1);
        b.op_sat(Opcode::Add, &[b.temp_dst(0)], &[b.imm(0), b.imm(1)]);
        let program = b.build().unwrap();
        assert_eq!(program.immediates[1][0], u32::MAX);
        assert!(program.instructions[0].saturate);
    }
}
