//! Register operands: files, swizzles, write masks and addressing modes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register file an operand addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterFile {
    /// Write sink; reads are invalid
    Null,
    Constant,
    Input,
    Output,
    Temporary,
    Sampler,
    Address,
    Immediate,
    SystemValue,
    Image,
    SamplerView,
    Buffer,
    /// Work-group shared memory
    Memory,
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegisterFile::Null => "NULL",
            RegisterFile::Constant => "CONST",
            RegisterFile::Input => "IN",
            RegisterFile::Output => "OUT",
            RegisterFile::Temporary => "TEMP",
            RegisterFile::Sampler => "SAMP",
            RegisterFile::Address => "ADDR",
            RegisterFile::Immediate => "IMM",
            RegisterFile::SystemValue => "SV",
            RegisterFile::Image => "IMAGE",
            RegisterFile::SamplerView => "SVIEW",
            RegisterFile::Buffer => "BUFFER",
            RegisterFile::Memory => "MEMORY",
        };
        f.write_str(name)
    }
}

/// Channel selector
pub const CHAN_X: usize = 0;
pub const CHAN_Y: usize = 1;
pub const CHAN_Z: usize = 2;
pub const CHAN_W: usize = 3;

const COMPONENT_NAMES: [char; 4] = ['x', 'y', 'z', 'w'];

/// Source component selection, one entry per destination channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Swizzle(pub [u8; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([0, 1, 2, 3]);
    pub const XXXX: Swizzle = Swizzle([0, 0, 0, 0]);
    pub const YYYY: Swizzle = Swizzle([1, 1, 1, 1]);
    pub const ZZZZ: Swizzle = Swizzle([2, 2, 2, 2]);
    pub const WWWW: Swizzle = Swizzle([3, 3, 3, 3]);

    /// Broadcast one component to every channel
    pub fn splat(component: u8) -> Self {
        Swizzle([component; 4])
    }

    /// Parse a `"xyzw"`-style selector of exactly four letters
    pub fn parse(text: &str) -> Option<Self> {
        let mut out = [0u8; 4];
        let mut chars = text.chars();
        for slot in &mut out {
            let c = chars.next()?;
            *slot = COMPONENT_NAMES.iter().position(|&n| n == c)? as u8;
        }
        if chars.next().is_some() {
            return None;
        }
        Some(Swizzle(out))
    }

    /// Component read for destination channel `chan`
    #[inline]
    pub fn component(self, chan: usize) -> u8 {
        self.0[chan]
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Swizzle::IDENTITY
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0 {
            let name = COMPONENT_NAMES.get(c as usize).copied().unwrap_or('?');
            write!(f, "{name}")?;
        }
        Ok(())
    }
}

/// Destination channel mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WriteMask(pub u8);

impl WriteMask {
    pub const NONE: WriteMask = WriteMask(0);
    pub const X: WriteMask = WriteMask(0b0001);
    pub const Y: WriteMask = WriteMask(0b0010);
    pub const Z: WriteMask = WriteMask(0b0100);
    pub const W: WriteMask = WriteMask(0b1000);
    pub const XY: WriteMask = WriteMask(0b0011);
    pub const ZW: WriteMask = WriteMask(0b1100);
    pub const XYZ: WriteMask = WriteMask(0b0111);
    pub const XYZW: WriteMask = WriteMask(0b1111);

    #[inline]
    pub fn contains(self, chan: usize) -> bool {
        self.0 & (1 << chan) != 0
    }

    /// True if every bit of `other` is set
    #[inline]
    pub fn covers(self, other: WriteMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set
    #[inline]
    pub fn intersects(self, other: WriteMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Channels enabled by the mask, lowest first
    pub fn channels(self) -> impl Iterator<Item = usize> {
        (0..4).filter(move |&c| self.contains(c))
    }

    /// One past the highest enabled channel
    pub fn last_bit(self) -> usize {
        (8 - (self.0 & 0xf).leading_zeros()) as usize
    }
}

impl fmt::Display for WriteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chan in self.channels() {
            write!(f, "{}", COMPONENT_NAMES[chan])?;
        }
        Ok(())
    }
}

/// Address-register relative indexing: `file[index].component` is added to the direct index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indirect {
    pub file: RegisterFile,
    pub index: u32,
    pub component: u8,
}

impl Indirect {
    /// Index through `ADDR[index].component`
    pub fn address(index: u32, component: u8) -> Self {
        Self {
            file: RegisterFile::Address,
            index,
            component,
        }
    }
}

/// Second register index (constant buffer slot, geometry input vertex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub index: i32,
    pub indirect: Option<Indirect>,
}

/// Source operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcRegister {
    pub file: RegisterFile,
    pub index: i32,
    pub swizzle: Swizzle,
    pub absolute: bool,
    pub negate: bool,
    pub indirect: Option<Indirect>,
    pub dimension: Option<Dimension>,
}

impl SrcRegister {
    pub fn new(file: RegisterFile, index: i32) -> Self {
        Self {
            file,
            index,
            swizzle: Swizzle::IDENTITY,
            absolute: false,
            negate: false,
            indirect: None,
            dimension: None,
        }
    }

    pub fn swizzle(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }

    /// Broadcast a single component
    pub fn scalar(self, component: u8) -> Self {
        self.swizzle(Swizzle::splat(component))
    }

    pub fn abs(mut self) -> Self {
        self.absolute = true;
        self
    }

    pub fn neg(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn indirect(mut self, address: u32, component: u8) -> Self {
        self.indirect = Some(Indirect::address(address, component));
        self
    }

    pub fn dim(mut self, index: i32) -> Self {
        self.dimension = Some(Dimension { index, indirect: None });
        self
    }

    pub fn dim_indirect(mut self, index: i32, address: u32, component: u8) -> Self {
        self.dimension = Some(Dimension {
            index,
            indirect: Some(Indirect::address(address, component)),
        });
        self
    }
}

impl fmt::Display for SrcRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("-")?;
        }
        if self.absolute {
            f.write_str("|")?;
        }
        write!(f, "{}", self.file)?;
        if let Some(dim) = &self.dimension {
            match &dim.indirect {
                Some(ind) => write!(f, "[ADDR[{}].{}+{}]", ind.index, COMPONENT_NAMES[ind.component as usize & 3], dim.index)?,
                None => write!(f, "[{}]", dim.index)?,
            }
        }
        match &self.indirect {
            Some(ind) => write!(f, "[ADDR[{}].{}+{}]", ind.index, COMPONENT_NAMES[ind.component as usize & 3], self.index)?,
            None => write!(f, "[{}]", self.index)?,
        }
        if self.swizzle != Swizzle::IDENTITY {
            write!(f, ".{}", self.swizzle)?;
        }
        if self.absolute {
            f.write_str("|")?;
        }
        Ok(())
    }
}

/// Destination operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstRegister {
    pub file: RegisterFile,
    pub index: i32,
    pub write_mask: WriteMask,
    pub indirect: Option<Indirect>,
}

impl DstRegister {
    pub fn new(file: RegisterFile, index: i32) -> Self {
        Self {
            file,
            index,
            write_mask: WriteMask::XYZW,
            indirect: None,
        }
    }

    pub fn mask(mut self, write_mask: WriteMask) -> Self {
        self.write_mask = write_mask;
        self
    }

    pub fn indirect(mut self, address: u32, component: u8) -> Self {
        self.indirect = Some(Indirect::address(address, component));
        self
    }

    /// The same register viewed as a source
    pub fn as_src(&self) -> SrcRegister {
        SrcRegister {
            indirect: self.indirect,
            ..SrcRegister::new(self.file, self.index)
        }
    }
}

impl fmt::Display for DstRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        match &self.indirect {
            Some(ind) => write!(f, "[ADDR[{}].{}+{}]", ind.index, COMPONENT_NAMES[ind.component as usize & 3], self.index)?,
            None => write!(f, "[{}]", self.index)?,
        }
        if self.write_mask != WriteMask::XYZW {
            write!(f, ".{}", self.write_mask)?;
        }
        Ok(())
    }
}

/// Texel offset operand: three signed components taken from lane 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexOffset {
    pub file: RegisterFile,
    pub index: i32,
    pub swizzle: [u8; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swizzle_parse() {
        assert_eq!(Swizzle::parse("xyzw"), Some(Swizzle::IDENTITY));
        assert_eq!(Swizzle::parse("wzyx"), Some(Swizzle([3, 2, 1, 0])));
        assert_eq!(Swizzle::parse("xyz"), None);
        assert_eq!(Swizzle::parse("xyzwx"), None);
        assert_eq!(Swizzle::parse("abcd"), None);
    }

    #[test]
    fn test_write_mask_helpers() {
        assert_eq!(WriteMask::XYZW.last_bit(), 4);
        assert_eq!(WriteMask::X.last_bit(), 1);
        assert_eq!(WriteMask(0b0101).last_bit(), 3);
        assert_eq!(WriteMask::NONE.last_bit(), 0);
        assert!(WriteMask::XYZW.covers(WriteMask::ZW));
        assert!(!WriteMask::Y.covers(WriteMask::XY));
        assert!(WriteMask::Y.intersects(WriteMask::XY));
        assert_eq!(WriteMask(0b1010).channels().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(WriteMask(0b1010).to_string(), "yw");
    }

    #[test]
    fn test_operand_display() {
        let src = SrcRegister::new(RegisterFile::Temporary, 3)
            .swizzle(Swizzle::XXXX)
            .neg();
        assert_eq!(src.to_string(), "-TEMP[3].xxxx");

        let src = SrcRegister::new(RegisterFile::Constant, 2).dim(1).indirect(0, 0);
        assert_eq!(src.to_string(), "CONST[1][ADDR[0].x+2]");

        let dst = DstRegister::new(RegisterFile::Output, 0).mask(WriteMask::XY);
        assert_eq!(dst.to_string(), "OUT[0].xy");
    }
}
