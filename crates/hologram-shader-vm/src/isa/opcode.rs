//! Opcode set
//!
//! Opcodes are numbered in declaration order; [`Opcode::try_from`] decodes a
//! raw `u16` produced by an external encoder.

use crate::error::Fault;
use std::fmt;

macro_rules! opcodes {
    ($($(#[$meta:meta])* $variant:ident => $mnemonic:literal,)*) => {
        /// Every opcode the machine executes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr(u16)]
        pub enum Opcode {
            $($(#[$meta])* $variant,)*
        }

        impl Opcode {
            /// All opcodes, indexed by their raw encoding
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Upper-case assembly mnemonic
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    // Float arithmetic
    Arl => "ARL",
    Mov => "MOV",
    /// Lighting coefficients
    Lit => "LIT",
    Rcp => "RCP",
    Rsq => "RSQ",
    /// Partial-precision 2^x
    Exp => "EXP",
    /// Partial-precision log2(x)
    Log => "LOG",
    Mul => "MUL",
    Add => "ADD",
    Dp3 => "DP3",
    Dp4 => "DP4",
    /// Distance vector
    Dst => "DST",
    Min => "MIN",
    Max => "MAX",
    Slt => "SLT",
    Sge => "SGE",
    Mad => "MAD",
    Lrp => "LRP",
    Sqrt => "SQRT",
    Frc => "FRC",
    Flr => "FLR",
    Round => "ROUND",
    Ex2 => "EX2",
    Lg2 => "LG2",
    Pow => "POW",
    Ldexp => "LDEXP",
    Cos => "COS",
    Ddx => "DDX",
    DdxFine => "DDX_FINE",
    Ddy => "DDY",
    DdyFine => "DDY_FINE",
    Kill => "KILL",
    KillIf => "KILL_IF",
    Pk2h => "PK2H",
    Seq => "SEQ",
    Sgt => "SGT",
    Sin => "SIN",
    Sle => "SLE",
    Sne => "SNE",
    Tex => "TEX",
    Txb => "TXB",
    Txd => "TXD",
    Txl => "TXL",
    Txp => "TXP",
    Tg4 => "TG4",
    Lodq => "LODQ",
    Up2h => "UP2H",
    Arr => "ARR",
    Cal => "CAL",
    Ret => "RET",
    Ssg => "SSG",
    Cmp => "CMP",
    Div => "DIV",
    Dp2 => "DP2",
    If => "IF",
    Uif => "UIF",
    Else => "ELSE",
    Endif => "ENDIF",
    End => "END",
    Ceil => "CEIL",
    Trunc => "TRUNC",

    // 32-bit integer
    I2f => "I2F",
    Not => "NOT",
    Shl => "SHL",
    And => "AND",
    Or => "OR",
    Mod => "MOD",
    Xor => "XOR",
    Txf => "TXF",
    Txq => "TXQ",
    Emit => "EMIT",
    Endprim => "ENDPRIM",
    Bgnloop => "BGNLOOP",
    Endloop => "ENDLOOP",
    Brk => "BRK",
    Cont => "CONT",
    Bgnsub => "BGNSUB",
    Endsub => "ENDSUB",
    Nop => "NOP",
    F2i => "F2I",
    Fseq => "FSEQ",
    Fsge => "FSGE",
    Fslt => "FSLT",
    Fsne => "FSNE",
    Idiv => "IDIV",
    Imax => "IMAX",
    Imin => "IMIN",
    Ineg => "INEG",
    Isge => "ISGE",
    Ishr => "ISHR",
    Islt => "ISLT",
    F2u => "F2U",
    U2f => "U2F",
    Uadd => "UADD",
    Udiv => "UDIV",
    Umad => "UMAD",
    Umax => "UMAX",
    Umin => "UMIN",
    Umod => "UMOD",
    Umul => "UMUL",
    ImulHi => "IMUL_HI",
    UmulHi => "UMUL_HI",
    Useq => "USEQ",
    Usge => "USGE",
    Ushr => "USHR",
    Uslt => "USLT",
    Usne => "USNE",
    Switch => "SWITCH",
    Case => "CASE",
    Default => "DEFAULT",
    Endswitch => "ENDSWITCH",

    // Resource-view sampling
    Sample => "SAMPLE",
    SampleI => "SAMPLE_I",
    SampleIMs => "SAMPLE_I_MS",
    SampleB => "SAMPLE_B",
    SampleC => "SAMPLE_C",
    SampleCLz => "SAMPLE_C_LZ",
    SampleD => "SAMPLE_D",
    SampleL => "SAMPLE_L",
    Gather4 => "GATHER4",
    Sviewinfo => "SVIEWINFO",
    Lod => "LOD",

    Uarl => "UARL",
    Ucmp => "UCMP",
    Iabs => "IABS",
    Issg => "ISSG",
    Tex2 => "TEX2",
    Txb2 => "TXB2",
    Txl2 => "TXL2",

    // Bit manipulation
    Ibfe => "IBFE",
    Ubfe => "UBFE",
    Bfi => "BFI",
    Brev => "BREV",
    Popc => "POPC",
    Lsb => "LSB",
    Imsb => "IMSB",
    Umsb => "UMSB",

    // Double precision
    F2d => "F2D",
    D2f => "D2F",
    Dabs => "DABS",
    Dneg => "DNEG",
    Dadd => "DADD",
    Dmul => "DMUL",
    Ddiv => "DDIV",
    Dmax => "DMAX",
    Dmin => "DMIN",
    Dslt => "DSLT",
    Dsge => "DSGE",
    Dseq => "DSEQ",
    Dsne => "DSNE",
    Drcp => "DRCP",
    Dsqrt => "DSQRT",
    Drsq => "DRSQ",
    Dmad => "DMAD",
    Dfrac => "DFRAC",
    Dflr => "DFLR",
    Dldexp => "DLDEXP",
    I2d => "I2D",
    D2i => "D2I",
    U2d => "U2D",
    D2u => "D2U",

    // Memory
    Load => "LOAD",
    Store => "STORE",
    Resq => "RESQ",
    AtomUadd => "ATOMUADD",
    AtomXchg => "ATOMXCHG",
    AtomCas => "ATOMCAS",
    AtomAnd => "ATOMAND",
    AtomOr => "ATOMOR",
    AtomXor => "ATOMXOR",
    AtomUmin => "ATOMUMIN",
    AtomUmax => "ATOMUMAX",
    AtomImin => "ATOMIMIN",
    AtomImax => "ATOMIMAX",
    AtomFadd => "ATOMFADD",
    /// Suspends the run loop
    Barrier => "BARRIER",
    Membar => "MEMBAR",

    // 64-bit integer
    I64abs => "I64ABS",
    I64ssg => "I64SSG",
    I64neg => "I64NEG",
    U64seq => "U64SEQ",
    U64sne => "U64SNE",
    I64slt => "I64SLT",
    U64slt => "U64SLT",
    I64sge => "I64SGE",
    U64sge => "U64SGE",
    I64min => "I64MIN",
    U64min => "U64MIN",
    I64max => "I64MAX",
    U64max => "U64MAX",
    U64add => "U64ADD",
    U64mul => "U64MUL",
    U64shl => "U64SHL",
    I64shr => "I64SHR",
    U64shr => "U64SHR",
    U64div => "U64DIV",
    I64div => "I64DIV",
    U64mod => "U64MOD",
    I64mod => "I64MOD",
    F2u64 => "F2U64",
    F2i64 => "F2I64",
    U2i64 => "U2I64",
    I2i64 => "I2I64",
    D2u64 => "D2U64",
    D2i64 => "D2I64",
    U642f => "U642F",
    I642f => "I642F",
    U642d => "U642D",
    I642d => "I642D",

    // Fragment interpolation
    InterpCentroid => "INTERP_CENTROID",
    InterpSample => "INTERP_SAMPLE",
    InterpOffset => "INTERP_OFFSET",
}

impl Opcode {
    /// Does this opcode change the program counter or the execution masks?
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            Opcode::If
                | Opcode::Uif
                | Opcode::Else
                | Opcode::Endif
                | Opcode::Bgnloop
                | Opcode::Endloop
                | Opcode::Brk
                | Opcode::Cont
                | Opcode::Switch
                | Opcode::Case
                | Opcode::Default
                | Opcode::Endswitch
                | Opcode::Cal
                | Opcode::Ret
                | Opcode::Bgnsub
                | Opcode::Endsub
                | Opcode::End
        )
    }

    /// Does this opcode go through the sampler capability?
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Opcode::Tex
                | Opcode::Txb
                | Opcode::Txd
                | Opcode::Txl
                | Opcode::Txp
                | Opcode::Tg4
                | Opcode::Lodq
                | Opcode::Tex2
                | Opcode::Txb2
                | Opcode::Txl2
                | Opcode::Txf
                | Opcode::Txq
                | Opcode::Sample
                | Opcode::SampleI
                | Opcode::SampleIMs
                | Opcode::SampleB
                | Opcode::SampleC
                | Opcode::SampleCLz
                | Opcode::SampleD
                | Opcode::SampleL
                | Opcode::Gather4
                | Opcode::Sviewinfo
                | Opcode::Lod
        )
    }

    /// Is this an atomic read-modify-write?
    pub fn is_atomic(self) -> bool {
        matches!(
            self,
            Opcode::AtomUadd
                | Opcode::AtomXchg
                | Opcode::AtomCas
                | Opcode::AtomAnd
                | Opcode::AtomOr
                | Opcode::AtomXor
                | Opcode::AtomUmin
                | Opcode::AtomUmax
                | Opcode::AtomImin
                | Opcode::AtomImax
                | Opcode::AtomFadd
        )
    }

    /// Does this opcode read or write 64-bit channel pairs?
    pub fn is_64bit(self) -> bool {
        let raw = self as u16;
        (Opcode::F2d as u16..=Opcode::D2u as u16).contains(&raw)
            || (Opcode::I64abs as u16..=Opcode::I642d as u16).contains(&raw)
    }
}

impl TryFrom<u16> for Opcode {
    type Error = Fault;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Opcode::ALL.get(raw as usize).copied().ok_or(Fault::UnknownOpcode(raw))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_encoding_matches_table() {
        for (raw, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as u16 as usize, raw);
            assert_eq!(Opcode::try_from(raw as u16), Ok(*op));
        }
        let past_end = Opcode::ALL.len() as u16;
        assert_eq!(Opcode::try_from(past_end), Err(Fault::UnknownOpcode(past_end)));
    }

    #[test]
    fn test_classification() {
        assert!(Opcode::Endloop.is_control_flow());
        assert!(!Opcode::Add.is_control_flow());
        assert!(Opcode::SampleCLz.is_texture());
        assert!(Opcode::AtomCas.is_atomic());
        assert!(Opcode::Dadd.is_64bit());
        assert!(Opcode::U642d.is_64bit());
        assert!(!Opcode::Load.is_64bit());
        assert_eq!(Opcode::DdxFine.to_string(), "DDX_FINE");
    }
}
