//! Symbolic instructions.
//!
//! The instruction set here is the subset this toolkit manipulates: module
//! variable access, constant loads, calls, jumps, and buffer creation. The
//! encoder in `emit::code` turns these into raw bytes; the rewriter patches
//! module-slot immediates in place.

use serde::{Deserialize, Serialize};

/// Immediate operand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Imm {
    Int(i64),
    Float(f64),
}

impl Imm {
    pub fn as_int(self) -> Option<i64> {
        match self {
            Imm::Int(v) => Some(v),
            Imm::Float(_) => None,
        }
    }
}

/// Operand layout of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// No operands.
    None,
    /// One 8-bit immediate.
    Imm8,
    /// One 16-bit immediate.
    Imm16,
    /// One 8-bit register.
    Reg8,
    /// Two 8-bit registers.
    Reg8Reg8,
    /// One 16-bit id (string / method / literal-array table index).
    Id16,
    /// 16-bit id then 8-bit immediate.
    Id16Imm8,
    /// 32-bit relative jump offset, resolved from a label.
    Jump32,
    /// One 64-bit integer immediate.
    Imm64,
    /// One 64-bit float immediate (bit pattern preserved).
    FImm64,
}

impl Format {
    /// Encoded operand size in bytes (opcode byte excluded).
    pub fn operand_size(self) -> usize {
        match self {
            Format::None => 0,
            Format::Imm8 | Format::Reg8 => 1,
            Format::Imm16 | Format::Reg8Reg8 | Format::Id16 => 2,
            Format::Id16Imm8 => 3,
            Format::Jump32 => 4,
            Format::Imm64 | Format::FImm64 => 8,
        }
    }
}

macro_rules! opcodes {
    ($( $variant:ident = ($byte:expr, $mnemonic:expr, $format:expr) ),+ $(,)?) => {
        /// Opcode of a symbolic instruction.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $( $variant ),+
        }

        impl Opcode {
            /// Encoded opcode byte.
            pub fn byte(self) -> u8 {
                match self {
                    $( Opcode::$variant => $byte ),+
                }
            }

            /// Assembly mnemonic.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $mnemonic ),+
                }
            }

            /// Operand layout.
            pub fn format(self) -> Format {
                match self {
                    $( Opcode::$variant => $format ),+
                }
            }
        }
    };
}

opcodes! {
    LdUndefined = (0x00, "ldundefined", Format::None),
    Lda = (0x01, "lda", Format::Reg8),
    Sta = (0x02, "sta", Format::Reg8),
    Mov = (0x03, "mov", Format::Reg8Reg8),
    Ldai = (0x04, "ldai", Format::Imm64),
    Fldai = (0x05, "fldai", Format::FImm64),
    LdaStr = (0x06, "lda.str", Format::Id16),
    Return = (0x07, "return", Format::None),
    ReturnUndefined = (0x08, "returnundefined", Format::None),
    Jmp = (0x09, "jmp", Format::Jump32),
    Jeqz = (0x0a, "jeqz", Format::Jump32),
    Throw = (0x0b, "throw", Format::None),
    CallArg0 = (0x0c, "callarg0", Format::None),
    CallArg1 = (0x0d, "callarg1", Format::Reg8),
    DefineFunc = (0x0e, "definefunc", Format::Id16Imm8),
    CreateArrayWithBuffer = (0x0f, "createarraywithbuffer", Format::Id16),
    CreateObjectWithBuffer = (0x10, "createobjectwithbuffer", Format::Id16),
    GetModuleNamespace = (0x11, "getmodulenamespace", Format::Imm8),
    WideGetModuleNamespace = (0x12, "wide.getmodulenamespace", Format::Imm16),
    StModuleVar = (0x13, "stmodulevar", Format::Imm8),
    WideStModuleVar = (0x14, "wide.stmodulevar", Format::Imm16),
    LdLocalModuleVar = (0x15, "ldlocalmodulevar", Format::Imm8),
    WideLdLocalModuleVar = (0x16, "wide.ldlocalmodulevar", Format::Imm16),
    LdExternalModuleVar = (0x17, "ldexternalmodulevar", Format::Imm8),
    WideLdExternalModuleVar = (0x18, "wide.ldexternalmodulevar", Format::Imm16),
}

impl Opcode {
    /// Whether the first immediate is a local-export slot index.
    pub fn reads_local_export_slot(self) -> bool {
        matches!(
            self,
            Opcode::LdLocalModuleVar
                | Opcode::WideLdLocalModuleVar
                | Opcode::StModuleVar
                | Opcode::WideStModuleVar
        )
    }

    /// Whether the first immediate is a regular-import slot index.
    pub fn reads_regular_import_slot(self) -> bool {
        matches!(
            self,
            Opcode::LdExternalModuleVar | Opcode::WideLdExternalModuleVar
        )
    }

    /// Whether the id operand names a function (method table reference).
    pub fn id_is_method(self) -> bool {
        matches!(self, Opcode::DefineFunc)
    }

    /// Whether the id operand names a literal array.
    pub fn id_is_literal_array(self) -> bool {
        matches!(
            self,
            Opcode::CreateArrayWithBuffer | Opcode::CreateObjectWithBuffer
        )
    }

    /// Whether the id operand names a string.
    pub fn id_is_string(self) -> bool {
        matches!(self, Opcode::LdaStr)
    }
}

/// Source position attached to an instruction for debug-info emission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsDebug {
    pub line: u32,
    pub column: u32,
}

/// One symbolic instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ins {
    pub opcode: Opcode,
    #[serde(default)]
    pub regs: Vec<u16>,
    #[serde(default)]
    pub imms: Vec<Imm>,
    /// String / method / literal-array operands, symbolic until emission.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Label defined at this instruction, if any.
    #[serde(default)]
    pub label: Option<String>,
    /// Jump target label, for jump formats.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub debug: InsDebug,
}

impl Ins {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            regs: Vec::new(),
            imms: Vec::new(),
            ids: Vec::new(),
            label: None,
            target: None,
            debug: InsDebug::default(),
        }
    }

    pub fn with_imm(opcode: Opcode, imm: i64) -> Self {
        let mut ins = Self::new(opcode);
        ins.imms.push(Imm::Int(imm));
        ins
    }

    pub fn with_id(opcode: Opcode, id: impl Into<String>) -> Self {
        let mut ins = Self::new(opcode);
        ins.ids.push(id.into());
        ins
    }

    /// First immediate as a module slot index, when the opcode addresses a
    /// module-variable slot.
    pub fn module_slot(&self) -> Option<u32> {
        if !self.opcode.reads_local_export_slot() && !self.opcode.reads_regular_import_slot() {
            return None;
        }
        self.imms.first().and_then(|i| i.as_int()).map(|v| v as u32)
    }

    /// Overwrite the module slot immediate.
    pub fn set_module_slot(&mut self, slot: u32) {
        if let Some(imm) = self.imms.first_mut() {
            *imm = Imm::Int(slot as i64);
        }
    }
}
