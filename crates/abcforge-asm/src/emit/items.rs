//! Binary-file items: the indexed entities of the output container.
//!
//! Items are created by the pipeline stages, assigned offsets by layout, and
//! serialized by the container writer. Cross-references between items are
//! typed ids resolved to byte offsets only at write time.

macro_rules! item_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u16);

        impl $name {
            #[inline]
            pub fn get(self) -> u16 {
                self.0
            }
        }
    };
}

item_id!(
    /// Index into the string item table.
    StringItemId
);
item_id!(
    /// Index into the class item table (concrete and foreign).
    ClassItemId
);
item_id!(
    /// Index into the field item table.
    FieldItemId
);
item_id!(
    /// Index into the method item table. Doubles as the 16-bit method
    /// operand value in encoded instructions.
    MethodItemId
);
item_id!(
    /// Index into the literal-array item table.
    LiteralArrayItemId
);
item_id!(
    /// Index into the code item table.
    CodeItemId
);
item_id!(
    /// Index into the debug item table.
    DebugItemId
);

/// An interned string.
#[derive(Clone, Debug)]
pub struct StringItem {
    pub text: String,
    pub offset: u32,
}

impl StringItem {
    /// u16 length prefix + UTF-8 bytes.
    pub fn byte_size(&self) -> usize {
        2 + self.text.len()
    }
}

/// A class item; `foreign` marks external declarations.
#[derive(Clone, Debug)]
pub struct ClassItem {
    pub name: StringItemId,
    pub access_flags: u32,
    pub foreign: bool,
    pub base: Option<ClassItemId>,
    pub interfaces: Vec<ClassItemId>,
    pub source_file: Option<StringItemId>,
    pub offset: u32,
}

impl ClassItem {
    pub fn byte_size(&self) -> usize {
        // name + access + foreign byte + base + source_file + iface count
        4 + 4 + 1 + 4 + 4 + 1 + 4 * self.interfaces.len()
    }
}

/// A field item; fields of foreign classes are themselves foreign.
#[derive(Clone, Debug)]
pub struct FieldItem {
    pub class: ClassItemId,
    pub name: StringItemId,
    /// Type descriptor string.
    pub ty: StringItemId,
    pub access_flags: u32,
    pub foreign: bool,
    /// Default value, attached at the annotation stage.
    pub value: Option<ValueItem>,
    pub offset: u32,
}

impl FieldItem {
    pub fn byte_size(&self) -> usize {
        let value = match &self.value {
            Some(v) => v.byte_size(),
            None => 0,
        };
        4 + 4 + 4 + 4 + 1 + 1 + value
    }
}

/// A method item; `code`/`debug` stay `None` for foreign methods.
#[derive(Clone, Debug)]
pub struct MethodItem {
    pub class: ClassItemId,
    pub name: StringItemId,
    pub access_flags: u32,
    pub foreign: bool,
    pub num_args: u8,
    pub code: Option<CodeItemId>,
    pub debug: Option<DebugItemId>,
    pub offset: u32,
}

impl MethodItem {
    pub fn byte_size(&self) -> usize {
        4 + 4 + 4 + 1 + 1 + 4 + 4
    }
}

/// A literal value resolved to binary form.
///
/// Serialized sizes must stay stable across the export-entities patch:
/// `String`, `Method`, and `Array` all serialize as a 4-byte offset, the
/// same width as the `U32` they are patched into.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralItem {
    TagByte(u8),
    Bool(bool),
    U32(u32),
    F32(f32),
    F64(f64),
    String(StringItemId),
    Method(MethodItemId),
    Affiliate(u16),
    Array(LiteralArrayItemId),
    StringArray(Vec<StringItemId>),
    Null,
}

impl LiteralItem {
    pub fn byte_size(&self) -> usize {
        match self {
            LiteralItem::TagByte(_) | LiteralItem::Bool(_) | LiteralItem::Null => 1,
            LiteralItem::Affiliate(_) => 2,
            LiteralItem::U32(_)
            | LiteralItem::F32(_)
            | LiteralItem::String(_)
            | LiteralItem::Method(_)
            | LiteralItem::Array(_) => 4,
            LiteralItem::F64(_) => 8,
            LiteralItem::StringArray(items) => 4 + 4 * items.len(),
        }
    }
}

/// A named literal array.
#[derive(Clone, Debug)]
pub struct LiteralArrayItem {
    pub key: String,
    pub literals: Vec<LiteralItem>,
    pub offset: u32,
}

impl LiteralArrayItem {
    pub fn byte_size(&self) -> usize {
        4 + self
            .literals
            .iter()
            .map(LiteralItem::byte_size)
            .sum::<usize>()
    }
}

/// A scalar value carried by an annotation element or a field default.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueItem {
    Bool(bool),
    I32(i32),
    F64(f64),
    Str(StringItemId),
    Method(MethodItemId),
    Array(LiteralArrayItemId),
}

impl ValueItem {
    /// Tag byte + payload.
    pub fn byte_size(&self) -> usize {
        1 + match self {
            ValueItem::Bool(_) => 1,
            ValueItem::I32(_) | ValueItem::Str(_) | ValueItem::Method(_) | ValueItem::Array(_) => 4,
            ValueItem::F64(_) => 8,
        }
    }
}

/// What an annotation is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationOwner {
    Class(ClassItemId),
    Field(FieldItemId),
    Method(MethodItemId),
    /// One parameter of a method, by position.
    Param(MethodItemId, u8),
}

/// One annotation element.
#[derive(Clone, Debug)]
pub struct ElementItem {
    pub name: StringItemId,
    pub value: ValueItem,
}

/// An annotation instance item.
#[derive(Clone, Debug)]
pub struct AnnotationItem {
    pub owner: AnnotationOwner,
    /// Class item of the annotation-interface record.
    pub interface: ClassItemId,
    /// Runtime-visible vs compile-time-only, plus the type-annotation bit.
    pub runtime: bool,
    pub type_annotation: bool,
    pub elements: Vec<ElementItem>,
    pub offset: u32,
}

impl AnnotationItem {
    pub fn byte_size(&self) -> usize {
        // owner kind + owner offset + param index + interface + flags + count
        let header = 1 + 4 + 1 + 4 + 1 + 1;
        header
            + self
                .elements
                .iter()
                .map(|e| 4 + e.value.byte_size())
                .sum::<usize>()
    }
}

/// One catch handler inside a try block.
#[derive(Clone, Debug)]
pub struct CatchItem {
    /// Class item of the caught exception type; `None` is a catch-all.
    pub exception: Option<ClassItemId>,
    pub handler_pc: u32,
}

/// One try block: a bytecode range plus its handlers in declaration order.
#[derive(Clone, Debug)]
pub struct TryBlockItem {
    pub start_pc: u32,
    pub length: u32,
    pub catches: Vec<CatchItem>,
}

/// A function body: encoded instructions plus the try/catch table.
///
/// The shell (with a precomputed size) is created when methods are
/// processed; `bytes` and `try_blocks` are filled by the bytecode stage.
#[derive(Clone, Debug)]
pub struct CodeItem {
    /// Mangled signature of the owning function.
    pub function: String,
    pub regs: u16,
    pub num_args: u8,
    /// Instruction byte size, fixed by formats before encoding.
    pub code_size: u32,
    pub bytes: Vec<u8>,
    /// Number of try blocks, fixed when the shell is created.
    pub try_shape: Vec<u8>,
    pub try_blocks: Vec<TryBlockItem>,
    pub offset: u32,
}

impl CodeItem {
    pub fn byte_size(&self) -> usize {
        // regs + num_args + code_size + bytes + try count
        let mut size = 2 + 1 + 4 + self.code_size as usize + 1;
        for &ncatch in &self.try_shape {
            size += 4 + 4 + 1 + 8 * ncatch as usize;
        }
        size
    }
}

/// A named local variable entry in a debug item.
#[derive(Clone, Debug)]
pub struct LocalVarItem {
    pub name: StringItemId,
    pub reg: u16,
    pub start_pc: u32,
    pub length: u32,
}

/// Per-function debug info: line/column records and local variables.
#[derive(Clone, Debug)]
pub struct DebugItem {
    pub function: String,
    pub source_file: Option<StringItemId>,
    pub source_code: Option<StringItemId>,
    /// (pc, line, column) per instruction; filled by the bytecode stage.
    pub lines: Vec<(u32, u32, u32)>,
    /// Number of line records, fixed when the shell is created.
    pub line_count: u32,
    pub locals: Vec<LocalVarItem>,
    pub offset: u32,
}

impl DebugItem {
    pub fn byte_size(&self) -> usize {
        4 + 4 + 4 + 12 * self.line_count as usize + 2 + 14 * self.locals.len()
    }
}
